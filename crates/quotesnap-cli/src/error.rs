use quotesnap_core::{CoreError, HttpError, StoreError, UniverseError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Universe(#[from] UniverseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("http client error: {0}")]
    Http(#[from] HttpError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for CliError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Validation(error) => Self::Validation(error),
            CoreError::Store(error) => Self::Store(error),
            CoreError::Universe(error) => Self::Universe(error),
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Universe(UniverseError::TickersNotFound(_) | UniverseError::Empty(_)) => 2,
            Self::Universe(UniverseError::Fetch(_)) => 3,
            Self::Universe(UniverseError::Csv(_)) => 4,
            Self::Universe(UniverseError::Io { .. } | UniverseError::Store(_)) => 10,
            Self::Store(StoreError::Encode(_) | StoreError::Decode { .. }) => 4,
            Self::Store(_) => 10,
            Self::Http(_) => 3,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn input_errors_exit_with_two() {
        let missing = CliError::from(UniverseError::TickersNotFound(PathBuf::from("t.txt")));
        assert_eq!(missing.exit_code(), 2);
        assert_eq!(CliError::from(ValidationError::ZeroBatchSize).exit_code(), 2);
    }

    #[test]
    fn write_failures_exit_with_ten() {
        let error = StoreError::io("out.json", std::io::Error::other("disk full"));
        assert_eq!(CliError::from(error).exit_code(), 10);
    }

    #[test]
    fn upstream_failures_exit_with_three() {
        let error = CliError::from(UniverseError::Fetch(String::from("status 503")));
        assert_eq!(error.exit_code(), 3);
    }
}
