use std::io::Write;

use serde::Serialize;

use crate::error::CliError;

/// Writes the run summary to stdout as one JSON document.
pub fn render<T: Serialize>(summary: &T, pretty: bool) -> Result<(), CliError> {
    let text = if pretty {
        serde_json::to_string_pretty(summary)?
    } else {
        serde_json::to_string(summary)?
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}")?;
    Ok(())
}
