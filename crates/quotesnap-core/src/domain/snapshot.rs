use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{PriceRecord, PriceSource, Symbol, UtcDateTime};

/// Session window a snapshot was taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotWindow {
    MidSession,
    Close,
    #[default]
    Manual,
}

impl SnapshotWindow {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MidSession => "mid_session",
            Self::Close => "close",
            Self::Manual => "manual",
        }
    }
}

impl Display for SnapshotWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-pass success counters of one fetch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchStats {
    pub requested: usize,
    pub bulk_ok: usize,
    pub retry_bulk_ok: usize,
    pub retry_bulk_small_ok: usize,
    pub retry_ok: usize,
    pub single_ok: usize,
}

impl FetchStats {
    pub fn record_success(&mut self, source: PriceSource, count: usize) {
        match source {
            PriceSource::Bulk => self.bulk_ok += count,
            PriceSource::RetryBulk => {
                self.retry_bulk_ok += count;
                self.retry_ok += count;
            }
            PriceSource::RetryBulkSmall => {
                self.retry_bulk_small_ok += count;
                self.retry_ok += count;
            }
            PriceSource::Single => self.single_ok += count,
            PriceSource::Previous | PriceSource::Missing => {}
        }
    }

    pub const fn fetched(&self) -> usize {
        self.bulk_ok + self.retry_ok + self.single_ok
    }
}

/// Symbol → record mapping that keeps insertion order and rejects duplicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    entries: Vec<(Symbol, PriceRecord)>,
    index: HashMap<Symbol, usize>,
}

impl PriceTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Inserts a record unless the symbol is already present. Returns whether it was inserted.
    pub fn insert(&mut self, symbol: Symbol, record: PriceRecord) -> bool {
        if self.index.contains_key(&symbol) {
            return false;
        }
        self.index.insert(symbol.clone(), self.entries.len());
        self.entries.push((symbol, record));
        true
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&PriceRecord> {
        self.index.get(symbol).map(|&at| &self.entries[at].1)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.index.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &PriceRecord)> {
        self.entries.iter().map(|(symbol, record)| (symbol, record))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.iter().map(|(symbol, _)| symbol)
    }
}

impl Serialize for PriceTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (symbol, record) in &self.entries {
            map.serialize_entry(symbol.as_str(), record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PriceTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = PriceTable;

            fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str("a symbol to price record map")
            }

            // Each entry is judged on its own so one bad record cannot hide the rest.
            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut table = PriceTable::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, serde_json::Value>()? {
                    let symbol = match Symbol::parse(&key) {
                        Ok(symbol) => symbol,
                        Err(error) => {
                            tracing::warn!("skipping record with invalid symbol '{key}': {error}");
                            continue;
                        }
                    };
                    match PriceRecord::deserialize(value) {
                        Ok(record) => {
                            table.insert(symbol, record);
                        }
                        Err(error) => {
                            tracing::warn!("skipping unreadable record {symbol}: {error}")
                        }
                    }
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// Persisted price snapshot document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub dataset: String,
    #[serde(alias = "asOf", alias = "as_of")]
    pub as_of_utc: UtcDateTime,
    #[serde(default, alias = "asOfPerth")]
    pub as_of_local: String,
    #[serde(default)]
    pub window: SnapshotWindow,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub count_tickers: usize,
    #[serde(default)]
    pub count_fetched_now: usize,
    #[serde(default)]
    pub count_filled_from_previous: usize,
    #[serde(default)]
    pub count_missing: usize,
    #[serde(default)]
    pub missing: Vec<Symbol>,
    #[serde(default)]
    pub stats: FetchStats,
    pub prices: PriceTable,
}
