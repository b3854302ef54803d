//! The symbolic table mapping codes to hexagram entries
//!
//! The full 64-entry table ships embedded in the binary. An override file in
//! the same JSON shape (code string → entry) may replace it, and may be
//! partial: missing codes resolve to the unknown placeholder.

use super::hexagram::{CodeParseError, HexagramCode, HexagramEntry};
use rust_embed::Embed;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

const BUILTIN_TABLE: &str = "hexagrams.json";

#[derive(Embed)]
#[folder = "data/"]
struct DataAssets;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("embedded table {0} is missing")]
    MissingAsset(&'static str),
    #[error("failed to read table: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed table JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid code {code:?} in table: {source}")]
    InvalidCode {
        code: String,
        source: CodeParseError,
    },
}

#[derive(Debug, Clone)]
pub struct HexagramTable {
    entries: HashMap<HexagramCode, HexagramEntry>,
    unknown: HexagramEntry,
}

impl HexagramTable {
    pub fn from_entries(entries: impl IntoIterator<Item = (HexagramCode, HexagramEntry)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            unknown: HexagramEntry::unknown(),
        }
    }

    /// The table compiled into the binary
    pub fn builtin() -> Result<Self, TableError> {
        let asset =
            DataAssets::get(BUILTIN_TABLE).ok_or(TableError::MissingAsset(BUILTIN_TABLE))?;
        Self::from_json_slice(&asset.data)
    }

    pub fn from_json_slice(json: &[u8]) -> Result<Self, TableError> {
        let raw: BTreeMap<String, HexagramEntry> = serde_json::from_slice(json)?;
        let mut entries = HashMap::with_capacity(raw.len());
        for (code, entry) in raw {
            let parsed = code
                .parse::<HexagramCode>()
                .map_err(|source| TableError::InvalidCode {
                    code: code.clone(),
                    source,
                })?;
            entries.insert(parsed, entry);
        }
        Ok(Self::from_entries(entries))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let bytes = std::fs::read(path)?;
        Self::from_json_slice(&bytes)
    }

    /// Look up a code; never fails
    pub fn lookup(&self, code: HexagramCode) -> &HexagramEntry {
        self.entries.get(&code).unwrap_or(&self.unknown)
    }

    pub fn get(&self, code: HexagramCode) -> Option<&HexagramEntry> {
        self.entries.get(&code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
