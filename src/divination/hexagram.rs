//! Hexagram codes and readings
//!
//! A code is six bits with index 0 as the bottom line, the first one thrown.
//! The textual form writes the bottom line first, so `"100010"` is 屯
//! (thunder below, water above). Reversing the order names a different
//! hexagram, which is why both directions are tested.

use super::coin::Line;
use super::table::HexagramTable;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of lines in a hexagram
pub const LINE_COUNT: usize = 6;

/// Six line values packed into the low bits; bit `i` is line `i`, bottom first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexagramCode(u8);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodeParseError {
    #[error("hexagram code must have 6 lines, got {0}")]
    WrongLength(usize),
    #[error("invalid line character {0:?}, expected '0' or '1'")]
    InvalidLine(char),
}

impl HexagramCode {
    /// Build from line values, bottom first
    pub fn from_values(values: [bool; LINE_COUNT]) -> Self {
        let bits = values
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, yang)| if *yang { acc | (1 << i) } else { acc });
        Self(bits)
    }

    pub fn from_lines(lines: &[Line; LINE_COUNT]) -> Self {
        Self::from_values(lines.map(|line| line.is_yang()))
    }

    /// Line values, bottom first
    pub fn values(self) -> [bool; LINE_COUNT] {
        std::array::from_fn(|i| self.is_yang(i))
    }

    pub fn is_yang(self, index: usize) -> bool {
        index < LINE_COUNT && self.0 & (1 << index) != 0
    }

    /// Flip every line whose position is set in `mask`
    pub fn flip(self, mask: [bool; LINE_COUNT]) -> Self {
        Self(self.0 ^ Self::from_values(mask).0)
    }

    /// Positions at which two codes differ, bottom first
    pub fn diff(self, other: Self) -> Vec<usize> {
        (0..LINE_COUNT)
            .filter(|i| self.is_yang(*i) != other.is_yang(*i))
            .collect()
    }
}

impl fmt::Display for HexagramCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for yang in self.values() {
            f.write_str(if yang { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for HexagramCode {
    type Err = CodeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let count = s.chars().count();
        if count != LINE_COUNT {
            return Err(CodeParseError::WrongLength(count));
        }
        let mut values = [false; LINE_COUNT];
        for (slot, c) in values.iter_mut().zip(s.chars()) {
            *slot = match c {
                '1' => true,
                '0' => false,
                other => return Err(CodeParseError::InvalidLine(other)),
            };
        }
        Ok(Self::from_values(values))
    }
}

impl Serialize for HexagramCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HexagramCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A named hexagram from the symbolic table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexagramEntry {
    pub name: String,
    pub meaning: String,
    pub interpretation: String,
}

impl HexagramEntry {
    pub fn new(
        name: impl Into<String>,
        meaning: impl Into<String>,
        interpretation: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            meaning: meaning.into(),
            interpretation: interpretation.into(),
        }
    }

    /// Stand-in for codes missing from the table
    pub fn unknown() -> Self {
        Self::new("未知", "未知", "解释未知")
    }

    /// Interpretation up to its first full stop
    pub fn headline(&self) -> &str {
        self.interpretation
            .split('。')
            .next()
            .unwrap_or(&self.interpretation)
    }
}

/// Outcome of a completed divination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reading {
    pub primary_code: HexagramCode,
    pub primary: HexagramEntry,
    pub changed_code: Option<HexagramCode>,
    pub changed: Option<HexagramEntry>,
    pub has_changes: bool,
    /// Indices of changing lines, bottom first
    pub changing_positions: Vec<usize>,
    /// Combined reading of primary and changed hexagrams
    pub synthesis: Option<String>,
}

/// Resolve six lines against the table
///
/// Pure: the same lines and table always give the same reading. Codes absent
/// from the table resolve to [`HexagramEntry::unknown`].
pub fn resolve(lines: &[Line; LINE_COUNT], table: &HexagramTable) -> Reading {
    let primary_code = HexagramCode::from_lines(lines);
    let primary = table.lookup(primary_code).clone();

    let changing = lines.map(|line| line.changing());
    let changing_positions: Vec<usize> = (0..LINE_COUNT).filter(|i| changing[*i]).collect();
    let has_changes = !changing_positions.is_empty();

    let (changed_code, changed) = if has_changes {
        let code = primary_code.flip(changing);
        (Some(code), Some(table.lookup(code).clone()))
    } else {
        (None, None)
    };

    let synthesis = changed
        .as_ref()
        .map(|changed| synthesize(&primary, changed, changing_positions.len()));

    Reading {
        primary_code,
        primary,
        changed_code,
        changed,
        has_changes,
        changing_positions,
        synthesis,
    }
}

fn synthesize(primary: &HexagramEntry, changed: &HexagramEntry, changing_count: usize) -> String {
    let pace = if changing_count > 1 {
        "有多个爻发生变化，意味着变化较为复杂且急剧。"
    } else {
        "只有一个爻发生变化，意味着变化较为缓和且有序。"
    };
    format!(
        "你的卦象从{}卦变化为{}卦，表明你正处于变化的过程中。目前的情况是{}，而未来的趋势是{}。{}",
        primary.name,
        changed.name,
        primary.headline(),
        changed.headline(),
        pace
    )
}
