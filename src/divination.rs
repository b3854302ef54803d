//! Toss-to-hexagram pipeline
//!
//! Entropy → three coin faces → one line; six lines → hexagram code →
//! reading from the symbolic table. Everything here is synchronous and free of
//! I/O apart from loading the table.

pub mod coin;
pub mod entropy;
pub mod hexagram;
pub mod table;

#[cfg(test)]
mod proptests;

pub use coin::{CoinFace, CoinTossEngine, Line, LineKind, LINE_POSITIONS};
pub use entropy::{EntropySource, MotionEntropy};
pub use hexagram::{resolve, HexagramCode, HexagramEntry, Reading, LINE_COUNT};
pub use table::{HexagramTable, TableError};
