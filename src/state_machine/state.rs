//! Session state types

use crate::divination::{HexagramTable, Line, Reading, LINE_COUNT};
use crate::shake::TossGate;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Step before the ritual has started
pub const STEP_IDLE: u8 = 0;
/// Step once all six lines are thrown and the reading is resolved
pub const STEP_COMPLETE: u8 = 7;

/// The divination in progress
///
/// Only the transition function writes a `Session`; everything else sees it
/// through snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub(super) step: u8,
    pub(super) lines: Vec<Line>,
    pub(super) flipping: bool,
    pub(super) reading: Option<Reading>,
    /// Bumped on every reset; settle timers carry the epoch they were
    /// scheduled in
    pub(super) epoch: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            step: STEP_IDLE,
            lines: Vec::with_capacity(LINE_COUNT),
            flipping: false,
            reading: None,
            epoch: 0,
        }
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    /// Lines thrown so far, bottom first
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn flipping(&self) -> bool {
        self.flipping
    }

    pub fn reading(&self) -> Option<&Reading> {
        self.reading.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_complete(&self) -> bool {
        self.step == STEP_COMPLETE
    }

    /// Whether a toss request would be honoured right now
    pub fn accepting_tosses(&self) -> bool {
        self.toss_gate().accepting()
    }

    pub fn toss_gate(&self) -> TossGate {
        TossGate {
            step: self.step,
            flipping: self.flipping,
        }
    }

    /// The six lines, once all of them are in
    pub fn full_lines(&self) -> Option<[Line; LINE_COUNT]> {
        <[Line; LINE_COUNT]>::try_from(self.lines.as_slice()).ok()
    }

    /// Append the next line. Lines are never reordered or edited afterwards.
    pub(super) fn record_line(&mut self, line: Line) {
        debug_assert!(self.lines.len() < LINE_COUNT);
        self.lines.push(line);
    }
}

/// Immutable inputs to the transition function
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub table: Arc<HexagramTable>,
    /// How long the coins spin before a toss lands
    pub settle_delay: Duration,
}

impl SessionContext {
    pub fn new(table: Arc<HexagramTable>, settle_delay: Duration) -> Self {
        Self {
            table,
            settle_delay,
        }
    }
}
