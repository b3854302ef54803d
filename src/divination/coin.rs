//! Coins and lines

use super::entropy::EntropySource;
use crate::motion::MotionSample;
use serde::{Deserialize, Serialize};

/// One coin's landing face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoinFace {
    Heads,
    Tails,
}

impl CoinFace {
    pub fn from_heads(heads: bool) -> Self {
        if heads {
            CoinFace::Heads
        } else {
            CoinFace::Tails
        }
    }

    pub fn is_heads(self) -> bool {
        self == CoinFace::Heads
    }
}

/// Traditional classification of a three-coin toss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// Three heads: yang, changing
    OldYang,
    /// Three tails: yin, changing
    OldYin,
    /// Two heads: yang, stable
    YoungYang,
    /// One head: yin, stable
    YoungYin,
}

impl LineKind {
    pub fn from_heads_count(heads: usize) -> Self {
        match heads {
            3 => LineKind::OldYang,
            2 => LineKind::YoungYang,
            1 => LineKind::YoungYin,
            _ => LineKind::OldYin,
        }
    }

    pub fn value(self) -> u8 {
        match self {
            LineKind::OldYang | LineKind::YoungYang => 1,
            LineKind::OldYin | LineKind::YoungYin => 0,
        }
    }

    pub fn is_changing(self) -> bool {
        matches!(self, LineKind::OldYang | LineKind::OldYin)
    }

    pub fn name(self) -> &'static str {
        match self {
            LineKind::OldYang => "old yang",
            LineKind::OldYin => "old yin",
            LineKind::YoungYang => "young yang",
            LineKind::YoungYin => "young yin",
        }
    }
}

/// Names of the six line positions, bottom first
pub const LINE_POSITIONS: [&str; 6] = ["初爻", "二爻", "三爻", "四爻", "五爻", "上爻"];

/// One line of a hexagram
///
/// Only constructible from three faces, so `value` and `changing` always
/// agree with the coins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Line {
    value: u8,
    changing: bool,
    faces: [CoinFace; 3],
}

impl Line {
    pub fn from_faces(faces: [CoinFace; 3]) -> Self {
        let heads = faces.iter().filter(|f| f.is_heads()).count();
        let kind = LineKind::from_heads_count(heads);
        Self {
            value: kind.value(),
            changing: kind.is_changing(),
            faces,
        }
    }

    /// 1 for yang, 0 for yin
    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn is_yang(&self) -> bool {
        self.value == 1
    }

    pub fn changing(&self) -> bool {
        self.changing
    }

    pub fn faces(&self) -> [CoinFace; 3] {
        self.faces
    }

    pub fn heads(&self) -> usize {
        self.faces.iter().filter(|f| f.is_heads()).count()
    }

    pub fn kind(&self) -> LineKind {
        LineKind::from_heads_count(self.heads())
    }
}

/// Turns entropy into lines
pub struct CoinTossEngine<E> {
    entropy: E,
}

impl<E: EntropySource> CoinTossEngine<E> {
    pub fn new(entropy: E) -> Self {
        Self { entropy }
    }

    /// Toss three coins, seeded from `sample` when there is one
    pub fn toss(&mut self, sample: Option<&MotionSample>) -> Line {
        Line::from_faces(self.entropy.draw_faces(sample))
    }
}
