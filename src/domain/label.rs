// ============================================================
// Layer 3 — ClassLabel Domain Type
// ============================================================
// The fixed, closed set of classes the model distinguishes.
//
// The numeric index is the position of the class in the
// model's output logits, so it must never change between
// training and serving:
//
//   index 0 → Cat
//   index 1 → Dog
//
// Folder names in a corpus are matched case-insensitively,
// while the wire format (JSON responses, tracker params)
// always uses the canonical capitalised name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the two image classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClassLabel {
    Cat,
    Dog,
}

impl ClassLabel {
    /// All classes in logit order.
    pub const ALL: [ClassLabel; 2] = [ClassLabel::Cat, ClassLabel::Dog];

    /// Number of classes, the width of the model's output layer.
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this class in the logit vector.
    pub const fn index(self) -> usize {
        match self {
            Self::Cat => 0,
            Self::Dog => 1,
        }
    }

    /// Inverse of [`ClassLabel::index`].
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Canonical wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cat => "Cat",
            Self::Dog => "Dog",
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown class label '{s}'"))
    }
}
