//! Benchmark phases and the labels that identify individual trials.
//!
//! A trial label renders as `{PHASE}_{index}` for measured trials and
//! `{PHASE}_WARMUP_{index}` for warmups. Labels are always built from their
//! parts; nothing in the crate parses them back.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumIter};

/// The three benchmark phases, in the order they run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    StrumDisplay,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    /// Raw loader iteration, timed from construction.
    Io,
    /// One real batch replayed for every step.
    Synthetic,
    /// Real batches through the host training loop.
    Full,
}

impl Phase {
    /// Whether trials of this phase replay a single cached batch.
    pub fn is_cached(self) -> bool {
        matches!(self, Phase::Synthetic)
    }
}

/// Identifies one trial within a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrialLabel {
    phase: Phase,
    index: usize,
    warmup: bool,
}

impl TrialLabel {
    pub fn measured(phase: Phase, index: usize) -> Self {
        Self {
            phase,
            index,
            warmup: false,
        }
    }

    pub fn warmup(phase: Phase, index: usize) -> Self {
        Self {
            phase,
            index,
            warmup: true,
        }
    }

    /// Label for the `ordinal`-th trial of a phase (0-based, warmups first).
    ///
    /// The first `nwarmup` ordinals are warmups; measured trials are indexed
    /// from zero after them.
    pub fn from_ordinal(phase: Phase, ordinal: usize, nwarmup: usize) -> Self {
        if ordinal < nwarmup {
            Self::warmup(phase, ordinal)
        } else {
            Self::measured(phase, ordinal - nwarmup)
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_warmup(&self) -> bool {
        self.warmup
    }
}

impl Display for TrialLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.warmup {
            write!(f, "{}_WARMUP_{}", self.phase, self.index)
        } else {
            write!(f, "{}_{}", self.phase, self.index)
        }
    }
}
