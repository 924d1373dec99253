use serde::{Deserialize, Serialize};

/// Stage of a search run
///
/// Declaration order is the order a run moves through; a run never goes back
/// to an earlier phase except for returning to `Idle` at the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SearchPhase {
    #[default]
    Idle,
    Indexed,
    LegacySmall,
    LegacyLarge,
    UnindexedSmall,
    UnindexedLarge,
    ToolOutputsSmall,
    ToolOutputsLarge,
}

impl SearchPhase {
    pub fn label(&self) -> &'static str {
        match self {
            SearchPhase::Idle => "idle",
            SearchPhase::Indexed => "indexed",
            SearchPhase::LegacySmall => "scanning small sessions",
            SearchPhase::LegacyLarge => "scanning large sessions",
            SearchPhase::UnindexedSmall => "scanning unindexed small sessions",
            SearchPhase::UnindexedLarge => "scanning unindexed large sessions",
            SearchPhase::ToolOutputsSmall => "scanning tool outputs (small)",
            SearchPhase::ToolOutputsLarge => "scanning tool outputs (large)",
        }
    }
}

/// Phase plus per-tier scan counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub phase: SearchPhase,
    pub scanned_small: usize,
    pub total_small: usize,
    pub scanned_large: usize,
    pub total_large: usize,
}

impl Progress {
    /// Move to `phase` unless that would step backwards
    pub fn advance_phase(&mut self, phase: SearchPhase) {
        if phase > self.phase {
            self.phase = phase;
        }
    }

    pub fn add_totals(&mut self, small: usize, large: usize) {
        self.total_small += small;
        self.total_large += large;
    }

    pub fn record_small(&mut self, count: usize) {
        self.scanned_small = (self.scanned_small + count).min(self.total_small);
    }

    pub fn record_large(&mut self, count: usize) {
        self.scanned_large = (self.scanned_large + count).min(self.total_large);
    }

    pub fn is_complete(&self) -> bool {
        self.scanned_small == self.total_small && self.scanned_large == self.total_large
    }
}
