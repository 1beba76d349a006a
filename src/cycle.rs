//! Per-cycle scan counters.

use crate::classifier::Classification;
use std::fmt;

/// Counts for one scan cycle.
///
/// Owned by the scheduler: a fresh summary is created when a cycle starts and
/// reported when it ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Records delivered by the scanner during the cycle
    pub discovered: usize,
    /// Records that produced a sensor reading
    pub matched: usize,
}

impl CycleSummary {
    pub fn record(&mut self, classification: &Classification) {
        self.discovered += 1;
        if classification.is_match() {
            self.matched += 1;
        }
    }
}

impl fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scan complete: discovered={} matched={}",
            self.discovered, self.matched
        )
    }
}
