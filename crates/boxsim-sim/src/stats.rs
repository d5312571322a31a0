//! Trial statistics tracking.
//!
//! [`TrialStats`] records cumulative counters across the trials of one
//! simulation: completed trials, simulated steps and waived bound violations.

// ---------------------------------------------------------------------------
// TrialStats
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrialStats {
    /// Trials that produced an effect.
    pub trials_completed: u32,
    /// Simulation steps across all completed trials.
    pub total_steps: u64,
    /// Effects clamped into bounds under a waiver.
    pub waived: u32,
}

impl TrialStats {
    pub const fn new() -> Self {
        Self {
            trials_completed: 0,
            total_steps: 0,
            waived: 0,
        }
    }

    pub(crate) fn record(&mut self, steps: u32, waived: bool) {
        self.trials_completed += 1;
        self.total_steps += u64::from(steps);
        if waived {
            self.waived += 1;
        }
    }

    /// Fraction of completed trials whose effect had to be clamped.
    pub fn waived_ratio(&self) -> Option<f64> {
        if self.trials_completed == 0 {
            return None;
        }
        Some(f64::from(self.waived) / f64::from(self.trials_completed))
    }
}
