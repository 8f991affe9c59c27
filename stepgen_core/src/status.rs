//! Result of driving one move to completion.

/// Summary returned by [`crate::runner::run_move`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Absolute position after the move, in counts.
    pub final_position: i64,
    /// Counts travelled during the move.
    pub travelled: u64,
    /// Engine ticks spent, including the pickup tick.
    pub ticks: u64,
    /// Largest single-tick burst observed.
    pub peak_burst: i32,
    /// Tick deadlines missed by the paced thread (0 in direct mode).
    pub overruns: u64,
}

impl MoveOutcome {
    /// Mean counts per tick over the whole move.
    pub fn mean_rate(&self) -> f64 {
        if self.ticks == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let r = self.travelled as f64 / self.ticks as f64;
        r
    }
}
