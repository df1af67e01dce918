//! Stop rules for the develop/verify loop.

use serde::Serialize;

/// Decision taken after each verification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum LoopDecision {
    /// Keep going; the report's feedback drives the next development cycle.
    Continue,
    /// The pass rate reached the threshold.
    ThresholdMet { pass_rate: f64, threshold: f64 },
    /// The iteration budget is spent without reaching the threshold.
    MaxIterationsReached { max_iterations: u32 },
}

impl LoopDecision {
    pub fn is_stop(self) -> bool {
        !matches!(self, LoopDecision::Continue)
    }

    pub fn is_success(self) -> bool {
        matches!(self, LoopDecision::ThresholdMet { .. })
    }
}

/// Decide whether to stop after `iteration` (1-based) produced `pass_rate`.
///
/// Meeting the threshold wins over exhausting the budget, so a final iteration
/// that passes is reported as a success.
pub fn decide(iteration: u32, max_iterations: u32, pass_rate: f64, threshold: f64) -> LoopDecision {
    if pass_rate >= threshold {
        return LoopDecision::ThresholdMet {
            pass_rate,
            threshold,
        };
    }
    if iteration >= max_iterations {
        return LoopDecision::MaxIterationsReached { max_iterations };
    }
    LoopDecision::Continue
}
