//! Rendering of the feedback text handed from verification to the next edit.
//!
//! Layout:
//!
//! ```text
//! === TEST RESULTS ===
//!
//! Passed: 1
//! Failed: 1
//! Partial: 0
//! Total: 2
//!
//! === FAILED TESTS ===
//!
//!
//! Test: test_2
//! Status: failed
//! Issues:
//!   - button missing
//! Observations: ...
//!
//! === RECOMMENDATIONS ===
//!
//! <model-written remediation>
//! ```

use crate::core::types::{TestResult, TestStatus};

pub const ALL_PASSED: &str = "All tests passed!";

/// Per-status tallies as shown in the feedback header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub passed: usize,
    pub failed: usize,
    pub partial: usize,
    pub total: usize,
}

impl StatusCounts {
    pub fn of(results: &[TestResult]) -> Self {
        let mut counts = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.status {
                TestStatus::Passed => counts.passed += 1,
                TestStatus::Failed => counts.failed += 1,
                TestStatus::Partial => counts.partial += 1,
            }
        }
        counts
    }
}

/// Results that need attention in the next edit cycle (failed and partial).
pub fn unpassed(results: &[TestResult]) -> Vec<&TestResult> {
    results.iter().filter(|r| !r.passed()).collect()
}

/// Render the feedback text.
///
/// `recommend` is called once, with the unpassed subset, only when that subset
/// is non-empty; its output is placed verbatim under the recommendations header.
pub fn render_feedback<F>(results: &[TestResult], recommend: F) -> String
where
    F: FnOnce(&[&TestResult]) -> String,
{
    let counts = StatusCounts::of(results);
    let mut parts = vec![
        "=== TEST RESULTS ===\n".to_string(),
        format!("Passed: {}", counts.passed),
        format!("Failed: {}", counts.failed),
        format!("Partial: {}", counts.partial),
        format!("Total: {}\n", counts.total),
    ];

    let failing = unpassed(results);
    if failing.is_empty() {
        parts.push(format!("\n{ALL_PASSED}"));
        return parts.join("\n");
    }

    parts.push("=== FAILED TESTS ===\n".to_string());
    for result in &failing {
        parts.push(format!("\nTest: {}", result.test_id));
        parts.push(format!("Status: {}", result.status));
        if !result.issues.is_empty() {
            parts.push("Issues:".to_string());
            parts.extend(result.issues.iter().map(|issue| format!("  - {issue}")));
        }
        if !result.observations.is_empty() {
            parts.push(format!("Observations: {}", result.observations));
        }
    }

    parts.push("\n=== RECOMMENDATIONS ===\n".to_string());
    parts.push(recommend(&failing));
    parts.join("\n")
}
