//! Shared data model for requirements, test cases and test results.
//!
//! Everything here is produced from model replies, so every field carries a
//! serde default: a partially-shaped reply still deserializes, and only a
//! reply that is not JSON at all (or has the wrong top-level shape) fails.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Requirement enriched with UI, interaction, data and dependency detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElaboratedRequirement {
    /// The high-level requirement this elaboration came from.
    pub requirement: String,
    pub functionality: String,
    pub ui_design: UiDesign,
    pub interactions: Vec<Interaction>,
    pub data: DataSpec,
    pub dependencies: Vec<String>,
}

impl ElaboratedRequirement {
    /// Minimal stand-in used when the elaboration reply cannot be parsed.
    pub fn fallback(requirement: &str) -> Self {
        Self {
            requirement: requirement.to_string(),
            functionality: requirement.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiDesign {
    pub layout: String,
    pub components: Vec<String>,
    pub styling: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Interaction {
    pub trigger: String,
    pub action: String,
    pub expected_result: String,
}

/// Where a requirement's data comes from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSpec {
    #[serde(rename = "type")]
    pub kind: DataKind,
    /// Free-form: models return either prose or a JSON object here.
    pub schema: serde_json::Value,
    pub source: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Database,
    Api,
    Mock,
    #[default]
    None,
}

impl<'de> Deserialize<'de> for DataKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(match raw.trim().to_ascii_lowercase().as_str() {
            "database" => DataKind::Database,
            "api" => DataKind::Api,
            "mock" => DataKind::Mock,
            _ => DataKind::None,
        })
    }
}

/// Narrative ("soap opera") test case: a persona walking through ordered steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestCase {
    pub test_id: String,
    pub requirement: String,
    pub persona: Persona,
    pub steps: Vec<TestStep>,
    pub validation: Validation,
}

impl TestCase {
    /// Stand-in used when the test-case reply cannot be parsed.
    ///
    /// `position` is the 1-based index of the test case in the plan.
    pub fn fallback(position: usize, requirement: &str) -> Self {
        Self {
            test_id: format!("test_{position}"),
            requirement: requirement.to_string(),
            persona: Persona {
                name: "User".to_string(),
                goal: "Test functionality".to_string(),
                context: String::new(),
            },
            steps: Vec::new(),
            validation: Validation::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    pub name: String,
    pub goal: String,
    pub context: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestStep {
    pub step_number: u32,
    pub description: String,
    pub action: String,
    pub expected_result: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Validation {
    pub functionality: String,
    pub visual: String,
}

/// Output of the requirement pipeline, generated once per run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestPlan {
    pub high_level_requirements: Vec<String>,
    pub detailed_requirements: Vec<ElaboratedRequirement>,
    pub test_cases: Vec<TestCase>,
}

/// Judged outcome of a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Partial,
}

impl TestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Partial => "partial",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: String,
    pub status: TestStatus,
    /// Judge confidence, clamped to `[0, 1]`.
    pub confidence: f64,
    pub issues: Vec<String>,
    pub observations: String,
}

impl TestResult {
    /// Failed result carrying a diagnostic issue and the raw judge reply.
    pub fn unjudged(test_id: &str, issue: impl Into<String>, observations: impl Into<String>) -> Self {
        Self {
            test_id: test_id.to_string(),
            status: TestStatus::Failed,
            confidence: 0.0,
            issues: vec![issue.into()],
            observations: observations.into(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

/// Aggregate verification result for one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub passed: usize,
    /// Every result that is not `passed` (partial included).
    pub failed: usize,
    pub total: usize,
    pub pass_rate: f64,
    /// False when the app never came up and no case was judged.
    pub deployed: bool,
    pub results: Vec<TestResult>,
    pub feedback: String,
}

impl TestReport {
    /// Build a report from judged results; tallies are derived, never passed in.
    pub fn from_results(results: Vec<TestResult>, feedback: String) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            passed,
            failed: total - passed,
            total,
            pass_rate: pass_rate(passed, total),
            deployed: true,
            results,
            feedback,
        }
    }

    /// Zero-pass report for an app that failed to start.
    pub fn deployment_failed(total: usize) -> Self {
        Self {
            passed: 0,
            failed: total,
            total,
            pass_rate: 0.0,
            deployed: false,
            results: Vec::new(),
            feedback: DEPLOYMENT_FAILED_FEEDBACK.to_string(),
        }
    }
}

pub const DEPLOYMENT_FAILED_FEEDBACK: &str = "Application failed to start. Check logs for errors.";

/// Fraction of passed cases; zero when nothing was run.
pub fn pass_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    passed as f64 / total as f64
}

/// What one development cycle changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevelopmentResult {
    /// Root-relative paths of successfully applied write/delete actions.
    pub files_modified: Vec<String>,
    /// Kind of every parsed action, in reply order (`file`, `delete`, or unknown kinds).
    pub actions_taken: Vec<String>,
}

/// Audit record for one develop/verify iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: u32,
    pub development: DevelopmentResult,
    pub testing: TestReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elaborated_requirement_tolerates_missing_fields() {
        let parsed: ElaboratedRequirement = serde_json::from_str(
            r#"{"requirement":"Display list of todos","ui_design":{"layout":"vertical list"},"data":{"type":"mock"}}"#,
        )
        .expect("parse");
        assert_eq!(parsed.requirement, "Display list of todos");
        assert_eq!(parsed.ui_design.layout, "vertical list");
        assert!(parsed.ui_design.components.is_empty());
        assert_eq!(parsed.data.kind, DataKind::Mock);
        assert!(parsed.dependencies.is_empty());
    }

    #[test]
    fn unknown_data_kind_maps_to_none() {
        let parsed: DataSpec =
            serde_json::from_str(r#"{"type":"database|api|mock|none"}"#).expect("parse");
        assert_eq!(parsed.kind, DataKind::None);
        let parsed: DataSpec = serde_json::from_str(r#"{"type":"API"}"#).expect("parse");
        assert_eq!(parsed.kind, DataKind::Api);
    }

    #[test]
    fn fallback_shapes_are_stable() {
        let req = ElaboratedRequirement::fallback("Add new todos");
        assert_eq!(req.requirement, "Add new todos");
        assert_eq!(req.functionality, "Add new todos");
        assert_eq!(req.data.kind, DataKind::None);
        assert!(req.interactions.is_empty());

        let case = TestCase::fallback(2, "Add new todos");
        assert_eq!(case.test_id, "test_2");
        assert_eq!(case.persona.name, "User");
        assert!(case.steps.is_empty());
    }

    #[test]
    fn report_counts_partial_as_not_passed() {
        let results = vec![
            TestResult {
                test_id: "a".to_string(),
                status: TestStatus::Passed,
                confidence: 0.9,
                issues: Vec::new(),
                observations: String::new(),
            },
            TestResult::unjudged("b", "broken", ""),
            TestResult {
                test_id: "c".to_string(),
                status: TestStatus::Partial,
                confidence: 0.5,
                issues: Vec::new(),
                observations: String::new(),
            },
            TestResult {
                test_id: "d".to_string(),
                status: TestStatus::Passed,
                confidence: 1.0,
                issues: Vec::new(),
                observations: String::new(),
            },
        ];
        let report = TestReport::from_results(results, "feedback".to_string());
        assert_eq!(report.passed, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.total, 4);
        assert!((report.pass_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn deployment_failure_report_has_no_results() {
        let report = TestReport::deployment_failed(3);
        assert!(!report.deployed);
        assert_eq!(report.failed, 3);
        assert_eq!(report.pass_rate, 0.0);
        assert!(report.results.is_empty());
        assert_eq!(report.feedback, DEPLOYMENT_FAILED_FEEDBACK);
    }

    #[test]
    fn pass_rate_of_empty_set_is_zero() {
        assert_eq!(pass_rate(0, 0), 0.0);
    }
}
