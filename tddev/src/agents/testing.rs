//! Verification: deploy the app, have the model judge each test case against
//! it, and turn the verdicts into feedback for the next development cycle.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::core::feedback::render_feedback;
use crate::core::reply::parse_reply;
use crate::core::types::{TestCase, TestReport, TestResult, TestStatus};
use crate::io::deploy::Deployer;
use crate::io::llm::CompletionClient;
use crate::io::prompt::{render_judge, render_recommendations};

const UNPARSEABLE_VERDICT: &str = "Failed to parse test result";
const RECOMMENDATIONS_UNAVAILABLE: &str =
    "Recommendations unavailable; address the failed tests listed above.";

/// Verdict as the judge writes it; the status is normalized afterwards.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Verdict {
    status: String,
    confidence: Option<f64>,
    issues: Vec<String>,
    observations: String,
}

fn normalize_status(raw: &str) -> TestStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "passed" | "pass" => TestStatus::Passed,
        "partial" => TestStatus::Partial,
        _ => TestStatus::Failed,
    }
}

pub struct TestingAgent<'a, C: CompletionClient, D: Deployer> {
    client: &'a C,
    deployer: &'a mut D,
    app_url: String,
}

impl<'a, C: CompletionClient, D: Deployer> TestingAgent<'a, C, D> {
    pub fn new(client: &'a C, deployer: &'a mut D, app_url: impl Into<String>) -> Self {
        Self {
            client,
            deployer,
            app_url: app_url.into(),
        }
    }

    /// Deploy, judge every case, build feedback, stop.
    ///
    /// A failed deploy yields a zero-pass report without any model call. The
    /// deployer is stopped on every path.
    #[instrument(skip_all, fields(cases = test_cases.len()))]
    pub fn test_application(&mut self, project_root: &Path, test_cases: &[TestCase]) -> TestReport {
        info!(root = %project_root.display(), "deploying application");
        if !self.deployer.deploy(project_root) {
            warn!("application failed to start");
            self.deployer.stop();
            return TestReport::deployment_failed(test_cases.len());
        }

        let results: Vec<TestResult> = test_cases
            .iter()
            .map(|case| self.execute_test_case(case))
            .collect();
        let feedback = self.construct_feedback(&results);
        self.deployer.stop();

        let report = TestReport::from_results(results, feedback);
        info!(
            passed = report.passed,
            failed = report.failed,
            total = report.total,
            pass_rate = report.pass_rate,
            "verification finished"
        );
        report
    }

    /// Judge one case. Never fails: transport and parse problems become a
    /// failed result that names the problem.
    pub fn execute_test_case(&self, test_case: &TestCase) -> TestResult {
        let test_id = test_case.test_id.as_str();
        let prompt = match render_judge(test_case, &self.app_url) {
            Ok(prompt) => prompt,
            Err(err) => return TestResult::unjudged(test_id, format!("{err:#}"), ""),
        };
        let reply = match self.client.prompt(&prompt) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(test_id, err = %err, "judge call failed");
                return TestResult::unjudged(test_id, err.to_string(), "");
            }
        };

        match parse_reply::<Verdict>(&reply) {
            Ok(verdict) => {
                let result = TestResult {
                    test_id: test_id.to_string(),
                    status: normalize_status(&verdict.status),
                    confidence: verdict.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
                    issues: verdict.issues,
                    observations: verdict.observations,
                };
                debug!(test_id, status = %result.status, "judged test case");
                result
            }
            Err(err) => {
                warn!(test_id, err = %err, "unparseable verdict");
                TestResult::unjudged(test_id, UNPARSEABLE_VERDICT, reply)
            }
        }
    }

    /// Feedback text for `results`; asks the model for recommendations only
    /// when something did not pass.
    pub fn construct_feedback(&self, results: &[TestResult]) -> String {
        render_feedback(results, |failing| {
            let reply = render_recommendations(failing)
                .and_then(|prompt| Ok(self.client.prompt(&prompt)?));
            match reply {
                Ok(text) => text.trim().to_string(),
                Err(err) => {
                    let message = format!("{err:#}");
                    warn!(err = %message, "recommendations call failed");
                    RECOMMENDATIONS_UNAVAILABLE.to_string()
                }
            }
        })
    }
}
