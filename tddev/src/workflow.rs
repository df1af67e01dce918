//! The generate → scaffold → {develop → verify}* loop behind `tddev`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use crate::agents::development::DevelopmentAgent;
use crate::agents::test_generation::TestGenerationAgent;
use crate::agents::testing::TestingAgent;
use crate::core::termination::{LoopDecision, decide};
use crate::core::types::{IterationRecord, TestPlan, TestReport};
use crate::io::config::TddevConfig;
use crate::io::deploy::Deployer;
use crate::io::llm::CompletionClient;
use crate::io::project::ProjectStore;
use crate::io::run_log::{
    RunLogPaths, RunSummary, write_iteration, write_summary, write_test_plan,
};
use crate::io::scaffold::Scaffolder;

/// What the user asked for and where the app goes.
#[derive(Debug, Clone)]
pub struct WorkflowRequest<'a> {
    pub user_input: &'a str,
    /// Optional design mock-up shown to the requirement pipeline.
    pub design_image: Option<PathBuf>,
    pub project_root: &'a Path,
}

/// Final report of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowOutcome {
    pub success: bool,
    pub iterations: u32,
    pub final_pass_rate: f64,
    pub project_path: PathBuf,
    /// Report of the last iteration; `None` when no iteration ran.
    pub test_results: Option<TestReport>,
    pub test_plan: TestPlan,
    pub stop: Option<LoopDecision>,
}

/// Run the full loop.
///
/// The test plan is generated and persisted once. Each iteration edits the
/// project, verifies it, persists its record, and hands it to `on_iteration`.
/// The loop ends when the pass threshold is met (success) or the iteration
/// budget is spent. Model-call failures outside the fallback paths abort the
/// run with an error.
#[instrument(skip_all, fields(root = %request.project_root.display()))]
pub fn run_workflow<C, D, F>(
    client: &C,
    deployer: &mut D,
    scaffolder: &dyn Scaffolder,
    config: &TddevConfig,
    request: &WorkflowRequest<'_>,
    mut on_iteration: F,
) -> Result<WorkflowOutcome>
where
    C: CompletionClient,
    D: Deployer,
    F: FnMut(&IterationRecord),
{
    let started_at = Utc::now();
    let store = ProjectStore::open(request.project_root).context("open project directory")?;
    let paths = RunLogPaths::new(store.root());

    info!("phase 1: generating requirements and test cases");
    let plan = TestGenerationAgent::new(client, request.design_image.clone())
        .generate_tests(request.user_input)
        .context("generate test plan")?;
    write_test_plan(&paths, &plan).context("persist test plan")?;

    info!("phase 2: initializing project");
    let mut developer =
        DevelopmentAgent::new(client, &store, scaffolder, config.development.clone());
    developer
        .initialize_project(request.user_input, &plan.high_level_requirements)
        .context("initialize project")?;

    info!(
        max_iterations = config.workflow.max_iterations,
        threshold = config.workflow.pass_threshold,
        "phase 3: development loop"
    );
    let mut feedback: Option<String> = None;
    let mut last_report: Option<TestReport> = None;
    let mut stop: Option<LoopDecision> = None;
    let mut iterations = 0u32;
    let mut files_modified_total = 0usize;

    for iteration in 1..=config.workflow.max_iterations {
        info!(iteration, "starting iteration");
        let development = developer
            .develop(
                request.user_input,
                &plan.high_level_requirements,
                &plan.detailed_requirements,
                feedback.as_deref(),
            )
            .with_context(|| format!("develop iteration {iteration}"))?;
        files_modified_total += development.files_modified.len();

        let testing = TestingAgent::new(client, &mut *deployer, config.testing.app_url.as_str())
            .test_application(store.root(), &plan.test_cases);

        let record = IterationRecord {
            iteration,
            development,
            testing,
        };
        write_iteration(&paths, &record)
            .with_context(|| format!("persist iteration {iteration}"))?;
        on_iteration(&record);
        iterations = iteration;

        let decision = decide(
            iteration,
            config.workflow.max_iterations,
            record.testing.pass_rate,
            config.workflow.pass_threshold,
        );
        feedback = Some(record.testing.feedback.clone());
        last_report = Some(record.testing);
        if decision.is_stop() {
            info!(?decision, "stopping development loop");
            stop = Some(decision);
            break;
        }
    }

    let success = stop.is_some_and(LoopDecision::is_success);
    let final_pass_rate = last_report.as_ref().map_or(0.0, |r| r.pass_rate);
    let summary = RunSummary {
        iterations,
        final_pass_rate,
        final_passed: last_report.as_ref().map_or(0, |r| r.passed),
        final_failed: last_report.as_ref().map_or(0, |r| r.failed),
        total_tests: plan.test_cases.len(),
        files_modified_total,
        project_path: store.root().to_path_buf(),
        success,
        started_at,
        finished_at: Utc::now(),
    };
    write_summary(&paths, &summary).context("persist run summary")?;
    info!(success, iterations, final_pass_rate, "workflow finished");

    Ok(WorkflowOutcome {
        success,
        iterations,
        final_pass_rate,
        project_path: store.root().to_path_buf(),
        test_results: last_report,
        test_plan: plan,
        stop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::run_log::{load_iteration, load_summary, load_test_plan};
    use crate::io::scaffold::BasicScaffolder;
    use crate::test_support::{
        ScriptedClient, ScriptedDeployer, elaboration_reply, judge_reply, test_case_reply,
        write_actions_reply,
    };

    fn single_requirement_client() -> ScriptedClient {
        ScriptedClient::new([
            r#"["Show a greeting"]"#.to_string(),
            elaboration_reply("Show a greeting"),
            test_case_reply("test_1", "Show a greeting"),
            "vite-react".to_string(),
        ])
    }

    #[test]
    fn passing_first_iteration_stops_with_success() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("app");
        let client = single_requirement_client();
        client.push("<include>src/App.tsx</include>");
        client.push(write_actions_reply(&[("src/App.tsx", "export default () => 'hi'")]));
        client.push(judge_reply("passed", &[]));
        let mut deployer = ScriptedDeployer::default();
        let mut seen = Vec::new();

        let outcome = run_workflow(
            &client,
            &mut deployer,
            &BasicScaffolder,
            &TddevConfig::default(),
            &WorkflowRequest {
                user_input: "greeting page",
                design_image: None,
                project_root: &root,
            },
            |record| seen.push(record.iteration),
        )
        .expect("workflow");

        assert!(outcome.success);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.final_pass_rate, 1.0);
        assert_eq!(seen, vec![1]);
        assert_eq!(client.remaining(), 0);
        assert_eq!((deployer.deploys(), deployer.stops()), (1, 1));

        let paths = RunLogPaths::new(&root);
        assert_eq!(load_test_plan(&paths).expect("plan"), outcome.test_plan);
        let record = load_iteration(&paths, 1).expect("iteration");
        assert_eq!(record.development.files_modified, vec!["src/App.tsx"]);
        let summary = load_summary(&paths).expect("summary");
        assert!(summary.success);
        assert_eq!(summary.files_modified_total, 1);
    }

    #[test]
    fn decomposition_failure_aborts_before_scaffolding() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("app");
        let client = ScriptedClient::new(["no json here"]);
        let mut deployer = ScriptedDeployer::default();
        let err = run_workflow(
            &client,
            &mut deployer,
            &BasicScaffolder,
            &TddevConfig::default(),
            &WorkflowRequest {
                user_input: "app",
                design_image: None,
                project_root: &root,
            },
            |_| {},
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("generate test plan"));
        assert!(!root.join("package.json").exists());
        assert_eq!(deployer.deploys(), 0);
    }
}
