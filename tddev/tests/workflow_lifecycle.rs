//! Loop-level tests for whole `run_workflow` runs against scripted doubles.
//!
//! Every model reply is queued in call order:
//! decompose, one elaboration per requirement, one test case per
//! requirement, template choice, then per iteration a context selection,
//! an edit reply, one verdict per test case and (when anything failed) a
//! recommendations reply.

use std::fs;
use std::path::Path;

use tddev::core::types::{DEPLOYMENT_FAILED_FEEDBACK, ElaboratedRequirement, TestStatus};
use tddev::io::config::TddevConfig;
use tddev::io::run_log::{RunLogPaths, load_iteration, load_summary, load_test_plan};
use tddev::io::scaffold::BasicScaffolder;
use tddev::workflow::{WorkflowOutcome, WorkflowRequest, run_workflow};
use tddev::test_support::{
    ScriptedClient, ScriptedDeployer, elaboration_reply, judge_reply, test_case_reply,
    write_actions_reply,
};

const TODO_REQUIREMENTS: [&str; 4] = [
    "Display list of todos",
    "Add new todos",
    "Mark todos as complete",
    "Delete todos",
];

fn todo_client() -> ScriptedClient {
    let client = ScriptedClient::new([serde_json::to_string(&TODO_REQUIREMENTS).expect("json")]);
    for requirement in TODO_REQUIREMENTS {
        client.push(elaboration_reply(requirement));
    }
    for (i, requirement) in TODO_REQUIREMENTS.iter().enumerate() {
        client.push(test_case_reply(&format!("test_{}", i + 1), requirement));
    }
    client.push("vite-react");
    client
}

/// Queue one iteration: select App.tsx, rewrite it, then the given verdicts.
fn push_iteration(client: &ScriptedClient, app_source: &str, verdicts: &[&str]) {
    client.push("<files>\n<include>src/App.tsx</include>\n</files>");
    client.push(write_actions_reply(&[("src/App.tsx", app_source)]));
    for status in verdicts {
        let issues: &[&str] = if *status == "passed" { &[] } else { &["todo list not rendered"] };
        client.push(judge_reply(status, issues));
    }
    if verdicts.iter().any(|s| *s != "passed") {
        client.push("Render the todo list from state.");
    }
}

fn config(max_iterations: u32) -> TddevConfig {
    let mut config = TddevConfig::default();
    config.workflow.max_iterations = max_iterations;
    config
}

fn run(
    client: &ScriptedClient,
    deployer: &mut ScriptedDeployer,
    config: &TddevConfig,
    root: &Path,
) -> (WorkflowOutcome, Vec<u32>) {
    let mut seen = Vec::new();
    let outcome = run_workflow(
        client,
        deployer,
        &BasicScaffolder,
        config,
        &WorkflowRequest {
            user_input: "Create a todo list app",
            design_image: None,
            project_root: root,
        },
        |record| seen.push(record.iteration),
    )
    .expect("workflow");
    (outcome, seen)
}

#[test]
fn todo_scenario_stops_when_threshold_is_met() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("todo");
    let client = todo_client();
    push_iteration(&client, "v1", &["passed", "failed", "partial", "passed"]);
    push_iteration(&client, "v2", &["passed"; 4]);
    let mut deployer = ScriptedDeployer::default();

    let (outcome, seen) = run(&client, &mut deployer, &config(3), &root);

    assert!(outcome.success);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(seen, vec![1, 2]);
    assert_eq!(outcome.final_pass_rate, 1.0);
    assert_eq!(client.remaining(), 0);
    assert_eq!((deployer.deploys(), deployer.stops()), (2, 2));
    assert_eq!(fs::read_to_string(root.join("src/App.tsx")).expect("read"), "v2");

    // The plan mirrors the scripted replies field for field.
    let plan = &outcome.test_plan;
    assert_eq!(plan.high_level_requirements, TODO_REQUIREMENTS);
    for (i, requirement) in TODO_REQUIREMENTS.iter().enumerate() {
        let expected: ElaboratedRequirement =
            serde_json::from_str(&elaboration_reply(requirement)).expect("parse");
        assert_eq!(plan.detailed_requirements[i], expected);
        assert_eq!(plan.test_cases[i].test_id, format!("test_{}", i + 1));
        assert_eq!(plan.test_cases[i].requirement, *requirement);
        assert_eq!(plan.test_cases[i].persona.name, "Alice");
    }

    let paths = RunLogPaths::new(&root);
    assert_eq!(&load_test_plan(&paths).expect("plan"), plan);

    let first = load_iteration(&paths, 1).expect("iteration 1");
    assert_eq!((first.testing.passed, first.testing.failed), (2, 2));
    assert_eq!(first.testing.pass_rate, 0.5);
    assert_eq!(first.testing.results[2].status, TestStatus::Partial);
    assert!(first.testing.feedback.contains("=== FAILED TESTS ==="));
    assert!(first.testing.feedback.contains("Render the todo list from state."));

    let summary = load_summary(&paths).expect("summary");
    assert!(summary.success);
    assert_eq!(summary.iterations, 2);
    assert_eq!(summary.total_tests, 4);
    assert_eq!(summary.files_modified_total, 2);
    assert!(summary.finished_at >= summary.started_at);

    // Iteration 2 is driven by iteration 1's feedback.
    let prompts = client.prompts();
    let second_edit = prompts
        .iter()
        .filter(|p| p.contains("<Context Buffer>"))
        .nth(1)
        .expect("second edit prompt");
    assert!(second_edit.contains("todo list not rendered"));
    assert!(second_edit.contains("Please fix the issues identified in the testing feedback."));
}

#[test]
fn todo_scenario_exhausts_iteration_budget() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("todo");
    let client = todo_client();
    push_iteration(&client, "v1", &["passed", "passed", "passed", "failed"]);
    push_iteration(&client, "v2", &["passed", "passed", "passed", "failed"]);
    let mut deployer = ScriptedDeployer::default();

    let (outcome, seen) = run(&client, &mut deployer, &config(2), &root);

    assert!(!outcome.success);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(seen, vec![1, 2]);
    assert_eq!(outcome.final_pass_rate, 0.75);
    let last = outcome.test_results.expect("last report");
    assert_eq!((last.passed, last.failed, last.total), (3, 1, 4));
    assert_eq!(client.remaining(), 0);

    let summary = load_summary(&RunLogPaths::new(&root)).expect("summary");
    assert!(!summary.success);
    assert_eq!((summary.final_passed, summary.final_failed), (3, 1));
}

#[test]
fn failed_deployment_counts_as_zero_pass_iteration() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("todo");
    let client = todo_client();
    // Iteration 1: no verdicts are requested because the app never starts.
    client.push("<include>src/App.tsx</include>");
    client.push(write_actions_reply(&[("src/App.tsx", "broken")]));
    push_iteration(&client, "fixed", &["passed"; 4]);
    let mut deployer = ScriptedDeployer::new([false, true]);

    let (outcome, _) = run(&client, &mut deployer, &config(3), &root);

    assert!(outcome.success);
    assert_eq!(outcome.iterations, 2);
    assert_eq!((deployer.deploys(), deployer.stops()), (2, 2));

    let first = load_iteration(&RunLogPaths::new(&root), 1).expect("iteration 1");
    assert!(!first.testing.deployed);
    assert_eq!((first.testing.passed, first.testing.failed), (0, 4));
    assert!(first.testing.results.is_empty());
    assert_eq!(first.testing.feedback, DEPLOYMENT_FAILED_FEEDBACK);

    let prompts = client.prompts();
    let second_edit = prompts
        .iter()
        .filter(|p| p.contains("<Context Buffer>"))
        .nth(1)
        .expect("second edit prompt");
    assert!(second_edit.contains(DEPLOYMENT_FAILED_FEEDBACK));
    assert!(second_edit.contains("   1 | broken"));
}

#[test]
fn malformed_elaboration_among_three_uses_fallback() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("app");
    let requirements = ["Show a list", "Add items", "Remove items"];
    let client = ScriptedClient::new([
        serde_json::to_string(&requirements).expect("json"),
        elaboration_reply("Show a list"),
        "Sure! Here is what I think the feature should do.".to_string(),
        elaboration_reply("Remove items"),
        test_case_reply("test_1", "Show a list"),
        "{ not valid".to_string(),
        test_case_reply("test_3", "Remove items"),
        "react".to_string(),
    ]);
    push_iteration(&client, "v1", &["passed"; 3]);
    let mut deployer = ScriptedDeployer::default();

    let (outcome, _) = run(&client, &mut deployer, &config(1), &root);

    let plan = &outcome.test_plan;
    assert_eq!(plan.detailed_requirements.len(), 3);
    assert_eq!(plan.test_cases.len(), 3);
    assert_eq!(plan.detailed_requirements[1], ElaboratedRequirement::fallback("Add items"));
    assert_eq!(plan.detailed_requirements[2].requirement, "Remove items");
    assert_eq!(plan.test_cases[1].test_id, "test_2");
    assert_eq!(plan.test_cases[1].persona.name, "User");
    assert!(outcome.success);
}
