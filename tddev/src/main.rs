//! `tddev`: generate a web app from a description, test-first.
//!
//! Writes the app under `--output` and its run artifacts under
//! `<output>/.tddev/`.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};

use tddev::core::templates::default_template;
use tddev::exit_codes;
use tddev::io::config::{CliOverrides, load_config};
use tddev::io::deploy::{NpmDeployer, ServerHandle};
use tddev::io::llm::{ClientSettings, HttpCompletionClient};
use tddev::io::project::ProjectStore;
use tddev::io::scaffold::{BasicScaffolder, Scaffolder};
use tddev::logging;
use tddev::workflow::{WorkflowOutcome, WorkflowRequest, run_workflow};

#[derive(Parser, Debug)]
#[command(
    name = "tddev",
    version,
    about = "Generate web applications with a test-driven multi-agent loop"
)]
struct Cli {
    /// Description of the application to build.
    #[arg(short, long, required_unless_present = "scaffold_only")]
    input: Option<String>,

    /// Design mock-up shown to the requirement pipeline.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Directory the application is written to.
    #[arg(short, long, default_value = "./output/app")]
    output: PathBuf,

    /// Model provider (overrides the config file).
    #[arg(long, value_parser = ["anthropic", "openai", "claude-agent-sdk"])]
    provider: Option<String>,

    /// Model name (overrides the config file).
    #[arg(long)]
    model: Option<String>,

    /// Maximum develop/verify iterations (config default: 3).
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Configuration file (TOML, or YAML by extension).
    #[arg(long, default_value = "config/config.toml")]
    config: PathBuf,

    #[arg(
        long,
        default_value = "info",
        value_parser = ["error", "warn", "info", "debug", "trace"]
    )]
    log_level: String,

    /// Also write logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Write the default starter project without calling a model, then exit.
    #[arg(long)]
    scaffold_only: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = logging::init(&cli.log_level, cli.log_file.as_deref()) {
        eprintln!("{err:#}");
        std::process::exit(exit_codes::FAILURE);
    }
    let server = ServerHandle::default();
    if let Err(err) = install_interrupt_handler(server.clone()) {
        eprintln!("{err:#}");
        std::process::exit(exit_codes::FAILURE);
    }
    match run(cli, server) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::FAILURE);
        }
    }
}

/// Ctrl-C (or SIGTERM) stops the dev server before exiting; it runs in its
/// own process group and would otherwise be left behind.
fn install_interrupt_handler(server: ServerHandle) -> Result<()> {
    ctrlc::set_handler(move || {
        warn!("interrupted, shutting down");
        server.stop();
        std::process::exit(exit_codes::FAILURE);
    })
    .context("install interrupt handler")
}

fn run(cli: Cli, server: ServerHandle) -> Result<i32> {
    if cli.scaffold_only {
        return scaffold_only(&cli);
    }

    let user_input = cli.input.as_deref().unwrap_or_default().trim();
    if user_input.is_empty() {
        bail!("--input must not be empty");
    }
    if let Some(image) = &cli.image
        && !image.is_file()
    {
        bail!("design image not found: {}", image.display());
    }

    let config = load_config(&cli.config)?
        .with_overrides(&CliOverrides {
            provider: cli.provider.clone(),
            model: cli.model.clone(),
            max_iterations: cli.max_iterations,
        })
        .context("apply command-line overrides")?;
    let settings = ClientSettings::from_config(&config.llm).context("resolve model settings")?;
    let client = HttpCompletionClient::from_env(settings).context("initialize model client")?;
    info!(
        provider = %client.settings().provider,
        model = %client.settings().model,
        "using model"
    );
    let mut deployer = NpmDeployer::new(config.testing.clone()).with_server_handle(server);

    let request = WorkflowRequest {
        user_input,
        design_image: cli.image.clone(),
        project_root: &cli.output,
    };
    let outcome = run_workflow(
        &client,
        &mut deployer,
        &BasicScaffolder,
        &config,
        &request,
        |record| {
            info!(
                iteration = record.iteration,
                files_modified = record.development.files_modified.len(),
                passed = record.testing.passed,
                total = record.testing.total,
                pass_rate = record.testing.pass_rate,
                deployed = record.testing.deployed,
                "iteration complete"
            );
        },
    )?;

    print_report(&outcome);
    Ok(exit_codes::OK)
}

fn scaffold_only(cli: &Cli) -> Result<i32> {
    let store = ProjectStore::open(&cli.output).context("open output directory")?;
    let template = default_template();
    let written = BasicScaffolder.materialize(&store, template)?;
    println!(
        "Wrote {} starter files ({}) to {}",
        written.len(),
        template.name,
        store.root().display()
    );
    for path in written {
        println!("  {path}");
    }
    Ok(exit_codes::OK)
}

fn print_report(outcome: &WorkflowOutcome) {
    println!("Success: {}", outcome.success);
    println!("Iterations: {}", outcome.iterations);
    println!("Final pass rate: {:.1}%", outcome.final_pass_rate * 100.0);
    if let Some(report) = &outcome.test_results {
        println!("Tests passed: {}/{}", report.passed, report.total);
    }
    println!("Project: {}", outcome.project_path.display());
}
