//! Bring the generated app up for verification and tear it down again.

use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn};

use crate::io::config::TestingConfig;
use crate::io::process::{run_command_with_timeout, spawn_quiet, terminate_child};

const INSTALL_OUTPUT_LIMIT_BYTES: usize = 64 * 1024;
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Starts and stops the app under test.
///
/// Failures to come up are reported as `false`, never as errors: a broken
/// build is a verification result, not a run failure.
pub trait Deployer {
    fn deploy(&mut self, project_root: &Path) -> bool;
    fn stop(&mut self);
}

/// The running dev server, shared with whoever must be able to stop it
/// from another thread (the CLI's interrupt handler).
#[derive(Debug, Clone, Default)]
pub struct ServerHandle {
    running: Arc<Mutex<Option<RunningServer>>>,
}

#[derive(Debug)]
struct RunningServer {
    child: Child,
    grace: Duration,
}

impl ServerHandle {
    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    /// Terminate the server, if any. Safe to call from any thread.
    pub fn stop(&self) {
        let Some(mut server) = self.lock().take() else {
            return;
        };
        info!(pid = server.child.id(), "stopping application");
        if let Err(err) = terminate_child(&mut server.child, server.grace) {
            warn!(err = %format!("{err:#}"), "failed to stop dev server");
        }
    }

    fn track(&self, child: Child, grace: Duration) {
        *self.lock() = Some(RunningServer { child, grace });
    }

    /// The exit status if the server has already died; the slot is cleared.
    fn exited(&self) -> Option<ExitStatus> {
        let mut running = self.lock();
        let status = running.as_mut()?.child.try_wait().ok()??;
        *running = None;
        Some(status)
    }

    fn lock(&self) -> MutexGuard<'_, Option<RunningServer>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Install dependencies when needed, run the dev server, wait for HTTP.
pub struct NpmDeployer {
    config: TestingConfig,
    server: ServerHandle,
}

impl NpmDeployer {
    pub fn new(config: TestingConfig) -> Self {
        Self {
            config,
            server: ServerHandle::default(),
        }
    }

    /// Track the dev server in `server` instead of a private slot.
    pub fn with_server_handle(mut self, server: ServerHandle) -> Self {
        self.server = server;
        self
    }

    fn install(&self, root: &Path) -> bool {
        if root.join("node_modules").exists() {
            debug!("node_modules present, skipping install");
            return true;
        }
        info!(command = ?self.config.install_command, "installing dependencies");
        let cmd = command_in(&self.config.install_command, root);
        let timeout = Duration::from_secs(self.config.install_timeout_secs);
        match run_command_with_timeout(cmd, timeout, INSTALL_OUTPUT_LIMIT_BYTES) {
            Ok(output) if output.success() => true,
            Ok(output) => {
                error!(
                    exit_code = ?output.status.code(),
                    timed_out = output.timed_out,
                    stderr = %output.stderr_excerpt(2000),
                    "dependency install failed"
                );
                false
            }
            Err(err) => {
                error!(err = %format!("{err:#}"), "dependency install could not run");
                false
            }
        }
    }

    fn wait_until_ready(&mut self) -> bool {
        let http = match reqwest::blocking::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                error!(err = %err, "build probe client");
                return false;
            }
        };

        let startup = Duration::from_secs(self.config.startup_timeout_secs);
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let deadline = Instant::now() + startup;
        while Instant::now() < deadline {
            if let Some(status) = self.server.exited() {
                error!(exit_code = ?status.code(), "dev server exited before becoming ready");
                return false;
            }
            match http.get(&self.config.app_url).send() {
                Ok(response) if response.status().is_success() => return true,
                Ok(response) => debug!(status = %response.status(), "app not ready"),
                Err(err) => debug!(err = %err, "app not reachable yet"),
            }
            thread::sleep(interval);
        }
        error!(
            startup_timeout_secs = self.config.startup_timeout_secs,
            "app failed to start within timeout"
        );
        false
    }
}

impl Deployer for NpmDeployer {
    #[instrument(skip_all, fields(root = %project_root.display(), url = %self.config.app_url))]
    fn deploy(&mut self, project_root: &Path) -> bool {
        self.stop();
        if !self.install(project_root) {
            return false;
        }

        info!(command = ?self.config.dev_command, "starting dev server");
        match spawn_quiet(command_in(&self.config.dev_command, project_root)) {
            Ok(child) => {
                let grace = Duration::from_secs(self.config.shutdown_grace_secs);
                self.server.track(child, grace);
            }
            Err(err) => {
                error!(err = %format!("{err:#}"), "dev server failed to launch");
                return false;
            }
        }

        let ready = self.wait_until_ready();
        if ready {
            info!("application started");
        }
        ready
    }

    fn stop(&mut self) {
        self.server.stop();
    }
}

impl Drop for NpmDeployer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn command_in(argv: &[String], dir: &Path) -> Command {
    // argv is validated non-empty by TestingConfig::validate.
    let (program, args) = argv.split_first().map_or(("", &[][..]), |(p, a)| (p.as_str(), a));
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(dir);
    cmd
}
