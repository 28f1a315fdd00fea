//! Docker + tmux session backend.
//!
//! Layout:
//!
//! ```text
//! host ──docker exec──▶ jumpbox container ──tmux──▶ session "Azure CLI 2_0"
//!                                                     └─ docker run -it <image>
//! ```
//!
//! Session targets use tmux's `=name` form so that a lookup never falls back
//! to prefix matching ("Azure CLI" must not hit "Azure CLI 2_0").

use async_trait::async_trait;
use climux_core::Session;
use tracing::{debug, info};

use crate::backend::{LaunchCommand, SessionBackend};
use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::runner::{CommandOutput, CommandRunner, TokioCommandRunner};

/// tmux's complaint when no server is running yet.
const NO_SERVER: &str = "no server running";

/// Session backend driving tmux inside a docker jumpbox.
pub struct DockerTmuxBackend<R = TokioCommandRunner> {
    config: BackendConfig,
    runner: R,
}

impl DockerTmuxBackend<TokioCommandRunner> {
    /// Creates a backend that runs real commands.
    pub fn new(config: BackendConfig) -> Self {
        Self::with_runner(config, TokioCommandRunner)
    }
}

impl<R: CommandRunner> DockerTmuxBackend<R> {
    /// Creates a backend with a custom command runner.
    pub fn with_runner(config: BackendConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Arguments for `docker exec [flags] <jumpbox> tmux <tmux_args>`.
    fn exec_args(&self, flags: &[&str], tmux_args: &[&str]) -> Vec<String> {
        let mut args = vec!["exec".to_string()];
        args.extend(flags.iter().map(|f| f.to_string()));
        args.push(self.config.jumpbox_name.clone());
        args.push(self.config.tmux.clone());
        args.extend(tmux_args.iter().map(|a| a.to_string()));
        args
    }

    async fn docker(&self, args: Vec<String>) -> Result<CommandOutput, BackendError> {
        self.runner.run(&self.config.docker, &args).await
    }

    /// Runs a docker command and maps a non-zero exit to `CommandFailed`.
    async fn docker_checked(&self, args: Vec<String>) -> Result<CommandOutput, BackendError> {
        let command = describe(&self.config.docker, &args);
        let output = self.docker(args).await?;
        if !output.success {
            return Err(BackendError::CommandFailed {
                command,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl<R: CommandRunner> SessionBackend for DockerTmuxBackend<R> {
    fn tool_name(&self) -> &str {
        &self.config.docker
    }

    async fn is_available(&self) -> bool {
        match self.docker(vec!["--version".to_string()]).await {
            Ok(output) => output.success,
            Err(e) => {
                debug!(error = %e, "Docker is not available");
                false
            }
        }
    }

    async fn backend_running(&self) -> Result<bool, BackendError> {
        let output = self
            .docker_checked(vec![
                "ps".to_string(),
                "--format".to_string(),
                "{{.Names}}".to_string(),
            ])
            .await?;

        let running = output
            .stdout
            .lines()
            .any(|line| line.trim() == self.config.jumpbox_name);
        debug!(jumpbox = %self.config.jumpbox_name, running, "Checked jumpbox");
        Ok(running)
    }

    async fn ensure_running(&self) -> Result<(), BackendError> {
        if self.backend_running().await? {
            return Ok(());
        }

        // A stopped container with the same name would block `docker run`.
        let removed = self
            .docker(vec![
                "rm".to_string(),
                "-f".to_string(),
                self.config.jumpbox_name.clone(),
            ])
            .await;
        match removed {
            Ok(output) if !output.success => {
                debug!(stderr = %output.stderr.trim(), "No stale jumpbox removed");
            }
            Ok(_) => debug!(jumpbox = %self.config.jumpbox_name, "Removed stale jumpbox"),
            Err(e) => debug!(error = %e, "Failed to remove stale jumpbox"),
        }

        info!(
            jumpbox = %self.config.jumpbox_name,
            image = %self.config.jumpbox_image,
            "Starting jumpbox"
        );
        self.docker_checked(vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.config.jumpbox_name.clone(),
            "-v".to_string(),
            "/var/run/docker.sock:/var/run/docker.sock".to_string(),
            self.config.jumpbox_image.clone(),
        ])
        .await?;
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>, BackendError> {
        if !self.backend_running().await? {
            return Ok(Vec::new());
        }

        let args = self.exec_args(&[], &["list-sessions", "-F", "#{session_name}"]);
        let command = describe(&self.config.docker, &args);
        let output = self.docker(args).await?;

        if !output.success {
            // A jumpbox without any session has no tmux server either.
            if output.stderr.contains(NO_SERVER) {
                return Ok(Vec::new());
            }
            return Err(BackendError::CommandFailed {
                command,
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| Session::from_backend(line).name().to_string())
            .collect())
    }

    async fn start_session(&self, name: &str, command: &str) -> Result<(), BackendError> {
        let session = Session::new(name);
        let args = self.exec_args(
            &[],
            &["new-session", "-d", "-s", session.backend_name(), command],
        );
        self.docker_checked(args).await?;
        info!(session = %name, "Started session");
        Ok(())
    }

    fn attach_command(&self, name: &str) -> LaunchCommand {
        let target = exact_target(name);
        LaunchCommand::new(
            self.config.docker.clone(),
            self.exec_args(&["-it"], &["attach-session", "-t", &target]),
        )
    }

    async fn send_keys(&self, name: &str, line: &str) -> Result<(), BackendError> {
        let target = format!("{}:", exact_target(name));
        let args = self.exec_args(&[], &["send-keys", "-t", &target, line, "Enter"]);
        self.docker_checked(args).await?;
        Ok(())
    }

    async fn kill_session(&self, name: &str) -> Result<(), BackendError> {
        let target = exact_target(name);
        let args = self.exec_args(&[], &["kill-session", "-t", &target]);
        self.docker_checked(args).await?;
        info!(session = %name, "Killed session");
        Ok(())
    }
}

/// tmux target matching exactly the session displayed as `name`.
fn exact_target(name: &str) -> String {
    format!("={}", Session::new(name).backend_name())
}

fn describe(program: &str, args: &[String]) -> String {
    let mut command = program.to_string();
    for arg in args.iter().take(4) {
        command.push(' ');
        command.push_str(arg);
    }
    command
}
