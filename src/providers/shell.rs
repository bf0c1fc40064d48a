//! Local shell provider.
//!
//! Treats the latest user message as a command line and answers with its
//! merged stdout/stderr. Failures surface as answer text rather than
//! errors; a broken command is still a complete turn.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::RelayConfig;
use crate::error::Result;
use crate::types::Message;

use super::{Provider, ProviderReply, latest_user_text};

#[cfg(not(windows))]
const DEFAULT_SHELL: &str = "/bin/bash";
#[cfg(windows)]
const DEFAULT_SHELL: &str = "cmd.exe";

/// Runs user input through a local command shell.
#[derive(Debug, Clone)]
pub struct ShellProvider {
    shell_path: String,
    timeout: Duration,
}

impl ShellProvider {
    /// Creates a shell provider from configuration.
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            shell_path: config
                .shell_path
                .clone()
                .unwrap_or_else(|| DEFAULT_SHELL.to_string()),
            timeout: config.shell_timeout,
        }
    }

    fn command(&self, line: &str) -> Command {
        let mut command = Command::new(&self.shell_path);
        #[cfg(not(windows))]
        command.arg("-c");
        #[cfg(windows)]
        command.arg("/C");
        command.arg(line);
        command.kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Provider for ShellProvider {
    async fn send(
        &self,
        messages: &[Message],
        _model_hint: Option<&str>,
    ) -> Result<ProviderReply> {
        let line = latest_user_text(messages).unwrap_or("").trim().to_string();
        if line.is_empty() {
            return Ok(ProviderReply::text("(no command provided)"));
        }
        tracing::debug!(shell = %self.shell_path, "running shell command");
        let output = tokio::time::timeout(self.timeout, self.command(&line).output()).await;
        let content = match output {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let mut combined = stdout.trim_end().to_string();
                let stderr = stderr.trim_end();
                if !stderr.is_empty() {
                    if !combined.is_empty() {
                        combined.push('\n');
                    }
                    combined.push_str(stderr);
                }
                if combined.is_empty() {
                    "(no output)".to_string()
                } else {
                    combined
                }
            }
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!(
                "command timed out after {}ms",
                self.timeout.as_millis()
            ),
        };
        Ok(ProviderReply::text(content))
    }
}
