//! External command runner shared by the command-backed collaborators

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::CollaboratorError;
use crate::utils::truncate_text;

/// Program plus argument template
///
/// Arguments may contain `{name}` placeholders filled per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Arguments with placeholders substituted
    pub fn render_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (key, value)| {
                    acc.replace(&format!("{{{key}}}"), value)
                })
            })
            .collect()
    }
}

/// Run a command to completion and return its trimmed stdout
///
/// The child is killed if the limit passes first.
pub async fn run_command(
    name: &str,
    spec: &CommandSpec,
    vars: &[(&str, &str)],
    limit: Duration,
) -> Result<String, CollaboratorError> {
    let args = spec.render_args(vars);
    tracing::debug!(collaborator = name, program = %spec.program, ?args, "Running command");

    let child = Command::new(&spec.program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            CollaboratorError::failed(name, format!("failed to spawn '{}': {e}", spec.program))
        })?;

    let output = match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(CollaboratorError::failed(name, format!("wait failed: {e}"))),
        Err(_) => return Err(CollaboratorError::timeout(name, limit.as_secs())),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output.status.code().unwrap_or(-1);
        return Err(CollaboratorError::failed(
            name,
            format!("exit code {code}: {}", truncate_text(stderr.trim(), 300)),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
