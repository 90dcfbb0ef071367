//! Command-backed context providers (news, weather) and the charts job

use async_trait::async_trait;
use std::time::Duration;

use super::command::{run_command, CommandSpec};
use super::{ChartsRefresher, CollaboratorError, ContextProvider};
use crate::utils::{normalize_whitespace, truncate_text};

/// Longest context text passed on to the content source
const MAX_CONTEXT_CHARS: usize = 1500;

/// Runs a configured command; its stdout is the collaborator's answer
#[derive(Debug, Clone)]
pub struct CommandCollaborator {
    name: String,
    spec: CommandSpec,
    timeout: Duration,
}

impl CommandCollaborator {
    pub fn new(name: impl Into<String>, spec: CommandSpec, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            spec,
            timeout,
        }
    }
}

#[async_trait]
impl ContextProvider for CommandCollaborator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<String, CollaboratorError> {
        let output = run_command(&self.name, &self.spec, &[], self.timeout).await?;
        let text = normalize_whitespace(&output);
        if text.is_empty() {
            return Err(CollaboratorError::malformed(&self.name, "empty output"));
        }
        Ok(truncate_text(&text, MAX_CONTEXT_CHARS))
    }
}

#[async_trait]
impl ChartsRefresher for CommandCollaborator {
    async fn refresh(&self) -> Result<(), CollaboratorError> {
        let output = run_command(&self.name, &self.spec, &[], self.timeout).await?;
        tracing::info!(
            collaborator = %self.name,
            output = %truncate_text(&output, 200),
            "Charts refresh finished"
        );
        Ok(())
    }
}
