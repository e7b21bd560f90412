//! Staged production: a workflow is an ordered list of [`Stage`] values run
//! by one [`Production`], each declaring its inputs, the tool calls it makes
//! and what happens when those calls fail.

use crate::gateway::{ToolCommand, ToolRunner, invoke_all};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub enum FailurePolicy {
    /// Abort the job.
    Fatal,
    /// Run these calls instead when the stage fails or produces nothing.
    Substitute(Vec<ToolCommand>),
    /// Warn and continue without the stage's output.
    Degrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    Substituted,
    Degraded,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct Stage {
    pub label: String,
    pub commands: Vec<ToolCommand>,
    /// Files that must exist before the stage runs; otherwise it is skipped.
    pub requires: Vec<PathBuf>,
    /// File the stage is expected to leave behind.
    pub produces: Option<PathBuf>,
    /// Forces captured output regardless of the job's silent flag.
    pub always_quiet: bool,
    pub on_failure: FailurePolicy,
}

impl Stage {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            commands: Vec::new(),
            requires: Vec::new(),
            produces: None,
            always_quiet: false,
            on_failure: FailurePolicy::Fatal,
        }
    }

    pub fn call(mut self, command: ToolCommand) -> Self {
        self.commands.push(command);
        self
    }

    pub fn requires(mut self, path: &Path) -> Self {
        self.requires.push(path.to_path_buf());
        self
    }

    pub fn produces(mut self, path: &Path) -> Self {
        self.produces = Some(path.to_path_buf());
        self
    }

    pub fn always_quiet(mut self) -> Self {
        self.always_quiet = true;
        self
    }

    pub fn or_substitute(mut self, fallback: Vec<ToolCommand>) -> Self {
        self.on_failure = FailurePolicy::Substitute(fallback);
        self
    }

    pub fn or_degrade(mut self) -> Self {
        self.on_failure = FailurePolicy::Degrade;
        self
    }
}

pub struct Production<'a> {
    runner: &'a dyn ToolRunner,
    silent: bool,
}

impl<'a> Production<'a> {
    pub fn new(runner: &'a dyn ToolRunner, silent: bool) -> Self {
        Self { runner, silent }
    }

    pub fn runner(&self) -> &'a dyn ToolRunner {
        self.runner
    }

    pub fn silent(&self) -> bool {
        self.silent
    }

    pub async fn run(&self, stages: &[Stage]) -> Result<Vec<StageOutcome>> {
        let mut outcomes = Vec::with_capacity(stages.len());
        for stage in stages {
            outcomes.push(self.run_stage(stage).await?);
        }
        Ok(outcomes)
    }

    pub async fn run_stage(&self, stage: &Stage) -> Result<StageOutcome> {
        if let Some(missing) = stage.requires.iter().find(|p| !p.exists()) {
            logw(format!(
                "Skipping {}: required input {} is missing",
                stage.label,
                missing.display()
            ));
            return Ok(StageOutcome::Skipped);
        }

        logi(format!("{}...", stage.label));
        let quiet = stage.always_quiet || self.silent;
        let result = invoke_all(self.runner, &stage.commands, quiet).await;

        let problem = match result {
            Ok(()) => match &stage.produces {
                Some(out) if !out.exists() => format!("no output at {}", out.display()),
                _ => {
                    logok(format!("{} done", stage.label));
                    return Ok(StageOutcome::Completed);
                }
            },
            Err(err) => match stage.on_failure {
                FailurePolicy::Fatal => {
                    return Err(err).with_context(|| format!("{} failed", stage.label));
                }
                _ => err.to_string(),
            },
        };

        match &stage.on_failure {
            FailurePolicy::Fatal => Err(anyhow::anyhow!("{} failed: {}", stage.label, problem)),
            FailurePolicy::Substitute(fallback) => {
                logw(format!("{}: {}; substituting", stage.label, problem));
                invoke_all(self.runner, fallback, quiet)
                    .await
                    .with_context(|| format!("{} fallback failed", stage.label))?;
                Ok(StageOutcome::Substituted)
            }
            FailurePolicy::Degrade => {
                logw(format!("{}: {}; continuing without it", stage.label, problem));
                Ok(StageOutcome::Degraded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ProcessRunner;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn missing_input_skips_stage() {
        let dir = tempfile::tempdir().unwrap();
        let stage = Stage::new("video")
            .call(sh("exit 1"))
            .requires(&dir.path().join("nope.png"));
        let outcome = Production::new(&ProcessRunner, true).run_stage(&stage).await.unwrap();
        assert_eq!(outcome, StageOutcome::Skipped);
    }

    #[tokio::test]
    async fn missing_output_triggers_substitute() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("art.png");
        let stage = Stage::new("image")
            .call(sh("true"))
            .produces(&image)
            .or_substitute(vec![ToolCommand::new("touch").path_arg(&image)]);
        let outcome = Production::new(&ProcessRunner, true).run_stage(&stage).await.unwrap();
        assert_eq!(outcome, StageOutcome::Substituted);
        assert!(image.exists());
    }

    #[tokio::test]
    async fn fatal_stage_aborts() {
        let stages = vec![Stage::new("gather").call(sh("exit 4")), Stage::new("later")];
        let err = Production::new(&ProcessRunner, true).run(&stages).await.unwrap_err();
        assert!(err.to_string().contains("gather failed"));
    }

    #[tokio::test]
    async fn degraded_stage_continues() {
        let stages = vec![
            Stage::new("music").call(sh("exit 1")).or_degrade(),
            Stage::new("after").call(sh("true")),
        ];
        let outcomes = Production::new(&ProcessRunner, true).run(&stages).await.unwrap();
        assert_eq!(outcomes, vec![StageOutcome::Degraded, StageOutcome::Completed]);
    }
}
