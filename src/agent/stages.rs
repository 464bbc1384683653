//! Ordered stage composition.
//!
//! ```text
//! TurnContext{artifact} ─▶ stage 1 ─▶ stage 2 ─▶ … ─▶ TurnContext{messages}
//! ```
//!
//! The first stage error ends the turn; later stages do not run.

use std::path::PathBuf;

use crate::audio::Artifact;

use super::{Message, Pipeline, PipelineError};

/// State threaded through the stages of one turn.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub artifact: Artifact,
    /// Messages produced so far, in order.
    pub messages: Vec<Message>,
    /// Where the spoken reply was written, if a speech stage ran.
    pub reply_audio: Option<PathBuf>,
}

impl TurnContext {
    pub fn new(artifact: Artifact) -> Self {
        Self {
            artifact,
            messages: Vec::new(),
            reply_audio: None,
        }
    }

    /// The last assistant message with non-empty text.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == super::Role::Assistant && !m.content.trim().is_empty())
            .map(|m| m.content.as_str())
    }
}

/// One step of a turn.
pub trait Stage: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn apply(&self, ctx: TurnContext) -> Result<TurnContext, PipelineError>;
}

/// Runs its stages in insertion order.
#[derive(Default)]
pub struct StagedPipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl StagedPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl Pipeline for StagedPipeline {
    fn run(&self, artifact: &Artifact) -> Result<Vec<Message>, PipelineError> {
        let mut ctx = TurnContext::new(artifact.clone());
        for stage in &self.stages {
            let started = std::time::Instant::now();
            ctx = stage.apply(ctx).map_err(|e| {
                log::warn!("pipeline: stage {} failed: {e}", stage.name());
                e
            })?;
            log::debug!(
                "pipeline: stage {} done in {:?}",
                stage.name(),
                started.elapsed()
            );
        }
        Ok(ctx.messages)
    }
}
