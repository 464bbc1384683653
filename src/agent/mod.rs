//! Turn pipeline: artifact in, ordered role-tagged messages out.
//!
//! This module provides:
//! * [`Pipeline`] — the contract the turn dispatcher depends on.
//! * [`StagedPipeline`] / [`Stage`] — an ordered list of stages over a
//!   [`TurnContext`].
//! * [`TranscribeStage`] — OpenAI-compatible `/v1/audio/transcriptions`.
//! * [`ReasonStage`] — OpenAI-compatible `/v1/chat/completions` with the
//!   `control_led` tool.
//! * [`SpeakStage`] — OpenAI-compatible `/v1/audio/speech`, played locally.
//! * [`build_pipeline`] — wires the three stages from [`AppConfig`].
//!
//! All stages block; they run on the turn worker thread.

pub mod reason;
pub mod speak;
pub mod stages;
pub mod transcribe;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actuator::ActuatorClient;
use crate::audio::{Artifact, DeviceError};
use crate::config::{AppConfig, AppPaths};

pub use reason::ReasonStage;
pub use speak::SpeakStage;
pub use stages::{Stage, StagedPipeline, TurnContext};
pub use transcribe::TranscribeStage;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// One role-tagged message produced during a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.role.as_str(), self.content)
    }
}

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Errors that end a turn as failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not read artifact {path}: {source}")]
    ArtifactIo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("nothing was heard in the recording")]
    EmptyTranscript,

    #[error("reasoning failed: {0}")]
    Reasoning(String),

    /// The actuator could not be reached; carries the tool-facing text.
    #[error("{0}")]
    Actuator(String),

    #[error("model kept calling tools after {0} rounds")]
    ToolRounds(u32),

    #[error("speech synthesis failed: {0}")]
    Speech(String),

    #[error("reply playback failed: {0}")]
    Playback(#[from] DeviceError),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Http(String),
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PipelineError::Timeout
        } else {
            PipelineError::Http(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline trait
// ---------------------------------------------------------------------------

/// Consumes one artifact and returns the turn's messages in order.
///
/// Implementors must be `Send + Sync`: the dispatcher shares one instance
/// across turn worker threads (`Arc<dyn Pipeline>`).
pub trait Pipeline: Send + Sync {
    fn run(&self, artifact: &Artifact) -> Result<Vec<Message>, PipelineError>;
}

/// Build transcribe → reason → (speak) from configuration.
///
/// Must be called outside any async runtime; the stages own blocking HTTP
/// clients.
pub fn build_pipeline(config: &AppConfig, paths: &AppPaths) -> StagedPipeline {
    let actuator = Arc::new(ActuatorClient::from_config(&config.actuator));

    let mut pipeline = StagedPipeline::new()
        .with_stage(TranscribeStage::from_config(&config.stt))
        .with_stage(ReasonStage::from_config(&config.agent, actuator));

    if config.tts.enabled {
        pipeline = pipeline.with_stage(SpeakStage::from_config(
            &config.tts,
            config.reply_path(paths),
        ));
    }

    log::info!("pipeline: stages = {:?}", pipeline.stage_names());
    pipeline
}
