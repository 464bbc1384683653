//! Speech-to-text stage.
//!
//! Uploads the artifact to any OpenAI-compatible
//! `/v1/audio/transcriptions` endpoint (whisper.cpp server, faster-whisper
//! server, OpenAI) and appends the transcript as a user message.

use std::time::Duration;

use crate::config::SttConfig;

use super::{Message, PipelineError, Stage, TurnContext};

pub struct TranscribeStage {
    client: reqwest::blocking::Client,
    config: SttConfig,
}

impl TranscribeStage {
    pub fn from_config(config: &SttConfig) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/audio/transcriptions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn transcribe(&self, ctx: &TurnContext) -> Result<String, PipelineError> {
        let path = ctx.artifact.path();
        let form = reqwest::blocking::multipart::Form::new()
            .text("model", self.config.model.clone())
            .text("language", self.config.language.clone())
            .text("response_format", "json")
            .file("file", path)
            .map_err(|source| PipelineError::ArtifactIo {
                path: path.to_path_buf(),
                source,
            })?;

        let mut req = self.client.post(self.endpoint()).multipart(form);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.bearer_auth(key);
        }

        let response = req.send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(PipelineError::Transcription(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }
        parse_transcript(&body)
    }
}

impl Stage for TranscribeStage {
    fn name(&self) -> &'static str {
        "transcribe"
    }

    fn apply(&self, mut ctx: TurnContext) -> Result<TurnContext, PipelineError> {
        let text = self.transcribe(&ctx)?;
        log::info!("transcribe: user said {text:?}");
        ctx.messages.push(Message::user(text));
        Ok(ctx)
    }
}

/// Extract the trimmed `text` field; blank transcripts are an error.
pub fn parse_transcript(body: &str) -> Result<String, PipelineError> {
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|e| PipelineError::Transcription(e.to_string()))?;

    let text = json["text"]
        .as_str()
        .ok_or_else(|| PipelineError::Transcription("response has no `text` field".into()))?
        .trim()
        .to_string();

    if text.is_empty() {
        return Err(PipelineError::EmptyTranscript);
    }
    Ok(text)
}
