//! Text-to-speech stage.
//!
//! Sends the last assistant message to an OpenAI-compatible
//! `/v1/audio/speech` endpoint, writes the returned WAV to the reply file
//! and plays it on the default output device before the turn completes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::json;

use crate::audio::{play_wav, DeviceError};
use crate::config::TtsConfig;

use super::{PipelineError, Stage, TurnContext};

type Player = Box<dyn Fn(&Path) -> Result<(), DeviceError> + Send + Sync>;

pub struct SpeakStage {
    client: reqwest::blocking::Client,
    config: TtsConfig,
    reply_path: PathBuf,
    player: Player,
}

impl SpeakStage {
    pub fn from_config(config: &TtsConfig, reply_path: PathBuf) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            client,
            config: config.clone(),
            reply_path,
            player: Box::new(play_wav),
        }
    }

    /// Replace the audio output (tests use a recorder instead of a device).
    pub fn with_player<F>(mut self, player: F) -> Self
    where
        F: Fn(&Path) -> Result<(), DeviceError> + Send + Sync + 'static,
    {
        self.player = Box::new(player);
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/audio/speech", self.config.base_url.trim_end_matches('/'))
    }

    fn synthesize(&self, text: &str) -> Result<Vec<u8>, PipelineError> {
        let body = json!({
            "model":           self.config.model,
            "input":           text,
            "voice":           self.config.voice,
            "response_format": "wav",
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.bearer_auth(key);
        }

        let response = req.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PipelineError::Speech(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }
        let bytes = response.bytes()?;
        if bytes.is_empty() {
            return Err(PipelineError::Speech("empty audio response".into()));
        }
        Ok(bytes.to_vec())
    }
}

impl Stage for SpeakStage {
    fn name(&self) -> &'static str {
        "speak"
    }

    fn apply(&self, mut ctx: TurnContext) -> Result<TurnContext, PipelineError> {
        let Some(text) = ctx.last_assistant_text().map(str::to_string) else {
            log::debug!("speak: no assistant text, nothing to say");
            return Ok(ctx);
        };

        let audio = self.synthesize(&text)?;
        std::fs::write(&self.reply_path, &audio).map_err(|source| PipelineError::ArtifactIo {
            path: self.reply_path.clone(),
            source,
        })?;
        log::info!(
            "speak: {} bytes written to {}",
            audio.len(),
            self.reply_path.display()
        );

        (self.player)(&self.reply_path)?;
        ctx.reply_audio = Some(self.reply_path.clone());
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Message;
    use crate::audio::{AudioFrame, PcmFormat, RecordingBuffer};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn without_assistant_text_nothing_is_requested_or_played() {
        let dir = tempfile::tempdir().unwrap();
        let played = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&played);

        let stage = SpeakStage::from_config(
            &TtsConfig {
                // Unroutable: a request here would fail the test.
                base_url: "http://127.0.0.1:9".into(),
                ..TtsConfig::default()
            },
            dir.path().join("reply.wav"),
        )
        .with_player(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let format = PcmFormat::default();
        let mut buf = RecordingBuffer::new(format, dir.path().join("in.wav"));
        buf.arm();
        buf.feed(AudioFrame::new(vec![0; 8], format));
        let mut ctx = TurnContext::new(buf.flush().unwrap().unwrap());
        ctx.messages.push(Message::user("hello"));

        let ctx = stage.apply(ctx).unwrap();
        assert!(ctx.reply_audio.is_none());
        assert_eq!(played.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn endpoint_path() {
        let stage = SpeakStage::from_config(&TtsConfig::default(), PathBuf::from("r.wav"));
        assert_eq!(stage.endpoint(), "http://localhost:8880/v1/audio/speech");
    }
}
