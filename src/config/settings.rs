//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// CaptureFormat
// ---------------------------------------------------------------------------

/// Sample format requested from the input device.
///
/// Artifacts are always written as 16-bit PCM; `F32` capture is converted
/// sample-by-sample before it reaches the recording buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CaptureFormat {
    /// Signed 16-bit integers (the default, no conversion).
    #[default]
    I16,
    /// 32-bit floats in `[-1.0, 1.0]`.
    F32,
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for the capture stream and the recorded artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of the recorded artifact in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels in the recorded artifact.
    pub channels: u16,
    /// Sample format requested from the device.
    pub sample_format: CaptureFormat,
    /// File name of the artifact inside the data directory.  Each turn
    /// overwrites the previous one.
    pub artifact_file: String,
    /// Input device name — `None` means the system default.
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            sample_format: CaptureFormat::I16,
            artifact_file: "human_message.wav".into(),
            device: None,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Push-to-talk key bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// Push-to-talk key name (e.g. `"Space"`, `"F9"`).
    pub push_to_talk_key: String,
    /// Also start the OS-level listener while the window is open.
    pub global_in_window: bool,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            push_to_talk_key: "Space".into(),
            global_in_window: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ActuatorConfig
// ---------------------------------------------------------------------------

/// Remote LED endpoint used by the `control_led` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    /// Full URL of the LED endpoint (POST commands, GET diagnostic blink).
    pub url: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000/led".into(),
            timeout_ms: 5_000,
        }
    }
}

// ---------------------------------------------------------------------------
// AgentConfig
// ---------------------------------------------------------------------------

/// Settings for the reasoning stage (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the API endpoint, without the `/v1/...` suffix.
    pub base_url: String,
    /// API key — `None` for local providers.
    pub api_key: Option<String>,
    /// Model identifier sent to the API.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// System prompt prepended to every request.
    pub system_prompt: String,
    /// Maximum model round-trips that may end in tool calls before the turn
    /// is failed.
    pub max_tool_rounds: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            api_key: None,
            model: "qwen2.5:3b".into(),
            temperature: 0.0,
            system_prompt:
                "You are Little John, a robot assistant for smart home and IoT devices.".into(),
            max_tool_rounds: 4,
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the transcription stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Base URL of an OpenAI-compatible `/v1/audio/transcriptions` server.
    pub base_url: String,
    /// API key — `None` for local servers.
    pub api_key: Option<String>,
    /// Model name (e.g. `"whisper-1"`, `"small"`).
    pub model: String,
    /// Spoken language as an ISO-639-1 code.
    pub language: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            api_key: None,
            model: "small".into(),
            language: "en".into(),
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for the speech synthesis stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Speak the assistant's reply after each turn.
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible `/v1/audio/speech` server.
    pub base_url: String,
    /// API key — `None` for local servers.
    pub api_key: Option<String>,
    /// Model name.
    pub model: String,
    /// Voice name.
    pub voice: String,
    /// File name of the synthesized reply inside the data directory.
    pub reply_file: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:8880".into(),
            api_key: None,
            model: "tts-1".into(),
            voice: "alloy".into(),
            reply_file: "voice_agent_response.wav".into(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Window settings for the windowed front-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Keep the window above all other windows.
    pub always_on_top: bool,
    /// Initial inner size `(width, height)` in points.
    pub window_size: (f32, f32),
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            always_on_top: false,
            window_size: (420.0, 320.0),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use ptt_agent::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capture stream and artifact settings.
    pub audio: AudioConfig,
    /// Push-to-talk bindings.
    pub hotkey: HotkeyConfig,
    /// LED endpoint.
    pub actuator: ActuatorConfig,
    /// Reasoning stage.
    pub agent: AgentConfig,
    /// Transcription stage.
    pub stt: SttConfig,
    /// Speech synthesis stage.
    pub tts: TtsConfig,
    /// Window settings.
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml` and
    /// apply environment overrides.
    ///
    /// Returns the defaults when the file does not exist yet.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&AppPaths::new().settings_file)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Override selected fields from environment variables.
    ///
    /// | Variable           | Field                         |
    /// |--------------------|-------------------------------|
    /// | `LED_API_BASE_URL` | `actuator.url`                |
    /// | `LLM_BASE_URL`     | `agent.base_url`              |
    /// | `LLM_API_KEY`      | `agent.api_key`               |
    /// | `LLM_MODEL`        | `agent.model`                 |
    /// | `STT_BASE_URL`     | `stt.base_url`                |
    /// | `STT_API_KEY`      | `stt.api_key`                 |
    ///
    /// `lookup` is injected so tests don't touch the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("LED_API_BASE_URL") {
            self.actuator.url = url;
        }
        if let Some(url) = non_empty("LLM_BASE_URL") {
            self.agent.base_url = url;
        }
        if let Some(key) = non_empty("LLM_API_KEY") {
            self.agent.api_key = Some(key);
        }
        if let Some(model) = non_empty("LLM_MODEL") {
            self.agent.model = model;
        }
        if let Some(url) = non_empty("STT_BASE_URL") {
            self.stt.base_url = url;
        }
        if let Some(key) = non_empty("STT_API_KEY") {
            self.stt.api_key = Some(key);
        }
    }

    /// Absolute path the recorded artifact is written to.
    pub fn artifact_path(&self, paths: &AppPaths) -> std::path::PathBuf {
        paths.data_dir.join(&self.audio.artifact_file)
    }

    /// Absolute path the synthesized reply is written to.
    pub fn reply_path(&self, paths: &AppPaths) -> std::path::PathBuf {
        paths.data_dir.join(&self.tts.reply_file)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
