//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\ptt-agent\
//!   macOS:   ~/Library/Application Support/ptt-agent/
//!   Linux:   ~/.config/ptt-agent/
//!
//! Data dir (recorded artifact, synthesized reply):
//!   Windows: %LOCALAPPDATA%\ptt-agent\
//!   macOS:   ~/Library/Application Support/ptt-agent/
//!   Linux:   ~/.local/share/ptt-agent/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for audio written at runtime.
    pub data_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "ptt-agent";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");

        Self {
            config_dir,
            settings_file,
            data_dir,
        }
    }

    /// Create the data directory if it does not exist yet.
    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
