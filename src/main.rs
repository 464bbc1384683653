//! Application entry point — push-to-talk window.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run) and apply
//!    environment overrides.
//! 3. Build the turn pipeline (transcribe → reason → speak).  Its stages own
//!    blocking HTTP clients, so this happens before any window or runtime
//!    exists.
//! 4. Run [`eframe::run_native`].  The creation closure builds [`PttApp`],
//!    which opens the capture stream and (optionally) the global hotkey
//!    listener.  Blocks the main thread until the window is closed.

use std::sync::Arc;

use eframe::egui;
use ptt_agent::{
    agent::{build_pipeline, Pipeline},
    app::PttApp,
    config::{AppConfig, AppPaths},
};

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (width, height) = config.ui.window_size;
    let mut vp = egui::ViewportBuilder::default()
        .with_title("Push to talk")
        .with_inner_size([width, height])
        .with_min_inner_size([300.0, 200.0]);

    if config.ui.always_on_top {
        vp = vp.with_always_on_top();
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("ptt-agent starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    let paths = AppPaths::new();

    // 3. Pipeline
    let pipeline: Arc<dyn Pipeline> = Arc::new(build_pipeline(&config, &paths));

    // 4. Window (blocks until closed)
    let options = native_options(&config);
    eframe::run_native(
        "ptt-agent",
        options,
        Box::new(move |cc| {
            let app = PttApp::new(&cc.egui_ctx, config, &paths, pipeline)?;
            Ok(Box::new(app))
        }),
    )
}
