//! Headless push-to-talk loop — no window.
//!
//! Hold the configured key anywhere on the desktop, speak, release.  Turn
//! messages are printed to stdout.  When the OS refuses the global listener
//! the loop falls back to stdin: each Enter toggles recording.
//!
//! ```text
//! ptt-agent-headless                 # run the loop
//! ptt-agent-headless --diagnose-led  # blink the LED endpoint and exit
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use ptt_agent::{
    actuator::ActuatorClient,
    agent::{build_pipeline, Pipeline},
    config::{AppConfig, AppPaths},
    input::{parse_key, ConsoleInput, GlobalHotkeyInput, InputEvent},
    turn::{ControllerState, Transition, TurnOutcome, VoiceSession},
};

/// How often the capture stream's health is checked.
const STREAM_CHECK_INTERVAL: Duration = Duration::from_secs(2);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    let paths = AppPaths::new();

    if std::env::args().skip(1).any(|arg| arg == "--diagnose-led") {
        return diagnose_led(&config);
    }

    // Blocking HTTP clients are created and dropped outside the runtime.
    let pipeline: Arc<dyn Pipeline> = Arc::new(build_pipeline(&config, &paths));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;
    let result = runtime.block_on(run(&config, &paths, Arc::clone(&pipeline)));
    drop(runtime);
    drop(pipeline);
    result
}

fn diagnose_led(config: &AppConfig) -> Result<()> {
    let client = ActuatorClient::from_config(&config.actuator);
    println!("Sending diagnostic request to {}", client.url());
    let body = client
        .diagnose()
        .with_context(|| format!("diagnostic request to {}", client.url()))?;
    println!("{body}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

async fn run(config: &AppConfig, paths: &AppPaths, pipeline: Arc<dyn Pipeline>) -> Result<()> {
    let (mut session, mut sink) = VoiceSession::new(config, paths, pipeline, None)?;
    if let Err(e) = session.open_stream() {
        log::error!("headless: microphone unavailable: {e}");
    }

    let (input_tx, mut input_rx) = mpsc::channel::<InputEvent>(16);
    let key_name = &config.hotkey.push_to_talk_key;

    // Kept alive for the lifetime of the loop.
    let mut console: Option<ConsoleInput> = None;
    let _hotkey = match parse_key(key_name)
        .and_then(|key| GlobalHotkeyInput::start(key, input_tx.clone(), None))
    {
        Ok(listener) => {
            println!("Hold {key_name} to talk. Ctrl+C to quit.");
            Some(listener)
        }
        Err(e) => {
            log::warn!("headless: global hotkey unavailable ({e})");
            console = Some(start_console(&input_tx)?);
            None
        }
    };

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stream_check = tokio::time::interval(STREAM_CHECK_INTERVAL);

    loop {
        tokio::select! {
            Some(event) = input_rx.recv() => match event {
                InputEvent::Edge(edge) => report_transition(&session.handle_edge(edge)),
                InputEvent::ListenerFailed(reason) => {
                    log::warn!("headless: global hotkey failed ({reason})");
                    if console.is_none() {
                        console = Some(start_console(&input_tx)?);
                    }
                }
            },
            Some(outcome) = sink.recv() => {
                print_outcome(&outcome);
                session.complete_turn(&outcome);
            }
            _ = stream_check.tick() => {
                if session.stream_failed() && session.state() == ControllerState::Idle {
                    if let Err(e) = session.reopen() {
                        log::debug!("headless: reopen failed: {e}");
                    }
                }
            }
            _ = &mut ctrl_c => {
                println!();
                log::info!("headless: interrupted, exiting");
                break;
            }
        }
    }

    if session.state() == ControllerState::Busy {
        log::info!("headless: a turn is still running and will be abandoned");
    }
    Ok(())
}

fn start_console(tx: &mpsc::Sender<InputEvent>) -> Result<ConsoleInput> {
    let console = ConsoleInput::start(tx.clone(), None).context("starting console input")?;
    println!("Press Enter to start recording, Enter again to stop. Ctrl+C to quit.");
    Ok(console)
}

fn report_transition(transition: &Transition) {
    match transition {
        Transition::Armed => println!("● recording…"),
        Transition::Dispatched(id) => println!("… processing turn {id}"),
        Transition::Discarded => println!("(nothing captured)"),
        Transition::CaptureFailed(reason) => eprintln!("capture failed: {reason}"),
        Transition::Ignored | Transition::Released(_) => {}
    }
}

fn print_outcome(outcome: &TurnOutcome) {
    match outcome.error() {
        Some(reason) => eprintln!("turn {} failed: {reason}", outcome.id),
        None => {
            for message in outcome.messages() {
                println!("{message}");
            }
            println!(
                "turn {} done in {:.1}s",
                outcome.id,
                outcome.elapsed.as_secs_f32()
            );
        }
    }
}
