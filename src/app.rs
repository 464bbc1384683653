//! Push-to-talk window — egui/eframe application.
//!
//! # Architecture
//!
//! [`PttApp`] is the top-level [`eframe::App`].  It owns the
//! [`VoiceSession`] and the [`ResultSink`], so every controller transition
//! happens on the UI thread:
//!
//! * window key / talk-button events → [`WindowedInput`] → edges
//! * optional global hotkey thread → `input_rx` → edges
//! * turn worker → [`ResultSink`] → `complete_turn`
//!
//! Background senders call a waker that requests a repaint, so the window
//! only redraws when something happened (plus a slow tick for the elapsed
//! timer while recording).
//!
//! # Button states
//!
//! | State | Label | Colour |
//! |-------|-------|--------|
//! | `Idle` | "Ready" | gray |
//! | `Recording` | "Recording…" + timer | red |
//! | `Busy` | "Processing…" | blue |

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use eframe::egui;
use tokio::sync::mpsc;

use crate::agent::{Message, Pipeline, Role};
use crate::config::{AppConfig, AppPaths};
use crate::input::{
    parse_key, parse_window_key, GlobalHotkeyInput, InputEdge, InputEvent, WindowedInput,
};
use crate::turn::{ControllerState, ResultSink, Transition, TurnOutcome, VoiceSession};
use crate::Waker;

const GRAY: egui::Color32 = egui::Color32::from_rgb(120, 120, 120);
const RED: egui::Color32 = egui::Color32::from_rgb(255, 68, 68);
const BLUE: egui::Color32 = egui::Color32::from_rgb(68, 136, 255);
const GREEN: egui::Color32 = egui::Color32::from_rgb(80, 200, 120);
const ORANGE: egui::Color32 = egui::Color32::from_rgb(255, 136, 68);

// ---------------------------------------------------------------------------
// PttApp
// ---------------------------------------------------------------------------

/// eframe application — the push-to-talk window.
pub struct PttApp {
    // ── Core ─────────────────────────────────────────────────────────────
    session: VoiceSession,
    sink: ResultSink,

    // ── Input ────────────────────────────────────────────────────────────
    window_input: WindowedInput,
    /// Edges from the global hotkey thread, when enabled.
    input_rx: mpsc::Receiver<InputEvent>,
    hotkey: Option<GlobalHotkeyInput>,

    // ── Display state ────────────────────────────────────────────────────
    /// Messages of the most recent successful turn.
    last_messages: Vec<Message>,
    /// Last capture, device or turn error.
    last_error: Option<String>,
    /// Informational line (e.g. "nothing captured").
    note: Option<String>,
    /// Set when the global hotkey listener failed.
    hotkey_notice: Option<String>,
    recording_start: Option<Instant>,
    last_turn_elapsed: Option<Duration>,

    config: AppConfig,
}

impl PttApp {
    /// Build the app inside the eframe creation closure.
    ///
    /// The capture stream is opened here; failing to open it is shown in
    /// the window rather than aborting.
    pub fn new(
        ctx: &egui::Context,
        config: AppConfig,
        paths: &AppPaths,
        pipeline: Arc<dyn Pipeline>,
    ) -> Result<Self> {
        let waker: Waker = {
            let ctx = ctx.clone();
            Arc::new(move || ctx.request_repaint())
        };

        let (mut session, sink) = VoiceSession::new(&config, paths, pipeline, Some(Arc::clone(&waker)))?;

        let mut last_error = None;
        if let Err(e) = session.open_stream() {
            log::warn!("app: microphone unavailable: {e}");
            last_error = Some(format!("Microphone unavailable: {e}"));
        }

        let key_name = &config.hotkey.push_to_talk_key;
        let window_key = parse_window_key(key_name).unwrap_or_else(|e| {
            log::warn!("app: {e}; using Space in the window");
            egui::Key::Space
        });

        let (input_tx, input_rx) = mpsc::channel::<InputEvent>(16);
        let mut hotkey_notice = None;
        let hotkey = if config.hotkey.global_in_window {
            match parse_key(key_name)
                .and_then(|key| GlobalHotkeyInput::start(key, input_tx, Some(waker)))
            {
                Ok(listener) => Some(listener),
                Err(e) => {
                    hotkey_notice = Some(format!("Global hotkey unavailable: {e}"));
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            session,
            sink,
            window_input: WindowedInput::new(window_key),
            input_rx,
            hotkey,
            last_messages: Vec::new(),
            last_error,
            note: None,
            hotkey_notice,
            recording_start: None,
            last_turn_elapsed: None,
            config,
        })
    }

    // ── Event handling ───────────────────────────────────────────────────

    fn apply_edge(&mut self, edge: InputEdge) {
        let transition = self.session.handle_edge(edge);
        match transition {
            Transition::Armed => {
                self.recording_start = Some(Instant::now());
                self.note = None;
                self.last_error = None;
            }
            Transition::Dispatched(id) => {
                self.recording_start = None;
                self.note = Some(format!("Turn {id} submitted"));
            }
            Transition::Discarded => {
                self.recording_start = None;
                self.note = Some("Nothing was captured.".into());
            }
            Transition::CaptureFailed(reason) => {
                self.recording_start = None;
                self.last_error = Some(reason);
            }
            Transition::Ignored | Transition::Released(_) => {}
        }
    }

    fn apply_outcome(&mut self, outcome: TurnOutcome) {
        if self.session.complete_turn(&outcome).is_ignored() {
            return;
        }
        self.last_turn_elapsed = Some(outcome.elapsed);
        self.note = None;
        match outcome.error() {
            Some(reason) => self.last_error = Some(reason.to_string()),
            None => {
                self.last_error = None;
                self.last_messages = outcome.messages().to_vec();
            }
        }
    }

    /// Drain the global hotkey channel (non-blocking).
    fn poll_hotkey(&mut self) {
        while let Ok(event) = self.input_rx.try_recv() {
            match event {
                InputEvent::Edge(edge) => self.apply_edge(edge),
                InputEvent::ListenerFailed(reason) => {
                    self.hotkey_notice = Some(format!(
                        "Global hotkey unavailable ({reason}); use the window key or button."
                    ));
                }
            }
        }
    }

    /// Drain finished turns (non-blocking).
    fn poll_results(&mut self) {
        while let Some(outcome) = self.sink.try_receive() {
            self.apply_outcome(outcome);
        }
    }

    // ── Panels ───────────────────────────────────────────────────────────

    /// The talk button.  Returns `true` while a press that began on it is
    /// held.
    fn draw_talk_button(&self, ui: &mut egui::Ui) -> bool {
        let state = self.session.state();
        let text = match (state, self.recording_start) {
            (ControllerState::Recording, Some(t)) => {
                format!("{} {:.1}s", state.label(), t.elapsed().as_secs_f32())
            }
            _ => state.label().to_string(),
        };

        let button = egui::Button::new(egui::RichText::new(text).size(18.0).color(state_color(state)))
            .min_size(egui::vec2(ui.available_width(), 64.0))
            .sense(egui::Sense::click_and_drag());
        ui.add(button).is_pointer_button_down_on()
    }

    fn draw_messages(&self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .max_height(140.0)
            .show(ui, |ui| {
                for message in &self.last_messages {
                    let color = match message.role {
                        Role::User => egui::Color32::from_rgb(200, 200, 200),
                        Role::Assistant => GREEN,
                        Role::Tool => GRAY,
                        Role::System => GRAY,
                    };
                    ui.label(
                        egui::RichText::new(message.to_string())
                            .color(color)
                            .size(12.0),
                    );
                }
            });
    }

    fn draw_status(&mut self, ui: &mut egui::Ui) {
        if let Some(note) = &self.note {
            ui.label(egui::RichText::new(note).color(GRAY).size(11.0));
        }
        if let Some(err) = &self.last_error {
            ui.label(egui::RichText::new(err).color(ORANGE).size(12.0));
        }
        if let Some(notice) = &self.hotkey_notice {
            ui.label(egui::RichText::new(notice).color(ORANGE).size(11.0));
        }

        if self.session.stream_failed() {
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new("Microphone stream stopped.").color(RED).size(11.0));
                if ui.button("Reopen microphone").clicked() {
                    match self.session.reopen() {
                        Ok(()) => self.last_error = None,
                        Err(e) => self.last_error = Some(format!("Microphone unavailable: {e}")),
                    }
                }
            });
        }

        ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new(format!(
                    "Hold {:?} or the button to talk",
                    self.window_input.key()
                ))
                .color(GRAY)
                .size(10.0),
            );
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let mut info = format!("dropped frames: {}", self.session.dropped_frames());
                if let Some(elapsed) = self.last_turn_elapsed {
                    info.push_str(&format!(" · last turn {:.1}s", elapsed.as_secs_f32()));
                }
                ui.label(egui::RichText::new(info).color(GRAY).size(10.0));
            });
        });
    }
}

/// Accent colour for a controller state.
fn state_color(state: ControllerState) -> egui::Color32 {
    match state {
        ControllerState::Idle => GRAY,
        ControllerState::Recording => RED,
        ControllerState::Busy => BLUE,
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for PttApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // --- Poll non-blocking channels ------------------------------------
        self.poll_hotkey();
        self.poll_results();

        let mut button_held = false;
        egui::CentralPanel::default().show(ctx, |ui| {
            button_held = self.draw_talk_button(ui);
            ui.separator();
            self.draw_messages(ui);
            ui.separator();
            self.draw_status(ui);
        });

        // --- Window input → controller -------------------------------------
        let edges = self.window_input.poll(ctx, button_held);
        if !edges.is_empty() {
            for edge in edges {
                self.apply_edge(edge);
            }
            ctx.request_repaint();
        }

        // --- Elapsed timer while recording ---------------------------------
        if self.session.state() == ControllerState::Recording {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if self.hotkey.as_ref().is_some_and(GlobalHotkeyInput::is_degraded) {
            log::debug!("app: global hotkey was degraded");
        }
        log::info!(
            "push-to-talk window closing ({})",
            self.config.hotkey.push_to_talk_key
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_state_has_its_own_colour() {
        assert_eq!(state_color(ControllerState::Idle), GRAY);
        assert_eq!(state_color(ControllerState::Recording), RED);
        assert_eq!(state_color(ControllerState::Busy), BLUE);
    }
}
