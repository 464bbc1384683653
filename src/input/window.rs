//! In-window push-to-talk: a designated key or the talk button.

use super::{EdgeLatch, InputEdge};

/// Which in-window control is holding push-to-talk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Key,
    Pointer,
}

/// Derives edges from window key and pointer events.
///
/// The presentation layer feeds raw events in; only events for the
/// designated key or the talk button produce edges.  Auto-repeat key-downs
/// and presses of a second control while one is held produce nothing.
#[derive(Debug)]
pub struct WindowedInput {
    key: egui::Key,
    latch: EdgeLatch<Control>,
}

impl WindowedInput {
    pub fn new(key: egui::Key) -> Self {
        Self {
            key,
            latch: EdgeLatch::new(),
        }
    }

    pub fn key(&self) -> egui::Key {
        self.key
    }

    /// Feed one keyboard event.
    pub fn on_key(&mut self, key: egui::Key, pressed: bool, repeat: bool) -> Option<InputEdge> {
        if key != self.key || repeat {
            return None;
        }
        if pressed {
            self.latch.press(Control::Key)
        } else {
            self.latch.release(Control::Key)
        }
    }

    /// Feed the talk button's pointer state for this frame: `held` is true
    /// while a press that began on the button is still down.
    pub fn on_pointer(&mut self, held: bool) -> Option<InputEdge> {
        match (held, self.latch.held_by()) {
            (true, None) => self.latch.press(Control::Pointer),
            (false, Some(Control::Pointer)) => self.latch.release(Control::Pointer),
            _ => None,
        }
    }

    /// Collect this frame's edges from egui input.
    pub fn poll(&mut self, ctx: &egui::Context, button_held: bool) -> Vec<InputEdge> {
        let mut edges: Vec<InputEdge> = ctx.input(|i| {
            i.events
                .iter()
                .filter_map(|event| match event {
                    egui::Event::Key {
                        key,
                        pressed,
                        repeat,
                        ..
                    } => Some((*key, *pressed, *repeat)),
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
        .into_iter()
        .filter_map(|(key, pressed, repeat)| self.on_key(key, pressed, repeat))
        .collect();

        edges.extend(self.on_pointer(button_held));
        edges
    }

    /// `true` while a control is held.
    pub fn is_held(&self) -> bool {
        self.latch.is_held()
    }
}
