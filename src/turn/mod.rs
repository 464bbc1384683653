//! Push-to-talk turn handling — controller state machine, dispatcher and
//! result sink.
//!
//! # Ownership
//!
//! * The audio callback only touches the recording buffer, via `try_lock`.
//! * The front-end thread owns the [`VoiceSession`] (and through it the
//!   [`PushToTalkController`]) and drains the [`ResultSink`].
//! * At most one turn worker thread runs the [`Pipeline`](crate::agent::Pipeline).

pub mod controller;
pub mod dispatcher;
pub mod session;
pub mod state;

pub use controller::PushToTalkController;
pub use dispatcher::{channel, ResultSink, TurnDispatcher, TurnOutcome, TurnStatus};
pub use session::VoiceSession;
pub use state::{ControllerState, Transition, TurnId};
