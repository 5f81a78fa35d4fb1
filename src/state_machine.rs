//! Turn state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! transition function decides, the runtime executor performs effects.

mod effect;
mod event;
mod state;
pub(crate) mod transition;


pub use effect::{Effect, Notice};
pub use event::Event;
pub use state::{TurnContext, TurnError, TurnState};
pub use transition::transition;
