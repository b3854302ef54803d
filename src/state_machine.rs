//! Core divination session state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::{Event, TossSource};
pub use state::{Session, SessionContext, STEP_COMPLETE, STEP_IDLE};
pub use transition::{transition, TransitionError, TransitionResult};
