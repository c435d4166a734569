//! The per-rater rating workflow, structured as a state machine.
//!
//! Each (community, rater) pair owns one session. The dispatcher turns
//! platform interactions into [`SessionEvent`]s, the pure [`transition`]
//! function maps state and event to a new state plus [`Effect`]s, and the
//! interpreter executes those effects, feeding store results back in as
//! further events.

pub mod effect;
pub mod event;
pub mod interpreter;
pub mod state;
pub mod store;
pub mod transition;

pub use effect::Effect;
pub use event::{SessionEvent, SubjectAction};
pub use state::SessionState;
pub use store::{SessionKey, SessionStore};
pub use transition::transition;
