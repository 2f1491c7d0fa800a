//! The stateful annotation core: objects, prompts, undo and propagation policy.

mod events;
mod session_engine;

pub use events::{SessionEvent, SessionObserver};
pub use session_engine::{FrameChange, PropagationOutcome, SessionEngine, UndoOutcome};
