//! Interactive video annotation core.
//!
//! A [`SessionEngine`] accumulates click prompts per object and frame, asks a
//! [`SegmentationBackend`] for masks, defers whole-video propagation until the
//! user changes frame, and supports undoing the latest point. The session is
//! exported as a COCO dataset with [`export::export`].

pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod model;
pub mod segmentation;
pub mod video;

pub use config::SessionConfig;
pub use engine::{FrameChange, PropagationOutcome, SessionEngine, SessionEvent, SessionObserver, UndoOutcome};
pub use error::AnnotationError;
pub use model::{AnnotationSession, Mask, MaskKey, ObjectDefinition, ObjectId, Point, PointLabel, VideoInfo};
pub use segmentation::SegmentationBackend;
