//! Session data: prompts, objects, masks and the session aggregate.

mod mask;
mod object;
mod point;
mod session;

pub use mask::{BoundingBox, Mask, MaskKey, MaskSource};
pub use object::{Color, ObjectDefinition, ObjectId, DEFAULT_PALETTE};
pub use point::{Point, PointLabel};
pub use session::{AnnotationSession, VideoInfo};
