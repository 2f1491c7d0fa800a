mod adapter;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::AnnotationService;
pub use types::{BackendMasks, FrameMasks, MaskLogits, PointPrompt, SegmentationBackend};
