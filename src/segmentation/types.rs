use crate::model::{ObjectId, PointLabel};
use anyhow::Result;
use ndarray::Array2;

/// Per-pixel mask logits, shape (height, width); positive means foreground
pub type MaskLogits = Array2<f32>;

/// One prompt as the backend sees it: absolute pixel position plus label
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointPrompt {
    pub x: f32,
    pub y: f32,
    pub label: PointLabel,
}

/// Masks a backend returns for a single frame.
///
/// `object_ids[i]` owns `masks[i]`. The backend may include objects other
/// than the one that was prompted.
#[derive(Debug, Clone, Default)]
pub struct BackendMasks {
    pub object_ids: Vec<ObjectId>,
    pub masks: Vec<MaskLogits>,
}

impl BackendMasks {
    /// Find the mask belonging to `object_id`, regardless of its position
    pub fn take_for(&mut self, object_id: ObjectId) -> Option<MaskLogits> {
        let position = self.object_ids.iter().position(|&id| id == object_id)?;
        if position >= self.masks.len() {
            return None;
        }
        self.object_ids.remove(position);
        Some(self.masks.remove(position))
    }
}

/// Propagation output for one frame, indexed relative to the first frame the
/// backend was initialised with
#[derive(Debug, Clone, Default)]
pub struct FrameMasks {
    pub frame_index: usize,
    pub object_ids: Vec<ObjectId>,
    pub masks: Vec<MaskLogits>,
}

/// Trait for promptable video segmentation backends
/// Allows swapping between different backends (SAM 2 checkpoints, ONNX exports, remote services)
pub trait SegmentationBackend {
    /// Prompt one object on one frame
    ///
    /// # Arguments
    /// * `frame_index` - Frame index relative to the backend's first frame
    /// * `object_id` - Object the prompts belong to
    /// * `prompts` - Every prompt for that object on that frame, in click order
    ///
    /// # Returns
    /// * Masks for every object the backend currently tracks on that frame
    fn add_points(
        &mut self,
        frame_index: usize,
        object_id: ObjectId,
        prompts: &[PointPrompt],
    ) -> Result<BackendMasks>;

    /// Run the tracker through the whole video using the prompts added so far
    fn propagate(&mut self) -> Result<Vec<FrameMasks>>;

    /// Reset internal state
    ///
    /// Call this when starting a new video session
    fn reset_state(&mut self) {
        // Default implementation: no-op for stateless backends
    }
}
