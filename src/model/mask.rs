use super::ObjectId;
use ndarray::Array2;

/// How a mask came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskSource {
    /// Produced from the user's prompts on this exact frame
    Interactive,
    /// Produced by propagating prompts from other frames
    Propagated,
}

/// Key of the session's mask store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaskKey {
    pub object_id: ObjectId,
    pub frame_index: usize,
}

impl MaskKey {
    pub fn new(object_id: ObjectId, frame_index: usize) -> Self {
        Self {
            object_id,
            frame_index,
        }
    }
}

/// Tight box around foreground pixels, `[x, y, width, height]` in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn to_xywh(self) -> [u32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

/// Binary segmentation of one object on one frame.
///
/// `bitmap` is indexed `[row, column]`, i.e. shape `(height, width)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub object_id: ObjectId,
    pub frame_index: usize,
    pub bitmap: Array2<bool>,
    pub source: MaskSource,
}

impl Mask {
    pub fn new(object_id: ObjectId, frame_index: usize, bitmap: Array2<bool>, source: MaskSource) -> Self {
        Self {
            object_id,
            frame_index,
            bitmap,
            source,
        }
    }

    /// Threshold backend logits into a mask; pixels strictly above
    /// `threshold` are foreground.
    pub fn from_logits(
        object_id: ObjectId,
        frame_index: usize,
        logits: &Array2<f32>,
        threshold: f32,
        source: MaskSource,
    ) -> Self {
        let bitmap = logits.mapv(|logit| logit > threshold);
        Self::new(object_id, frame_index, bitmap, source)
    }

    pub fn key(&self) -> MaskKey {
        MaskKey::new(self.object_id, self.frame_index)
    }

    /// Returns (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        let (rows, cols) = self.bitmap.dim();
        (cols as u32, rows as u32)
    }

    /// Number of foreground pixels
    pub fn area(&self) -> u64 {
        self.bitmap.iter().filter(|&&on| on).count() as u64
    }

    pub fn is_empty(&self) -> bool {
        !self.bitmap.iter().any(|&on| on)
    }

    /// Tight bounding box of the foreground, all zeros for an empty mask
    pub fn bounding_box(&self) -> BoundingBox {
        let mut bounds: Option<(usize, usize, usize, usize)> = None;

        for ((row, col), &on) in self.bitmap.indexed_iter() {
            if !on {
                continue;
            }
            bounds = Some(match bounds {
                None => (col, row, col, row),
                Some((x_min, y_min, x_max, y_max)) => {
                    (x_min.min(col), y_min.min(row), x_max.max(col), y_max.max(row))
                }
            });
        }

        match bounds {
            Some((x_min, y_min, x_max, y_max)) => BoundingBox {
                x: x_min as u32,
                y: y_min as u32,
                width: (x_max - x_min + 1) as u32,
                height: (y_max - y_min + 1) as u32,
            },
            None => BoundingBox::default(),
        }
    }
}
