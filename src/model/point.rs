use super::ObjectId;

/// Whether a prompt marks foreground or background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointLabel {
    Positive,
    Negative,
}

impl PointLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            PointLabel::Positive => "positive",
            PointLabel::Negative => "negative",
        }
    }
}

/// A click prompt on one frame, attributed to one object.
///
/// Coordinates are absolute pixel positions and `frame_index` is the
/// absolute index into the source video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub label: PointLabel,
    pub object_id: ObjectId,
    pub frame_index: usize,
}

impl Point {
    pub fn new(x: f32, y: f32, label: PointLabel, object_id: ObjectId, frame_index: usize) -> Self {
        Self {
            x,
            y,
            label,
            object_id,
            frame_index,
        }
    }

    pub fn belongs_to(&self, object_id: ObjectId, frame_index: usize) -> bool {
        self.object_id == object_id && self.frame_index == frame_index
    }
}
