use crate::model::ObjectId;
use thiserror::Error;

/// Errors surfaced by the annotation session and its exporters.
///
/// Validation variants (`InvalidName` through `NothingToUndo`, and
/// `EmptySession`) are raised before any state is touched.
#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("object name must not be empty")]
    InvalidName,

    #[error("an object named '{0}' already exists")]
    DuplicateName(String),

    #[error("object {0} does not exist")]
    UnknownObject(ObjectId),

    #[error("no prompts given for object {object_id} on frame {frame_index}")]
    EmptyPrompt {
        object_id: ObjectId,
        frame_index: usize,
    },

    #[error("no object selected; add or select an object first")]
    NoObjectSelected,

    #[error("no point to undo for object {object_id} on frame {frame_index}")]
    NothingToUndo {
        object_id: ObjectId,
        frame_index: usize,
    },

    /// The backend answered without a mask for the object that was prompted.
    #[error(
        "segmentation backend returned no mask for object {requested} on frame {frame_index} (returned ids: {returned:?})"
    )]
    Consistency {
        requested: ObjectId,
        frame_index: usize,
        returned: Vec<ObjectId>,
    },

    #[error("propagation failed: {0:#}")]
    Propagation(#[source] anyhow::Error),

    #[error("segmentation backend call failed: {0:#}")]
    Backend(#[source] anyhow::Error),

    #[error("frame {frame_index} precedes the first extracted frame {start_frame}")]
    FrameBeforeStart {
        frame_index: usize,
        start_frame: usize,
    },

    #[error("frame {frame_index} is past the end of the video ({total_frames} frames)")]
    FrameOutOfRange {
        frame_index: usize,
        total_frames: usize,
    },

    #[error("session has no masks to export")]
    EmptySession,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to serialize dataset: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T, E = AnnotationError> = std::result::Result<T, E>;
