use crate::error::AnnotationError;
use crate::model::{Mask, ObjectDefinition, ObjectId};

/// Notifications emitted after each successful mutation.
///
/// Observers run synchronously inside the mutating call, so they see every
/// event before the next mutation can be issued.
#[derive(Debug)]
pub enum SessionEvent<'a> {
    ObjectAdded(&'a ObjectDefinition),
    ObjectSelected(&'a ObjectDefinition),
    /// A mask was created or recomputed for this object/frame
    AnnotationAdded {
        object_id: ObjectId,
        frame_index: usize,
        mask: &'a Mask,
    },
    /// The mask for this object/frame no longer exists
    AnnotationRemoved {
        object_id: ObjectId,
        frame_index: usize,
    },
    FrameChanged {
        from: usize,
        to: usize,
    },
    PropagationCompleted {
        masks_merged: usize,
    },
    PropagationFailed(&'a AnnotationError),
}

impl SessionEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::ObjectAdded(_) => "object_added",
            SessionEvent::ObjectSelected(_) => "object_selected",
            SessionEvent::AnnotationAdded { .. } => "annotation_added",
            SessionEvent::AnnotationRemoved { .. } => "annotation_removed",
            SessionEvent::FrameChanged { .. } => "frame_changed",
            SessionEvent::PropagationCompleted { .. } => "propagation_completed",
            SessionEvent::PropagationFailed(_) => "propagation_failed",
        }
    }
}

/// Receives session events, typically the presentation layer
pub trait SessionObserver {
    fn on_event(&mut self, event: &SessionEvent<'_>);
}

impl<F> SessionObserver for F
where
    F: FnMut(&SessionEvent<'_>),
{
    fn on_event(&mut self, event: &SessionEvent<'_>) {
        self(event)
    }
}

pub(crate) fn notify(observers: &mut [Box<dyn SessionObserver>], event: &SessionEvent<'_>) {
    for observer in observers.iter_mut() {
        observer.on_event(event);
    }
}
