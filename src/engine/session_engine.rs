use super::events::{notify, SessionEvent, SessionObserver};
use crate::config::SessionConfig;
use crate::error::{AnnotationError, Result};
use crate::model::{AnnotationSession, Mask, MaskKey, ObjectId, Point, PointLabel, VideoInfo};
use crate::segmentation::{AnnotationService, SegmentationBackend};
use std::collections::BTreeSet;

/// Result of undoing a point
#[derive(Debug)]
pub enum UndoOutcome<'a> {
    /// Points remain for the pair; the mask was recomputed from them
    Updated { removed: Point, mask: &'a Mask },
    /// That was the pair's last point; the propagated mask it had replaced
    /// is back
    Restored { removed: Point, mask: &'a Mask },
    /// That was the pair's last point; its mask is gone
    Removed { removed: Point },
}

/// What happened to propagation during a frame transition
#[derive(Debug)]
pub enum PropagationOutcome {
    NotNeeded,
    Completed { masks_merged: usize },
    /// Navigation still happened; propagation is retried on the next change
    Failed(AnnotationError),
}

#[derive(Debug)]
pub struct FrameChange {
    pub from: usize,
    pub to: usize,
    pub propagation: PropagationOutcome,
}

/// Coordinates the session's data with the segmentation backend.
///
/// All mutating calls take `&mut self`, so a single owner serialises them.
/// Point clicks only prompt the backend for the clicked object and frame;
/// whole-video propagation is deferred until the user leaves the frame.
pub struct SessionEngine {
    session: AnnotationSession,
    service: AnnotationService,
    config: SessionConfig,
    observers: Vec<Box<dyn SessionObserver>>,
}

impl SessionEngine {
    /// Start a session whose backend was initialised with the frames from
    /// `start_frame` onwards
    pub fn new(
        video: VideoInfo,
        start_frame: usize,
        backend: Box<dyn SegmentationBackend>,
        config: SessionConfig,
    ) -> Self {
        tracing::info!(
            "Starting annotation session for {} ({}, {} frames) at frame {}",
            video.path,
            video.resolution_string(),
            video.total_frames,
            start_frame
        );
        let mut service = AnnotationService::new(backend, start_frame, config.mask_threshold);
        service.reset();
        Self {
            session: AnnotationSession::new(video, start_frame),
            service,
            config,
            observers: Vec::new(),
        }
    }

    pub fn session(&self) -> &AnnotationSession {
        &self.session
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn into_session(self) -> AnnotationSession {
        self.session
    }

    pub fn subscribe(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn add_object(&mut self, name: &str) -> Result<ObjectId> {
        let object = self.session.add_object(name, &self.config.palette)?;
        tracing::info!("Added object '{}' (ID: {})", object.name, object.id);
        let id = object.id;
        notify(&mut self.observers, &SessionEvent::ObjectAdded(object));
        Ok(id)
    }

    pub fn select_object(&mut self, object_id: ObjectId) -> Result<()> {
        self.session.set_current_object(object_id)?;
        if let Some(object) = self.session.object(object_id) {
            tracing::debug!("Selected object '{}' for annotation", object.name);
            notify(&mut self.observers, &SessionEvent::ObjectSelected(object));
        }
        Ok(())
    }

    /// Add a prompt for the current object and return its refreshed mask.
    ///
    /// The backend is given every point for this object on this frame, the
    /// new one last. Nothing is recorded if the backend call fails. The
    /// clicked frame becomes the current frame without triggering
    /// propagation.
    pub fn add_point(&mut self, frame_index: usize, x: f32, y: f32, label: PointLabel) -> Result<&Mask> {
        let object_id = self
            .session
            .current_object_id()
            .ok_or(AnnotationError::NoObjectSelected)?;
        self.check_frame(frame_index)?;

        let point = Point::new(x, y, label, object_id, frame_index);
        let mut prompts = self.session.points_for(object_id, frame_index);
        prompts.push(point);

        let mask = self.service.apply_points(object_id, frame_index, &prompts)?;

        self.session.push_point(point)?;
        self.session.set_current_frame(frame_index);
        self.session.mark_needs_propagation();
        tracing::debug!(
            "Added {} point for object {} at ({}, {}) on frame {}",
            label.as_str(),
            object_id,
            x,
            y,
            frame_index
        );

        let stored = self.session.store_mask(mask);
        notify(
            &mut self.observers,
            &SessionEvent::AnnotationAdded {
                object_id,
                frame_index,
                mask: stored,
            },
        );
        Ok(stored)
    }

    /// Remove the latest point of the current object on the current frame.
    ///
    /// Remaining points are re-sent to the backend. If none remain the mask
    /// for that pair is deleted, or replaced by the propagated mask the first
    /// point had covered.
    pub fn undo_last_point(&mut self) -> Result<UndoOutcome<'_>> {
        let object_id = self
            .session
            .current_object_id()
            .ok_or(AnnotationError::NoObjectSelected)?;
        let frame_index = self.session.current_frame();

        let mut remaining = self.session.points_for(object_id, frame_index);
        if remaining.pop().is_none() {
            return Err(AnnotationError::NothingToUndo {
                object_id,
                frame_index,
            });
        }

        let recomputed = if remaining.is_empty() {
            None
        } else {
            Some(self.service.apply_points(object_id, frame_index, &remaining)?)
        };

        let removed = self
            .session
            .remove_last_point_for(object_id, frame_index)
            .ok_or(AnnotationError::NothingToUndo {
                object_id,
                frame_index,
            })?;
        self.session.mark_needs_propagation();
        tracing::debug!(
            "Undid {} point for object {} at ({}, {}) on frame {}",
            removed.label.as_str(),
            object_id,
            removed.x,
            removed.y,
            frame_index
        );

        match recomputed {
            Some(mask) => {
                let stored = self.session.store_mask(mask);
                notify(
                    &mut self.observers,
                    &SessionEvent::AnnotationAdded {
                        object_id,
                        frame_index,
                        mask: stored,
                    },
                );
                Ok(UndoOutcome::Updated { removed, mask: stored })
            }
            None => {
                let key = MaskKey::new(object_id, frame_index);
                self.session.remove_mask(key);
                match self.session.restore_displaced(key) {
                    Some(mask) => {
                        notify(
                            &mut self.observers,
                            &SessionEvent::AnnotationAdded {
                                object_id,
                                frame_index,
                                mask,
                            },
                        );
                        Ok(UndoOutcome::Restored { removed, mask })
                    }
                    None => {
                        notify(
                            &mut self.observers,
                            &SessionEvent::AnnotationRemoved {
                                object_id,
                                frame_index,
                            },
                        );
                        Ok(UndoOutcome::Removed { removed })
                    }
                }
            }
        }
    }

    /// Navigate to another frame, propagating first if prompts changed.
    ///
    /// The target is clamped to the video's frame range. Staying on the same
    /// frame is not a transition and never propagates. A failed propagation
    /// does not block navigation.
    pub fn on_frame_change(&mut self, new_frame_index: usize) -> FrameChange {
        let from = self.session.current_frame();
        let to = self.session.video().clamp_frame(new_frame_index);

        if to == from {
            return FrameChange {
                from,
                to,
                propagation: PropagationOutcome::NotNeeded,
            };
        }

        let propagation = if self.session.needs_propagation() {
            match self.run_propagation() {
                Ok(masks_merged) => PropagationOutcome::Completed { masks_merged },
                Err(err) => PropagationOutcome::Failed(err),
            }
        } else {
            PropagationOutcome::NotNeeded
        };

        self.session.set_current_frame(to);
        notify(&mut self.observers, &SessionEvent::FrameChanged { from, to });

        FrameChange { from, to, propagation }
    }

    pub fn next_frame(&mut self) -> FrameChange {
        let current = self.session.current_frame();
        self.on_frame_change(current.saturating_add(1))
    }

    pub fn previous_frame(&mut self) -> FrameChange {
        let current = self.session.current_frame();
        self.on_frame_change(current.saturating_sub(1))
    }

    /// Propagate now, even if no prompt changed since the last run
    pub fn propagate_now(&mut self) -> Result<usize> {
        self.run_propagation()
    }

    fn run_propagation(&mut self) -> Result<usize> {
        let points_by_key = self.session.points_by_key();
        tracing::info!("Propagating annotations through video...");

        let masks = match self.service.propagate(&points_by_key) {
            Ok(masks) => masks,
            Err(err) => {
                tracing::warn!("{}", err);
                notify(&mut self.observers, &SessionEvent::PropagationFailed(&err));
                return Err(err);
            }
        };

        // Propagated masks from earlier runs that this run no longer produces
        // belong to retracted prompts
        let produced: BTreeSet<MaskKey> = masks.iter().map(Mask::key).collect();
        let stale = self.session.retain_propagated(|key| produced.contains(key));
        if !stale.is_empty() {
            tracing::debug!("Dropped {} stale propagated mask(s)", stale.len());
        }
        for key in stale {
            notify(
                &mut self.observers,
                &SessionEvent::AnnotationRemoved {
                    object_id: key.object_id,
                    frame_index: key.frame_index,
                },
            );
        }

        let mut merged = 0;
        for mask in masks {
            // Masks the user prompted on this exact frame win over propagation
            if points_by_key.contains_key(&mask.key()) {
                self.session.displace_mask(mask);
                continue;
            }
            self.session.insert_mask(mask);
            merged += 1;
        }

        self.session.mark_propagated();
        tracing::info!("Video propagation complete: {} mask(s) merged", merged);
        notify(
            &mut self.observers,
            &SessionEvent::PropagationCompleted { masks_merged: merged },
        );
        Ok(merged)
    }

    fn check_frame(&self, frame_index: usize) -> Result<()> {
        let total_frames = self.session.video().total_frames;
        if total_frames > 0 && frame_index >= total_frames {
            return Err(AnnotationError::FrameOutOfRange {
                frame_index,
                total_frames,
            });
        }
        Ok(())
    }
}
