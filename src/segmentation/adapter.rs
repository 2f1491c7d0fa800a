use super::types::{PointPrompt, SegmentationBackend};
use crate::error::{AnnotationError, Result};
use crate::model::{Mask, MaskKey, MaskSource, ObjectId, Point};
use anyhow::anyhow;
use std::collections::{BTreeMap, BTreeSet};

/// Wraps a segmentation backend and translates session prompts into calls.
///
/// The backend only knows the extracted frames, numbered from zero at the
/// session's start frame; this adapter converts between that numbering and
/// absolute video frame indices in both directions.
pub struct AnnotationService {
    backend: Box<dyn SegmentationBackend>,
    start_frame: usize,
    mask_threshold: f32,
}

impl AnnotationService {
    pub fn new(backend: Box<dyn SegmentationBackend>, start_frame: usize, mask_threshold: f32) -> Self {
        Self {
            backend,
            start_frame,
            mask_threshold,
        }
    }

    fn relative_frame(&self, frame_index: usize) -> Result<usize> {
        frame_index
            .checked_sub(self.start_frame)
            .ok_or(AnnotationError::FrameBeforeStart {
                frame_index,
                start_frame: self.start_frame,
            })
    }

    /// Prompt the backend with every point for one object on one frame and
    /// return that object's mask.
    ///
    /// `points` must be non-empty and all belong to (`object_id`,
    /// `frame_index`). The returned mask is the one the backend labelled with
    /// `object_id`; masks for other objects in the response are ignored.
    pub fn apply_points(&mut self, object_id: ObjectId, frame_index: usize, points: &[Point]) -> Result<Mask> {
        if points.is_empty() {
            return Err(AnnotationError::EmptyPrompt {
                object_id,
                frame_index,
            });
        }
        debug_assert!(points.iter().all(|p| p.belongs_to(object_id, frame_index)));

        let relative = self.relative_frame(frame_index)?;
        let prompts: Vec<PointPrompt> = points
            .iter()
            .map(|p| PointPrompt {
                x: p.x,
                y: p.y,
                label: p.label,
            })
            .collect();

        let mut response = {
            let _span = tracing::debug_span!("apply_points", object_id, frame_index).entered();
            tracing::debug!("Prompting backend with {} point(s)", prompts.len());
            self.backend
                .add_points(relative, object_id, &prompts)
                .map_err(AnnotationError::Backend)?
        };

        let returned = response.object_ids.clone();
        let logits = response
            .take_for(object_id)
            .ok_or(AnnotationError::Consistency {
                requested: object_id,
                frame_index,
                returned,
            })?;

        let mask = Mask::from_logits(
            object_id,
            frame_index,
            &logits,
            self.mask_threshold,
            MaskSource::Interactive,
        );
        tracing::debug!(
            "Backend mask for object {} on frame {}: {} foreground pixels",
            object_id,
            frame_index,
            mask.area()
        );

        Ok(mask)
    }

    /// Run propagation across the whole video.
    ///
    /// `points_by_key` is the session's current prompt state; only objects
    /// that have prompts are kept from the backend's output. Frame indices
    /// in the result are absolute.
    pub fn propagate(&mut self, points_by_key: &BTreeMap<MaskKey, Vec<Point>>) -> Result<Vec<Mask>> {
        let tracked: BTreeSet<ObjectId> = points_by_key.keys().map(|key| key.object_id).collect();

        let frames = {
            let _span = tracing::debug_span!("propagate").entered();
            tracing::debug!(
                "Propagating {} object(s) from {} prompted frame(s)",
                tracked.len(),
                points_by_key.len()
            );
            self.backend.propagate().map_err(AnnotationError::Propagation)?
        };

        let mut masks = Vec::new();
        for frame in frames {
            if frame.object_ids.len() != frame.masks.len() {
                return Err(AnnotationError::Propagation(anyhow!(
                    "frame {} returned {} object id(s) but {} mask(s)",
                    frame.frame_index,
                    frame.object_ids.len(),
                    frame.masks.len()
                )));
            }

            let frame_index = self.start_frame + frame.frame_index;
            for (object_id, logits) in frame.object_ids.into_iter().zip(frame.masks) {
                if !tracked.contains(&object_id) {
                    tracing::warn!(
                        "Dropping propagated mask for untracked object {} on frame {}",
                        object_id,
                        frame_index
                    );
                    continue;
                }
                masks.push(Mask::from_logits(
                    object_id,
                    frame_index,
                    &logits,
                    self.mask_threshold,
                    MaskSource::Propagated,
                ));
            }
        }

        Ok(masks)
    }

    pub fn reset(&mut self) {
        self.backend.reset_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PointLabel;
    use crate::segmentation::testing::{logits_with_value, RecordingBackend};
    use crate::segmentation::{BackendMasks, FrameMasks};

    fn point(object_id: ObjectId, frame_index: usize, x: f32) -> Point {
        Point::new(x, 10.0, PointLabel::Positive, object_id, frame_index)
    }

    #[test]
    fn test_apply_points_sends_full_prompt_list() {
        let backend = RecordingBackend::new(4, 4);
        let log = backend.log();
        let mut service = AnnotationService::new(Box::new(backend), 0, 0.0);

        let points = vec![point(1, 2, 1.0), point(1, 2, 2.0), point(1, 2, 3.0)];
        service.apply_points(1, 2, &points).unwrap();

        let calls = log.borrow();
        assert_eq!(calls.add_points.len(), 1);
        let xs: Vec<f32> = calls.add_points[0].prompts.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_apply_points_selects_mask_by_id_not_position() {
        let mut backend = RecordingBackend::new(2, 2);
        backend.respond_with(BackendMasks {
            object_ids: vec![1, 2],
            masks: vec![logits_with_value(2, 2, -1.0), logits_with_value(2, 2, 1.0)],
        });
        let mut service = AnnotationService::new(Box::new(backend), 0, 0.0);

        let mask = service.apply_points(2, 0, &[point(2, 0, 1.0)]).unwrap();
        assert_eq!(mask.object_id, 2);
        assert_eq!(mask.area(), 4);
    }

    #[test]
    fn test_apply_points_fails_when_object_missing_from_response() {
        let mut backend = RecordingBackend::new(2, 2);
        backend.respond_with(BackendMasks {
            object_ids: vec![1],
            masks: vec![logits_with_value(2, 2, 1.0)],
        });
        let mut service = AnnotationService::new(Box::new(backend), 0, 0.0);

        let err = service.apply_points(3, 0, &[point(3, 0, 1.0)]).unwrap_err();
        assert!(matches!(
            err,
            AnnotationError::Consistency { requested: 3, ref returned, .. } if returned == &vec![1]
        ));
    }

    #[test]
    fn test_apply_points_uses_relative_frames() {
        let backend = RecordingBackend::new(2, 2);
        let log = backend.log();
        let mut service = AnnotationService::new(Box::new(backend), 100, 0.0);

        let mask = service.apply_points(1, 105, &[point(1, 105, 1.0)]).unwrap();
        assert_eq!(mask.frame_index, 105);
        assert_eq!(log.borrow().add_points[0].frame_index, 5);

        let err = service.apply_points(1, 99, &[point(1, 99, 1.0)]).unwrap_err();
        assert!(matches!(err, AnnotationError::FrameBeforeStart { frame_index: 99, start_frame: 100 }));
    }

    #[test]
    fn test_apply_points_rejects_empty_prompt() {
        let mut service = AnnotationService::new(Box::new(RecordingBackend::new(2, 2)), 0, 0.0);
        assert!(matches!(
            service.apply_points(1, 0, &[]),
            Err(AnnotationError::EmptyPrompt { object_id: 1, frame_index: 0 })
        ));
    }

    #[test]
    fn test_propagate_maps_frames_and_drops_untracked_objects() {
        let mut backend = RecordingBackend::new(2, 2);
        backend.propagate_with(vec![
            FrameMasks {
                frame_index: 0,
                object_ids: vec![1, 9],
                masks: vec![logits_with_value(2, 2, 1.0), logits_with_value(2, 2, 1.0)],
            },
            FrameMasks {
                frame_index: 1,
                object_ids: vec![1],
                masks: vec![logits_with_value(2, 2, 1.0)],
            },
        ]);
        let mut service = AnnotationService::new(Box::new(backend), 10, 0.0);

        let mut prompts = BTreeMap::new();
        prompts.insert(MaskKey::new(1, 10), vec![point(1, 10, 1.0)]);

        let masks = service.propagate(&prompts).unwrap();
        let keys: Vec<MaskKey> = masks.iter().map(Mask::key).collect();
        assert_eq!(keys, vec![MaskKey::new(1, 10), MaskKey::new(1, 11)]);
        assert!(masks.iter().all(|m| m.source == MaskSource::Propagated));
    }

    #[test]
    fn test_propagate_reports_backend_failure() {
        let mut backend = RecordingBackend::new(2, 2);
        backend.fail_propagation(true);
        let mut service = AnnotationService::new(Box::new(backend), 0, 0.0);

        let err = service.propagate(&BTreeMap::new()).unwrap_err();
        assert!(matches!(err, AnnotationError::Propagation(_)));
    }
}
