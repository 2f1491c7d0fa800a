use super::coco::{AnnotationEntry, CategoryEntry, Dataset, ImageEntry};
use super::rle::encode_rle;
use crate::config::SessionConfig;
use crate::error::{AnnotationError, Result};
use crate::model::{AnnotationSession, Mask};
use crate::video::{FrameFile, FrameLookup};
use serde_json::Map;
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// Builds a dataset one mask at a time.
///
/// Images are keyed by file name and categories by object name, so however
/// many masks reference a frame or an object name, each appears once.
pub struct ExportAssembler {
    dataset: Dataset,
    supercategory: String,
    image_ids: HashMap<String, u64>,
    category_ids: HashMap<String, u64>,
}

impl ExportAssembler {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            dataset: Dataset::new(config.dataset_name.clone()),
            supercategory: config.supercategory.clone(),
            image_ids: HashMap::new(),
            category_ids: HashMap::new(),
        }
    }

    /// Id of the image entry for `frame`, creating it on first use
    pub fn image_id(&mut self, frame: &FrameFile) -> u64 {
        if let Some(&id) = self.image_ids.get(&frame.file_name) {
            return id;
        }
        let id = self.dataset.images.len() as u64 + 1;
        self.dataset.images.push(ImageEntry {
            id,
            file_name: frame.file_name.clone(),
            width: frame.width,
            height: frame.height,
            extra: Map::new(),
        });
        self.image_ids.insert(frame.file_name.clone(), id);
        id
    }

    /// Id of the category named `name`, creating it on first use
    pub fn category_id(&mut self, name: &str) -> u64 {
        if let Some(&id) = self.category_ids.get(name) {
            return id;
        }
        let id = self.dataset.categories.len() as u64 + 1;
        self.dataset.categories.push(CategoryEntry {
            id,
            name: name.to_string(),
            supercategory: self.supercategory.clone(),
        });
        self.category_ids.insert(name.to_string(), id);
        id
    }

    /// Append one annotation for `mask`, returning its id.
    ///
    /// Returns `None` without touching the dataset when the bitmap size
    /// differs from the frame's.
    pub fn add_mask(&mut self, mask: &Mask, frame: &FrameFile, category_name: &str) -> Option<u64> {
        let (width, height) = mask.dimensions();
        if (width, height) != (frame.width, frame.height) {
            tracing::warn!(
                "Mask of object {} is {}x{} but {} is {}x{}; skipping",
                mask.object_id,
                width,
                height,
                frame.file_name,
                frame.width,
                frame.height
            );
            return None;
        }

        let image_id = self.image_id(frame);
        let category_id = self.category_id(category_name);
        let bbox = mask.bounding_box();

        let id = self.dataset.annotations.len() as u64 + 1;
        self.dataset.annotations.push(AnnotationEntry {
            id,
            image_id,
            category_id,
            bbox: [
                bbox.x as f64,
                bbox.y as f64,
                bbox.width as f64,
                bbox.height as f64,
            ],
            area: mask.area() as f64,
            segmentation: Some(encode_rle(&mask.bitmap)),
            iscrowd: 0,
            extra: Map::new(),
        });
        Some(id)
    }

    pub fn finish(self) -> Dataset {
        self.dataset
    }
}

/// Export every stored mask of the session
pub fn export(session: &AnnotationSession, frames: &dyn FrameLookup, config: &SessionConfig) -> Result<Dataset> {
    assemble(session, frames, config, |_| true)
}

/// Export only masks whose frame lies in `range` (absolute frame indices)
pub fn export_range(
    session: &AnnotationSession,
    frames: &dyn FrameLookup,
    config: &SessionConfig,
    range: RangeInclusive<usize>,
) -> Result<Dataset> {
    assemble(session, frames, config, |frame_index| range.contains(&frame_index))
}

fn assemble<F>(
    session: &AnnotationSession,
    frames: &dyn FrameLookup,
    config: &SessionConfig,
    include: F,
) -> Result<Dataset>
where
    F: Fn(usize) -> bool,
{
    let mut masks: Vec<&Mask> = session
        .masks()
        .filter(|mask| include(mask.frame_index))
        .collect();
    if masks.is_empty() {
        return Err(AnnotationError::EmptySession);
    }
    masks.sort_by_key(|mask| (mask.frame_index, mask.object_id));

    let mut assembler = ExportAssembler::new(config);
    // Every defined object gets a category, annotated or not
    for object in session.objects() {
        assembler.category_id(&object.name);
    }

    let mut skipped = 0;
    for mask in masks {
        let Some(frame) = frames.frame_file(mask.frame_index) else {
            skipped += 1;
            tracing::warn!(
                "No frame file for frame {}; skipping mask of object {}",
                mask.frame_index,
                mask.object_id
            );
            continue;
        };
        let name = session
            .object(mask.object_id)
            .map(|object| object.name.as_str())
            .unwrap_or("unknown");
        if assembler.add_mask(mask, &frame, name).is_none() {
            skipped += 1;
        }
    }

    let dataset = assembler.finish();
    tracing::info!(
        "Assembled dataset: {} images, {} annotations, {} categories ({} masks skipped)",
        dataset.images.len(),
        dataset.annotations.len(),
        dataset.categories.len(),
        skipped
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MaskSource, VideoInfo, DEFAULT_PALETTE};
    use crate::video::ExtractedFrames;
    use ndarray::Array2;

    fn square_mask(object_id: u32, frame_index: usize) -> Mask {
        let mut bitmap = Array2::from_elem((6, 8), false);
        for row in 1..3 {
            for col in 2..5 {
                bitmap[[row, col]] = true;
            }
        }
        Mask::new(object_id, frame_index, bitmap, MaskSource::Interactive)
    }

    fn session_with_objects(names: &[&str]) -> AnnotationSession {
        let mut session = AnnotationSession::new(VideoInfo::new("clip.mp4", 8, 6, 30.0, 10), 0);
        for name in names {
            session.add_object(name, &DEFAULT_PALETTE).unwrap();
        }
        session
    }

    #[test]
    fn test_shared_frames_produce_one_image_each() {
        let mut session = session_with_objects(&["car", "person"]);
        for object_id in [1, 2] {
            for frame_index in [0, 1] {
                session.insert_mask(square_mask(object_id, frame_index));
            }
        }
        let frames = ExtractedFrames::numbered(0, 10, 8, 6);

        let dataset = export(&session, &frames, &SessionConfig::default()).unwrap();

        assert_eq!(dataset.images.len(), 2);
        assert_eq!(dataset.categories.len(), 2);
        assert_eq!(dataset.annotations.len(), 4);

        for annotation in &dataset.annotations {
            assert!(dataset.images.iter().any(|i| i.id == annotation.image_id));
            assert!(dataset.categories.iter().any(|c| c.id == annotation.category_id));
        }
        let per_image: Vec<usize> = dataset
            .images
            .iter()
            .map(|image| {
                dataset
                    .annotations
                    .iter()
                    .filter(|a| a.image_id == image.id)
                    .count()
            })
            .collect();
        assert_eq!(per_image, vec![2, 2]);
        assert_eq!(
            dataset.annotations_per_category(),
            vec![("car".to_string(), 2), ("person".to_string(), 2)]
        );
    }

    #[test]
    fn test_annotation_geometry_comes_from_bitmap() {
        let mut session = session_with_objects(&["car"]);
        session.insert_mask(square_mask(1, 3));
        let frames = ExtractedFrames::numbered(0, 10, 8, 6);

        let dataset = export(&session, &frames, &SessionConfig::default()).unwrap();
        let annotation = &dataset.annotations[0];
        assert_eq!(annotation.bbox, [2.0, 1.0, 3.0, 2.0]);
        assert_eq!(annotation.area, 6.0);
        assert!(annotation.segmentation.is_some());
        assert_eq!(dataset.images[0].file_name, "00003.jpg");
        assert_eq!(dataset.categories[0].supercategory, "object");
    }

    #[test]
    fn test_category_ids_are_stable_per_name() {
        let config = SessionConfig::default();
        let mut assembler = ExportAssembler::new(&config);
        let person = assembler.category_id("person");
        let car = assembler.category_id("car");
        assert_eq!(assembler.category_id("person"), person);
        assert_eq!(assembler.category_id("car"), car);
        assert_ne!(person, car);

        let frame = FrameFile {
            file_name: "00000.jpg".to_string(),
            width: 8,
            height: 6,
        };
        let first = assembler.image_id(&frame);
        assert_eq!(assembler.image_id(&frame), first);

        let large = FrameFile {
            file_name: "00001.jpg".to_string(),
            width: 16,
            height: 12,
        };
        assert_eq!(assembler.add_mask(&square_mask(1, 1), &large, "car"), None);
        assert_eq!(assembler.add_mask(&square_mask(1, 0), &frame, "car"), Some(1));

        let dataset = assembler.finish();
        assert_eq!(dataset.images.len(), 1);
        assert_eq!(dataset.annotations.len(), 1);
    }

    #[test]
    fn test_unannotated_objects_still_get_categories() {
        let mut session = session_with_objects(&["car", "person"]);
        session.insert_mask(square_mask(2, 0));
        let frames = ExtractedFrames::numbered(0, 10, 8, 6);

        let dataset = export(&session, &frames, &SessionConfig::default()).unwrap();
        assert_eq!(dataset.categories.len(), 2);
        assert_eq!(dataset.annotations.len(), 1);
        assert_eq!(dataset.category_name(dataset.annotations[0].category_id), Some("person"));
    }

    #[test]
    fn test_empty_session_is_rejected() {
        let session = session_with_objects(&["car"]);
        let frames = ExtractedFrames::numbered(0, 10, 8, 6);
        assert!(matches!(
            export(&session, &frames, &SessionConfig::default()),
            Err(AnnotationError::EmptySession)
        ));
    }

    #[test]
    fn test_masks_without_frame_file_are_skipped() {
        let mut session = session_with_objects(&["car"]);
        session.insert_mask(square_mask(1, 0));
        session.insert_mask(square_mask(1, 9));
        let frames = ExtractedFrames::numbered(0, 5, 8, 6);

        let dataset = export(&session, &frames, &SessionConfig::default()).unwrap();
        assert_eq!(dataset.annotations.len(), 1);
        assert_eq!(dataset.images.len(), 1);
    }

    #[test]
    fn test_masks_not_matching_frame_size_are_skipped() {
        let mut session = session_with_objects(&["car"]);
        session.insert_mask(square_mask(1, 0));
        let frames = ExtractedFrames::numbered(0, 10, 16, 12);

        let dataset = export(&session, &frames, &SessionConfig::default()).unwrap();
        assert!(dataset.annotations.is_empty());
        assert!(dataset.images.is_empty());
        assert_eq!(dataset.categories.len(), 1);
    }

    #[test]
    fn test_export_range_limits_frames() {
        let mut session = session_with_objects(&["car"]);
        for frame_index in 0..6 {
            session.insert_mask(square_mask(1, frame_index));
        }
        let frames = ExtractedFrames::numbered(0, 10, 8, 6);
        let config = SessionConfig::default();

        let dataset = export_range(&session, &frames, &config, 0..=2).unwrap();
        assert_eq!(dataset.images.len(), 3);
        assert!(matches!(
            export_range(&session, &frames, &config, 7..=9),
            Err(AnnotationError::EmptySession)
        ));
    }
}
