use super::{Color, Mask, MaskKey, MaskSource, ObjectDefinition, ObjectId, Point};
use crate::error::{AnnotationError, Result};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Video metadata and properties
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoInfo {
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
}

impl VideoInfo {
    pub fn new(path: impl Into<String>, width: u32, height: u32, fps: f64, total_frames: usize) -> Self {
        Self {
            path: path.into(),
            width,
            height,
            fps,
            total_frames,
        }
    }

    /// Duration in seconds, zero when the frame rate is unknown
    pub fn duration(&self) -> f64 {
        if self.fps > 0.0 {
            self.total_frames as f64 / self.fps
        } else {
            0.0
        }
    }

    pub fn resolution_string(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Clamp a requested frame index into the video's range; an unknown
    /// frame count leaves the index untouched
    pub fn clamp_frame(&self, frame_index: usize) -> usize {
        if self.total_frames == 0 {
            return frame_index;
        }
        frame_index.min(self.total_frames - 1)
    }
}

/// All objects, prompts and masks for one annotation pass over a video.
///
/// Mutations here only enforce the data invariants (unique names, points
/// attributed to known objects, one mask per object/frame). Coordination
/// with the segmentation backend lives in [`crate::engine::SessionEngine`].
#[derive(Debug, Clone)]
pub struct AnnotationSession {
    video: VideoInfo,
    start_frame: usize,
    current_frame: usize,
    objects: BTreeMap<ObjectId, ObjectDefinition>,
    current_object_id: Option<ObjectId>,
    next_object_id: ObjectId,
    points: Vec<Point>,
    masks: BTreeMap<MaskKey, Mask>,
    /// Propagated masks covered by an interactive one on the same pair
    displaced: BTreeMap<MaskKey, Mask>,
    needs_propagation: bool,
}

impl AnnotationSession {
    /// `start_frame` is the first frame handed to the backend; frames before
    /// it cannot be annotated.
    pub fn new(video: VideoInfo, start_frame: usize) -> Self {
        Self {
            video,
            start_frame,
            current_frame: start_frame,
            objects: BTreeMap::new(),
            current_object_id: None,
            next_object_id: 1,
            points: Vec::new(),
            masks: BTreeMap::new(),
            displaced: BTreeMap::new(),
            needs_propagation: false,
        }
    }

    pub fn video(&self) -> &VideoInfo {
        &self.video
    }

    pub fn start_frame(&self) -> usize {
        self.start_frame
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub(crate) fn set_current_frame(&mut self, frame_index: usize) {
        self.current_frame = frame_index;
    }

    // Objects

    /// Register a new object. The name is trimmed; it must be non-empty and
    /// not already used (exact, case-sensitive match).
    ///
    /// The first object ever added becomes the current object.
    pub fn add_object(&mut self, name: &str, palette: &[Color]) -> Result<&ObjectDefinition> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AnnotationError::InvalidName);
        }
        if self.objects.values().any(|obj| obj.name == name) {
            return Err(AnnotationError::DuplicateName(name.to_string()));
        }

        let id = self.next_object_id;
        self.next_object_id += 1;

        let definition = ObjectDefinition {
            id,
            name: name.to_string(),
            color: Color::for_object(id, palette),
        };

        if self.current_object_id.is_none() {
            self.current_object_id = Some(id);
        }

        Ok(&*self.objects.entry(id).or_insert(definition))
    }

    pub fn objects(&self) -> impl Iterator<Item = &ObjectDefinition> {
        self.objects.values()
    }

    pub fn object(&self, object_id: ObjectId) -> Option<&ObjectDefinition> {
        self.objects.get(&object_id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn current_object_id(&self) -> Option<ObjectId> {
        self.current_object_id
    }

    pub fn current_object(&self) -> Option<&ObjectDefinition> {
        self.current_object_id.and_then(|id| self.objects.get(&id))
    }

    pub fn set_current_object(&mut self, object_id: ObjectId) -> Result<()> {
        if !self.objects.contains_key(&object_id) {
            return Err(AnnotationError::UnknownObject(object_id));
        }
        self.current_object_id = Some(object_id);
        Ok(())
    }

    // Points

    pub fn push_point(&mut self, point: Point) -> Result<()> {
        if !self.objects.contains_key(&point.object_id) {
            return Err(AnnotationError::UnknownObject(point.object_id));
        }
        self.points.push(point);
        Ok(())
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Points for one object on one frame, in insertion order
    pub fn points_for(&self, object_id: ObjectId, frame_index: usize) -> Vec<Point> {
        self.points
            .iter()
            .filter(|p| p.belongs_to(object_id, frame_index))
            .copied()
            .collect()
    }

    pub fn points_for_frame(&self, frame_index: usize) -> Vec<Point> {
        self.points
            .iter()
            .filter(|p| p.frame_index == frame_index)
            .copied()
            .collect()
    }

    /// Remove the most recently appended point for one object/frame pair
    pub fn remove_last_point_for(&mut self, object_id: ObjectId, frame_index: usize) -> Option<Point> {
        let position = self
            .points
            .iter()
            .rposition(|p| p.belongs_to(object_id, frame_index))?;
        Some(self.points.remove(position))
    }

    /// All points grouped by (object, frame), each group in insertion order
    pub fn points_by_key(&self) -> BTreeMap<MaskKey, Vec<Point>> {
        let mut grouped: BTreeMap<MaskKey, Vec<Point>> = BTreeMap::new();
        for point in &self.points {
            grouped
                .entry(MaskKey::new(point.object_id, point.frame_index))
                .or_default()
                .push(*point);
        }
        grouped
    }

    // Masks

    /// Store a mask, replacing any previous one for the same object/frame
    pub fn insert_mask(&mut self, mask: Mask) -> Option<Mask> {
        self.masks.insert(mask.key(), mask)
    }

    /// Like [`insert_mask`](Self::insert_mask) but hands back the stored mask.
    ///
    /// A propagated mask replaced here is kept aside and comes back through
    /// [`restore_displaced`](Self::restore_displaced).
    pub fn store_mask(&mut self, mask: Mask) -> &Mask {
        match self.masks.entry(mask.key()) {
            Entry::Occupied(mut slot) => {
                let previous = slot.insert(mask);
                if previous.source == MaskSource::Propagated {
                    self.displaced.insert(previous.key(), previous);
                }
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(mask),
        }
    }

    /// Put back the propagated mask an interactive one replaced, if any
    pub(crate) fn restore_displaced(&mut self, key: MaskKey) -> Option<&Mask> {
        let mask = self.displaced.remove(&key)?;
        Some(self.store_mask(mask))
    }

    /// Record a propagated result for a pair the user prompted; it stays
    /// hidden until the pair's last point is undone
    pub(crate) fn displace_mask(&mut self, mask: Mask) {
        self.displaced.insert(mask.key(), mask);
    }

    /// Drop propagated masks the latest run did not produce, visible or
    /// displaced. Returns the keys of the visible masks removed.
    pub(crate) fn retain_propagated<F>(&mut self, keep: F) -> Vec<MaskKey>
    where
        F: Fn(&MaskKey) -> bool,
    {
        let mut removed = Vec::new();
        self.masks.retain(|key, mask| {
            let stale = mask.source == MaskSource::Propagated && !keep(key);
            if stale {
                removed.push(*key);
            }
            !stale
        });
        self.displaced.retain(|key, _| keep(key));
        removed
    }

    pub fn remove_mask(&mut self, key: MaskKey) -> Option<Mask> {
        self.masks.remove(&key)
    }

    pub fn mask(&self, key: MaskKey) -> Option<&Mask> {
        self.masks.get(&key)
    }

    pub fn masks(&self) -> impl Iterator<Item = &Mask> {
        self.masks.values()
    }

    pub fn mask_count(&self) -> usize {
        self.masks.len()
    }

    pub fn masks_for_frame(&self, frame_index: usize) -> Vec<&Mask> {
        self.masks
            .values()
            .filter(|m| m.frame_index == frame_index)
            .collect()
    }

    // Propagation bookkeeping

    pub fn needs_propagation(&self) -> bool {
        self.needs_propagation
    }

    pub(crate) fn mark_needs_propagation(&mut self) {
        self.needs_propagation = true;
    }

    pub(crate) fn mark_propagated(&mut self) {
        self.needs_propagation = false;
    }

    pub fn has_annotations(&self) -> bool {
        !self.points.is_empty() || !self.masks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MaskSource, PointLabel, DEFAULT_PALETTE};
    use ndarray::Array2;

    fn session() -> AnnotationSession {
        AnnotationSession::new(VideoInfo::new("clip.mp4", 64, 48, 30.0, 120), 0)
    }

    #[test]
    fn test_add_object_allocates_monotonic_ids() {
        let mut s = session();
        let car = s.add_object("car", &DEFAULT_PALETTE).unwrap().id;
        let person = s.add_object("person", &DEFAULT_PALETTE).unwrap().id;
        assert_eq!((car, person), (1, 2));
        assert_eq!(s.current_object_id(), Some(1));
        assert_ne!(s.object(1).unwrap().color, s.object(2).unwrap().color);
    }

    #[test]
    fn test_add_object_rejects_bad_names() {
        let mut s = session();
        s.add_object("car", &DEFAULT_PALETTE).unwrap();

        assert!(matches!(
            s.add_object("   ", &DEFAULT_PALETTE),
            Err(AnnotationError::InvalidName)
        ));
        assert!(matches!(
            s.add_object("car", &DEFAULT_PALETTE),
            Err(AnnotationError::DuplicateName(name)) if name == "car"
        ));
        // Case-sensitive match: "Car" is a different object
        assert!(s.add_object("Car", &DEFAULT_PALETTE).is_ok());
        assert_eq!(s.object_count(), 2);
    }

    #[test]
    fn test_push_point_requires_known_object() {
        let mut s = session();
        let err = s
            .push_point(Point::new(1.0, 2.0, PointLabel::Positive, 7, 0))
            .unwrap_err();
        assert!(matches!(err, AnnotationError::UnknownObject(7)));
        assert!(s.points().is_empty());
    }

    #[test]
    fn test_remove_last_point_only_touches_its_pair() {
        let mut s = session();
        s.add_object("a", &DEFAULT_PALETTE).unwrap();
        s.add_object("b", &DEFAULT_PALETTE).unwrap();
        s.push_point(Point::new(1.0, 1.0, PointLabel::Positive, 1, 0)).unwrap();
        s.push_point(Point::new(2.0, 2.0, PointLabel::Negative, 1, 0)).unwrap();
        s.push_point(Point::new(3.0, 3.0, PointLabel::Positive, 2, 0)).unwrap();

        let removed = s.remove_last_point_for(1, 0).unwrap();
        assert_eq!((removed.x, removed.label), (2.0, PointLabel::Negative));
        assert_eq!(s.points_for(1, 0).len(), 1);
        assert_eq!(s.points_for(2, 0).len(), 1);
        assert!(s.remove_last_point_for(1, 5).is_none());
    }

    #[test]
    fn test_insert_mask_replaces_same_key() {
        let mut s = session();
        let bitmap = Array2::from_elem((2, 2), true);
        assert!(s
            .insert_mask(Mask::new(1, 3, bitmap.clone(), MaskSource::Propagated))
            .is_none());
        let previous = s.insert_mask(Mask::new(1, 3, bitmap, MaskSource::Interactive));
        assert_eq!(previous.map(|m| m.source), Some(MaskSource::Propagated));
        assert_eq!(s.mask_count(), 1);
    }

    #[test]
    fn test_replaced_propagated_mask_can_be_restored() {
        let mut s = session();
        let propagated = Mask::new(1, 3, Array2::from_elem((2, 2), true), MaskSource::Propagated);
        s.insert_mask(propagated.clone());
        s.store_mask(Mask::new(1, 3, Array2::from_elem((2, 2), false), MaskSource::Interactive));

        s.remove_mask(MaskKey::new(1, 3));
        assert_eq!(s.restore_displaced(MaskKey::new(1, 3)), Some(&propagated));
        assert_eq!(s.mask(MaskKey::new(1, 3)), Some(&propagated));
        assert!(s.restore_displaced(MaskKey::new(1, 3)).is_none());
    }

    #[test]
    fn test_retain_propagated_keeps_interactive_masks() {
        let mut s = session();
        let bitmap = Array2::from_elem((2, 2), true);
        s.insert_mask(Mask::new(1, 0, bitmap.clone(), MaskSource::Interactive));
        s.insert_mask(Mask::new(1, 1, bitmap.clone(), MaskSource::Propagated));
        s.insert_mask(Mask::new(2, 1, bitmap.clone(), MaskSource::Propagated));
        s.displace_mask(Mask::new(2, 4, bitmap, MaskSource::Propagated));

        let removed = s.retain_propagated(|key| key.object_id == 1);
        assert_eq!(removed, vec![MaskKey::new(2, 1)]);
        assert_eq!(s.mask_count(), 2);
        assert!(s.restore_displaced(MaskKey::new(2, 4)).is_none());
    }

    #[test]
    fn test_video_info_helpers() {
        let info = VideoInfo::new("clip.mp4", 1920, 1080, 25.0, 50);
        assert_eq!(info.resolution_string(), "1920x1080");
        assert!((info.duration() - 2.0).abs() < f64::EPSILON);
        assert_eq!(info.clamp_frame(400), 49);
        assert_eq!(VideoInfo::default().clamp_frame(3), 3);
    }
}
