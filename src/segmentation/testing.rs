//! Scriptable backend that records every call, for tests.

use super::types::{BackendMasks, FrameMasks, MaskLogits, PointPrompt, SegmentationBackend};
use crate::model::{ObjectId, PointLabel};
use anyhow::{bail, Result};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct AddPointsCall {
    pub frame_index: usize,
    pub object_id: ObjectId,
    pub prompts: Vec<PointPrompt>,
}

#[derive(Debug, Default)]
pub struct CallLog {
    pub add_points: Vec<AddPointsCall>,
    pub propagate_calls: usize,
    pub resets: usize,
}

pub fn logits_with_value(width: usize, height: usize, value: f32) -> MaskLogits {
    MaskLogits::from_elem((height, width), value)
}

/// Unscripted calls answer like a stateful tracker: every object prompted on
/// the frame so far is returned, and the prompted object's mask has one
/// foreground pixel per positive prompt (row-major from the top-left).
pub struct RecordingBackend {
    width: usize,
    height: usize,
    log: Rc<RefCell<CallLog>>,
    scripted: VecDeque<BackendMasks>,
    tracked: BTreeMap<usize, BTreeMap<ObjectId, MaskLogits>>,
    propagation: Vec<FrameMasks>,
    fail_add_points: bool,
    fail_propagation: bool,
}

impl RecordingBackend {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            log: Rc::new(RefCell::new(CallLog::default())),
            scripted: VecDeque::new(),
            tracked: BTreeMap::new(),
            propagation: Vec::new(),
            fail_add_points: false,
            fail_propagation: false,
        }
    }

    pub fn log(&self) -> Rc<RefCell<CallLog>> {
        Rc::clone(&self.log)
    }

    /// Queue a response for the next `add_points` call
    pub fn respond_with(&mut self, masks: BackendMasks) {
        self.scripted.push_back(masks);
    }

    pub fn propagate_with(&mut self, frames: Vec<FrameMasks>) {
        self.propagation = frames;
    }

    pub fn fail_add_points(&mut self, fail: bool) {
        self.fail_add_points = fail;
    }

    pub fn fail_propagation(&mut self, fail: bool) {
        self.fail_propagation = fail;
    }

    fn mask_for(&self, prompts: &[PointPrompt]) -> MaskLogits {
        let positives = prompts
            .iter()
            .filter(|p| p.label == PointLabel::Positive)
            .count();
        let mut logits = logits_with_value(self.width, self.height, -1.0);
        for (i, value) in logits.iter_mut().enumerate() {
            if i < positives {
                *value = 1.0;
            }
        }
        logits
    }
}

impl SegmentationBackend for RecordingBackend {
    fn add_points(
        &mut self,
        frame_index: usize,
        object_id: ObjectId,
        prompts: &[PointPrompt],
    ) -> Result<BackendMasks> {
        self.log.borrow_mut().add_points.push(AddPointsCall {
            frame_index,
            object_id,
            prompts: prompts.to_vec(),
        });

        if self.fail_add_points {
            bail!("backend unavailable");
        }
        if let Some(scripted) = self.scripted.pop_front() {
            return Ok(scripted);
        }

        let mask = self.mask_for(prompts);
        let frame = self.tracked.entry(frame_index).or_default();
        frame.insert(object_id, mask);

        Ok(BackendMasks {
            object_ids: frame.keys().copied().collect(),
            masks: frame.values().cloned().collect(),
        })
    }

    fn propagate(&mut self) -> Result<Vec<FrameMasks>> {
        self.log.borrow_mut().propagate_calls += 1;
        if self.fail_propagation {
            bail!("propagation crashed");
        }
        Ok(self.propagation.clone())
    }

    fn reset_state(&mut self) {
        self.log.borrow_mut().resets += 1;
        self.tracked.clear();
    }
}
