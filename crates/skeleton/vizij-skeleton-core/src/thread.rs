//! Playback cursor over one sequence.

use serde::{Deserialize, Serialize};

use crate::ids::ThreadId;
use crate::node_set::NodeSet;
use crate::sequence::Sequence;

/// Cross-fade bookkeeping for a thread that switched sequences.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransitionData {
    pub in_transition: bool,
    /// Blend factor, 0 = reference pose, 1 = new pose.
    pub pos: f32,
    /// Seconds for `pos` to go from 0 to 1.
    pub duration: f32,
    /// Keep advancing the new sequence while fading in.
    pub continue_play: bool,
    /// Playback multiplier for the new sequence until the fade ends.
    pub target_scale: f32,
    /// Channels the thread controlled before the switch.
    pub old_rotation_nodes: NodeSet,
    pub old_translation_nodes: NodeSet,
    pub old_scale_nodes: NodeSet,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    /// Index into `Shape::sequences`.
    pub sequence: usize,
    pub priority: i32,
    pub blend: bool,
    pub key_num1: usize,
    pub key_num2: usize,
    /// Fraction between `key_num1` and `key_num2`.
    pub key_pos: f32,
    /// Normalized playback position in `[0, 1]`.
    pub pos: f32,
    pub time_scale: f32,
    pub blend_disabled: bool,
    pub transition: TransitionData,
}

impl Thread {
    pub fn new(id: ThreadId, sequence_index: usize, sequence: &Sequence) -> Self {
        let mut th = Self {
            id,
            sequence: sequence_index,
            priority: sequence.priority,
            blend: sequence.blend,
            key_num1: 0,
            key_num2: 0,
            key_pos: 0.0,
            pos: 0.0,
            time_scale: 1.0,
            blend_disabled: false,
            transition: TransitionData::default(),
        };
        th.select_keyframes(sequence);
        th
    }

    /// Point the thread at another sequence without a cross-fade.
    pub fn set_sequence(&mut self, sequence_index: usize, sequence: &Sequence, pos: f32) {
        self.sequence = sequence_index;
        self.priority = sequence.priority;
        self.blend = sequence.blend;
        self.set_pos(pos, sequence);
    }

    pub fn set_pos(&mut self, pos: f32, sequence: &Sequence) {
        self.pos = wrap_or_clamp(pos, sequence.cyclic);
        self.select_keyframes(sequence);
    }

    /// Pick the keyframe pair around `pos`.
    ///
    /// Cyclic sequences treat the last key as leading back into key 0; others
    /// stretch `pos` over `num_keyframes - 1` intervals.
    pub fn select_keyframes(&mut self, sequence: &Sequence) {
        let n = sequence.num_keyframes;
        if n <= 1 {
            self.key_num1 = 0;
            self.key_num2 = 0;
            self.key_pos = 0.0;
            return;
        }
        if sequence.cyclic {
            let kpos = self.pos * n as f32;
            let k1 = (kpos.floor() as usize).min(n - 1);
            self.key_num1 = k1;
            self.key_num2 = if k1 + 1 >= n { 0 } else { k1 + 1 };
            self.key_pos = (kpos - k1 as f32).clamp(0.0, 1.0);
        } else {
            let kpos = self.pos * (n - 1) as f32;
            let k1 = (kpos.floor() as usize).min(n - 1);
            self.key_num1 = k1;
            self.key_num2 = (k1 + 1).min(n - 1);
            self.key_pos = if self.key_num1 == self.key_num2 {
                0.0
            } else {
                (kpos - k1 as f32).clamp(0.0, 1.0)
            };
        }
    }

    /// Move the playback cursor by `dt` seconds scaled by `time_scale`.
    pub fn advance(&mut self, dt: f32, sequence: &Sequence) {
        if self.time_scale == 0.0 || dt == 0.0 {
            return;
        }
        let delta = dt * self.time_scale / sequence.duration;
        self.pos = wrap_or_clamp(self.pos + delta, sequence.cyclic);
        self.select_keyframes(sequence);
    }

    /// Returns true when the cross-fade completed during this step.
    pub fn advance_transition(&mut self, dt: f32) -> bool {
        if !self.transition.in_transition {
            return false;
        }
        if self.transition.duration <= 0.0 {
            self.transition.pos = 1.0;
        } else {
            self.transition.pos += dt / self.transition.duration;
        }
        if self.transition.pos >= 1.0 {
            self.transition.pos = 1.0;
            self.transition.in_transition = false;
            return true;
        }
        false
    }

    /// Multiplier on `dt` for the playback cursor: `target_scale` while fading, 1 otherwise.
    #[inline]
    pub fn playback_scale(&self) -> f32 {
        if self.transition.in_transition {
            self.transition.target_scale
        } else {
            1.0
        }
    }
}

fn wrap_or_clamp(pos: f32, cyclic: bool) -> f32 {
    if cyclic {
        let p = pos.rem_euclid(1.0);
        // rem_euclid can round up to exactly 1.0 for tiny negative inputs
        if p >= 1.0 {
            0.0
        } else {
            p
        }
    } else {
        pos.clamp(0.0, 1.0)
    }
}
