//! Cross-fades between a captured reference pose and the live pose.
//!
//! When a thread switches sequence with a transition, the instance captures
//! every node's current [`LocalPose`] as the reference. Until the fade ends,
//! each node in the transition sets is blended from that reference toward
//! the freshly evaluated pose by the responsible thread's `transition.pos`.

use std::ops::Range;

use nalgebra::{Matrix4, UnitQuaternion, Vector3};

use crate::ids::ThreadId;
use crate::interp::{lerp_vec3, slerp_quat};
use crate::node_set::NodeSet;
use crate::node_state::NodeMasks;
use crate::scale::{scale_of, ScaleMode, ScaleValue};
use crate::scratch::Scratch;
use crate::shape::Shape;
use crate::thread::Thread;
use crate::transform::{compose, position, rotation_of};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Channel {
    Rotation,
    Translation,
    Scale,
}

/// Channel values behind the most recent local matrices, one entry per node.
///
/// Nodes whose matrix was written directly (hands-off, callbacks, blend
/// threads, IK) are decomposed from the matrix; every other node keeps the
/// exact values it was composed from.
#[derive(Clone, Debug, Default)]
pub struct LocalPose {
    pub rotations: Vec<UnitQuaternion<f32>>,
    pub translations: Vec<Vector3<f32>>,
    pub scales: Vec<ScaleValue>,
}

impl LocalPose {
    /// The shape's default pose with identity scale.
    pub fn from_defaults(shape: &Shape) -> Self {
        let scale = shape.scale_mode.map_or_else(ScaleValue::default, ScaleValue::identity);
        Self {
            rotations: shape.nodes.iter().map(|n| n.default_rotation).collect(),
            translations: shape.nodes.iter().map(|n| n.default_translation).collect(),
            scales: vec![scale; shape.node_count()],
        }
    }

    pub fn record_channels(&mut self, node: usize, scratch: &Scratch, scale_mode: Option<ScaleMode>) {
        self.rotations[node] = scratch.rotations[node];
        self.translations[node] = scratch.translations[node];
        self.scales[node] = match scale_mode {
            Some(_) => scratch.scales[node],
            None => ScaleValue::default(),
        };
    }

    pub fn record_matrix(&mut self, node: usize, m: &Matrix4<f32>, scale_mode: Option<ScaleMode>) {
        self.rotations[node] = rotation_of(m);
        self.translations[node] = position(m);
        self.scales[node] = scale_mode.map_or_else(ScaleValue::default, |mode| scale_of(m, mode));
    }
}

#[derive(Clone, Debug, Default)]
pub struct TransitionState {
    pub rotation_nodes: NodeSet,
    pub translation_nodes: NodeSet,
    pub scale_nodes: NodeSet,
    pub reference_rotations: Vec<UnitQuaternion<f32>>,
    pub reference_translations: Vec<Vector3<f32>>,
    pub reference_scales: Vec<ScaleValue>,
    /// Threads currently fading in, in evaluation order.
    pub threads: Vec<ThreadId>,
}

impl TransitionState {
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.threads.is_empty()
    }

    /// Record the current local pose of every node as the fade origin.
    pub fn capture_reference(&mut self, pose: &LocalPose) {
        self.reference_rotations.clone_from(&pose.rotations);
        self.reference_translations.clone_from(&pose.translations);
        self.reference_scales.clone_from(&pose.scales);
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.threads.contains(&id)
    }

    /// Recompute the transition node sets from the threads still fading,
    /// keeping `threads` in evaluation order.
    pub fn rebuild(&mut self, shape: &Shape, threads: &[Thread]) {
        self.threads = threads
            .iter()
            .filter(|t| t.transition.in_transition)
            .map(|t| t.id)
            .collect();
        self.rotation_nodes.clear_all();
        self.translation_nodes.clear_all();
        self.scale_nodes.clear_all();
        for th in threads.iter().filter(|t| t.transition.in_transition) {
            let seq = &shape.sequences[th.sequence];
            self.rotation_nodes.union_with(&th.transition.old_rotation_nodes);
            self.rotation_nodes.union_with(&seq.rotation_matters);
            self.translation_nodes.union_with(&th.transition.old_translation_nodes);
            self.translation_nodes.union_with(&seq.translation_matters);
            self.scale_nodes.union_with(&th.transition.old_scale_nodes);
            self.scale_nodes.union_with(&seq.scale_matters);
        }
    }

    /// Blend every transitioning node in `range` and recompose its local matrix.
    /// Recomposed nodes leave `scratch.local_dirty`.
    pub fn blend_nodes(
        &self,
        shape: &Shape,
        threads: &[Thread],
        masks: &NodeMasks,
        range: Range<usize>,
        scratch: &mut Scratch,
        locals: &mut [Matrix4<f32>],
    ) {
        let mut nodes = self.rotation_nodes.clone();
        nodes.union_with(&self.translation_nodes);
        if shape.scale_animated() {
            nodes.union_with(&self.scale_nodes);
        }
        nodes.subtract(&masks.hands_off);

        // matrices touched after composition have to be read back
        for i in nodes.iter().filter(|i| range.contains(i)) {
            if scratch.local_dirty.test(i) {
                scratch.rotations[i] = rotation_of(&locals[i]);
                scratch.translations[i] = position(&locals[i]);
                if let Some(mode) = shape.scale_mode {
                    scratch.scales[i] = scale_of(&locals[i], mode);
                }
            }
        }

        for i in self.rotation_nodes.iter().filter(|i| range.contains(i)) {
            if masks.hands_off.test(i) {
                continue;
            }
            let Some(th) = self.responsible(shape, threads, scratch.rotation_owner[i], i, Channel::Rotation) else {
                continue;
            };
            scratch.rotations[i] =
                slerp_quat(&self.reference_rotations[i], &scratch.rotations[i], th.transition.pos);
        }

        for i in self.translation_nodes.iter().filter(|i| range.contains(i)) {
            if masks.hands_off.test(i) {
                continue;
            }
            let Some(th) =
                self.responsible(shape, threads, scratch.translation_owner[i], i, Channel::Translation)
            else {
                continue;
            };
            scratch.translations[i] =
                lerp_vec3(&self.reference_translations[i], &scratch.translations[i], th.transition.pos);
        }

        if let Some(mode) = shape.scale_mode {
            for i in self.scale_nodes.iter().filter(|i| range.contains(i)) {
                if masks.hands_off.test(i) {
                    continue;
                }
                let Some(th) = self.responsible(shape, threads, scratch.scale_owner[i], i, Channel::Scale) else {
                    continue;
                };
                scratch.scales[i] =
                    ScaleValue::interpolate(self.reference_scales[i], scratch.scales[i], th.transition.pos)
                        .convert(mode);
            }
        }

        for i in nodes.iter().filter(|i| range.contains(i)) {
            locals[i] = compose(&scratch.rotations[i], &scratch.translations[i]);
            if shape.scale_animated() {
                scratch.scales[i].apply(&mut locals[i]);
            }
            scratch.local_dirty.clear(i);
        }
    }

    /// Thread whose fade drives `node` on `channel`: the channel's owner when it
    /// is fading, otherwise the first fading thread that used to own the node
    /// or owns it now.
    fn responsible<'a>(
        &self,
        shape: &Shape,
        threads: &'a [Thread],
        owner: Option<ThreadId>,
        node: usize,
        channel: Channel,
    ) -> Option<&'a Thread> {
        if let Some(th) = owner
            .and_then(|id| threads.iter().find(|t| t.id == id))
            .filter(|t| t.transition.in_transition)
        {
            return Some(th);
        }
        let found = self.threads.iter().find_map(|id| {
            let th = threads.iter().find(|t| t.id == *id)?;
            let seq = &shape.sequences[th.sequence];
            let (old, now) = match channel {
                Channel::Rotation => (&th.transition.old_rotation_nodes, &seq.rotation_matters),
                Channel::Translation => (&th.transition.old_translation_nodes, &seq.translation_matters),
                Channel::Scale => (&th.transition.old_scale_nodes, &seq.scale_matters),
            };
            (old.test(node) || now.test(node)).then_some(th)
        });
        debug_assert!(
            found.is_some(),
            "node {node} is in the {channel:?} transition set but no fading thread claims it"
        );
        found
    }
}
