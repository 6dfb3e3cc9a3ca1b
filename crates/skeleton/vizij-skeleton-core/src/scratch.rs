//! Per-pass working buffers.
//!
//! Everything here is rebuilt by each node pass. Buffers are sized to the
//! whole shape and only the evaluated sub-shape's range is touched, so
//! separate sub-shapes may be evaluated with separate `Scratch` values.

use nalgebra::{UnitQuaternion, Vector3};

use crate::ids::ThreadId;
use crate::node_set::NodeSet;
use crate::scale::ScaleValue;

#[derive(Debug, Default)]
pub struct Scratch {
    pub rotations: Vec<UnitQuaternion<f32>>,
    pub translations: Vec<Vector3<f32>>,
    /// Held in the shape's scale mode. Untouched when scale is not animated.
    pub scales: Vec<ScaleValue>,

    /// Thread that supplied each channel this pass (`None` = default pose).
    pub rotation_owner: Vec<Option<ThreadId>>,
    pub translation_owner: Vec<Option<ThreadId>>,
    pub scale_owner: Vec<Option<ThreadId>>,

    pub rot_been_set: NodeSet,
    pub tran_been_set: NodeSet,
    pub scale_been_set: NodeSet,

    /// Nodes whose local matrix no longer matches the channel values above
    /// (callbacks, blend threads, IK).
    pub local_dirty: NodeSet,
}

impl Scratch {
    pub fn with_capacity(nodes: usize) -> Self {
        Self {
            rotations: Vec::with_capacity(nodes),
            translations: Vec::with_capacity(nodes),
            scales: Vec::with_capacity(nodes),
            rotation_owner: Vec::with_capacity(nodes),
            translation_owner: Vec::with_capacity(nodes),
            scale_owner: Vec::with_capacity(nodes),
            ..Default::default()
        }
    }

    /// Size every buffer for `nodes` and clear the per-pass sets.
    pub fn prepare(&mut self, nodes: usize) {
        self.rotations.resize(nodes, UnitQuaternion::identity());
        self.translations.resize(nodes, Vector3::zeros());
        self.scales.resize(nodes, ScaleValue::default());
        self.rotation_owner.resize(nodes, None);
        self.translation_owner.resize(nodes, None);
        self.scale_owner.resize(nodes, None);
        self.rot_been_set.clear_all();
        self.tran_been_set.clear_all();
        self.scale_been_set.clear_all();
        self.local_dirty.clear_all();
    }

    /// Forget channel owners for `range`.
    pub fn reset_owners(&mut self, range: std::ops::Range<usize>) {
        for i in range {
            self.rotation_owner[i] = None;
            self.translation_owner[i] = None;
            self.scale_owner[i] = None;
        }
    }
}
