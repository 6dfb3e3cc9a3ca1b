//! Immutable animation clips.
//!
//! A sequence owns no keyframe data itself. Its membership sets say which
//! nodes, objects and morph targets it animates, and the `base_*` offsets
//! locate its block inside the packed arrays of the owning [`Shape`].
//!
//! Within a block, data is laid out key-major: the value for member rank `r`
//! at keyframe `k` lives at `base + k * members + r`.
//!
//! [`Shape`]: crate::shape::Shape

use serde::{Deserialize, Serialize};

use crate::node_set::NodeSet;
use crate::scale::ScaleMode;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    pub num_keyframes: usize,
    /// Seconds for one pass over the keyframes.
    pub duration: f32,
    /// Threads are ordered by priority, highest first.
    pub priority: i32,
    /// Blend sequences are layered on top of the resolved base pose.
    pub blend: bool,
    pub cyclic: bool,
    /// Mode of this sequence's scale tracks, `None` when it animates no scale.
    pub scale_mode: Option<ScaleMode>,

    pub rotation_matters: NodeSet,
    pub translation_matters: NodeSet,
    pub scale_matters: NodeSet,
    pub vis_matters: NodeSet,
    pub frame_matters: NodeSet,
    pub mat_frame_matters: NodeSet,
    pub morph_matters: NodeSet,

    pub base_rotation: usize,
    pub base_translation: usize,
    pub base_scale: usize,
    pub base_object_state: usize,
    pub first_morph: usize,
}

impl Sequence {
    /// Objects with any animated state. Object states are packed over this union.
    pub fn object_matters(&self) -> NodeSet {
        let mut s = self.vis_matters.clone();
        s.union_with(&self.frame_matters);
        s.union_with(&self.mat_frame_matters);
        s
    }

    /// Nodes with any animated channel.
    pub fn node_matters(&self) -> NodeSet {
        let mut s = self.rotation_matters.clone();
        s.union_with(&self.translation_matters);
        s.union_with(&self.scale_matters);
        s
    }

    #[inline]
    pub fn animates_scale(&self) -> bool {
        self.scale_mode.is_some() && !self.scale_matters.is_empty()
    }
}
