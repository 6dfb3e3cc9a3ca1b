//! Read-only skeleton and keyframe store shared by every instance of a shape.
//!
//! Built once through [`ShapeBuilder`](crate::builder::ShapeBuilder) and then
//! shared behind an `Arc`. Accessors take `(sequence, keyframe, rank)` and do
//! no bounds recovery: the builder has already validated every offset.

use hashbrown::HashMap;
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::node_set::NodeSet;
use crate::scale::{ArbitraryScale, ScaleMode, ScaleValue};
use crate::sequence::Sequence;

/// A bone. Parents always precede their children in `Shape::nodes`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub parent: Option<usize>,
    pub default_rotation: UnitQuaternion<f32>,
    pub default_translation: Vector3<f32>,
}

/// Contiguous node and mesh-object ranges animated together.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubShape {
    pub first_node: usize,
    pub num_nodes: usize,
    pub first_object: usize,
    pub num_objects: usize,
}

impl SubShape {
    #[inline]
    pub fn nodes(&self) -> std::ops::Range<usize> {
        self.first_node..self.first_node + self.num_nodes
    }

    #[inline]
    pub fn objects(&self) -> std::ops::Range<usize> {
        self.first_object..self.first_object + self.num_objects
    }
}

/// Detail level. A detail without a sub-shape (a billboard) animates nothing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Detail {
    pub name: String,
    pub sub_shape: Option<usize>,
}

/// Per-object state that sequences can key.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    /// Visibility in `[0, 1]`.
    pub vis: f32,
    pub frame: u32,
    pub mat_frame: u32,
}

impl Default for ObjectState {
    fn default() -> Self {
        Self {
            vis: 1.0,
            frame: 0,
            mat_frame: 0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshObject {
    pub name: String,
    pub default_state: ObjectState,
}

/// Chain solved after the hierarchy multiply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IkChain {
    /// Node whose world position is the goal.
    pub dest: usize,
    /// End effector. Its own rotation is restored after solving.
    pub target: usize,
    /// Link nodes, tip first.
    pub links: Vec<usize>,
    pub max_iterations: u32,
    /// Per-step clamp in radians.
    pub max_angle: f32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Shape {
    pub nodes: Vec<Node>,
    pub objects: Vec<MeshObject>,
    pub sub_shapes: Vec<SubShape>,
    pub details: Vec<Detail>,
    pub sequences: Vec<Sequence>,
    pub ik_chains: Vec<IkChain>,
    /// Nodes whose IK rotation is restricted to their local x axis (hinges).
    pub limit_angle_x: NodeSet,
    pub num_morphs: usize,
    /// Widest scale mode any sequence animates. `None` when scale is never animated.
    pub scale_mode: Option<ScaleMode>,

    pub(crate) rotations: Vec<UnitQuaternion<f32>>,
    pub(crate) translations: Vec<Vector3<f32>>,
    pub(crate) uniform_scales: Vec<f32>,
    pub(crate) aligned_scales: Vec<Vector3<f32>>,
    pub(crate) arbitrary_scales: Vec<ArbitraryScale>,
    pub(crate) object_states: Vec<ObjectState>,
    pub(crate) morph_weights: Vec<f32>,

    #[serde(skip)]
    pub(crate) name_index: HashMap<String, usize>,
}

impl Shape {
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn find_node(&self, name: &str) -> Option<usize> {
        if self.name_index.is_empty() {
            return self.nodes.iter().position(|n| n.name == name);
        }
        self.name_index.get(name).copied()
    }

    pub fn find_sequence(&self, name: &str) -> Option<usize> {
        self.sequences.iter().position(|s| s.name == name)
    }

    #[inline]
    pub fn parent(&self, node: usize) -> Option<usize> {
        self.nodes[node].parent
    }

    /// Sub-shape containing `node`.
    pub fn sub_shape_of(&self, node: usize) -> Option<usize> {
        self.sub_shapes.iter().position(|ss| ss.nodes().contains(&node))
    }

    #[inline]
    pub fn scale_animated(&self) -> bool {
        self.scale_mode.is_some()
    }

    pub(crate) fn rebuild_name_index(&mut self) {
        self.name_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.clone(), i))
            .collect();
    }

    #[inline]
    pub fn rotation(&self, seq: &Sequence, key: usize, rank: usize) -> UnitQuaternion<f32> {
        let stride = seq.rotation_matters.count();
        self.rotations[seq.base_rotation + key * stride + rank]
    }

    #[inline]
    pub fn translation(&self, seq: &Sequence, key: usize, rank: usize) -> Vector3<f32> {
        let stride = seq.translation_matters.count();
        self.translations[seq.base_translation + key * stride + rank]
    }

    #[inline]
    pub fn uniform_scale(&self, seq: &Sequence, key: usize, rank: usize) -> f32 {
        let stride = seq.scale_matters.count();
        self.uniform_scales[seq.base_scale + key * stride + rank]
    }

    #[inline]
    pub fn aligned_scale(&self, seq: &Sequence, key: usize, rank: usize) -> Vector3<f32> {
        let stride = seq.scale_matters.count();
        self.aligned_scales[seq.base_scale + key * stride + rank]
    }

    #[inline]
    pub fn arbitrary_scale(&self, seq: &Sequence, key: usize, rank: usize) -> ArbitraryScale {
        let stride = seq.scale_matters.count();
        self.arbitrary_scales[seq.base_scale + key * stride + rank]
    }

    /// Scale sample in the sequence's own mode.
    pub fn scale(&self, seq: &Sequence, key: usize, rank: usize) -> ScaleValue {
        match seq.scale_mode {
            Some(ScaleMode::Uniform) | None => ScaleValue::Uniform(self.uniform_scale(seq, key, rank)),
            Some(ScaleMode::Aligned) => ScaleValue::Aligned(self.aligned_scale(seq, key, rank)),
            Some(ScaleMode::Arbitrary) => ScaleValue::Arbitrary(self.arbitrary_scale(seq, key, rank)),
        }
    }

    /// `rank` counts over the union of the sequence's vis, frame and mat-frame sets.
    #[inline]
    pub fn object_state(&self, seq: &Sequence, key: usize, rank: usize) -> ObjectState {
        self.object_state_at(seq, seq.object_matters().count(), key, rank)
    }

    #[inline]
    pub(crate) fn object_state_at(&self, seq: &Sequence, stride: usize, key: usize, rank: usize) -> ObjectState {
        self.object_states[seq.base_object_state + key * stride + rank]
    }

    #[inline]
    pub fn morph_weight(&self, seq: &Sequence, key: usize, rank: usize) -> f32 {
        let stride = seq.morph_matters.count();
        self.morph_weights[seq.first_morph + key * stride + rank]
    }
}
