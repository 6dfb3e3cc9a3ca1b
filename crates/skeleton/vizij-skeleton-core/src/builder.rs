//! Validated construction of a [`Shape`].
//!
//! Tracks are given per node (or object, or morph target) and packed here
//! into the shape's shared arrays. Both builders are plain serde data, so a
//! rig description can be loaded straight from JSON and then built.

use std::collections::BTreeMap;

use log::debug;
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkeletonError};
use crate::node_set::NodeSet;
use crate::scale::{ScaleMode, ScaleValue};
use crate::sequence::Sequence;
use crate::shape::{Detail, IkChain, MeshObject, Node, ObjectState, Shape, SubShape};

/// Keyed object state. Missing channels are not animated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectTrack {
    pub vis: Option<Vec<f32>>,
    pub frame: Option<Vec<u32>>,
    pub mat_frame: Option<Vec<u32>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceBuilder {
    pub name: String,
    pub num_keyframes: usize,
    pub duration: f32,
    pub priority: i32,
    pub blend: bool,
    pub cyclic: bool,
    pub rotations: BTreeMap<usize, Vec<UnitQuaternion<f32>>>,
    pub translations: BTreeMap<usize, Vec<Vector3<f32>>>,
    pub scales: BTreeMap<usize, Vec<ScaleValue>>,
    pub objects: BTreeMap<usize, ObjectTrack>,
    pub morphs: BTreeMap<usize, Vec<f32>>,
}

impl SequenceBuilder {
    pub fn new(name: impl Into<String>, num_keyframes: usize, duration: f32) -> Self {
        Self {
            name: name.into(),
            num_keyframes,
            duration,
            ..Default::default()
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn blend(mut self, blend: bool) -> Self {
        self.blend = blend;
        self
    }

    pub fn cyclic(mut self, cyclic: bool) -> Self {
        self.cyclic = cyclic;
        self
    }

    pub fn rotation_track(mut self, node: usize, keys: Vec<UnitQuaternion<f32>>) -> Self {
        self.rotations.insert(node, keys);
        self
    }

    pub fn translation_track(mut self, node: usize, keys: Vec<Vector3<f32>>) -> Self {
        self.translations.insert(node, keys);
        self
    }

    pub fn scale_track(mut self, node: usize, keys: Vec<ScaleValue>) -> Self {
        self.scales.insert(node, keys);
        self
    }

    pub fn vis_track(mut self, object: usize, keys: Vec<f32>) -> Self {
        self.objects.entry(object).or_default().vis = Some(keys);
        self
    }

    pub fn frame_track(mut self, object: usize, keys: Vec<u32>) -> Self {
        self.objects.entry(object).or_default().frame = Some(keys);
        self
    }

    pub fn mat_frame_track(mut self, object: usize, keys: Vec<u32>) -> Self {
        self.objects.entry(object).or_default().mat_frame = Some(keys);
        self
    }

    pub fn morph_track(mut self, morph: usize, keys: Vec<f32>) -> Self {
        self.morphs.insert(morph, keys);
        self
    }

    fn check_len(&self, actual: usize) -> Result<()> {
        if actual != self.num_keyframes {
            return Err(SkeletonError::KeyframeCountMismatch {
                sequence: self.name.clone(),
                expected: self.num_keyframes,
                actual,
            });
        }
        Ok(())
    }

    /// Single scale mode used by every scale track, or `None` without scale tracks.
    fn scale_mode(&self) -> Result<Option<ScaleMode>> {
        let mut mode: Option<ScaleMode> = None;
        for value in self.scales.values().flatten() {
            match mode {
                None => mode = Some(value.mode()),
                Some(m) if m != value.mode() => {
                    return Err(SkeletonError::ScaleModeConflict {
                        sequence: self.name.clone(),
                        first: m,
                        second: value.mode(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(mode)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeBuilder {
    pub nodes: Vec<Node>,
    pub objects: Vec<MeshObject>,
    /// Empty means one sub-shape spanning every node and object.
    pub sub_shapes: Vec<SubShape>,
    /// Empty means one detail per sub-shape.
    pub details: Vec<Detail>,
    pub sequences: Vec<SequenceBuilder>,
    pub ik_chains: Vec<IkChain>,
    pub limit_angle_x: Vec<usize>,
    pub num_morphs: usize,
}

impl ShapeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its index.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        default_rotation: UnitQuaternion<f32>,
        default_translation: Vector3<f32>,
    ) -> usize {
        self.nodes.push(Node {
            name: name.into(),
            parent,
            default_rotation,
            default_translation,
        });
        self.nodes.len() - 1
    }

    pub fn add_object(&mut self, name: impl Into<String>, default_state: ObjectState) -> usize {
        self.objects.push(MeshObject {
            name: name.into(),
            default_state,
        });
        self.objects.len() - 1
    }

    pub fn add_sub_shape(&mut self, sub_shape: SubShape) -> usize {
        self.sub_shapes.push(sub_shape);
        self.sub_shapes.len() - 1
    }

    pub fn add_detail(&mut self, name: impl Into<String>, sub_shape: Option<usize>) -> usize {
        self.details.push(Detail {
            name: name.into(),
            sub_shape,
        });
        self.details.len() - 1
    }

    pub fn add_sequence(&mut self, sequence: SequenceBuilder) -> usize {
        self.sequences.push(sequence);
        self.sequences.len() - 1
    }

    pub fn add_ik_chain(&mut self, chain: IkChain) -> usize {
        self.ik_chains.push(chain);
        self.ik_chains.len() - 1
    }

    /// Restrict IK on `node` to rotation about its local x axis.
    pub fn limit_angle_x(&mut self, node: usize) {
        self.limit_angle_x.push(node);
    }

    pub fn set_num_morphs(&mut self, count: usize) {
        self.num_morphs = count;
    }

    /// Validate everything and pack keyframe data.
    pub fn build(self) -> Result<Shape> {
        let node_count = self.nodes.len();
        let object_count = self.objects.len();

        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(p) = node.parent {
                if p >= node_count {
                    return Err(SkeletonError::NodeOutOfRange {
                        index: p,
                        count: node_count,
                    });
                }
                if p >= i {
                    return Err(SkeletonError::ParentAfterChild { node: i, parent: p });
                }
            }
        }

        let sub_shapes = if self.sub_shapes.is_empty() {
            vec![SubShape {
                first_node: 0,
                num_nodes: node_count,
                first_object: 0,
                num_objects: object_count,
            }]
        } else {
            self.sub_shapes
        };
        validate_sub_shapes(&sub_shapes, &self.nodes, object_count)?;

        let details = if self.details.is_empty() {
            (0..sub_shapes.len())
                .map(|i| Detail {
                    name: format!("detail{i}"),
                    sub_shape: Some(i),
                })
                .collect()
        } else {
            self.details
        };
        for d in &details {
            if let Some(ss) = d.sub_shape {
                if ss >= sub_shapes.len() {
                    return Err(SkeletonError::SubShapeNotFound { index: ss });
                }
            }
        }

        let mut limit_angle_x = NodeSet::new();
        for &n in &self.limit_angle_x {
            check_node(n, node_count)?;
            limit_angle_x.set(n);
        }

        for (index, chain) in self.ik_chains.iter().enumerate() {
            validate_chain(index, chain, &sub_shapes, node_count)?;
        }

        let mut shape = Shape {
            nodes: self.nodes,
            objects: self.objects,
            sub_shapes,
            details,
            ik_chains: self.ik_chains,
            limit_angle_x,
            num_morphs: self.num_morphs,
            ..Default::default()
        };

        for sb in self.sequences {
            let seq = pack_sequence(&mut shape, sb)?;
            if let Some(mode) = seq.scale_mode {
                shape.scale_mode = Some(shape.scale_mode.map_or(mode, |m| m.max(mode)));
            }
            shape.sequences.push(seq);
        }
        shape.rebuild_name_index();

        debug!(
            "built shape: {} nodes, {} objects, {} sequences, {} ik chains, scale mode {:?}",
            shape.nodes.len(),
            shape.objects.len(),
            shape.sequences.len(),
            shape.ik_chains.len(),
            shape.scale_mode
        );
        Ok(shape)
    }
}

fn check_node(index: usize, count: usize) -> Result<()> {
    if index >= count {
        return Err(SkeletonError::NodeOutOfRange { index, count });
    }
    Ok(())
}

fn validate_sub_shapes(sub_shapes: &[SubShape], nodes: &[Node], object_count: usize) -> Result<()> {
    let mut next_node = 0;
    let mut next_object = 0;
    for (index, ss) in sub_shapes.iter().enumerate() {
        if ss.first_node != next_node {
            return Err(SkeletonError::SubShapeInvalid {
                index,
                reason: format!("node range starts at {}, expected {}", ss.first_node, next_node),
            });
        }
        if ss.first_object != next_object {
            return Err(SkeletonError::SubShapeInvalid {
                index,
                reason: format!(
                    "object range starts at {}, expected {}",
                    ss.first_object, next_object
                ),
            });
        }
        next_node = ss.first_node + ss.num_nodes;
        next_object = ss.first_object + ss.num_objects;
        for i in ss.nodes() {
            let Some(node) = nodes.get(i) else {
                break;
            };
            if let Some(p) = node.parent {
                if p < ss.first_node {
                    return Err(SkeletonError::SubShapeInvalid {
                        index,
                        reason: format!("node {i} has parent {p} outside the sub-shape"),
                    });
                }
            }
        }
    }
    if next_node != nodes.len() {
        return Err(SkeletonError::SubShapeInvalid {
            index: sub_shapes.len().saturating_sub(1),
            reason: format!("node ranges cover {next_node} of {} nodes", nodes.len()),
        });
    }
    if next_object != object_count {
        return Err(SkeletonError::SubShapeInvalid {
            index: sub_shapes.len().saturating_sub(1),
            reason: format!("object ranges cover {next_object} of {object_count} objects"),
        });
    }
    Ok(())
}

fn validate_chain(index: usize, chain: &IkChain, sub_shapes: &[SubShape], node_count: usize) -> Result<()> {
    let invalid = |reason: String| SkeletonError::IkChainInvalid { index, reason };
    if chain.links.is_empty() {
        return Err(invalid("chain has no links".into()));
    }
    if !(chain.max_angle > 0.0) {
        return Err(invalid(format!("max angle {} must be positive", chain.max_angle)));
    }
    check_node(chain.dest, node_count)?;
    check_node(chain.target, node_count)?;
    for &l in &chain.links {
        check_node(l, node_count)?;
    }
    let home = sub_shapes.iter().position(|ss| ss.nodes().contains(&chain.target));
    let same = |n: usize| home.is_some_and(|h| sub_shapes[h].nodes().contains(&n));
    if !same(chain.dest) || !chain.links.iter().all(|&l| same(l)) {
        return Err(invalid("chain nodes span more than one sub-shape".into()));
    }
    Ok(())
}

fn pack_sequence(shape: &mut Shape, sb: SequenceBuilder) -> Result<Sequence> {
    let node_count = shape.nodes.len();
    let object_count = shape.objects.len();

    if sb.num_keyframes == 0 {
        return Err(SkeletonError::EmptySequence { sequence: sb.name });
    }
    if !(sb.duration.is_finite() && sb.duration > 0.0) {
        return Err(SkeletonError::InvalidDuration {
            duration: sb.duration,
        });
    }
    let scale_mode = sb.scale_mode()?;

    for (&n, keys) in &sb.rotations {
        check_node(n, node_count)?;
        sb.check_len(keys.len())?;
    }
    for (&n, keys) in &sb.translations {
        check_node(n, node_count)?;
        sb.check_len(keys.len())?;
    }
    for (&n, keys) in &sb.scales {
        check_node(n, node_count)?;
        sb.check_len(keys.len())?;
    }
    for (&o, track) in &sb.objects {
        if o >= object_count {
            return Err(SkeletonError::ObjectOutOfRange {
                index: o,
                count: object_count,
            });
        }
        let lens = [
            track.vis.as_ref().map(Vec::len),
            track.frame.as_ref().map(Vec::len),
            track.mat_frame.as_ref().map(Vec::len),
        ];
        for len in lens.into_iter().flatten() {
            sb.check_len(len)?;
        }
    }
    for (&m, keys) in &sb.morphs {
        if m >= shape.num_morphs {
            return Err(SkeletonError::MorphOutOfRange {
                index: m,
                count: shape.num_morphs,
            });
        }
        sb.check_len(keys.len())?;
    }

    let n = sb.num_keyframes;
    let mut seq = Sequence {
        name: sb.name.clone(),
        num_keyframes: n,
        duration: sb.duration,
        priority: sb.priority,
        blend: sb.blend,
        cyclic: sb.cyclic,
        scale_mode,
        rotation_matters: sb.rotations.keys().copied().collect(),
        translation_matters: sb.translations.keys().copied().collect(),
        scale_matters: sb.scales.keys().copied().collect(),
        vis_matters: keys_where(&sb.objects, |t| t.vis.is_some()),
        frame_matters: keys_where(&sb.objects, |t| t.frame.is_some()),
        mat_frame_matters: keys_where(&sb.objects, |t| t.mat_frame.is_some()),
        morph_matters: sb.morphs.keys().copied().collect(),
        base_rotation: shape.rotations.len(),
        base_translation: shape.translations.len(),
        base_scale: 0,
        base_object_state: shape.object_states.len(),
        first_morph: shape.morph_weights.len(),
    };

    for k in 0..n {
        for keys in sb.rotations.values() {
            // stored keys may come from JSON and be slightly off unit length
            shape.rotations.push(UnitQuaternion::new_normalize(keys[k].into_inner()));
        }
        for keys in sb.translations.values() {
            shape.translations.push(keys[k]);
        }
    }

    seq.base_scale = match scale_mode {
        Some(ScaleMode::Uniform) | None => shape.uniform_scales.len(),
        Some(ScaleMode::Aligned) => shape.aligned_scales.len(),
        Some(ScaleMode::Arbitrary) => shape.arbitrary_scales.len(),
    };
    for k in 0..n {
        for keys in sb.scales.values() {
            match keys[k] {
                ScaleValue::Uniform(s) => shape.uniform_scales.push(s),
                ScaleValue::Aligned(v) => shape.aligned_scales.push(v),
                ScaleValue::Arbitrary(a) => shape.arbitrary_scales.push(a),
            }
        }
    }

    let objects = &shape.objects;
    for k in 0..n {
        for (&o, track) in &sb.objects {
            let default = objects[o].default_state;
            shape.object_states.push(ObjectState {
                vis: track.vis.as_ref().map_or(default.vis, |v| v[k]),
                frame: track.frame.as_ref().map_or(default.frame, |v| v[k]),
                mat_frame: track.mat_frame.as_ref().map_or(default.mat_frame, |v| v[k]),
            });
        }
        for keys in sb.morphs.values() {
            shape.morph_weights.push(keys[k]);
        }
    }

    Ok(seq)
}

fn keys_where(objects: &BTreeMap<usize, ObjectTrack>, pred: impl Fn(&ObjectTrack) -> bool) -> NodeSet {
    objects
        .iter()
        .filter(|(_, t)| pred(t))
        .map(|(&o, _)| o)
        .collect()
}
