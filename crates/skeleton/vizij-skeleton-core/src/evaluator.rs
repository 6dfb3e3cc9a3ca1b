//! Node pass: threads to local and global transforms for one sub-shape.
//!
//! Order within a pass is fixed:
//! 1. non-blend threads, first writer wins per channel
//! 2. default pose for unclaimed channels
//! 3. rotation+translation composition, then scale
//! 4. node callbacks
//! 5. blend threads, right-multiplied onto the resolved locals
//! 6. transition cross-fades
//! 7. hierarchy multiply
//! 8. IK chains, followed by a re-multiply of the affected subtree

use nalgebra::Matrix4;

use log::trace;

use crate::callback::NodeCallbackEntry;
use crate::config::Config;
use crate::ik::{solve_chain, IkStats};
use crate::interp::{lerp_vec3, slerp_quat};
use crate::node_set::NodeSet;
use crate::node_state::NodeMasks;
use crate::objects::animate_morphs;
use crate::scale::{ScaleMode, ScaleValue};
use crate::scratch::Scratch;
use crate::shape::Shape;
use crate::thread::Thread;
use crate::transform::{compose, set_position};
use crate::transition::{LocalPose, TransitionState};

/// Read-only inputs of a node pass.
pub struct NodePass<'a> {
    pub shape: &'a Shape,
    /// Threads in evaluation order (see [`sort_threads`]).
    pub threads: &'a [Thread],
    pub masks: &'a NodeMasks,
    pub transitions: &'a TransitionState,
    pub config: &'a Config,
}

/// Buffers written by a node pass. `local` also carries hands-off transforms in.
pub struct NodeOutputs<'a> {
    pub local: &'a mut [Matrix4<f32>],
    /// Channel values behind `local`, refreshed for the evaluated range.
    pub pose: &'a mut LocalPose,
    pub global: &'a mut [Matrix4<f32>],
    pub morph_weights: &'a mut [f32],
    pub ik_stats: &'a mut Vec<IkStats>,
}

/// Non-blend threads first, then higher priority first. Stable, so equal
/// threads keep their insertion order.
pub fn sort_threads(threads: &mut [Thread]) {
    threads.sort_by(|a, b| a.blend.cmp(&b.blend).then(b.priority.cmp(&a.priority)));
}

/// Evaluate the nodes of `sub_shape`.
pub fn animate_nodes(
    pass: &NodePass<'_>,
    callbacks: &mut [NodeCallbackEntry],
    sub_shape: usize,
    scratch: &mut Scratch,
    out: &mut NodeOutputs<'_>,
) {
    let shape = pass.shape;
    out.morph_weights.iter_mut().for_each(|w| *w = 0.0);

    let n = shape.node_count();
    if n == 0 {
        return;
    }
    debug_assert!(sub_shape < shape.sub_shapes.len(), "sub-shape {sub_shape} out of range");
    debug_assert!(out.local.len() >= n && out.global.len() >= n);

    let range = shape.sub_shapes[sub_shape].nodes();
    let (a, b) = (range.start, range.end);
    scratch.prepare(n);
    scratch.reset_owners(range.clone());

    let first_blend = pass.threads.iter().position(|t| t.blend).unwrap_or(pass.threads.len());
    let (base, blends) = pass.threads.split_at(first_blend);

    let masks = pass.masks;
    let external = masks.externally_driven();
    let mask_pos = masks.pos_any();

    // channels no base thread claims fall back to the default pose
    let mut rot_default = NodeSet::with_all(n);
    let mut tran_default = NodeSet::with_all(n);
    let mut scale_default = NodeSet::with_all(n);
    for th in base {
        let seq = &shape.sequences[th.sequence];
        rot_default.subtract(&seq.rotation_matters);
        tran_default.subtract(&seq.translation_matters);
        scale_default.subtract(&seq.scale_matters);
    }
    rot_default.union_with(&masks.rotation);
    tran_default.union_with(&mask_pos);
    for set in [&mut rot_default, &mut tran_default, &mut scale_default] {
        set.union_with(&masks.callback);
        set.subtract(&masks.hands_off);
    }

    for i in range.clone() {
        let node = &shape.nodes[i];
        if rot_default.test(i) {
            scratch.rotations[i] = node.default_rotation;
        }
        if tran_default.test(i) {
            scratch.translations[i] = node.default_translation;
        }
        if let Some(mode) = shape.scale_mode {
            if scale_default.test(i) {
                scratch.scales[i] = ScaleValue::identity(mode);
            }
        }
    }

    scratch.rot_been_set = rot_default;
    scratch.rot_been_set.union_with(&external);
    scratch.tran_been_set = tran_default;
    scratch.tran_been_set.subtract(&mask_pos);
    scratch.tran_been_set.union_with(&external);
    scratch.scale_been_set = scale_default;
    scratch.scale_been_set.union_with(&external);

    for th in base {
        sample_base_thread(shape, th, a, b, &mask_pos, masks, scratch);
        animate_morphs(shape, th, out.morph_weights);
    }

    for i in range.clone() {
        if !masks.hands_off.test(i) {
            out.local[i] = compose(&scratch.rotations[i], &scratch.translations[i]);
        }
    }

    if shape.scale_animated() {
        for i in range.clone() {
            if !masks.hands_off.test(i) {
                scratch.scales[i].apply(&mut out.local[i]);
            }
        }
    }

    for entry in callbacks.iter_mut() {
        if range.contains(&entry.node) {
            entry.callback.set_node_transform(entry.node, &mut out.local[entry.node]);
            scratch.local_dirty.set(entry.node);
        }
    }

    for th in blends.iter().filter(|t| !t.blend_disabled) {
        apply_blend_thread(shape, th, a, b, masks, scratch, out.local);
        animate_morphs(shape, th, out.morph_weights);
    }

    if pass.transitions.is_active() {
        pass.transitions
            .blend_nodes(shape, pass.threads, masks, range.clone(), scratch, out.local);
    }

    multiply_hierarchy(shape, a, b, out.local, out.global);

    if pass.config.ik_enabled {
        for (index, chain) in shape.ik_chains.iter().enumerate() {
            if !range.contains(&chain.target) {
                continue;
            }
            let stats = solve_chain(
                index,
                chain,
                &shape.nodes,
                &shape.limit_angle_x,
                &pass.config.ik,
                out.local,
                out.global,
            );
            if stats.links_rotated > 0 {
                for &l in &chain.links {
                    scratch.local_dirty.set(l);
                }
                scratch.local_dirty.set(chain.target);
                let lowest = chain.links.iter().copied().min().unwrap_or(chain.target).min(chain.target);
                multiply_hierarchy(shape, lowest, b, out.local, out.global);
            }
            out.ik_stats.push(stats);
        }
    }

    for i in range.clone() {
        if masks.hands_off.test(i) || scratch.local_dirty.test(i) {
            out.pose.record_matrix(i, &out.local[i], shape.scale_mode);
        } else {
            out.pose.record_channels(i, scratch, shape.scale_mode);
        }
    }

    trace!(
        "node pass: sub-shape {sub_shape}, nodes {a}..{b}, {} base / {} blend threads, transition {}",
        base.len(),
        blends.len(),
        pass.transitions.is_active()
    );
}

/// `global[i] = global[parent] * local[i]` for `i` in `a..b`, in index order.
pub fn multiply_hierarchy(shape: &Shape, a: usize, b: usize, local: &[Matrix4<f32>], global: &mut [Matrix4<f32>]) {
    for i in a..b {
        global[i] = match shape.nodes[i].parent {
            Some(p) => global[p] * local[i],
            None => local[i],
        };
    }
}

fn sample_base_thread(
    shape: &Shape,
    th: &Thread,
    a: usize,
    b: usize,
    mask_pos: &NodeSet,
    masks: &NodeMasks,
    scratch: &mut Scratch,
) {
    let seq = &shape.sequences[th.sequence];
    let (k1, k2, t) = (th.key_num1, th.key_num2, th.key_pos);

    for (rank, i) in seq.rotation_matters.iter().enumerate() {
        if i >= b {
            break;
        }
        if i < a || scratch.rot_been_set.test(i) {
            continue;
        }
        let q1 = shape.rotation(seq, k1, rank);
        let q2 = shape.rotation(seq, k2, rank);
        scratch.rotations[i] = slerp_quat(&q1, &q2, t);
        scratch.rot_been_set.set(i);
        scratch.rotation_owner[i] = Some(th.id);
    }

    for (rank, i) in seq.translation_matters.iter().enumerate() {
        if i >= b {
            break;
        }
        if i < a || scratch.tran_been_set.test(i) {
            continue;
        }
        let p1 = shape.translation(seq, k1, rank);
        let p2 = shape.translation(seq, k2, rank);
        let p = lerp_vec3(&p1, &p2, t);
        if mask_pos.test(i) {
            // masked axes keep the default written above
            let cur = &mut scratch.translations[i];
            if !masks.pos_x.test(i) {
                cur.x = p.x;
            }
            if !masks.pos_y.test(i) {
                cur.y = p.y;
            }
            if !masks.pos_z.test(i) {
                cur.z = p.z;
            }
        } else {
            scratch.translations[i] = p;
            scratch.translation_owner[i] = Some(th.id);
        }
        scratch.tran_been_set.set(i);
    }

    let Some(mode) = shape.scale_mode else {
        return;
    };
    if !seq.animates_scale() {
        return;
    }
    for (rank, i) in seq.scale_matters.iter().enumerate() {
        if i >= b {
            break;
        }
        if i < a || scratch.scale_been_set.test(i) {
            continue;
        }
        let s = ScaleValue::interpolate(shape.scale(seq, k1, rank), shape.scale(seq, k2, rank), t);
        scratch.scales[i] = s.convert(mode);
        scratch.scale_been_set.set(i);
        scratch.scale_owner[i] = Some(th.id);
    }
}

fn apply_blend_thread(
    shape: &Shape,
    th: &Thread,
    a: usize,
    b: usize,
    masks: &NodeMasks,
    scratch: &mut Scratch,
    local: &mut [Matrix4<f32>],
) {
    let seq = &shape.sequences[th.sequence];
    let (k1, k2, t) = (th.key_num1, th.key_num2, th.key_pos);
    let (mut jrot, mut jtrans, mut jscale) = (0usize, 0usize, 0usize);
    let next = |on: bool, counter: &mut usize| {
        on.then(|| {
            *counter += 1;
            *counter - 1
        })
    };

    for i in seq.node_matters().iter() {
        if i >= b {
            break;
        }
        // ranks advance for skipped nodes too so later members stay aligned
        let rot = next(seq.rotation_matters.test(i), &mut jrot);
        let trans = next(seq.translation_matters.test(i), &mut jtrans);
        let scale = next(seq.scale_matters.test(i), &mut jscale);
        if i < a || masks.hands_off.test(i) || masks.disable_blend.test(i) {
            continue;
        }

        let mut mat = Matrix4::identity();
        if let Some(r) = rot {
            let q = slerp_quat(&shape.rotation(seq, k1, r), &shape.rotation(seq, k2, r), t);
            mat = q.to_homogeneous();
        }
        if let Some(r) = trans {
            let p = lerp_vec3(&shape.translation(seq, k1, r), &shape.translation(seq, k2, r), t);
            set_position(&mut mat, &p);
        }
        if let Some(r) = scale {
            let s = ScaleValue::interpolate(shape.scale(seq, k1, r), shape.scale(seq, k2, r), t);
            s.convert(seq.scale_mode.unwrap_or(ScaleMode::Uniform)).apply(&mut mat);
        }
        local[i] *= mat;
        scratch.local_dirty.set(i);
    }
}
