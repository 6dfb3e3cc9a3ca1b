//! Mesh object state and morph weight animation.
//!
//! Objects follow the same first-writer-wins rule as node channels: objects
//! no thread animates take their default state, the rest take the value of
//! the first thread (in evaluation order) that keys them.

use std::ops::Range;

use crate::interp::lerp_f32;
use crate::node_set::NodeSet;
use crate::sequence::Sequence;
use crate::shape::{ObjectState, Shape};
use crate::thread::Thread;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ObjectChannel {
    Vis,
    Frame,
    MatFrame,
}

impl ObjectChannel {
    fn matters(self, seq: &Sequence) -> &NodeSet {
        match self {
            ObjectChannel::Vis => &seq.vis_matters,
            ObjectChannel::Frame => &seq.frame_matters,
            ObjectChannel::MatFrame => &seq.mat_frame_matters,
        }
    }
}

fn animate_channel(
    shape: &Shape,
    threads: &[Thread],
    range: Range<usize>,
    states: &mut [ObjectState],
    channel: ObjectChannel,
    write: impl Fn(&mut ObjectState, &Thread, ObjectState, ObjectState),
    write_default: impl Fn(&mut ObjectState, &ObjectState),
) {
    if shape.objects.is_empty() {
        return;
    }
    let mut been_set = NodeSet::with_all(shape.objects.len());
    for th in threads {
        been_set.subtract(channel.matters(&shape.sequences[th.sequence]));
    }
    for i in range.clone() {
        if been_set.test(i) {
            write_default(&mut states[i], &shape.objects[i].default_state);
        }
    }

    for th in threads {
        let seq = &shape.sequences[th.sequence];
        let matters = channel.matters(seq);
        // object states are packed over the union of all object channels
        let objects = seq.object_matters();
        let stride = objects.count();
        for (rank, obj) in objects.iter().enumerate() {
            if obj >= range.end {
                break;
            }
            if obj < range.start || been_set.test(obj) || !matters.test(obj) {
                continue;
            }
            let s1 = shape.object_state_at(seq, stride, th.key_num1, rank);
            let s2 = shape.object_state_at(seq, stride, th.key_num2, rank);
            write(&mut states[obj], th, s1, s2);
            been_set.set(obj);
        }
    }
}

/// Visibility jumps when the two keys differ by (about) a whole unit, and
/// interpolates otherwise.
pub fn animate_visibility(shape: &Shape, threads: &[Thread], range: Range<usize>, states: &mut [ObjectState]) {
    animate_channel(
        shape,
        threads,
        range,
        states,
        ObjectChannel::Vis,
        |out, th, s1, s2| {
            let d = s1.vis - s2.vis;
            out.vis = if d * d > 0.99 {
                if th.key_pos < 0.5 {
                    s1.vis
                } else {
                    s2.vis
                }
            } else {
                lerp_f32(s1.vis, s2.vis, th.key_pos)
            };
        },
        |out, default| out.vis = default.vis,
    );
}

/// Mesh frame of the nearest key.
pub fn animate_frame(shape: &Shape, threads: &[Thread], range: Range<usize>, states: &mut [ObjectState]) {
    animate_channel(
        shape,
        threads,
        range,
        states,
        ObjectChannel::Frame,
        |out, th, s1, s2| out.frame = if th.key_pos < 0.5 { s1.frame } else { s2.frame },
        |out, default| out.frame = default.frame,
    );
}

/// Material frame of the nearest key.
pub fn animate_mat_frame(shape: &Shape, threads: &[Thread], range: Range<usize>, states: &mut [ObjectState]) {
    animate_channel(
        shape,
        threads,
        range,
        states,
        ObjectChannel::MatFrame,
        |out, th, s1, s2| out.mat_frame = if th.key_pos < 0.5 { s1.mat_frame } else { s2.mat_frame },
        |out, default| out.mat_frame = default.mat_frame,
    );
}

/// Write the interpolated weight of every morph target `thread` keys.
pub fn animate_morphs(shape: &Shape, thread: &Thread, weights: &mut [f32]) {
    let seq = &shape.sequences[thread.sequence];
    for (rank, morph) in seq.morph_matters.iter().enumerate() {
        if let Some(w) = weights.get_mut(morph) {
            let w1 = shape.morph_weight(seq, thread.key_num1, rank);
            let w2 = shape.morph_weight(seq, thread.key_num2, rank);
            *w = lerp_f32(w1, w2, thread.key_pos);
        }
    }
}
