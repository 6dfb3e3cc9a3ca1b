mod common;

use std::f32::consts::FRAC_PI_2;
use std::sync::{Arc, Mutex};

use common::{approx, approx3, approx_mat, instance, position, quat_z};
use nalgebra::{Matrix4, UnitQuaternion, Vector3};
use vizij_skeleton_core::transform::{compose, rotation_of};
use vizij_skeleton_core::{Config, NodeCallback, NodeState, SequenceBuilder, ShapeBuilder, ShapeInstance};

const ROOT: usize = 0;
const UPPER: usize = 1;
const LOWER: usize = 2;

/// it should land exactly on the first and last keys at pos 0 and 1
#[test]
fn keyframe_boundaries_are_exact() {
    let mut inst = instance("three-bone-arm");
    let bend = inst.shape().find_sequence("bend").unwrap();
    let th = inst.add_thread(bend).unwrap();

    inst.animate_node_subtrees(true);
    approx3(position(&inst.global_transforms()[LOWER]), Vector3::new(0.0, 2.0, 0.0), 1e-6);

    inst.set_pos(th, 1.0).unwrap();
    inst.animate_node_subtrees(false);
    let q = rotation_of(&inst.local_transforms()[UPPER]);
    approx(q.angle_to(&quat_z(FRAC_PI_2)), 0.0, 1e-4);
    // upper at (0,1,0) turned 90 degrees about z, lower one unit further along -x
    approx3(position(&inst.global_transforms()[LOWER]), Vector3::new(-1.0, 1.0, 0.0), 1e-5);
}

/// it should slerp halfway and compose global = parent * local down the chain
#[test]
fn three_node_chain_midpoint() {
    let mut inst = instance("three-bone-arm");
    let th = inst.add_thread(0).unwrap();
    inst.set_pos(th, 0.5).unwrap();
    inst.animate_node_subtrees(false);

    let local = inst.local_transforms();
    let global = inst.global_transforms();
    approx(rotation_of(&local[UPPER]).angle(), FRAC_PI_2 / 2.0, 1e-5);
    approx_mat(&global[LOWER], &(global[UPPER] * local[LOWER]), 1e-6);
    approx_mat(&global[UPPER], &(global[ROOT] * local[UPPER]), 1e-6);

    let s = std::f32::consts::FRAC_1_SQRT_2;
    approx3(position(&global[LOWER]), Vector3::new(-s, 1.0 + s, 0.0), 1e-5);
}

/// it should fall back to the default pose for channels no thread animates
#[test]
fn unanimated_channels_use_default_pose() {
    let mut inst = instance("three-bone-arm");
    inst.animate_node_subtrees(true);
    for (i, node) in inst.shape().nodes.iter().enumerate() {
        let expected = compose(&node.default_rotation, &node.default_translation);
        approx_mat(&inst.local_transforms()[i], &expected, 1e-6);
    }

    let lift = inst.shape().find_sequence("lift").unwrap();
    let th = inst.add_thread(lift).unwrap();
    inst.set_pos(th, 0.5).unwrap();
    inst.animate_node_subtrees(false);
    approx3(position(&inst.local_transforms()[ROOT]), Vector3::new(0.0, 1.0, 0.0), 1e-6);
    approx3(position(&inst.local_transforms()[UPPER]), Vector3::new(0.0, 1.0, 0.0), 1e-6);
    approx(rotation_of(&inst.local_transforms()[LOWER]).angle(), 0.0, 1e-6);
}

fn contested_rig() -> ShapeInstance {
    let mut b = ShapeBuilder::new();
    b.add_node("spinner", None, UnitQuaternion::identity(), Vector3::zeros());
    b.add_sequence(SequenceBuilder::new("low", 1, 1.0).priority(1).rotation_track(0, vec![quat_z(0.3)]));
    b.add_sequence(SequenceBuilder::new("high", 1, 1.0).priority(5).rotation_track(0, vec![quat_z(1.2)]));
    ShapeInstance::new(Arc::new(b.build().unwrap()), Config::default())
}

/// it should let the highest-priority thread own a contested channel
#[test]
fn first_writer_wins_by_priority() {
    let mut inst = contested_rig();
    let low = inst.add_thread(0).unwrap();
    inst.add_thread(1).unwrap();
    inst.animate_node_subtrees(false);
    approx(rotation_of(&inst.local_transforms()[0]).angle(), 1.2, 1e-5);

    inst.set_priority(low, 9).unwrap();
    inst.animate_node_subtrees(false);
    approx(rotation_of(&inst.local_transforms()[0]).angle(), 0.3, 1e-5);
    assert_eq!(inst.threads()[0].id, low);
}

/// it should hold masked rotation and masked axes at the default pose
#[test]
fn masked_channels_keep_defaults() {
    let mut inst = instance("three-bone-arm");
    let bend = inst.add_thread(0).unwrap();
    let lift = inst.add_thread(1).unwrap();
    inst.set_pos(bend, 1.0).unwrap();
    inst.set_pos(lift, 1.0).unwrap();

    inst.set_node_animation_state(UPPER, NodeState::ROTATION, None).unwrap();
    inst.set_node_animation_state(ROOT, NodeState::POS_Y, None).unwrap();
    assert_eq!(inst.node_animation_state(ROOT).unwrap(), NodeState::POS_Y);
    inst.animate_node_subtrees(false);

    let local = inst.local_transforms();
    approx(rotation_of(&local[UPPER]).angle(), 0.0, 1e-6);
    approx(rotation_of(&local[LOWER]).angle(), FRAC_PI_2, 1e-5);
    approx3(position(&local[ROOT]), Vector3::zeros(), 1e-6);

    inst.set_node_animation_state(ROOT, NodeState::empty(), None).unwrap();
    inst.animate_node_subtrees(false);
    approx3(position(&inst.local_transforms()[ROOT]), Vector3::new(0.0, 2.0, 0.0), 1e-6);
}

/// it should ignore keyed x entirely on a node with POS_X masked
#[test]
fn masked_axis_ignores_keyed_value() {
    for keyed_x in [1.0, 5.0] {
        let mut b = ShapeBuilder::new();
        b.add_node("n", None, UnitQuaternion::identity(), Vector3::new(7.0, 0.0, 0.0));
        let key = Vector3::new(keyed_x, 2.0, 3.0);
        b.add_sequence(SequenceBuilder::new("slide", 2, 1.0).translation_track(0, vec![key, key]));
        let mut inst = ShapeInstance::new(Arc::new(b.build().unwrap()), Config::default());
        inst.add_thread(0).unwrap();
        inst.set_node_animation_state(0, NodeState::POS_X, None).unwrap();
        inst.animate_node_subtrees(false);

        approx3(position(&inst.local_transforms()[0]), Vector3::new(7.0, 2.0, 3.0), 1e-6);
    }
}

/// it should leave hands-off nodes at their externally set local transform
#[test]
fn hands_off_keeps_external_transform() {
    let mut inst = instance("three-bone-arm");
    let th = inst.add_thread(0).unwrap();
    inst.set_pos(th, 1.0).unwrap();

    let pinned = compose(&UnitQuaternion::identity(), &Vector3::new(5.0, 0.0, 0.0));
    inst.set_node_animation_state(UPPER, NodeState::HANDS_OFF | NodeState::ROTATION, None)
        .unwrap();
    assert_eq!(
        inst.node_animation_state(UPPER).unwrap(),
        NodeState::HANDS_OFF | NodeState::BLEND
    );
    inst.set_node_local_transform(UPPER, pinned).unwrap();
    inst.animate_node_subtrees(false);

    approx_mat(&inst.local_transforms()[UPPER], &pinned, 0.0);
    let global = inst.global_transforms();
    approx_mat(&global[LOWER], &(global[UPPER] * inst.local_transforms()[LOWER]), 1e-6);
    approx(rotation_of(&inst.local_transforms()[LOWER]).angle(), FRAC_PI_2, 1e-5);
}

/// it should hand callbacks the default pose and use what they write
#[test]
fn callback_node_receives_default_pose() {
    let mut inst = instance("three-bone-arm");
    let th = inst.add_thread(0).unwrap();
    inst.set_pos(th, 1.0).unwrap();

    let seen: Arc<Mutex<Vec<Matrix4<f32>>>> = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let callback = move |node: usize, local: &mut Matrix4<f32>| {
        assert_eq!(node, LOWER);
        record.lock().unwrap().push(*local);
        local[(1, 3)] = 3.0;
    };
    inst.set_node_animation_state(LOWER, NodeState::empty(), Some(Box::new(callback) as Box<dyn NodeCallback>))
        .unwrap();
    assert!(inst.node_animation_state(LOWER).unwrap().contains(NodeState::CALLBACK));
    inst.animate_node_subtrees(false);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let default = compose(&UnitQuaternion::identity(), &Vector3::new(0.0, 1.0, 0.0));
    approx_mat(&seen[0], &default, 1e-6);
    approx3(position(&inst.local_transforms()[LOWER]), Vector3::new(0.0, 3.0, 0.0), 1e-6);
}

/// it should right-multiply blend threads onto the resolved pose
#[test]
fn blend_thread_composes_on_base() {
    let mut inst = instance("three-bone-arm");
    let bend = inst.add_thread(0).unwrap();
    let twist = inst.add_thread(2).unwrap();
    inst.set_pos(bend, 1.0).unwrap();
    inst.set_pos(twist, 1.0).unwrap();
    inst.animate_node_subtrees(false);

    // base threads sort ahead of blend threads regardless of insertion order
    assert!(!inst.threads()[0].blend);
    let twist_q = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 30f32.to_radians());
    let expected = quat_z(FRAC_PI_2) * twist_q;
    let got = rotation_of(&inst.local_transforms()[LOWER]);
    approx(got.angle_to(&expected), 0.0, 1e-4);
    approx3(position(&inst.local_transforms()[LOWER]), Vector3::new(0.0, 1.0, 0.0), 1e-6);
}

/// it should skip a blend thread when disabled or masked on the node
#[test]
fn blend_disabled_and_blend_mask() {
    let mut inst = instance("three-bone-arm");
    let bend = inst.add_thread(0).unwrap();
    let twist = inst.add_thread(2).unwrap();
    inst.set_pos(bend, 1.0).unwrap();
    inst.set_pos(twist, 1.0).unwrap();

    inst.set_blend_enabled(twist, false).unwrap();
    inst.animate_node_subtrees(false);
    approx(rotation_of(&inst.local_transforms()[LOWER]).angle_to(&quat_z(FRAC_PI_2)), 0.0, 1e-4);

    inst.set_blend_enabled(twist, true).unwrap();
    inst.set_node_animation_state(LOWER, NodeState::BLEND, None).unwrap();
    inst.animate_node_subtrees(false);
    approx(rotation_of(&inst.local_transforms()[LOWER]).angle_to(&quat_z(FRAC_PI_2)), 0.0, 1e-4);
}

/// it should keep per-node ranks aligned when a blend thread skips earlier nodes
#[test]
fn blend_ranks_survive_skipped_nodes() {
    let mut b = ShapeBuilder::new();
    let a = b.add_node("a", None, UnitQuaternion::identity(), Vector3::zeros());
    b.add_node("b", Some(a), UnitQuaternion::identity(), Vector3::zeros());
    b.add_sequence(
        SequenceBuilder::new("layer", 1, 1.0)
            .blend(true)
            .rotation_track(0, vec![quat_z(0.4)])
            .rotation_track(1, vec![quat_z(0.9)]),
    );
    let mut inst = ShapeInstance::new(Arc::new(b.build().unwrap()), Config::default());
    inst.add_thread(0).unwrap();
    inst.set_node_animation_state(0, NodeState::BLEND, None).unwrap();
    inst.animate_node_subtrees(false);

    approx(rotation_of(&inst.local_transforms()[0]).angle(), 0.0, 1e-6);
    approx(rotation_of(&inst.local_transforms()[1]).angle(), 0.9, 1e-5);
}

/// it should reject unknown threads, sequences, nodes and bad keyframes
#[test]
fn control_errors() {
    let mut inst = instance("three-bone-arm");
    assert!(inst.add_thread(42).is_err());
    let th = inst.add_thread(0).unwrap();
    assert!(inst.set_node_animation_state(7, NodeState::ROTATION, None).is_err());
    assert!(inst.set_keyframes(th, 0, 2, 0.5).is_err());

    inst.set_keyframes(th, 1, 1, 0.0).unwrap();
    inst.animate_node_subtrees(false);
    approx(rotation_of(&inst.local_transforms()[UPPER]).angle(), FRAC_PI_2, 1e-5);

    inst.destroy_thread(th).unwrap();
    assert!(inst.set_pos(th, 0.5).is_err());
    assert!(inst.destroy_thread(th).is_err());
}
