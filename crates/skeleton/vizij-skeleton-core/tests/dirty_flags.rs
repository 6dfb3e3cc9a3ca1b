mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{approx, instance};
use nalgebra::{Matrix4, UnitQuaternion, Vector3};
use vizij_skeleton_core::transform::rotation_of;
use vizij_skeleton_core::{
    Config, DirtyFlags, NodeCallback, NodeState, SequenceBuilder, ShapeBuilder, ShapeInstance, SkeletonError,
    SubShape,
};

fn counting_callback(counter: &Arc<AtomicUsize>) -> Box<dyn NodeCallback> {
    let counter = Arc::clone(counter);
    Box::new(move |_node: usize, _local: &mut Matrix4<f32>| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

/// it should skip the node pass while the sub-shape is clean
#[test]
fn clean_sub_shape_is_not_reevaluated() {
    let mut inst = instance("three-bone-arm");
    let calls = Arc::new(AtomicUsize::new(0));
    inst.set_node_animation_state(2, NodeState::empty(), Some(counting_callback(&calls)))
        .unwrap();

    inst.animate(Some(0)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(inst.dirty_flags(0), Some(DirtyFlags::empty()));

    inst.animate(Some(0)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    inst.set_dirty(DirtyFlags::TRANSFORM);
    inst.animate(Some(0)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    inst.animate_subtrees(true).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// it should mark sub-shapes dirty when playback moves and not when it stands still
#[test]
fn advancing_time_dirties_transforms() {
    let mut inst = instance("three-bone-arm");
    inst.add_thread(0).unwrap();
    inst.animate_subtrees(false).unwrap();
    assert_eq!(inst.dirty_flags(0), Some(DirtyFlags::empty()));

    inst.advance_time(0.0);
    assert_eq!(inst.dirty_flags(0), Some(DirtyFlags::empty()));

    inst.advance_time(0.1);
    assert!(inst.dirty_flags(0).unwrap().contains(DirtyFlags::TRANSFORM));
    inst.animate_node_subtrees(false);
    assert!(!inst.dirty_flags(0).unwrap().contains(DirtyFlags::TRANSFORM));
    assert!(inst.dirty_flags(0).unwrap().contains(DirtyFlags::VIS));
}

fn two_part_rig() -> ShapeInstance {
    let mut b = ShapeBuilder::new();
    b.add_node("torso", None, UnitQuaternion::identity(), Vector3::zeros());
    b.add_node("prop", None, UnitQuaternion::identity(), Vector3::zeros());
    b.add_sub_shape(SubShape {
        first_node: 0,
        num_nodes: 1,
        ..Default::default()
    });
    b.add_sub_shape(SubShape {
        first_node: 1,
        num_nodes: 1,
        ..Default::default()
    });
    b.add_detail("billboard", None);
    b.add_detail("torso-hi", Some(0));
    b.add_detail("prop-hi", Some(1));
    let spin = |a: f32| UnitQuaternion::from_axis_angle(&Vector3::z_axis(), a);
    b.add_sequence(
        SequenceBuilder::new("spin", 1, 1.0)
            .rotation_track(0, vec![spin(0.5)])
            .rotation_track(1, vec![spin(0.7)]),
    );
    ShapeInstance::new(Arc::new(b.build().unwrap()), Config::default())
}

/// it should animate only the sub-shape behind the requested detail
#[test]
fn detail_selects_sub_shape() {
    let mut inst = two_part_rig();
    inst.add_thread(0).unwrap();

    inst.animate(Some(0)).unwrap();
    assert_eq!(inst.dirty_flags(0), Some(DirtyFlags::all()));

    inst.animate(Some(1)).unwrap();
    approx(rotation_of(&inst.local_transforms()[0]).angle(), 0.5, 1e-5);
    approx(rotation_of(&inst.local_transforms()[1]).angle(), 0.0, 1e-6);
    assert_eq!(inst.dirty_flags(0), Some(DirtyFlags::empty()));
    assert!(!inst.dirty_flags(1).unwrap().is_empty());

    inst.animate(Some(2)).unwrap();
    approx(rotation_of(&inst.local_transforms()[1]).angle(), 0.7, 1e-5);
    // the first pass is not undone by the second
    approx(rotation_of(&inst.local_transforms()[0]).angle(), 0.5, 1e-5);
}

/// it should treat no detail as a no-op and reject unknown details and sub-shapes
#[test]
fn detail_and_sub_shape_errors() {
    let mut inst = two_part_rig();
    assert_eq!(inst.animate(None), Ok(()));
    assert_eq!(inst.animate(Some(9)), Err(SkeletonError::DetailNotFound { index: 9 }));
    assert_eq!(
        inst.animate_sub_shape(5),
        Err(SkeletonError::SubShapeNotFound { index: 5 })
    );
    assert_eq!(inst.dirty_flags(5), None);
}

/// it should set, read and clear trigger states 1..=32
#[test]
fn trigger_states() {
    let mut inst = instance("three-bone-arm");
    inst.set_trigger_state(3, true).unwrap();
    assert_eq!(inst.trigger_state(3, false), Ok(true));
    assert_eq!(inst.trigger_state(3, true), Ok(true));
    assert_eq!(inst.trigger_state(3, false), Ok(false));

    inst.set_trigger_bits(0b101, true);
    assert_eq!(inst.trigger_state(1, false), Ok(true));
    assert_eq!(inst.trigger_state(2, false), Ok(false));
    assert_eq!(inst.trigger_state(3, false), Ok(true));
    inst.set_trigger_bits(0b001, false);
    assert_eq!(inst.trigger_state(1, false), Ok(false));

    inst.set_trigger_state(32, true).unwrap();
    assert_eq!(inst.trigger_state(32, true), Ok(true));
    assert_eq!(
        inst.set_trigger_state(0, true),
        Err(SkeletonError::TriggerStateOutOfRange { state: 0 })
    );
    assert!(inst.trigger_state(33, false).is_err());
}
