#![allow(dead_code)]

use std::sync::Arc;

use nalgebra::{Matrix4, UnitQuaternion, Vector3};
use vizij_skeleton_core::{Config, Shape, ShapeBuilder, ShapeInstance};

pub fn load_rig(name: &str) -> Arc<Shape> {
    let builder: ShapeBuilder = vizij_test_fixtures::rigs::load(name).expect("load rig fixture");
    Arc::new(builder.build().expect("rig fixture should build"))
}

pub fn instance(name: &str) -> ShapeInstance {
    ShapeInstance::new(load_rig(name), Config::default())
}

pub fn approx(a: f32, b: f32, eps: f32) {
    assert!(
        (a - b).abs() <= eps,
        "approx failed: left={a} right={b} eps={eps}"
    );
}

pub fn approx3(a: Vector3<f32>, b: Vector3<f32>, eps: f32) {
    approx(a.x, b.x, eps);
    approx(a.y, b.y, eps);
    approx(a.z, b.z, eps);
}

pub fn approx_mat(a: &Matrix4<f32>, b: &Matrix4<f32>, eps: f32) {
    for (x, y) in a.iter().zip(b.iter()) {
        approx(*x, *y, eps);
    }
}

pub fn position(m: &Matrix4<f32>) -> Vector3<f32> {
    Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}

pub fn rotation_angle_between(a: &Matrix4<f32>, b: &Matrix4<f32>) -> f32 {
    let ra = vizij_skeleton_core::transform::rotation_of(a);
    let rb = vizij_skeleton_core::transform::rotation_of(b);
    ra.angle_to(&rb)
}

pub fn quat_z(angle: f32) -> UnitQuaternion<f32> {
    UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angle)
}
