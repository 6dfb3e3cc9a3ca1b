//! Interpolation helpers:
//! - lerp_f32 / lerp_vec3 (endpoint-exact linear blend)
//! - slerp_quat (shortest-arc spherical blend, linear fallback for tiny arcs)

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// Below this `1 - cos(omega)` the arc is treated as straight.
const SLERP_LINEAR_EPS: f32 = 0.000_01;

/// Linear interpolation of scalars. `t = 0` returns `a` and `t = 1` returns `b` exactly.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

#[inline]
pub fn lerp_vec3(a: &Vector3<f32>, b: &Vector3<f32>, t: f32) -> Vector3<f32> {
    a * (1.0 - t) + b * t
}

/// Spherical interpolation with shortest-arc correction.
/// If dot < 0, the second quaternion is negated so the blend takes the short way.
#[inline]
pub fn slerp_quat(a: &UnitQuaternion<f32>, b: &UnitQuaternion<f32>, t: f32) -> UnitQuaternion<f32> {
    if t <= 0.0 {
        return *a;
    }
    if t >= 1.0 {
        return *b;
    }
    let qa = a.as_ref().coords;
    let qb = b.as_ref().coords;
    let mut cos_omega = qa.dot(&qb);
    let sign = if cos_omega < 0.0 {
        cos_omega = -cos_omega;
        -1.0
    } else {
        1.0
    };
    let (s1, s2) = if 1.0 - cos_omega > SLERP_LINEAR_EPS {
        let omega = cos_omega.min(1.0).acos();
        let sin_omega = omega.sin();
        (
            ((1.0 - t) * omega).sin() / sin_omega,
            (t * omega).sin() / sin_omega,
        )
    } else {
        (1.0 - t, t)
    };
    let blended = qa * s1 + qb * (s2 * sign);
    UnitQuaternion::new_normalize(Quaternion::from_vector(blended))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn lerp_endpoints_are_exact() {
        let a = Vector3::new(0.1, -3.7, 1e6);
        let b = Vector3::new(7.3, 0.3, -2.5);
        assert_eq!(lerp_vec3(&a, &b, 0.0), a);
        assert_eq!(lerp_vec3(&a, &b, 1.0), b);
        assert_eq!(lerp_f32(0.3, 0.9, 1.0), 0.9);
    }

    #[test]
    fn slerp_identity_and_endpoints() {
        let q1 = UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1);
        let q2 = UnitQuaternion::from_euler_angles(-1.0, 0.5, 0.1);
        for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let q = slerp_quat(&q1, &q1, t);
            assert_relative_eq!(q.angle_to(&q1), 0.0, epsilon = 1e-3);
        }
        assert_eq!(slerp_quat(&q1, &q2, 0.0), q1);
        assert_eq!(slerp_quat(&q1, &q2, 1.0), q2);
    }

    #[test]
    fn slerp_halfway_about_axis() {
        let id = UnitQuaternion::identity();
        let quarter = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let half = slerp_quat(&id, &quarter, 0.5);
        assert_relative_eq!(half.angle(), FRAC_PI_2 * 0.5, epsilon = 1e-5);
    }

    #[test]
    fn slerp_takes_short_arc() {
        let a = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.2);
        let b_neg = UnitQuaternion::new_unchecked(-UnitQuaternion::from_axis_angle(
            &Vector3::y_axis(),
            0.4,
        )
        .into_inner());
        let mid = slerp_quat(&a, &b_neg, 0.5);
        let expected = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.3);
        assert_relative_eq!(mid.angle_to(&expected), 0.0, epsilon = 1e-4);
    }
}
