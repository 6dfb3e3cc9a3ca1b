//! Scale composition.
//!
//! A shape animates scale in one mode (the widest mode any of its sequences
//! uses). Sequences sampled in a narrower mode are upgraded into the shape's
//! mode before they are stored in scratch or applied to a matrix.

use nalgebra::{Matrix3, Matrix4, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::interp::{lerp_f32, lerp_vec3, slerp_quat};

/// Scale representation, ordered from narrowest to widest.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    Uniform,
    Aligned,
    Arbitrary,
}

/// Per-axis factors expressed in a rotated scale frame.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArbitraryScale {
    pub factors: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl ArbitraryScale {
    pub fn identity() -> Self {
        Self {
            factors: Vector3::repeat(1.0),
            rotation: UnitQuaternion::identity(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum ScaleValue {
    Uniform(f32),
    Aligned(Vector3<f32>),
    Arbitrary(ArbitraryScale),
}

impl ScaleValue {
    /// Unit scale in `mode`.
    pub fn identity(mode: ScaleMode) -> Self {
        match mode {
            ScaleMode::Uniform => ScaleValue::Uniform(1.0),
            ScaleMode::Aligned => ScaleValue::Aligned(Vector3::repeat(1.0)),
            ScaleMode::Arbitrary => ScaleValue::Arbitrary(ArbitraryScale::identity()),
        }
    }

    pub fn mode(&self) -> ScaleMode {
        match self {
            ScaleValue::Uniform(_) => ScaleMode::Uniform,
            ScaleValue::Aligned(_) => ScaleMode::Aligned,
            ScaleValue::Arbitrary(_) => ScaleMode::Arbitrary,
        }
    }

    /// Re-express this value in `mode`.
    ///
    /// Widening is lossless (scalar to diagonal to rotated-diagonal with identity
    /// rotation). Narrowing drops the scale rotation, then keeps only the x factor.
    pub fn convert(self, mode: ScaleMode) -> ScaleValue {
        match (self, mode) {
            (ScaleValue::Uniform(s), ScaleMode::Uniform) => ScaleValue::Uniform(s),
            (ScaleValue::Uniform(s), ScaleMode::Aligned) => ScaleValue::Aligned(Vector3::repeat(s)),
            (ScaleValue::Uniform(s), ScaleMode::Arbitrary) => ScaleValue::Arbitrary(ArbitraryScale {
                factors: Vector3::repeat(s),
                rotation: UnitQuaternion::identity(),
            }),
            (ScaleValue::Aligned(v), ScaleMode::Uniform) => ScaleValue::Uniform(v.x),
            (ScaleValue::Aligned(v), ScaleMode::Aligned) => ScaleValue::Aligned(v),
            (ScaleValue::Aligned(v), ScaleMode::Arbitrary) => ScaleValue::Arbitrary(ArbitraryScale {
                factors: v,
                rotation: UnitQuaternion::identity(),
            }),
            (ScaleValue::Arbitrary(a), ScaleMode::Uniform) => ScaleValue::Uniform(a.factors.x),
            (ScaleValue::Arbitrary(a), ScaleMode::Aligned) => ScaleValue::Aligned(a.factors),
            (ScaleValue::Arbitrary(a), ScaleMode::Arbitrary) => ScaleValue::Arbitrary(a),
        }
    }

    /// Interpolate two samples. Both sides are brought to the wider of the two modes first.
    pub fn interpolate(a: ScaleValue, b: ScaleValue, t: f32) -> ScaleValue {
        let mode = a.mode().max(b.mode());
        match (a.convert(mode), b.convert(mode)) {
            (ScaleValue::Uniform(x), ScaleValue::Uniform(y)) => ScaleValue::Uniform(lerp_f32(x, y, t)),
            (ScaleValue::Aligned(x), ScaleValue::Aligned(y)) => ScaleValue::Aligned(lerp_vec3(&x, &y, t)),
            (ScaleValue::Arbitrary(x), ScaleValue::Arbitrary(y)) => ScaleValue::Arbitrary(ArbitraryScale {
                factors: lerp_vec3(&x.factors, &y.factors, t),
                rotation: slerp_quat(&x.rotation, &y.rotation, t),
            }),
            // convert() to a shared mode always yields matching variants
            (x, _) => x,
        }
    }

    /// 3x3 linear scale matrix.
    pub fn to_matrix3(&self) -> Matrix3<f32> {
        match self {
            ScaleValue::Uniform(s) => Matrix3::from_diagonal_element(*s),
            ScaleValue::Aligned(v) => Matrix3::from_diagonal(v),
            ScaleValue::Arbitrary(a) => {
                let r = a.rotation.to_rotation_matrix().into_inner();
                r * Matrix3::from_diagonal(&a.factors) * r.transpose()
            }
        }
    }

    /// Right-multiply the scale into a composed rotation+translation matrix.
    pub fn apply(&self, m: &mut Matrix4<f32>) {
        let s = self.to_matrix3().to_homogeneous();
        *m *= s;
    }

    /// Scale factors with any scale rotation discarded.
    pub fn factors(&self) -> Vector3<f32> {
        match self {
            ScaleValue::Uniform(s) => Vector3::repeat(*s),
            ScaleValue::Aligned(v) => *v,
            ScaleValue::Arbitrary(a) => a.factors,
        }
    }
}

impl Default for ScaleValue {
    fn default() -> Self {
        ScaleValue::Uniform(1.0)
    }
}

/// Extract the scale of `m` (column lengths) in `mode`.
///
/// Only the rotation-free part of the scale is recoverable; an arbitrary
/// scale comes back with identity scale rotation.
pub fn scale_of(m: &Matrix4<f32>, mode: ScaleMode) -> ScaleValue {
    let v = Vector3::new(
        m.fixed_view::<3, 1>(0, 0).norm(),
        m.fixed_view::<3, 1>(0, 1).norm(),
        m.fixed_view::<3, 1>(0, 2).norm(),
    );
    ScaleValue::Aligned(v).convert(mode)
}
