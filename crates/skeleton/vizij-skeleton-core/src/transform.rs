//! Affine helpers over `Matrix4<f32>`.
//!
//! Matrices use column vectors: `global = parent * local`, and a local
//! transform is `T * R` (scale, when present, is applied on the right).

use nalgebra::{Isometry3, Matrix3, Matrix4, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};

/// Build `T * R` from a rotation and a translation.
#[inline]
pub fn compose(rotation: &UnitQuaternion<f32>, translation: &Vector3<f32>) -> Matrix4<f32> {
    Isometry3::from_parts(Translation3::from(*translation), *rotation).to_homogeneous()
}

#[inline]
pub fn position(m: &Matrix4<f32>) -> Vector3<f32> {
    Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}

#[inline]
pub fn set_position(m: &mut Matrix4<f32>, p: &Vector3<f32>) {
    m[(0, 3)] = p.x;
    m[(1, 3)] = p.y;
    m[(2, 3)] = p.z;
}

/// Rotation part of an affine matrix. Column lengths (scale) are divided out first.
pub fn rotation_of(m: &Matrix4<f32>) -> UnitQuaternion<f32> {
    let mut r: Matrix3<f32> = m.fixed_view::<3, 3>(0, 0).into_owned();
    for mut col in r.column_iter_mut() {
        let n = col.norm();
        if n > f32::EPSILON {
            col /= n;
        }
    }
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r))
}

/// Replace the upper 3x3 with `rotation`, keeping the translation column.
pub fn with_rotation(m: &Matrix4<f32>, rotation: &UnitQuaternion<f32>) -> Matrix4<f32> {
    compose(rotation, &position(m))
}

#[inline]
pub fn transform_point(m: &Matrix4<f32>, p: &Vector3<f32>) -> Vector3<f32> {
    m.transform_point(&Point3::from(*p)).coords
}

/// General inverse; a singular matrix inverts to identity.
pub fn affine_inverse(m: &Matrix4<f32>) -> Matrix4<f32> {
    m.try_inverse().unwrap_or_else(Matrix4::identity)
}
