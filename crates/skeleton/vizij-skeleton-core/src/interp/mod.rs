//! Interpolation helpers.
//!
//! Keyframe pairs are blended with shortest-arc slerp for rotations and
//! endpoint-exact linear interpolation for translations and scales.

pub mod functions;

pub use functions::{lerp_f32, lerp_vec3, slerp_quat};
