//! Error types for shape construction and instance control.
//!
//! The per-frame evaluator never returns errors; everything it indexes is
//! validated here, when the shape is built or a thread is configured.

use serde::{Deserialize, Serialize};

use crate::ids::ThreadId;
use crate::scale::ScaleMode;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SkeletonError {
    /// A node index does not exist in the shape.
    #[error("Node index {index} out of range (shape has {count} nodes)")]
    NodeOutOfRange { index: usize, count: usize },

    /// A mesh object index does not exist in the shape.
    #[error("Object index {index} out of range (shape has {count} objects)")]
    ObjectOutOfRange { index: usize, count: usize },

    /// A morph target index does not exist in the shape.
    #[error("Morph index {index} out of range (shape has {count} morph targets)")]
    MorphOutOfRange { index: usize, count: usize },

    /// Nodes must be ordered so that every parent precedes its children.
    #[error("Node {node} has parent {parent}, parents must precede children")]
    ParentAfterChild { node: usize, parent: usize },

    /// A track holds a different number of keys than its sequence declares.
    #[error("Sequence '{sequence}' expects {expected} keyframes, track has {actual}")]
    KeyframeCountMismatch {
        sequence: String,
        expected: usize,
        actual: usize,
    },

    /// A keyframe index past the end of its sequence.
    #[error("Sequence '{sequence}' has {count} keyframes, key {key} requested")]
    KeyframeOutOfRange {
        sequence: String,
        key: usize,
        count: usize,
    },

    /// A sequence must have at least one keyframe.
    #[error("Sequence '{sequence}' has no keyframes")]
    EmptySequence { sequence: String },

    /// Every scale track within one sequence must use the same mode.
    #[error("Sequence '{sequence}' mixes {first:?} and {second:?} scale tracks")]
    ScaleModeConflict {
        sequence: String,
        first: ScaleMode,
        second: ScaleMode,
    },

    /// Sub-shape node/object ranges must tile the shape.
    #[error("Sub-shape {index} is invalid: {reason}")]
    SubShapeInvalid { index: usize, reason: String },

    #[error("Sub-shape {index} not found")]
    SubShapeNotFound { index: usize },

    #[error("Detail {index} not found")]
    DetailNotFound { index: usize },

    #[error("IK chain {index} is invalid: {reason}")]
    IkChainInvalid { index: usize, reason: String },

    #[error("Sequence not found: {index}")]
    SequenceNotFound { index: usize },

    #[error("Thread not found: {id:?}")]
    ThreadNotFound { id: ThreadId },

    #[error("Invalid duration: {duration}")]
    InvalidDuration { duration: f32 },

    /// Trigger states are numbered 1..=32.
    #[error("Trigger state {state} out of range (1..=32)")]
    TriggerStateOutOfRange { state: u32 },
}

impl SkeletonError {
    /// Coarse category used when reporting errors upstream.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::NodeOutOfRange { .. }
            | Self::ObjectOutOfRange { .. }
            | Self::MorphOutOfRange { .. }
            | Self::ParentAfterChild { .. }
            | Self::SubShapeInvalid { .. }
            | Self::IkChainInvalid { .. } => "shape",
            Self::KeyframeCountMismatch { .. }
            | Self::KeyframeOutOfRange { .. }
            | Self::EmptySequence { .. }
            | Self::ScaleModeConflict { .. } => "sequence",
            Self::SubShapeNotFound { .. }
            | Self::DetailNotFound { .. }
            | Self::SequenceNotFound { .. }
            | Self::ThreadNotFound { .. } => "lookup",
            Self::InvalidDuration { .. } | Self::TriggerStateOutOfRange { .. } => "validation",
        }
    }
}

/// Result type used across the crate.
pub type Result<T> = core::result::Result<T, SkeletonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        let e = SkeletonError::NodeOutOfRange { index: 4, count: 2 };
        assert_eq!(e.category(), "shape");
        let e = SkeletonError::ThreadNotFound { id: ThreadId(3) };
        assert_eq!(e.category(), "lookup");
    }

    #[test]
    fn display_and_json() {
        let e = SkeletonError::KeyframeCountMismatch {
            sequence: "walk".into(),
            expected: 4,
            actual: 3,
        };
        assert_eq!(
            e.to_string(),
            "Sequence 'walk' expects 4 keyframes, track has 3"
        );
        let s = serde_json::to_string(&e).unwrap();
        let back: SkeletonError = serde_json::from_str(&s).unwrap();
        assert_eq!(e, back);
    }
}
