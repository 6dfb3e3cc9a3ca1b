#![allow(dead_code)]
//! Vizij Skeleton Core (engine-agnostic)
//!
//! Skeletal pose evaluation: playback threads over shared keyframe sequences
//! are combined per sub-shape into local and global node transforms, with
//! blend layers, per-node masks and callbacks, cross-fade transitions, three
//! scale modes and a CCD IK pass. Mesh object state and morph weights are
//! animated alongside.

pub mod builder;
pub mod callback;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod ids;
pub mod ik;
pub mod instance;
pub mod interp;
pub mod node_set;
pub mod node_state;
pub mod objects;
pub mod scale;
pub mod scratch;
pub mod sequence;
pub mod shape;
pub mod thread;
pub mod transform;
pub mod transition;

// Re-exports for consumers (adapters)
pub use builder::{ObjectTrack, SequenceBuilder, ShapeBuilder};
pub use callback::{NodeCallback, NodeCallbackEntry};
pub use config::{Config, IkTolerances};
pub use error::{Result, SkeletonError};
pub use evaluator::{animate_nodes, multiply_hierarchy, sort_threads, NodeOutputs, NodePass};
pub use ids::ThreadId;
pub use ik::IkStats;
pub use instance::ShapeInstance;
pub use node_set::NodeSet;
pub use node_state::{DirtyFlags, NodeMasks, NodeState};
pub use scale::{ArbitraryScale, ScaleMode, ScaleValue};
pub use scratch::Scratch;
pub use sequence::Sequence;
pub use shape::{Detail, IkChain, MeshObject, Node, ObjectState, Shape, SubShape};
pub use thread::{Thread, TransitionData};
pub use transition::{LocalPose, TransitionState};
