//! Per-node animation control and per-sub-shape dirty flags.

use bitflags::bitflags;

use crate::node_set::NodeSet;

bitflags! {
    /// How threads may drive a node.
    pub struct NodeState: u32 {
        /// Rotation held at the default pose.
        const ROTATION = 1 << 0;
        /// Translation axes held at the default pose.
        const POS_X = 1 << 1;
        const POS_Y = 1 << 2;
        const POS_Z = 1 << 3;
        /// Blend threads skip the node.
        const BLEND = 1 << 4;
        /// The node keeps whatever local transform it already has.
        const HANDS_OFF = 1 << 5;
        /// A registered callback supplies the local transform.
        const CALLBACK = 1 << 6;

        const POS = Self::POS_X.bits | Self::POS_Y.bits | Self::POS_Z.bits;
        const MASKS = Self::ROTATION.bits | Self::POS.bits;
    }
}

bitflags! {
    /// Which parts of a sub-shape need re-evaluation.
    pub struct DirtyFlags: u32 {
        const TRANSFORM = 1 << 0;
        const VIS = 1 << 1;
        const FRAME = 1 << 2;
        const MAT_FRAME = 1 << 3;
        const THREAD = 1 << 4;
    }
}

/// Node sets derived from the per-node [`NodeState`]s of an instance.
#[derive(Clone, Debug, Default)]
pub struct NodeMasks {
    pub rotation: NodeSet,
    pub pos_x: NodeSet,
    pub pos_y: NodeSet,
    pub pos_z: NodeSet,
    pub disable_blend: NodeSet,
    pub hands_off: NodeSet,
    pub callback: NodeSet,
}

impl NodeMasks {
    /// Resolve the precedence rules for a requested state.
    ///
    /// Hands-off wins over everything, a callback replaces any masking, and
    /// both imply that blend threads leave the node alone.
    pub fn normalize(state: NodeState, has_callback: bool) -> NodeState {
        let mut state = state;
        state.set(NodeState::CALLBACK, has_callback);
        if state.contains(NodeState::HANDS_OFF) {
            NodeState::HANDS_OFF | NodeState::BLEND
        } else if state.contains(NodeState::CALLBACK) {
            NodeState::CALLBACK | NodeState::BLEND
        } else {
            state
        }
    }

    pub fn state(&self, node: usize) -> NodeState {
        let mut s = NodeState::empty();
        s.set(NodeState::ROTATION, self.rotation.test(node));
        s.set(NodeState::POS_X, self.pos_x.test(node));
        s.set(NodeState::POS_Y, self.pos_y.test(node));
        s.set(NodeState::POS_Z, self.pos_z.test(node));
        s.set(NodeState::BLEND, self.disable_blend.test(node));
        s.set(NodeState::HANDS_OFF, self.hands_off.test(node));
        s.set(NodeState::CALLBACK, self.callback.test(node));
        s
    }

    /// Store an already normalized state.
    pub fn apply(&mut self, node: usize, state: NodeState) {
        let put = |set: &mut NodeSet, on: bool| if on { set.set(node) } else { set.clear(node) };
        put(&mut self.rotation, state.contains(NodeState::ROTATION));
        put(&mut self.pos_x, state.contains(NodeState::POS_X));
        put(&mut self.pos_y, state.contains(NodeState::POS_Y));
        put(&mut self.pos_z, state.contains(NodeState::POS_Z));
        put(&mut self.disable_blend, state.contains(NodeState::BLEND));
        put(&mut self.hands_off, state.contains(NodeState::HANDS_OFF));
        put(&mut self.callback, state.contains(NodeState::CALLBACK));
    }

    /// Nodes with at least one masked translation axis.
    pub fn pos_any(&self) -> NodeSet {
        let mut s = self.pos_x.clone();
        s.union_with(&self.pos_y);
        s.union_with(&self.pos_z);
        s
    }

    /// Nodes that threads never write: hands-off or callback driven.
    pub fn externally_driven(&self) -> NodeSet {
        let mut s = self.hands_off.clone();
        s.union_with(&self.callback);
        s
    }
}
