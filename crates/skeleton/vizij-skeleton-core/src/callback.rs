//! Externally driven nodes.

use nalgebra::Matrix4;

/// Supplies the local transform of a callback node.
///
/// Invoked once per node pass, after the base pose is composed and before
/// blend threads run. `local` holds the default pose on entry.
pub trait NodeCallback {
    fn set_node_transform(&mut self, node: usize, local: &mut Matrix4<f32>);
}

impl<F> NodeCallback for F
where
    F: FnMut(usize, &mut Matrix4<f32>),
{
    fn set_node_transform(&mut self, node: usize, local: &mut Matrix4<f32>) {
        self(node, local)
    }
}

/// Registered callback for one node.
pub struct NodeCallbackEntry {
    pub node: usize,
    pub callback: Box<dyn NodeCallback>,
}

impl std::fmt::Debug for NodeCallbackEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeCallbackEntry").field("node", &self.node).finish_non_exhaustive()
    }
}
