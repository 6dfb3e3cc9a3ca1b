//! Core configuration for vizij-skeleton-core.

use serde::{Deserialize, Serialize};

/// Configuration for a shape instance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Run the IK chains declared by the shape after the hierarchy multiply.
    pub ik_enabled: bool,

    /// Convergence and degeneracy thresholds for the IK solver.
    pub ik: IkTolerances,

    /// Initial capacity hint (in nodes) for scratch buffers.
    pub scratch_nodes: usize,
}

/// Epsilons used by the CCD solver. Squared quantities are compared where noted.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IkTolerances {
    /// Squared distance between target and destination (in link space) below
    /// which the whole solve stops.
    pub min_distance: f32,
    /// Step angles smaller than this are skipped.
    pub min_angle: f32,
    /// Squared rotation-axis length below which the axis is considered ambiguous.
    pub min_axis: f32,
    /// Hinge rotations smaller than this (after clamping) are skipped.
    pub min_rotation: f32,
}

impl Default for IkTolerances {
    fn default() -> Self {
        Self {
            min_distance: 0.0001,
            min_angle: 0.000_000_01,
            min_axis: 0.000_000_1,
            min_rotation: 0.000_01,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ik_enabled: true,
            ik: IkTolerances::default(),
            scratch_nodes: 128,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: Config = serde_json::from_str(r#"{ "ik_enabled": false }"#).unwrap();
        assert!(!cfg.ik_enabled);
        assert_eq!(cfg.ik, IkTolerances::default());
        assert_eq!(cfg.scratch_nodes, 128);
    }
}
