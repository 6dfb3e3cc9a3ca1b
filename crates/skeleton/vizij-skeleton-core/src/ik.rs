//! Cyclic coordinate descent over one IK chain.
//!
//! Each iteration walks the links tip to root and rotates each link so that,
//! seen from the link, the end effector points further toward the goal.
//! Steps are clamped to `max_angle`. Hinge links (see
//! `Shape::limit_angle_x`) only turn about their local x axis.
//!
//! The solver is greedy and gives no convergence guarantee.

use nalgebra::{Matrix4, UnitQuaternion, Unit, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::IkTolerances;
use crate::node_set::NodeSet;
use crate::shape::{IkChain, Node};
use crate::transform::{affine_inverse, position, rotation_of, transform_point, with_rotation};

/// Outcome of one chain solve.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IkStats {
    pub chain: usize,
    pub iterations: u32,
    pub links_rotated: u32,
    /// Largest single-step rotation applied to any link, radians.
    pub max_step_angle: f32,
    /// Stopped because the effector reached the goal.
    pub converged: bool,
}

#[inline]
fn remultiply(nodes: &[Node], node: usize, locals: &[Matrix4<f32>], globals: &mut [Matrix4<f32>]) {
    globals[node] = match nodes[node].parent {
        Some(p) => globals[p] * locals[node],
        None => locals[node],
    };
}

/// Solve `chain` in place. Only the links' local rotations change; the
/// target's local rotation is restored before returning.
pub fn solve_chain(
    index: usize,
    chain: &IkChain,
    nodes: &[Node],
    limit_angle_x: &NodeSet,
    tol: &IkTolerances,
    locals: &mut [Matrix4<f32>],
    globals: &mut [Matrix4<f32>],
) -> IkStats {
    let mut stats = IkStats {
        chain: index,
        ..Default::default()
    };
    let dest = position(&globals[chain.dest]);
    let target_rotation = rotation_of(&locals[chain.target]);

    'solve: for iteration in 0..chain.max_iterations {
        stats.iterations = iteration + 1;
        for (k, &link) in chain.links.iter().enumerate() {
            let effector = position(&globals[chain.target]);
            let to_link = affine_inverse(&globals[link]);
            let local_dest = transform_point(&to_link, &dest);
            let local_target = transform_point(&to_link, &effector);

            if (local_target - local_dest).norm_squared() < tol.min_distance {
                stats.converged = true;
                break 'solve;
            }

            let (Some(d), Some(t)) = (
                local_dest.try_normalize(f32::EPSILON),
                local_target.try_normalize(f32::EPSILON),
            ) else {
                continue;
            };

            let dot = t.dot(&d);
            if dot > 1.0 {
                continue;
            }
            let mut angle = dot.max(-1.0).acos();
            if angle.abs() < tol.min_angle {
                continue;
            }
            angle = angle.min(chain.max_angle);

            let cross = t.cross(&d);
            let axis = if cross.norm_squared() < tol.min_axis {
                if iteration > 0 {
                    continue;
                }
                Vector3::x_axis()
            } else {
                Unit::new_normalize(cross)
            };

            let step = if limit_angle_x.test(link) {
                if iteration == 0 {
                    // go straight to the clamped angle about the hinge
                    let sign = if axis.x > 0.0 { 1.0 } else { -1.0 };
                    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), sign * angle)
                } else {
                    let (roll, _, _) = UnitQuaternion::from_axis_angle(&axis, angle).euler_angles();
                    let roll = roll.clamp(-chain.max_angle, chain.max_angle);
                    if roll.abs() < tol.min_rotation {
                        continue;
                    }
                    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), roll)
                }
            } else {
                UnitQuaternion::from_axis_angle(&axis, angle)
            };

            let rotation = rotation_of(&locals[link]) * step;
            locals[link] = with_rotation(&locals[link], &rotation);
            stats.links_rotated += 1;
            stats.max_step_angle = stats.max_step_angle.max(step.angle());

            for &moved in chain.links[..=k].iter().rev() {
                remultiply(nodes, moved, locals, globals);
            }
            remultiply(nodes, chain.target, locals, globals);
        }
    }

    locals[chain.target] = with_rotation(&locals[chain.target], &target_rotation);
    remultiply(nodes, chain.target, locals, globals);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::compose;

    fn node(parent: Option<usize>) -> Node {
        Node {
            name: String::new(),
            parent,
            default_rotation: UnitQuaternion::identity(),
            default_translation: Vector3::zeros(),
        }
    }

    #[test]
    fn single_link_turns_toward_goal() {
        // 0: root link at origin, 1: effector one unit along x, 2: goal on y
        let nodes = vec![node(None), node(Some(0)), node(None)];
        let mut locals = vec![
            Matrix4::identity(),
            compose(&UnitQuaternion::identity(), &Vector3::x()),
            compose(&UnitQuaternion::identity(), &Vector3::y()),
        ];
        let mut globals = locals.clone();
        let chain = IkChain {
            dest: 2,
            target: 1,
            links: vec![0],
            max_iterations: 4,
            max_angle: std::f32::consts::PI,
        };
        let stats = solve_chain(0, &chain, &nodes, &NodeSet::new(), &IkTolerances::default(), &mut locals, &mut globals);
        assert!(stats.links_rotated >= 1);
        let p = position(&globals[1]);
        assert!((p - Vector3::y()).norm() < 1e-3, "effector at {p:?}");
    }
}
