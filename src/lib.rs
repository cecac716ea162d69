//! Kinematic trees of Denavit-Hartenberg joints with analytical inverse kinematics for short
//! chains: legs, pan/tilt rigs and coplanar arms.
//!
//! Each joint carries four DH parameters (`d`, `θ`, `r`, `α`), an actuation value `q` with
//! limits, and optional mass and collision data. Joints form a tree: a joint's link frame is
//! its parent's link frame composed with its own DH transform, so moving one joint moves
//! everything below it.
//!
//! # Features
//!
//! - Forward kinematics between any two joints of a tree, through their lowest common ancestor.
//! - `IKThreeLink`, a closed form solver for up to three mobile joints (revolute or prismatic)
//!   above an effector. It handles yaw/pitch/knee legs, pan/tilt/zoom heads and planar arms,
//!   retries the other knee solution when a joint limit is hit and reports whether the target
//!   was out of reach or blocked by limits.
//! - `PlanarThreeLinkArm`, for three parallel revolute joints, with a preferred heading of the
//!   last link that is relaxed in 10° steps when the joint limits do not allow it.
//! - Position targets may be points, lines or planes; orientation targets full rotations,
//!   parallel axes or cones.
//! - Incremental `step` calls for moving towards a target at bounded speed.
//! - Jacobian, joint velocities and torques of the mobile chain above an effector.
//! - Mass aggregation, bounding boxes and actuator cross-reference helpers.
//! - Reading and writing chains as YAML (`allow_filesystem` feature).
//!
//! # Example
//!
//! ```
//! use nalgebra::Point3;
//! use rs_dh_kinematics::constraints::Position;
//! use rs_dh_kinematics::kinematic_joint::KinematicJoint;
//! use rs_dh_kinematics::kinematic_traits::IKSolver;
//! use rs_dh_kinematics::kinematic_tree::KinematicTree;
//!
//! let mut tree = KinematicTree::new();
//! let shoulder = tree.insert(KinematicJoint::revolute("shoulder"));
//! let elbow = tree.add_child(shoulder, KinematicJoint::revolute("elbow").with_dh(0.0, 0.0, 100.0, 0.0))?;
//! let hand = tree.add_child(elbow, KinematicJoint::fixed("hand").with_dh(0.0, 0.0, 80.0, 0.0))?;
//!
//! let solver = tree.get_ik(hand)?;
//! assert!(solver.solve_position(&mut tree, hand, &Point3::origin(), &Position::point(120.0, 50.0, 0.0)));
//! # Ok::<(), rs_dh_kinematics::errors::KinematicsError>(())
//! ```

pub mod errors;
pub mod events;

#[path = "utils/utils.rs"]
pub mod utils;

pub mod kinematic_traits;
pub mod constraints;
pub mod link_component;
pub mod kinematic_joint;
pub mod kinematic_tree;

pub mod jacobian;

pub mod ik_three_link;
pub mod planar_three_link_arm;
pub mod solver_registry;

#[cfg(feature = "allow_filesystem")]
pub mod chain_from_file;

#[cfg(test)]
mod tests;
