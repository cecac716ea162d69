//! The inverse kinematics contract shared by all solvers

extern crate nalgebra as na;

use na::{Isometry3, Point3, UnitQuaternion};

use crate::constraints::{Orientation, Position};
use crate::kinematic_tree::{JointId, KinematicTree};

/// Pose is a rigid transform: Cartesian position and rotation quaternion.
/// ```
/// extern crate nalgebra as na;
/// use na::{Isometry3, Translation3, UnitQuaternion, Vector3};
///
/// type Pose = Isometry3<f64>;
///
/// let translation = Translation3::new(1.0, 0.0, 0.0);
/// let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.5);
/// let transform = Pose::from_parts(translation, rotation);
/// ```
pub type Pose = Isometry3<f64>;

/// Kind of progress made by a single `step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// Goal was reached.
    Success,
    /// Moved closer, call again.
    Progress,
    /// Not able to progress due to joint limits.
    Limits,
    /// Not able to progress because the target is out of reach.
    Range,
}

impl StepResult {
    /// Only `Progress` asks the caller to keep stepping.
    pub fn is_terminal(&self) -> bool {
        *self != StepResult::Progress
    }
}

/// Analytical inverse kinematic solver. Solvers hold no per-call state: every call walks
/// the mobile ancestors of `joint` and mutates their q values in place.
///
/// `p_eff` and `ori_eff` are given in the link frame of `joint` (the frame after its own
/// q is applied). Targets are in world (root) coordinates. Priorities weight position
/// against orientation when both cannot be met; a priority of 0 means "don't care".
pub trait IKSolver {
    /// Brings the effector to a solution of the targets, or as close as limits allow.
    /// Returns true if the final configuration is within tolerance of the target.
    #[allow(clippy::too_many_arguments)]
    fn solve(
        &self,
        tree: &mut KinematicTree,
        joint: JointId,
        p_eff: &Point3<f64>,
        ori_eff: &UnitQuaternion<f64>,
        p_tgt: &Position,
        pos_pri: f64,
        ori_tgt: &Orientation,
        ori_pri: f64,
    ) -> bool;

    /// Moves the effector at most `p_dist` (and `ori_dist` radians) towards the targets.
    #[allow(clippy::too_many_arguments)]
    fn step(
        &self,
        tree: &mut KinematicTree,
        joint: JointId,
        p_eff: &Point3<f64>,
        ori_eff: &UnitQuaternion<f64>,
        p_tgt: &Position,
        p_dist: f64,
        pos_pri: f64,
        ori_tgt: &Orientation,
        ori_dist: f64,
        ori_pri: f64,
    ) -> StepResult;

    /// Solve for position only, the orientation is left as it comes out.
    fn solve_position(
        &self,
        tree: &mut KinematicTree,
        joint: JointId,
        p_eff: &Point3<f64>,
        p_tgt: &Position,
    ) -> bool {
        let current = Orientation::Rotation(tree.world_quaternion(joint));
        self.solve(tree, joint, p_eff, &UnitQuaternion::identity(), p_tgt, 1.0, &current, 0.0)
    }

    /// Solve for orientation only, holding the origin of `joint` where it currently is.
    fn solve_orientation(
        &self,
        tree: &mut KinematicTree,
        joint: JointId,
        ori_eff: &UnitQuaternion<f64>,
        ori_tgt: &Orientation,
    ) -> bool {
        let here = Position::Point(tree.world_position(joint));
        self.solve(tree, joint, &Point3::origin(), ori_eff, &here, 0.0, ori_tgt, 1.0)
    }

    /// Step for position only, moving at most `p_dist`.
    fn step_position(
        &self,
        tree: &mut KinematicTree,
        joint: JointId,
        p_eff: &Point3<f64>,
        p_tgt: &Position,
        p_dist: f64,
    ) -> StepResult {
        let current = Orientation::Rotation(tree.world_quaternion(joint));
        self.step(
            tree,
            joint,
            p_eff,
            &UnitQuaternion::identity(),
            p_tgt,
            p_dist,
            1.0,
            &current,
            0.0,
            0.0,
        )
    }

    /// Step for orientation only, rotating at most `ori_dist` radians.
    fn step_orientation(
        &self,
        tree: &mut KinematicTree,
        joint: JointId,
        ori_eff: &UnitQuaternion<f64>,
        ori_tgt: &Orientation,
        ori_dist: f64,
    ) -> StepResult {
        let here = Position::Point(tree.world_position(joint));
        self.step(
            tree,
            joint,
            &Point3::origin(),
            ori_eff,
            &here,
            0.0,
            0.0,
            ori_tgt,
            ori_dist,
            1.0,
        )
    }
}
