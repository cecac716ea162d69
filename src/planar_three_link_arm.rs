//! Closed form inverse kinematics for a coplanar arm of three revolute joints.
//!
//! Shoulder, elbow and wrist rotate about parallel axes, so the problem reduces to a planar
//! two link law of cosines solution plus a wrist correction for the third link and the
//! desired heading `phi` of that link.

use std::f64::consts::PI;
use std::fmt;

use nalgebra::{Point3, UnitQuaternion, Vector2, Vector3};
use tracing::debug;

use crate::constraints::{Orientation, Position};
use crate::errors::KinematicsError;
use crate::ik_three_link::EPSILON;
use crate::kinematic_joint::JointType;
use crate::kinematic_traits::{IKSolver, StepResult};
use crate::kinematic_tree::{JointId, KinematicTree};
pub use crate::utils::{ang_dist, ang_norm};

/// Heading is relaxed in steps of this size when the requested one is infeasible.
const RELAX_STEP: f64 = 10.0 * PI / 180.0;
/// Relaxation gives up after this many steps to either side, i.e. at ±180°.
const RELAX_STEPS: usize = 18;

const SOLVER_NAME: &str = "PlanarThreeLinkArm";

/// Up to two candidate configurations `[shoulder, elbow, wrist]`.
///
/// Only the first `count` rows are meaningful. When exactly one candidate survives limit
/// checking, it is moved to row 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarSolutions {
    pub angles: [[f64; 3]; 2],
    pub count: usize,
    pub valid: bool,
}

impl PlanarSolutions {
    fn none() -> Self {
        PlanarSolutions { angles: [[0.0; 3]; 2], count: 0, valid: false }
    }

    /// Row 0, the configuration the solver applies.
    pub fn first(&self) -> Option<[f64; 3]> {
        (self.count > 0).then_some(self.angles[0])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanarThreeLinkArm {
    lengths: [f64; 3],
    /// `[min, max]` per joint, in planar angles.
    limits: [[f64; 2]; 3],
    /// Planar angle minus q, per joint.
    offsets: [f64; 3],
}

fn unsupported(reason: String) -> KinematicsError {
    KinematicsError::UnsupportedChain { solver: SOLVER_NAME.to_string(), reason }
}

impl PlanarThreeLinkArm {
    /// Arm with the given link lengths and `[min, max]` joint limits. Planar angles are the
    /// joint q values. L1 and L2 must not be zero, L3 may be.
    pub fn new(lengths: [f64; 3], limits: [[f64; 2]; 3]) -> Result<Self, KinematicsError> {
        check_lengths(&lengths)?;
        Ok(PlanarThreeLinkArm { lengths, limits, offsets: [0.0; 3] })
    }

    /// Arm ending at `effector`, whose parent, grandparent and great-grandparent are wrist,
    /// elbow and shoulder. The link lengths are the `r` of elbow, wrist and effector.
    pub fn from_effector(tree: &KinematicTree, effector: JointId) -> Result<Self, KinematicsError> {
        if !tree.contains(effector) {
            return Err(KinematicsError::InvalidJoint(effector));
        }
        let [shoulder, elbow, wrist] = arm_joints(tree, effector)?;
        Self::from_joints(tree, [shoulder, elbow, wrist], [elbow, wrist, effector])
    }

    /// Arm whose joints are `[shoulder, elbow, wrist]`. Each link length is the `r` of the
    /// joint's first branch.
    pub fn from_base_joints(tree: &KinematicTree, joints: [JointId; 3]) -> Result<Self, KinematicsError> {
        let mut next = [joints[0]; 3];
        for (slot, joint) in next.iter_mut().zip(joints) {
            if !tree.contains(joint) {
                return Err(KinematicsError::InvalidJoint(joint));
            }
            *slot = tree
                .next_joint(joint)
                .ok_or_else(|| unsupported(format!("joint {} has no link after it", tree.joint(joint).name)))?;
        }
        Self::from_joints(tree, joints, next)
    }

    fn from_joints(tree: &KinematicTree, joints: [JointId; 3], next: [JointId; 3]) -> Result<Self, KinematicsError> {
        let mut arm = PlanarThreeLinkArm { lengths: [0.0; 3], limits: [[0.0; 2]; 3], offsets: [0.0; 3] };
        for i in 0..3 {
            let joint = tree.joint(joints[i]);
            let link = tree.joint(next[i]);
            if joint.joint_type() != JointType::Revolute {
                return Err(unsupported(format!("joint {} is not revolute", joint.name)));
            }
            // The effector's own alpha tilts only its frame, not the plane of the arm
            if i < 2 && link.alpha().abs() > EPSILON {
                return Err(unsupported(format!("joint {} does not rotate in the arm plane", link.name)));
            }
            let offset = joint.q_offset() + link.theta();
            arm.lengths[i] = link.r();
            arm.offsets[i] = offset;
            arm.limits[i] = [joint.qmin() + offset, joint.qmax() + offset];
        }
        check_lengths(&arm.lengths)?;
        Ok(arm)
    }

    pub fn l1(&self) -> f64 {
        self.lengths[0]
    }

    pub fn l2(&self) -> f64 {
        self.lengths[1]
    }

    pub fn l3(&self) -> f64 {
        self.lengths[2]
    }

    pub fn limits(&self) -> &[[f64; 2]; 3] {
        &self.limits
    }

    pub fn set_l1(&mut self, length: f64, joint_max: f64, joint_min: f64) {
        self.set_link(0, length, joint_max, joint_min);
    }

    pub fn set_l2(&mut self, length: f64, joint_max: f64, joint_min: f64) {
        self.set_link(1, length, joint_max, joint_min);
    }

    pub fn set_l3(&mut self, length: f64, joint_max: f64, joint_min: f64) {
        self.set_link(2, length, joint_max, joint_min);
    }

    fn set_link(&mut self, index: usize, length: f64, joint_max: f64, joint_min: f64) {
        self.lengths[index] = length;
        self.limits[index] = [joint_min, joint_max];
    }

    /// Both solutions of the two link problem, rows `[q1, q2]`: elbow with negative sine
    /// first, positive second. The point must be within the reachable annulus.
    pub fn inv_kin_2link(&self, x: f64, y: f64, link1: f64, link2: f64) -> [[f64; 2]; 2] {
        let c2 = (x * x + y * y - link1 * link1 - link2 * link2) / (2.0 * link1 * link2);
        two_link_rows(x, y, link1, link2, c2)
    }

    /// Two link solutions for the arm's own L1 and L2, with the third joint at zero. For points
    /// outside the reachable annulus cos(q2) is clamped into [-1, 1], which gives the stretched
    /// or folded configuration aimed at the point. The point is not walked inwards until
    /// reachable, so both rows are then the same configuration.
    pub fn inv_kin_2link_at(&self, x: f64, y: f64) -> PlanarSolutions {
        let [l1, l2, _] = self.lengths;
        let c2 = ((x * x + y * y - l1 * l1 - l2 * l2) / (2.0 * l1 * l2)).clamp(-1.0, 1.0);
        let rows = two_link_rows(x, y, l1, l2, c2);
        PlanarSolutions {
            angles: [[rows[0][0], rows[0][1], 0.0], [rows[1][0], rows[1][1], 0.0]],
            count: 2,
            valid: true,
        }
    }

    /// Configurations putting the end of L3 at `(x, y)` with L3 pointing along `phi`,
    /// limit checked by [`Self::valid_angles`].
    pub fn inv_kin_3link(&self, x: f64, y: f64, phi: f64) -> PlanarSolutions {
        let [l1, l2, l3] = self.lengths;
        let p2x = x - l3 * phi.cos();
        let p2y = y - l3 * phi.sin();
        let c2 = (p2x * p2x + p2y * p2y - l1 * l1 - l2 * l2) / (2.0 * l1 * l2);
        if c2 * c2 > 1.0 {
            return PlanarSolutions::none();
        }
        let rows = self.inv_kin_2link(p2x, p2y, l1, l2);
        let mut solutions = PlanarSolutions { angles: [[0.0; 3]; 2], count: 2, valid: true };
        for (row, [q1, q2]) in solutions.angles.iter_mut().zip(rows) {
            let q1 = ang_norm(q1);
            *row = [q1, q2, ang_norm(phi - q1 - q2)];
        }
        self.valid_angles(solutions)
    }

    /// Like [`Self::inv_kin_3link`], but when `pref_phi` is infeasible the heading is moved in
    /// 10° steps to either side, up to 180°, until some configuration fits the limits.
    /// Targets beyond the total reach get [`Self::punt`]. When no heading is feasible there
    /// are no solutions at all and the arm is left where it is.
    pub fn inv_kin_3link_relax_phi(&self, x: f64, y: f64, pref_phi: f64) -> PlanarSolutions {
        if x.hypot(y) > self.lengths.iter().sum::<f64>() {
            return self.punt(x, y);
        }
        let solutions = self.inv_kin_3link(x, y, pref_phi);
        if solutions.valid {
            return solutions;
        }
        for i in 1..=RELAX_STEPS {
            let delta = i as f64 * RELAX_STEP;
            for phi in [pref_phi + delta, pref_phi - delta] {
                let solutions = self.inv_kin_3link(x, y, ang_norm(phi));
                if solutions.valid {
                    debug!("Relaxed heading {} to {}", pref_phi, ang_norm(phi));
                    return solutions;
                }
            }
        }
        debug!("No heading near {} fits the joint limits for ({}, {})", pref_phi, x, y);
        PlanarSolutions::none()
    }

    /// Solves for `(x, y)` shifted by `base_offset` rotated to `pref_phi`.
    pub fn solve_with_offset(&self, x: f64, y: f64, pref_phi: f64, base_offset: &Vector3<f64>) -> PlanarSolutions {
        let offset = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), pref_phi) * base_offset;
        self.inv_kin_3link(x + offset.x, y + offset.y, pref_phi)
    }

    /// Best effort for an unreachable target: shoulder aimed at it within its limits, the rest
    /// straight. Never valid.
    pub fn punt(&self, x: f64, y: f64) -> PlanarSolutions {
        let q1 = y.atan2(x).clamp(self.limits[0][0], self.limits[0][1]);
        PlanarSolutions { angles: [[q1, 0.0, 0.0], [0.0; 3]], count: 1, valid: false }
    }

    fn within_limits(&self, angles: &[f64; 3]) -> bool {
        angles
            .iter()
            .zip(&self.limits)
            .all(|(q, [min, max])| *min <= *q && *q <= *max)
    }

    /// Drops candidates with any joint outside its limits. When only the second candidate
    /// survives it moves to row 0. When both survive, their order is kept as is.
    pub fn valid_angles(&self, mut solutions: PlanarSolutions) -> PlanarSolutions {
        let rows = solutions.count.min(2);
        let valid: Vec<bool> = solutions.angles[..rows].iter().map(|row| self.within_limits(row)).collect();
        match valid.as_slice() {
            [true, true] => {
                solutions.count = 2;
                solutions.valid = true;
            }
            [true, false] | [true] => {
                solutions.count = 1;
                solutions.valid = true;
            }
            [false, true] => {
                solutions.angles.swap(0, 1);
                solutions.count = 1;
                solutions.valid = true;
            }
            _ => {
                solutions.count = 0;
                solutions.valid = false;
            }
        }
        solutions
    }

    /// The candidate whose elbow bends the same way as `elbow`, as a single solution.
    pub fn near_config(&self, solutions: &PlanarSolutions, elbow: f64, valid: bool) -> PlanarSolutions {
        let rows = solutions.count.min(2);
        match solutions.angles[..rows].iter().find(|row| row[1].signum() == elbow.signum()) {
            Some(row) => PlanarSolutions { angles: [*row, [0.0; 3]], count: 1, valid },
            None => PlanarSolutions::none(),
        }
    }

    /// Planar angles `[shoulder, elbow, wrist]` for joint values `q`.
    pub fn planar_angles(&self, q: [f64; 3]) -> [f64; 3] {
        [q[0] + self.offsets[0], q[1] + self.offsets[1], q[2] + self.offsets[2]]
    }

    /// End of L3 and its heading, for planar angles.
    pub fn forward(&self, angles: &[f64; 3]) -> (Vector2<f64>, f64) {
        let mut heading = 0.0;
        let mut p = Vector2::zeros();
        for (length, angle) in self.lengths.iter().zip(angles) {
            heading += angle;
            p += Vector2::new(heading.cos(), heading.sin()) * *length;
        }
        (p, heading)
    }

    /// Places the effector, returning the candidates found and the final residual.
    fn place(
        &self,
        tree: &mut KinematicTree,
        effector: JointId,
        p_eff: &Point3<f64>,
        target: &Point3<f64>,
        ori_tgt: &Orientation,
    ) -> Result<(PlanarSolutions, f64), KinematicsError> {
        let joints = arm_joints(tree, effector)?;
        let [shoulder, elbow, wrist] = joints;

        // Everything below happens in the shoulder frame at q = 0
        let to = tree.joint(shoulder).to();
        let base = match tree.parent(shoulder) {
            Some(parent) => tree.full_t(parent) * to,
            None => *to,
        };

        // Effector rotation apart from the arm heading
        let effector_joint = tree.joint(effector);
        let local = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -effector_joint.theta())
            * effector_joint.tq().rotation;

        let phi = match ori_tgt {
            Orientation::Rotation(world) => {
                let in_plane = base.rotation.inverse() * world * local.inverse();
                in_plane.euler_angles().2
            }
            _ => {
                let q = [tree.q(shoulder), tree.q(elbow), tree.q(wrist)];
                self.planar_angles(q).iter().sum()
            }
        };

        let heading = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), phi);
        let goal = base.inverse_transform_point(target) - heading * (local * p_eff.coords);
        let solutions = self.inv_kin_3link_relax_phi(goal.x, goal.y, phi);
        debug!("Planar arm target ({}, {}) phi {}: {:?}", goal.x, goal.y, phi, solutions);

        if let Some(angles) = solutions.first() {
            for (i, joint) in joints.iter().enumerate() {
                tree.try_q(*joint, angles[i] - self.offsets[i]);
            }
        }
        let residual = (tree.full_t(effector) * p_eff - target).norm();
        Ok((solutions, residual))
    }
}

fn check_lengths(lengths: &[f64; 3]) -> Result<(), KinematicsError> {
    if lengths[0].abs() < EPSILON || lengths[1].abs() < EPSILON {
        return Err(unsupported("upper arm and forearm need non-zero length".into()));
    }
    Ok(())
}

/// `[shoulder, elbow, wrist]` above the effector.
fn arm_joints(tree: &KinematicTree, effector: JointId) -> Result<[JointId; 3], KinematicsError> {
    let wrist = tree.parent(effector).ok_or_else(|| unsupported("effector has no wrist".into()))?;
    let elbow = tree.parent(wrist).ok_or_else(|| unsupported("wrist has no elbow".into()))?;
    let shoulder = tree.parent(elbow).ok_or_else(|| unsupported("elbow has no shoulder".into()))?;
    Ok([shoulder, elbow, wrist])
}

fn two_link_rows(x: f64, y: f64, link1: f64, link2: f64, c2: f64) -> [[f64; 2]; 2] {
    let s2 = (1.0 - c2 * c2).max(0.0).sqrt();
    let (s2_plus, s2_minus) = (-s2, s2);
    let k1 = link1 + link2 * c2;
    let bearing = y.atan2(x);
    [
        [bearing - (link2 * s2_plus).atan2(k1), s2_plus.atan2(c2)],
        [bearing - (link2 * s2_minus).atan2(k1), s2_minus.atan2(c2)],
    ]
}

impl fmt::Display for PlanarThreeLinkArm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "L1: {}\tL2: {}\tL3: {}", self.lengths[0], self.lengths[1], self.lengths[2])?;
        writeln!(f, "Shoulder joint limits:\t{}\t{}", self.limits[0][0], self.limits[0][1])?;
        writeln!(f, "Elbow joint limits:   \t{}\t{}", self.limits[1][0], self.limits[1][1])?;
        write!(f, "Wrist joint limits:   \t{}\t{}", self.limits[2][0], self.limits[2][1])
    }
}

impl IKSolver for PlanarThreeLinkArm {
    /// Only `Point` targets and, optionally, a `Rotation` for the heading are meaningful.
    /// Other position targets are reduced to their point nearest the current effector.
    fn solve(
        &self,
        tree: &mut KinematicTree,
        joint: JointId,
        p_eff: &Point3<f64>,
        _ori_eff: &UnitQuaternion<f64>,
        p_tgt: &Position,
        _pos_pri: f64,
        ori_tgt: &Orientation,
        _ori_pri: f64,
    ) -> bool {
        let t = tree.full_t(joint);
        let p_base = t * p_eff;
        let target = p_base + p_tgt.error_gradient(&p_base, &t.rotation);
        match self.place(tree, joint, p_eff, &target, ori_tgt) {
            Ok((solutions, residual)) => solutions.valid && residual <= EPSILON,
            Err(_) => false,
        }
    }

    fn step(
        &self,
        tree: &mut KinematicTree,
        joint: JointId,
        p_eff: &Point3<f64>,
        _ori_eff: &UnitQuaternion<f64>,
        p_tgt: &Position,
        p_dist: f64,
        _pos_pri: f64,
        ori_tgt: &Orientation,
        _ori_dist: f64,
        _ori_pri: f64,
    ) -> StepResult {
        let t = tree.full_t(joint);
        let p_base = t * p_eff;
        let mut de = p_tgt.error_gradient(&p_base, &t.rotation);

        let mut result = StepResult::Success;
        let distance = de.norm();
        if distance > p_dist {
            de *= p_dist / distance;
            result = StepResult::Progress;
        }
        let target = p_base + de;
        match self.place(tree, joint, p_eff, &target, ori_tgt) {
            Ok((solutions, residual)) if solutions.valid && residual <= EPSILON => result,
            Ok((solutions, _)) if solutions.valid => StepResult::Limits,
            // Within reach, but no heading fits the limits
            Ok((solutions, _)) if solutions.count == 0 => StepResult::Limits,
            // Punted
            _ => StepResult::Range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn arm() -> PlanarThreeLinkArm {
        PlanarThreeLinkArm::new([100.0, 80.0, 30.0], [[-PI, PI]; 3]).unwrap()
    }

    #[test]
    fn test_two_link_rows_reproduce_point() {
        let arm = arm();
        for [q1, q2] in arm.inv_kin_2link(120.0, 60.0, 100.0, 80.0) {
            let (p, _) = arm.forward(&[q1, q2, 0.0]);
            let x = p.x - 30.0 * (q1 + q2).cos();
            let y = p.y - 30.0 * (q1 + q2).sin();
            assert!((x - 120.0).abs() < 1e-6 && (y - 60.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_two_link_clamps_unreachable() {
        let arm = arm();
        let solutions = arm.inv_kin_2link_at(500.0, 0.0);
        // Stretched out towards the point
        assert!(solutions.angles[0][0].abs() < 1e-9);
        assert!(solutions.angles[0][1].abs() < 1e-9);
    }

    #[test]
    fn test_punt_is_clamped_and_invalid() {
        let arm = PlanarThreeLinkArm::new([100.0, 80.0, 30.0], [[-0.5, 0.5], [-PI, PI], [-PI, PI]]).unwrap();
        let punt = arm.punt(0.0, 300.0);
        assert_eq!(punt.angles[0], [0.5, 0.0, 0.0]);
        assert_eq!(punt.count, 1);
        assert!(!punt.valid);
    }

    #[test]
    fn test_zero_length_links_rejected() {
        assert!(matches!(
            PlanarThreeLinkArm::new([0.0, 80.0, 30.0], [[-PI, PI]; 3]),
            Err(KinematicsError::UnsupportedChain { .. })
        ));
        assert!(PlanarThreeLinkArm::new([100.0, 0.0, 30.0], [[-PI, PI]; 3]).is_err());
        // Without a third link the arm is a plain two link one
        assert!(PlanarThreeLinkArm::new([100.0, 80.0, 0.0], [[-PI, PI]; 3]).is_ok());
    }

    #[test]
    fn test_near_config_picks_elbow_side() {
        let arm = arm();
        let solutions = arm.inv_kin_3link(120.0, 60.0, 0.3);
        let up = arm.near_config(&solutions, 1.0, true);
        assert_eq!(up.count, 1);
        assert!(up.angles[0][1] > 0.0);
        let down = arm.near_config(&solutions, -1.0, true);
        assert!(down.angles[0][1] < 0.0);
    }

    #[test]
    fn test_display() {
        let text = arm().to_string();
        assert!(text.starts_with("L1: 100\tL2: 80\tL3: 30"));
        assert_eq!(text.lines().count(), 4);
    }
}
