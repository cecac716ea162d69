//! Analytical inverse kinematics for chains of up to three mobile joints.
//!
//! Supported configurations, counted from the root-most mobile joint:
//! - a single revolute or a single prismatic joint;
//! - two revolutes with parallel or orthogonal axes;
//! - a revolute followed by an orthogonal prismatic joint;
//! - a leg: hip rotation, orthogonal hip elevation, knee parallel or perpendicular to the elevation;
//! - a pan/tilt rig with a prismatic "zoom" joint whose z axis looks through the pan axis.
//!
//! Only the effector position is solved. The orientation target is ignored, as none of these
//! chains has freedom left for it once the position is fixed.

use nalgebra::{Isometry3, Point3, UnitQuaternion, Vector3};
use tracing::{debug, error, warn};

use crate::constraints::{Orientation, Position};
use crate::kinematic_joint::JointType;
use crate::kinematic_traits::{IKSolver, StepResult};
use crate::kinematic_tree::{JointId, KinematicTree};
use crate::utils::normalize_angle;

/// Distance at which the effector counts as having reached the target. Also the tolerance
/// for the geometric degeneracy checks.
pub const EPSILON: f64 = 1e-3;

/// Most mobile joints this solver drives.
const MAX_LINKS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IKThreeLink {
    invert_knee: bool,
}

/// The other solution of a knee-like joint, valid within its limits but not chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlternateSolution {
    pub joint: JointId,
    pub q: f64,
}

/// Everything a `solve` call found out, beyond the yes/no answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreeLinkOutcome {
    /// Effector within [`EPSILON`] of the target.
    pub converged: bool,
    /// Final distance between effector and target.
    pub residual: f64,
    /// Some joint ended up clamped at a limit.
    pub limited: bool,
    /// The target lies outside the envelope of some joint (fully extended or no real solution).
    pub out_of_reach: bool,
    /// Alternate knee solution seen during the solve, if any.
    pub alternate: Option<AlternateSolution>,
}

/// Position of a joint within the mobile chain, counted from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Rotates the whole chain about, or slides it along, its axis.
    First,
    /// Elevation, or extension for prismatic joints.
    Second,
    /// Knee, or zoom for prismatic joints.
    Third,
}

impl Role {
    fn at(index: usize) -> Role {
        match index {
            0 => Role::First,
            1 => Role::Second,
            _ => Role::Third,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct StageResult {
    valid: bool,
    alternate: Option<f64>,
    out_of_reach: bool,
}

impl StageResult {
    fn limited(valid: bool) -> Self {
        StageResult { valid, alternate: None, out_of_reach: false }
    }

    /// The joint cannot move the effector (or any value is as good as another), so it is
    /// left where it is.
    fn unchanged() -> Self {
        StageResult::limited(true)
    }
}

/// Target of one solve, shared by every stage.
struct Objective<'a> {
    target: Point3<f64>,
    effector: JointId,
    p_eff: &'a Point3<f64>,
}

/// True when `p` lies on the z axis of its frame, where rotating about z has no effect.
fn on_axis(p: &Point3<f64>) -> bool {
    p.x.abs() < EPSILON && p.y.abs() < EPSILON
}

/// World to frame transform of an optional joint, the world itself for None.
fn frame_inverse(tree: &KinematicTree, joint: Option<JointId>) -> Isometry3<f64> {
    joint.map_or_else(Isometry3::identity, |joint| tree.full_inv_t(joint))
}

/// World to the joint's frame as if its own q were zero.
fn base_inverse(tree: &KinematicTree, joint: JointId) -> Isometry3<f64> {
    let to = tree.joint(joint).to();
    match tree.parent(joint) {
        None => to.inverse(),
        Some(parent) => (tree.full_t(parent) * to).inverse(),
    }
}

/// Extension `b` of a prismatic joint solving the law of cosines `c² = a² + b² − 2·a·b·cos(C)`,
/// with `obj_d2 = c²`, `neck_d2 = a²` and `inner = a·cos(C)`. Without a real solution, the
/// closest one (at a right angle to the objective) is returned and flagged as out of reach.
pub fn compute_prismatic_q(obj_d2: f64, neck_d2: f64, inner: f64) -> (f64, bool) {
    let b = -2.0 * inner;
    let c = neck_d2 - obj_d2;
    let r = b * b - 4.0 * c;
    if r < 0.0 {
        let q2 = neck_d2 - inner * inner;
        if q2 < 0.0 {
            // Only reachable through numeric roundoff
            warn!("Prismatic extension q² < 0: {} from neck² {} inner {} objective² {}", q2, neck_d2, inner, obj_d2);
            return (0.0, true);
        }
        return (q2.sqrt(), true);
    }
    ((-b + r.sqrt()) / 2.0, false)
}

impl IKThreeLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// With `invert` set, the knee takes the non-default of its two solutions.
    pub fn with_inverted_knee(invert: bool) -> Self {
        IKThreeLink { invert_knee: invert }
    }

    pub fn inverted_knee(&self) -> bool {
        self.invert_knee
    }

    /// Mobile joints among `joint` and its ancestors, nearest to `joint` first in the walk,
    /// at most three, returned root-most first.
    pub fn mobile_links(tree: &KinematicTree, joint: JointId) -> Vec<JointId> {
        let mut links: Vec<JointId> = std::iter::once(joint)
            .chain(tree.ancestors(joint))
            .filter(|link| tree.joint(*link).is_mobile())
            .take(MAX_LINKS)
            .collect();
        links.reverse();
        links
    }

    /// Moves the mobile joints above `joint` so that `p_eff` (in the link frame of `joint`)
    /// lands on the point of `p_tgt` nearest to it.
    pub fn solve_detailed(
        &self,
        tree: &mut KinematicTree,
        joint: JointId,
        p_eff: &Point3<f64>,
        p_tgt: &Position,
        pos_pri: f64,
    ) -> ThreeLinkOutcome {
        let t = tree.full_t(joint);
        let p_base = t * p_eff;
        let de = p_tgt.error_gradient(&p_base, &t.rotation);

        let links = Self::mobile_links(tree, joint);
        if links.is_empty() || pos_pri <= 0.0 {
            if links.is_empty() {
                error!("IKThreeLink trying to solve without any mobile joints ({})", tree.joint(joint).name);
            } else {
                error!("IKThreeLink needs a position priority above 0, got {}", pos_pri);
            }
            let residual = de.norm();
            return ThreeLinkOutcome {
                converged: residual <= EPSILON,
                residual,
                limited: false,
                out_of_reach: false,
                alternate: None,
            };
        }

        let objective = Objective { target: p_base + de, effector: joint, p_eff };
        let original: Vec<f64> = links.iter().map(|link| tree.q(*link)).collect();
        let knee = if links.len() == MAX_LINKS { Some(links[2]) } else { None };

        let mut pass = self.chain_pass(tree, &links, &original, &objective, knee);

        // Root link saturated: it can contribute no more, the next one acts as root instead
        if !pass.valid[0] && links.len() > 1 {
            let inner = self.chain_pass(tree, &links[1..], &original[1..], &objective, knee);
            pass.valid[1..].copy_from_slice(&inner.valid);
            pass.out_of_reach |= inner.out_of_reach;
            pass.alternate = pass.alternate.or(inner.alternate);
        }

        // Middle link saturated as well, the last one just points at the target
        if links.len() == MAX_LINKS && !pass.valid[1] {
            let last = self.stage(tree, Role::First, links[2], &objective, false);
            pass.valid[2] = last.valid;
        }

        let residual = (tree.full_t(joint) * p_eff - objective.target).norm();
        ThreeLinkOutcome {
            converged: residual <= EPSILON,
            residual,
            limited: pass.valid.iter().any(|valid| !valid),
            out_of_reach: pass.out_of_reach,
            alternate: pass.alternate,
        }
    }

    /// Solves each joint of `chain` from the tip inwards, the first of them acting as root.
    /// When an outer joint then fails on its limits, the alternate solution of the inner joint
    /// is tried, and kept only if it helps or is nearer to where the joint started.
    fn chain_pass(
        &self,
        tree: &mut KinematicTree,
        chain: &[JointId],
        original: &[f64],
        objective: &Objective,
        knee: Option<JointId>,
    ) -> ChainPass {
        let mut pass = ChainPass {
            valid: vec![true; chain.len()],
            out_of_reach: false,
            alternate: None,
        };
        let mut alternate_at = None;

        for index in (0..chain.len()).rev() {
            let invert = self.invert_knee && Some(chain[index]) == knee;
            let result = self.stage(tree, Role::at(index), chain[index], objective, invert);
            pass.valid[index] = result.valid;
            pass.out_of_reach |= result.out_of_reach;
            if alternate_at.is_none() {
                if let Some(q) = result.alternate {
                    alternate_at = Some(index);
                    pass.alternate = Some(AlternateSolution { joint: chain[index], q });
                }
            }
        }

        let (Some(k), Some(alternate)) = (alternate_at, pass.alternate) else {
            return pass;
        };
        if pass.valid[..k].iter().all(|valid| *valid) {
            return pass;
        }

        debug!("Hit limit, trying alternate q {} for {}", alternate.q, tree.joint(alternate.joint).name);
        let default_q = tree.q(chain[k]);
        tree.try_q(chain[k], alternate.q);
        self.redo_inner(tree, chain, k, objective, knee, &mut pass);

        let inner_failed = pass.valid[..k].iter().any(|valid| !valid);
        if inner_failed && (original[k] - alternate.q).abs() > (original[k] - default_q).abs() {
            debug!("Alternate did not help, going back to {}", default_q);
            tree.try_q(chain[k], default_q);
            self.redo_inner(tree, chain, k, objective, knee, &mut pass);
        }
        pass
    }

    fn redo_inner(
        &self,
        tree: &mut KinematicTree,
        chain: &[JointId],
        k: usize,
        objective: &Objective,
        knee: Option<JointId>,
        pass: &mut ChainPass,
    ) {
        for index in (0..k).rev() {
            let invert = self.invert_knee && Some(chain[index]) == knee;
            pass.valid[index] = self.stage(tree, Role::at(index), chain[index], objective, invert).valid;
        }
    }

    fn stage(
        &self,
        tree: &mut KinematicTree,
        role: Role,
        cur: JointId,
        objective: &Objective,
        invert: bool,
    ) -> StageResult {
        let joint_type = tree.joint(cur).joint_type();
        match (role, joint_type) {
            (Role::First, JointType::Revolute) => first_link_revolute(tree, cur, objective),
            (Role::First, JointType::Prismatic) => first_link_prismatic(tree, cur, objective),
            (Role::Second, JointType::Revolute) => second_link_revolute(tree, cur, objective, invert),
            (Role::Second, JointType::Prismatic) => second_link_prismatic(tree, cur, objective),
            (Role::Third, JointType::Revolute) => third_link_revolute(tree, cur, objective, invert),
            (Role::Third, JointType::Prismatic) => third_link_prismatic(tree, cur, objective),
        }
    }
}

struct ChainPass {
    valid: Vec<bool>,
    out_of_reach: bool,
    alternate: Option<AlternateSolution>,
}

fn effector_in(tree: &KinematicTree, cur: JointId, objective: &Objective) -> Point3<f64> {
    tree.t_between(objective.effector, cur) * objective.p_eff
}

fn first_link_revolute(tree: &mut KinematicTree, cur: JointId, objective: &Objective) -> StageResult {
    let c_obj = base_inverse(tree, cur) * objective.target;
    let c_eff = effector_in(tree, cur, objective);
    if on_axis(&c_eff) || on_axis(&c_obj) {
        return StageResult::unchanged();
    }
    let ao = c_obj.y.atan2(c_obj.x);
    let ae = c_eff.y.atan2(c_eff.x);
    let q = normalize_angle(ao - ae - tree.joint(cur).q_offset());
    StageResult::limited(tree.try_q(cur, q))
}

fn first_link_prismatic(tree: &mut KinematicTree, cur: JointId, objective: &Objective) -> StageResult {
    let c_obj = base_inverse(tree, cur) * objective.target;
    let q = c_obj.z - tree.joint(cur).q_offset();
    StageResult::limited(tree.try_q(cur, q))
}

/// Tries `offset ± a`, default branch first, and reports the other one as alternate if it is
/// distinct and within limits.
fn choose_branch(tree: &mut KinematicTree, cur: JointId, offset: f64, a: f64, invert: bool) -> (bool, Option<f64>) {
    let (q1, q2) = if invert { (offset - a, offset + a) } else { (offset + a, offset - a) };
    let (q1, q2) = (normalize_angle(q1), normalize_angle(q2));
    debug!("angle {} offset {} q1 {} q2 {}", a, offset, q1, q2);

    if tree.try_q(cur, q1) {
        let joint = tree.joint(cur);
        let alternate = ((q1 - q2).abs() > EPSILON && joint.valid_q(q2)).then_some(q2);
        return (true, alternate);
    }
    if tree.try_q(cur, q2) {
        return (true, None);
    }
    (tree.try_q(cur, q1), None)
}

/// Law of cosines angle between the sides `adj1` and `adj2`, opposite `opp`. Targets
/// closer in than the sides allow fold up to 0, targets beyond their sum extend to π.
fn fold_angle(adj1: f64, adj2: f64, opp: f64) -> (f64, bool) {
    if adj1 + opp <= adj2 || adj2 + opp <= adj1 {
        (0.0, false)
    } else if adj1 + adj2 <= opp {
        (std::f64::consts::PI, true)
    } else {
        let ca = (adj1 * adj1 + adj2 * adj2 - opp * opp) / (2.0 * adj1 * adj2);
        (ca.clamp(-1.0, 1.0).acos(), false)
    }
}

/// Assumes the z axes of parent and current frame are either parallel or orthogonal.
/// Anything not parallel is treated as orthogonal.
fn second_link_revolute(tree: &mut KinematicTree, cur: JointId, objective: &Objective, invert: bool) -> StageResult {
    let c_eff = effector_in(tree, cur, objective);
    if on_axis(&c_eff) {
        return StageResult::unchanged();
    }
    let p_obj = frame_inverse(tree, tree.parent(cur)) * objective.target;
    let joint = tree.joint(cur);
    let z_alignment = (joint.tq().rotation * Vector3::z()).z;

    if z_alignment.abs() >= 1.0 - EPSILON {
        let adj1 = joint.r().abs();
        let adj2 = c_eff.x.hypot(c_eff.y);
        let opp = p_obj.x.hypot(p_obj.y);
        let (a, out_of_reach) = fold_angle(adj1, adj2, opp);
        debug!("Parallel second link: {} {} {} = {}", adj1, adj2, opp, a);

        let mut offset = -joint.q_offset() - c_eff.y.atan2(c_eff.x);
        if joint.r() > 0.0 {
            offset += std::f64::consts::PI;
        }
        let (valid, alternate) = choose_branch(tree, cur, offset, a, invert);
        return StageResult { valid, alternate, out_of_reach };
    }

    // Solve (cr + coh/tan(q))² + lz² = por², a quadratic in x = coh/tan(q)
    let cr = joint.r().abs();
    let lz = c_eff.z.abs();
    let mut coh = p_obj.z - joint.d();
    if joint.alpha() < 0.0 {
        coh = -coh;
    }
    let por = p_obj.x.hypot(p_obj.y);
    debug!("Orthogonal second link: cr {} lz {} coh {} por {}", cr, lz, coh, por);
    if por < lz {
        // Effector too far to the side, no real solution
        return StageResult { valid: false, alternate: None, out_of_reach: true };
    }
    let b = 2.0 * cr;
    let c = cr * cr + lz * lz - por * por;
    let x = (-b + (b * b - 4.0 * c).sqrt()) / 2.0;
    let q = coh.atan2(x) - joint.q_offset() - c_eff.y.atan2(c_eff.x);
    StageResult::limited(tree.try_q(cur, normalize_angle(q)))
}

/// Neck geometry of a prismatic joint relative to its tilt joint: squared neck length and the
/// projection of the neck onto the joint's z axis.
fn neck_geometry(tree: &KinematicTree, cur: JointId, tilt: JointId) -> (f64, f64) {
    let to = tree.joint(cur).to();
    let cur_to_tilt = match tree.parent(cur) {
        Some(parent) => tree.t_between(parent, tilt) * to,
        None => *to,
    };
    let neck = cur_to_tilt.translation.vector;
    let z = cur_to_tilt.rotation * Vector3::z();
    (neck.norm_squared(), z.dot(&-neck))
}

/// Sets the extension to match the distance of the objective in the plane of the tilt rotation.
fn second_link_prismatic(tree: &mut KinematicTree, cur: JointId, objective: &Objective) -> StageResult {
    let Some(tilt) = tree.next_mobile_ancestor(cur) else {
        return first_link_prismatic(tree, cur, objective);
    };
    let t_obj = tree.full_inv_t(tilt) * objective.target;
    let (neck_d2, inner) = neck_geometry(tree, cur, tilt);
    let (q, out_of_reach) = compute_prismatic_q(t_obj.x * t_obj.x + t_obj.y * t_obj.y, neck_d2, inner);
    let valid = tree.try_q(cur, q - tree.joint(cur).q_offset());
    StageResult { valid, alternate: None, out_of_reach }
}

/// Knee angle from the thigh length, the effector distance in the knee's plane of rotation and
/// the distance from the hip's ring of motion to the objective.
///
/// The knee is either parallel to the hip elevation (hip `d` folds into the effector z offset)
/// or perpendicular to it with a zero hip radius. Targets behind the hip are not reached:
/// the hip stays on its side at its limit instead of snapping across the singularity.
fn third_link_revolute(tree: &mut KinematicTree, cur: JointId, objective: &Objective, invert: bool) -> StageResult {
    let c_eff = effector_in(tree, cur, objective);
    if on_axis(&c_eff) {
        return StageResult::unchanged();
    }
    let Some(parent) = tree.parent(cur) else {
        return first_link_revolute(tree, cur, objective);
    };
    let grandparent = tree.parent(parent);
    let (parent_r, parent_d) = {
        let parent = tree.joint(parent);
        (parent.r(), parent.d())
    };

    let mut gp_obj = frame_inverse(tree, grandparent) * objective.target;
    gp_obj.z -= parent_d;

    let joint = tree.joint(cur);
    let knee_perpendicular = (joint.alpha().abs() - std::f64::consts::FRAC_PI_2).abs() < EPSILON;

    let (thigh, thigh2, ring_obj_d2) = if knee_perpendicular {
        if parent_r != 0.0 {
            warn!("Perpendicular knee {} with non-zero hip radius {}, solution will be off", joint.name, parent_r);
        }
        let thigh2 = joint.r() * joint.r() + joint.d() * joint.d();
        let lz = c_eff.z;
        let rd = gp_obj.x.hypot(gp_obj.y) - parent_r.abs();
        let ring_obj_d2 = (rd * rd + gp_obj.z * gp_obj.z - lz * lz).max(0.0);
        (thigh2.sqrt(), thigh2, ring_obj_d2)
    } else {
        let thigh = joint.r().abs();
        let lz = c_eff.z - joint.d();
        let d2 = (gp_obj.x * gp_obj.x + gp_obj.y * gp_obj.y - lz * lz).max(0.0);
        let rd = d2.sqrt() - parent_r.abs();
        (thigh, thigh * thigh, rd * rd + gp_obj.z * gp_obj.z)
    };
    let ring_obj_d = ring_obj_d2.sqrt();
    let ln2 = c_eff.x * c_eff.x + c_eff.y * c_eff.y;
    let ln = ln2.sqrt();
    debug!("Knee: thigh {} ring distance {} link {}", thigh, ring_obj_d, ln);

    let (mut a, out_of_reach) = if ln + ring_obj_d <= thigh || ring_obj_d + thigh <= ln {
        (0.0, false)
    } else if ln + thigh <= ring_obj_d {
        (std::f64::consts::PI, true)
    } else {
        let ca = (ln2 + thigh2 - ring_obj_d2) / (2.0 * ln * thigh);
        (ca.clamp(-1.0, 1.0).acos(), false)
    };

    let mut offset = -joint.q_offset() - c_eff.y.atan2(c_eff.x);
    if knee_perpendicular {
        let tilt = joint.d().atan2(joint.r());
        offset += if joint.alpha() < 0.0 { -tilt } else { tilt };
        a = std::f64::consts::PI - a;
    } else if joint.r() > 0.0 {
        a = std::f64::consts::PI - a;
    }

    let (valid, alternate) = choose_branch(tree, cur, offset, a, invert);
    StageResult { valid, alternate, out_of_reach }
}

/// Pan/tilt camera: the prismatic joint's z axis looks out of the camera and must pass
/// through the pan axis. There may be fixed frames between camera and tilt. The effector
/// point is ignored, only the line of sight is solved.
fn third_link_prismatic(tree: &mut KinematicTree, cur: JointId, objective: &Objective) -> StageResult {
    let Some(tilt) = tree.next_mobile_ancestor(cur) else {
        return first_link_prismatic(tree, cur, objective);
    };
    let pan = tree.parent(tilt);
    let tilt_joint = tree.joint(tilt);
    let (tilt_r, tilt_d) = (tilt_joint.r(), tilt_joint.d());

    let mut gp_obj = frame_inverse(tree, pan) * objective.target;
    gp_obj.z -= tilt_d;

    let (neck_d2, inner) = neck_geometry(tree, cur, tilt);
    let rd = gp_obj.x.hypot(gp_obj.y) - tilt_r.abs();
    let ring_obj_d2 = rd * rd + gp_obj.z * gp_obj.z;
    debug!("Camera: neck² {} inner {} ring distance² {}", neck_d2, inner, ring_obj_d2);

    let (q, out_of_reach) = compute_prismatic_q(ring_obj_d2, neck_d2, inner);
    let valid = tree.try_q(cur, q - tree.joint(cur).q_offset());
    StageResult { valid, alternate: None, out_of_reach }
}

impl IKSolver for IKThreeLink {
    fn solve(
        &self,
        tree: &mut KinematicTree,
        joint: JointId,
        p_eff: &Point3<f64>,
        _ori_eff: &UnitQuaternion<f64>,
        p_tgt: &Position,
        pos_pri: f64,
        _ori_tgt: &Orientation,
        _ori_pri: f64,
    ) -> bool {
        self.solve_detailed(tree, joint, p_eff, p_tgt, pos_pri).converged
    }

    fn step(
        &self,
        tree: &mut KinematicTree,
        joint: JointId,
        p_eff: &Point3<f64>,
        _ori_eff: &UnitQuaternion<f64>,
        p_tgt: &Position,
        p_dist: f64,
        pos_pri: f64,
        _ori_tgt: &Orientation,
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
        let outcome = self.solve_detailed(tree, joint, p_eff, &Position::Point(p_base + de), pos_pri);
        step_result(&outcome, result)
    }
}

/// Maps a solve outcome onto the step result, `reached` being what to report on convergence.
pub(crate) fn step_result(outcome: &ThreeLinkOutcome, reached: StepResult) -> StepResult {
    if outcome.converged {
        reached
    } else if outcome.out_of_reach || !outcome.limited {
        StepResult::Range
    } else {
        StepResult::Limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prismatic_q_law_of_cosines() {
        // Neck of 3 at a right angle to the line of sight, objective 5 away: extension is 4
        let (q, out_of_reach) = compute_prismatic_q(25.0, 9.0, 0.0);
        assert!((q - 4.0).abs() < 1e-12);
        assert!(!out_of_reach);
    }

    #[test]
    fn test_prismatic_q_without_solution() {
        // Objective closer than the neck allows: closest approach at a right angle
        let (q, out_of_reach) = compute_prismatic_q(1.0, 25.0, 3.0);
        assert!((q - 4.0).abs() < 1e-12);
        assert!(out_of_reach);
    }

    #[test]
    fn test_fold_angle_limits() {
        assert_eq!(fold_angle(10.0, 5.0, 2.0), (0.0, false));
        assert_eq!(fold_angle(10.0, 5.0, 20.0), (std::f64::consts::PI, true));
        let (a, reach) = fold_angle(3.0, 4.0, 5.0);
        assert!((a - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!(!reach);
    }

    #[test]
    fn test_step_result_mapping() {
        let mut outcome = ThreeLinkOutcome {
            converged: true,
            residual: 0.0,
            limited: false,
            out_of_reach: false,
            alternate: None,
        };
        assert_eq!(step_result(&outcome, StepResult::Progress), StepResult::Progress);
        outcome.converged = false;
        assert_eq!(step_result(&outcome, StepResult::Success), StepResult::Range);
        outcome.limited = true;
        assert_eq!(step_result(&outcome, StepResult::Success), StepResult::Limits);
        outcome.out_of_reach = true;
        assert_eq!(step_result(&outcome, StepResult::Success), StepResult::Range);
    }
}
