//! Selection of the IK solver for a joint, by the solver name in its configuration.

use nalgebra::{Point3, UnitQuaternion};
use tracing::warn;

use crate::constraints::{Orientation, Position};
use crate::errors::KinematicsError;
use crate::ik_three_link::IKThreeLink;
use crate::kinematic_traits::{IKSolver, StepResult};
use crate::kinematic_tree::{JointId, KinematicTree};
use crate::planar_three_link_arm::PlanarThreeLinkArm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverKind {
    #[default]
    ThreeLink,
    PlanarThreeLinkArm,
}

impl SolverKind {
    /// The empty name selects the default solver.
    pub fn from_name(name: &str) -> Option<SolverKind> {
        match name {
            "" | "IKThreeLink" => Some(SolverKind::ThreeLink),
            "PlanarThreeLinkArm" => Some(SolverKind::PlanarThreeLinkArm),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SolverKind::ThreeLink => "IKThreeLink",
            SolverKind::PlanarThreeLinkArm => "PlanarThreeLinkArm",
        }
    }

    /// Builds the solver for chains ending at `joint`.
    pub fn build(&self, tree: &KinematicTree, joint: JointId) -> Result<Solver, KinematicsError> {
        match self {
            SolverKind::ThreeLink => Ok(Solver::ThreeLink(IKThreeLink::new())),
            SolverKind::PlanarThreeLinkArm => {
                PlanarThreeLinkArm::from_effector(tree, joint).map(Solver::PlanarThreeLinkArm)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Solver {
    ThreeLink(IKThreeLink),
    PlanarThreeLinkArm(PlanarThreeLinkArm),
}

impl Solver {
    pub fn kind(&self) -> SolverKind {
        match self {
            Solver::ThreeLink(_) => SolverKind::ThreeLink,
            Solver::PlanarThreeLinkArm(_) => SolverKind::PlanarThreeLinkArm,
        }
    }

    fn inner(&self) -> &dyn IKSolver {
        match self {
            Solver::ThreeLink(solver) => solver,
            Solver::PlanarThreeLinkArm(solver) => solver,
        }
    }
}

/// Solver named `name` for chains ending at `joint`. Unknown names, and chains the named
/// solver cannot handle, fall back to the default solver with a warning.
pub fn resolve_solver(name: &str, tree: &KinematicTree, joint: JointId) -> Result<Solver, KinematicsError> {
    let requested = match SolverKind::from_name(name) {
        Some(kind) => kind.build(tree, joint),
        None => Err(KinematicsError::UnsupportedChain {
            solver: name.to_string(),
            reason: "no solver of this name".to_string(),
        }),
    };
    match requested {
        Ok(solver) => Ok(solver),
        Err(err) => {
            warn!("Cannot use IK solver '{}' for {}: {}, falling back to default", name, joint, err);
            SolverKind::default().build(tree, joint).map_err(|_| KinematicsError::NoSolver {
                joint,
                requested: name.to_string(),
            })
        }
    }
}

impl IKSolver for Solver {
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
    ) -> bool {
        self.inner().solve(tree, joint, p_eff, ori_eff, p_tgt, pos_pri, ori_tgt, ori_pri)
    }

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
    ) -> StepResult {
        self.inner()
            .step(tree, joint, p_eff, ori_eff, p_tgt, p_dist, pos_pri, ori_tgt, ori_dist, ori_pri)
    }
}
