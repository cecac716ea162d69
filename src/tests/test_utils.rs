//! Chains shared by the scenario tests

use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::Point3;

use crate::kinematic_joint::KinematicJoint;
use crate::kinematic_tree::{JointId, KinematicTree};

/// Two revolute joints moving in the xy plane, upper arm 100, forearm 80.
pub(crate) struct TwoLink {
    pub tree: KinematicTree,
    pub shoulder: JointId,
    pub elbow: JointId,
    pub hand: JointId,
}

pub(crate) fn two_link() -> TwoLink {
    let mut tree = KinematicTree::new();
    let shoulder = tree.insert(KinematicJoint::revolute("shoulder"));
    let elbow = tree
        .add_child(shoulder, KinematicJoint::revolute("elbow").with_dh(0.0, 0.0, 100.0, 0.0))
        .unwrap();
    let hand = tree
        .add_child(elbow, KinematicJoint::fixed("hand").with_dh(0.0, 0.0, 80.0, 0.0))
        .unwrap();
    TwoLink { tree, shoulder, elbow, hand }
}

/// Insect style leg: hip yaw about z, hip pitch and knee about horizontal axes,
/// thigh 40, shin 50. Stretched out along x at zero.
pub(crate) struct Leg {
    pub tree: KinematicTree,
    pub hip_yaw: JointId,
    pub hip_pitch: JointId,
    pub knee: JointId,
    pub foot: JointId,
}

pub(crate) fn leg() -> Leg {
    leg_with_limits([-PI, PI], [-PI, PI])
}

pub(crate) fn leg_with_limits(hip_pitch_limits: [f64; 2], knee_limits: [f64; 2]) -> Leg {
    let mut tree = KinematicTree::new();
    let hip_yaw = tree.insert(KinematicJoint::revolute("hip_yaw").with_limits(-FRAC_PI_2, FRAC_PI_2));
    let hip_pitch = tree
        .add_child(
            hip_yaw,
            KinematicJoint::revolute("hip_pitch")
                .with_dh(0.0, 0.0, 0.0, FRAC_PI_2)
                .with_limits(hip_pitch_limits[0], hip_pitch_limits[1]),
        )
        .unwrap();
    let knee = tree
        .add_child(
            hip_pitch,
            KinematicJoint::revolute("knee")
                .with_dh(0.0, 0.0, 40.0, 0.0)
                .with_limits(knee_limits[0], knee_limits[1]),
        )
        .unwrap();
    let foot = tree
        .add_child(knee, KinematicJoint::fixed("foot").with_dh(0.0, 0.0, 50.0, 0.0))
        .unwrap();
    Leg { tree, hip_yaw, hip_pitch, knee, foot }
}

/// Pan and tilt head with a prismatic "zoom" along the line of sight. At zero the
/// camera frame coincides with the world frame, looking along z.
pub(crate) struct PanTilt {
    pub tree: KinematicTree,
    pub pan: JointId,
    pub tilt: JointId,
    pub camera: JointId,
}

pub(crate) fn pan_tilt() -> PanTilt {
    let mut tree = KinematicTree::new();
    let pan = tree.insert(KinematicJoint::revolute("pan"));
    let tilt = tree
        .add_child(
            pan,
            KinematicJoint::revolute("tilt")
                .with_dh(0.0, 0.0, 0.0, -FRAC_PI_2)
                .with_limits(-FRAC_PI_2, FRAC_PI_2),
        )
        .unwrap();
    let camera = tree
        .add_child(
            tilt,
            KinematicJoint::prismatic("camera")
                .with_dh(0.0, 0.0, 0.0, FRAC_PI_2)
                .with_limits(0.0, 1000.0),
        )
        .unwrap();
    PanTilt { tree, pan, tilt, camera }
}

/// Coplanar arm of three revolute joints, links 100, 80, 30, solved by the planar solver.
pub(crate) struct PlanarArm {
    pub tree: KinematicTree,
    pub shoulder: JointId,
    pub elbow: JointId,
    pub wrist: JointId,
    pub effector: JointId,
}

pub(crate) fn planar_arm(limits: [[f64; 2]; 3]) -> PlanarArm {
    let mut tree = KinematicTree::new();
    let shoulder = tree.insert(KinematicJoint::revolute("shoulder").with_limits(limits[0][0], limits[0][1]));
    let elbow = tree
        .add_child(
            shoulder,
            KinematicJoint::revolute("elbow")
                .with_dh(0.0, 0.0, 100.0, 0.0)
                .with_limits(limits[1][0], limits[1][1]),
        )
        .unwrap();
    let wrist = tree
        .add_child(
            elbow,
            KinematicJoint::revolute("wrist")
                .with_dh(0.0, 0.0, 80.0, 0.0)
                .with_limits(limits[2][0], limits[2][1]),
        )
        .unwrap();
    let effector = tree
        .add_child(
            wrist,
            KinematicJoint::fixed("effector")
                .with_dh(0.0, 0.0, 30.0, 0.0)
                .with_ik_solver("PlanarThreeLinkArm"),
        )
        .unwrap();
    PlanarArm { tree, shoulder, elbow, wrist, effector }
}

pub(crate) fn assert_near(actual: f64, expected: f64, tolerance: f64, what: &str) {
    assert!(
        (actual - expected).abs() < tolerance,
        "{}: expected {}, got {}",
        what,
        expected,
        actual
    );
}

pub(crate) fn assert_point_near(actual: &Point3<f64>, expected: &Point3<f64>, tolerance: f64) {
    assert!(
        (actual - expected).norm() < tolerance,
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}
