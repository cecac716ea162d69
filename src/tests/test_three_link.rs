use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::{Point3, UnitQuaternion, Vector3};

use crate::constraints::{Orientation, Position};
use crate::ik_three_link::{IKThreeLink, EPSILON};
use crate::kinematic_joint::KinematicJoint;
use crate::kinematic_traits::{IKSolver, StepResult};
use crate::kinematic_tree::KinematicTree;
use crate::solver_registry::SolverKind;
use crate::tests::test_utils::{assert_near, assert_point_near, leg, leg_with_limits, pan_tilt, two_link};

const ANGLE: f64 = 1e-4;

#[test]
fn test_two_link_reaches_target() {
    let mut arm = two_link();
    let solver = IKThreeLink::new();
    let target = Point3::new(120.0, 50.0, 0.0);

    assert!(solver.solve_position(&mut arm.tree, arm.hand, &Point3::origin(), &Position::Point(target)));
    assert_near(arm.tree.q(arm.shoulder), 1.05728, ANGLE, "shoulder");
    assert_near(arm.tree.q(arm.elbow), -1.53954, ANGLE, "elbow");
    assert_point_near(&arm.tree.world_position(arm.hand), &target, EPSILON);
}

#[test]
fn test_two_link_out_of_reach_stretches_towards_target() {
    let mut arm = two_link();
    let outcome = IKThreeLink::new().solve_detailed(
        &mut arm.tree,
        arm.hand,
        &Point3::origin(),
        &Position::point(300.0, 0.0, 0.0),
        1.0,
    );
    assert!(!outcome.converged);
    assert!(outcome.out_of_reach);
    assert_near(outcome.residual, 120.0, 1e-6, "residual");
    assert_near(arm.tree.q(arm.shoulder), 0.0, 1e-9, "shoulder");
    assert_near(arm.tree.q(arm.elbow), 0.0, 1e-9, "elbow");
    assert_point_near(&arm.tree.world_position(arm.hand), &Point3::new(180.0, 0.0, 0.0), 1e-6);
}

#[test]
fn test_two_link_target_off_plane() {
    let mut arm = two_link();
    let outcome = IKThreeLink::new().solve_detailed(
        &mut arm.tree,
        arm.hand,
        &Point3::origin(),
        &Position::point(0.0, 200.0, 10.0),
        1.0,
    );
    assert!(!outcome.converged);
    assert!(outcome.out_of_reach);
    assert_near(arm.tree.q(arm.shoulder), FRAC_PI_2, ANGLE, "shoulder");
    assert_near(outcome.residual, 500.0_f64.sqrt(), 1e-6, "residual");
}

#[test]
fn test_second_solve_is_fixed_point() {
    let mut arm = two_link();
    let solver = IKThreeLink::new();
    let target = Position::point(120.0, 50.0, 0.0);
    assert!(solver.solve_position(&mut arm.tree, arm.hand, &Point3::origin(), &target));
    let before = [arm.tree.q(arm.shoulder), arm.tree.q(arm.elbow)];

    assert!(solver.solve_position(&mut arm.tree, arm.hand, &Point3::origin(), &target));
    assert_near(arm.tree.q(arm.shoulder), before[0], 1e-6, "shoulder");
    assert_near(arm.tree.q(arm.elbow), before[1], 1e-6, "elbow");
}

#[test]
fn test_plane_target_takes_nearest_point() {
    let mut arm = two_link();
    // x = 120
    let plane = Position::plane(Vector3::x(), -120.0).unwrap();
    assert!(IKThreeLink::new().solve_position(&mut arm.tree, arm.hand, &Point3::origin(), &plane));
    assert_near(arm.tree.world_position(arm.hand).x, 120.0, EPSILON, "x");
}

#[test]
fn test_immobile_joints_are_skipped() {
    let arm = two_link();
    assert_eq!(IKThreeLink::mobile_links(&arm.tree, arm.hand), vec![arm.shoulder, arm.elbow]);
}

#[test]
fn test_frozen_middle_joint_leaves_two_links() {
    // Two link arm with a roll joint between shoulder and elbow, on the shoulder axis
    let mut tree = KinematicTree::new();
    let shoulder = tree.insert(KinematicJoint::revolute("shoulder"));
    let roll = tree.add_child(shoulder, KinematicJoint::revolute("roll")).unwrap();
    let elbow = tree
        .add_child(roll, KinematicJoint::revolute("elbow").with_dh(0.0, 0.0, 100.0, 0.0))
        .unwrap();
    let hand = tree
        .add_child(elbow, KinematicJoint::fixed("hand").with_dh(0.0, 0.0, 80.0, 0.0))
        .unwrap();
    assert_eq!(IKThreeLink::mobile_links(&tree, hand), vec![shoulder, roll, elbow]);

    tree.freeze_q(roll, 0.0);
    assert_eq!(IKThreeLink::mobile_links(&tree, hand), vec![shoulder, elbow]);

    let target = Point3::new(120.0, 50.0, 0.0);
    let outcome = IKThreeLink::new().solve_detailed(&mut tree, hand, &Point3::origin(), &Position::Point(target), 1.0);
    assert!(outcome.converged);
    assert!(!outcome.limited);
    assert_eq!(tree.q(roll), 0.0);
    assert_near(tree.q(shoulder), 1.05728, ANGLE, "shoulder");
    assert_near(tree.q(elbow), -1.53954, ANGLE, "elbow");
    assert_point_near(&tree.world_position(hand), &target, EPSILON);
}

#[test]
fn test_zero_priority_changes_nothing() {
    let mut arm = two_link();
    let outcome = IKThreeLink::new().solve_detailed(
        &mut arm.tree,
        arm.hand,
        &Point3::origin(),
        &Position::point(120.0, 50.0, 0.0),
        0.0,
    );
    assert!(!outcome.converged);
    assert_eq!(arm.tree.q(arm.shoulder), 0.0);
    assert_eq!(arm.tree.q(arm.elbow), 0.0);
}

#[test]
fn test_leg_zero_pose() {
    let leg = leg();
    assert_point_near(&leg.tree.world_position(leg.foot), &Point3::new(90.0, 0.0, 0.0), 1e-9);
}

#[test]
fn test_leg_reaches_targets_below_hip() {
    for target in [
        Point3::new(30.0, 20.0, -50.0),
        Point3::new(50.0, 0.0, -30.0),
        Point3::new(10.0, -40.0, -40.0),
        Point3::new(0.0, 0.0, -60.0),
    ] {
        let mut leg = leg();
        assert!(
            IKThreeLink::new().solve_position(&mut leg.tree, leg.foot, &Point3::origin(), &Position::Point(target)),
            "target {:?}",
            target
        );
        assert_point_near(&leg.tree.world_position(leg.foot), &target, EPSILON);
    }
}

#[test]
fn test_leg_default_knee() {
    let mut leg = leg();
    let outcome = IKThreeLink::new().solve_detailed(
        &mut leg.tree,
        leg.foot,
        &Point3::origin(),
        &Position::point(30.0, 20.0, -50.0),
        1.0,
    );
    assert!(outcome.converged);
    assert!(!outcome.limited);
    assert_near(leg.tree.q(leg.hip_yaw), 0.58800, ANGLE, "hip yaw");
    assert_near(leg.tree.q(leg.hip_pitch), -1.88819, ANGLE, "hip pitch");
    assert_near(leg.tree.q(leg.knee), 1.64587, ANGLE, "knee");

    let alternate = outcome.alternate.expect("the knee has a second solution");
    assert_eq!(alternate.joint, leg.knee);
    assert_near(alternate.q, -1.64587, ANGLE, "alternate knee");
}

fn assert_bent_backwards(leg: &crate::tests::test_utils::Leg) {
    assert_near(leg.tree.q(leg.hip_yaw), 0.58800, ANGLE, "hip yaw");
    assert_near(leg.tree.q(leg.hip_pitch), -0.003895, ANGLE, "hip pitch");
    assert_near(leg.tree.q(leg.knee), -1.64587, ANGLE, "knee");
}

#[test]
fn test_inverted_knee() {
    let mut leg = leg();
    let solver = IKThreeLink::with_inverted_knee(true);
    assert!(solver.inverted_knee());
    assert!(solver.solve_position(&mut leg.tree, leg.foot, &Point3::origin(), &Position::point(30.0, 20.0, -50.0)));
    assert_bent_backwards(&leg);
}

#[test]
fn test_knee_limit_selects_other_branch() {
    let mut leg = leg_with_limits([-PI, PI], [-PI, 0.0]);
    assert!(IKThreeLink::new().solve_position(
        &mut leg.tree,
        leg.foot,
        &Point3::origin(),
        &Position::point(30.0, 20.0, -50.0)
    ));
    assert_bent_backwards(&leg);
}

#[test]
fn test_hip_limit_retries_alternate_knee() {
    let mut leg = leg_with_limits([-0.5, 0.5], [-PI, PI]);
    assert!(IKThreeLink::new().solve_position(
        &mut leg.tree,
        leg.foot,
        &Point3::origin(),
        &Position::point(30.0, 20.0, -50.0)
    ));
    assert_bent_backwards(&leg);
}

#[test]
fn test_leg_too_short() {
    let mut leg = leg();
    let outcome = IKThreeLink::new().solve_detailed(
        &mut leg.tree,
        leg.foot,
        &Point3::origin(),
        &Position::point(0.0, 0.0, -120.0),
        1.0,
    );
    assert!(!outcome.converged);
    assert!(outcome.out_of_reach);
    assert_near(outcome.residual, 30.0, 1e-6, "residual");
    assert_near(leg.tree.q(leg.hip_pitch), -FRAC_PI_2, ANGLE, "hip pitch");
    assert_near(leg.tree.q(leg.knee), 0.0, ANGLE, "knee");
    assert_point_near(&leg.tree.world_position(leg.knee), &Point3::new(0.0, 0.0, -40.0), 1e-6);
    assert_point_near(&leg.tree.world_position(leg.foot), &Point3::new(0.0, 0.0, -90.0), 1e-6);
}

#[test]
fn test_leg_target_behind_hip_is_limited() {
    let mut leg = leg();
    let target = Position::point(-30.0, 0.0, -50.0);
    let outcome = IKThreeLink::new().solve_detailed(&mut leg.tree, leg.foot, &Point3::origin(), &target, 1.0);
    assert!(!outcome.converged);
    assert!(outcome.limited);
    assert!(!outcome.out_of_reach);
    assert_near(outcome.residual, 30.0, 1e-6, "residual");
    assert_near(leg.tree.q(leg.hip_yaw), FRAC_PI_2, 1e-9, "hip yaw");

    let mut leg = crate::tests::test_utils::leg();
    let result = IKThreeLink::new().step_position(&mut leg.tree, leg.foot, &Point3::origin(), &target, 1000.0);
    assert_eq!(result, StepResult::Limits);
}

#[test]
fn test_pan_tilt_aims_camera() {
    let mut head = pan_tilt();
    assert_point_near(&head.tree.world_position(head.camera), &Point3::origin(), 1e-12);
    assert!(head.tree.world_quaternion(head.camera).angle() < 1e-12);

    let target = Point3::new(100.0, 50.0, 30.0);
    assert!(IKThreeLink::new().solve_position(&mut head.tree, head.camera, &Point3::origin(), &Position::Point(target)));
    assert_near(head.tree.q(head.pan), 0.46365, ANGLE, "pan");
    assert_near(head.tree.q(head.tilt), 1.30864, ANGLE, "tilt");
    assert_near(head.tree.q(head.camera), 115.758, 1e-3, "zoom");
    assert_point_near(&head.tree.world_position(head.camera), &target, EPSILON);
}

#[test]
fn test_pan_tilt_below_horizon_is_limited() {
    let mut head = pan_tilt();
    let target = Position::point(200.0, -20.0, -80.0);
    let outcome = IKThreeLink::new().solve_detailed(&mut head.tree, head.camera, &Point3::origin(), &target, 1.0);
    assert!(!outcome.converged);
    assert!(outcome.limited);
    assert!(!outcome.out_of_reach);
    assert_near(head.tree.q(head.tilt), FRAC_PI_2, 1e-9, "tilt");
    assert_near(outcome.residual, 80.0, 1e-6, "residual");
}

#[test]
fn test_steps_until_reached() {
    let mut arm = two_link();
    let solver = IKThreeLink::new();
    let target = Position::point(120.0, 50.0, 0.0);

    let mut steps = 0;
    let mut last = arm.tree.world_position(arm.hand);
    let result = loop {
        let result = solver.step_position(&mut arm.tree, arm.hand, &Point3::origin(), &target, 20.0);
        let here = arm.tree.world_position(arm.hand);
        assert!((here - last).norm() <= 20.0 + EPSILON);
        last = here;
        steps += 1;
        if result.is_terminal() || steps > 20 {
            break result;
        }
        assert_eq!(result, StepResult::Progress);
    };
    assert_eq!(result, StepResult::Success);
    assert!(steps > 1);
    assert_point_near(&last, &Point3::new(120.0, 50.0, 0.0), EPSILON);
}

#[test]
fn test_step_out_of_range() {
    let mut arm = two_link();
    let result = IKThreeLink::new().step_position(
        &mut arm.tree,
        arm.hand,
        &Point3::origin(),
        &Position::point(300.0, 0.0, 0.0),
        10.0,
    );
    assert_eq!(result, StepResult::Range);
}

#[test]
fn test_solver_from_tree() {
    let mut leg = leg();
    let solver = leg.tree.get_ik(leg.foot).unwrap();
    assert_eq!(solver.kind(), SolverKind::ThreeLink);
    let ori = Orientation::Rotation(UnitQuaternion::identity());
    assert!(solver.solve(
        &mut leg.tree,
        leg.foot,
        &Point3::origin(),
        &UnitQuaternion::identity(),
        &Position::point(50.0, 0.0, -30.0),
        1.0,
        &ori,
        0.0,
    ));
}
