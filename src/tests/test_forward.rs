use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::{Point3, UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::kinematic_joint::KinematicJoint;
use crate::kinematic_tree::{JointId, KinematicTree};
use crate::tests::test_utils::{assert_near, assert_point_near, leg, pan_tilt, two_link};

const SEED: u64 = 0x5EED;

/// Random tree of revolute and prismatic joints, each attached below a random earlier one.
fn random_tree(rng: &mut StdRng, size: usize) -> (KinematicTree, Vec<JointId>) {
    let mut tree = KinematicTree::new();
    let mut joints = vec![tree.insert(KinematicJoint::revolute("j0"))];
    for i in 1..size {
        let parent = joints[rng.gen_range(0..joints.len())];
        let joint = if rng.gen_bool(0.2) {
            KinematicJoint::prismatic(format!("j{}", i)).with_limits(0.0, 50.0)
        } else {
            KinematicJoint::revolute(format!("j{}", i))
        };
        let joint = joint
            .with_dh(
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-PI..PI),
                rng.gen_range(0.0..40.0),
                rng.gen_range(-PI..PI),
            )
            .with_q_offset(rng.gen_range(-0.5..0.5));
        joints.push(tree.add_child(parent, joint).unwrap());
    }
    for joint in &joints {
        let (qmin, qmax) = (tree.joint(*joint).qmin(), tree.joint(*joint).qmax());
        tree.set_q(*joint, rng.gen_range(qmin..=qmax));
    }
    (tree, joints)
}

#[test]
fn test_two_link_forward() {
    let mut arm = two_link();
    assert_point_near(&arm.tree.world_position(arm.hand), &Point3::new(180.0, 0.0, 0.0), 1e-9);

    arm.tree.set_q(arm.shoulder, FRAC_PI_2);
    arm.tree.set_q(arm.elbow, -FRAC_PI_2);
    assert_point_near(&arm.tree.world_position(arm.elbow), &Point3::new(0.0, 100.0, 0.0), 1e-9);
    assert_point_near(&arm.tree.world_position(arm.hand), &Point3::new(80.0, 100.0, 0.0), 1e-9);
    assert!(arm.tree.world_quaternion(arm.hand).angle() < 1e-9);
}

#[test]
fn test_leg_forward() {
    let mut leg = leg();
    leg.tree.set_q(leg.hip_yaw, FRAC_PI_2);
    assert_point_near(&leg.tree.world_position(leg.foot), &Point3::new(0.0, 90.0, 0.0), 1e-9);

    // Pitch axis is horizontal, positive pitch lifts the leg
    leg.tree.set_q(leg.hip_yaw, 0.0);
    leg.tree.set_q(leg.hip_pitch, FRAC_PI_2);
    assert_point_near(&leg.tree.world_position(leg.foot), &Point3::new(0.0, 0.0, 90.0), 1e-9);

    leg.tree.set_q(leg.knee, -FRAC_PI_2);
    assert_point_near(&leg.tree.world_position(leg.foot), &Point3::new(50.0, 0.0, 40.0), 1e-9);
}

#[test]
fn test_prismatic_slides_along_axis() {
    let mut head = pan_tilt();
    head.tree.set_q(head.camera, 25.0);
    assert_point_near(&head.tree.world_position(head.camera), &Point3::new(0.0, 0.0, 25.0), 1e-9);

    head.tree.set_q(head.tilt, FRAC_PI_2);
    assert_point_near(&head.tree.world_position(head.camera), &Point3::new(25.0, 0.0, 0.0), 1e-9);

    // Clamped to the limits
    head.tree.set_q(head.camera, -5.0);
    assert_eq!(head.tree.q(head.camera), 0.0);
}

#[test]
fn test_world_rotation_matches_quaternion() {
    let mut head = pan_tilt();
    head.tree.set_q(head.pan, 0.3);
    head.tree.set_q(head.tilt, -0.7);
    let rotation = head.tree.world_rotation(head.camera);
    let quaternion = head.tree.world_quaternion(head.camera);
    let v = Vector3::new(1.0, 2.0, 3.0);
    assert!((rotation * v - quaternion * v).norm() < 1e-12);
}

#[test]
fn test_between_matches_composition() {
    let mut rng = StdRng::seed_from_u64(SEED);
    for _ in 0..10 {
        let (tree, joints) = random_tree(&mut rng, 12);
        for _ in 0..20 {
            let from = joints[rng.gen_range(0..joints.len())];
            let to = joints[rng.gen_range(0..joints.len())];
            let expected = tree.full_inv_t(to) * tree.full_t(from);
            let actual = tree.t_between(from, to);

            let p = Point3::new(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0));
            assert_point_near(&(actual * p), &(expected * p), 1e-6);
            assert!(tree.quaternion_between(from, to).angle_to(&expected.rotation) < 1e-9);
        }
    }
}

#[test]
fn test_common_ancestor_is_lowest() {
    let mut rng = StdRng::seed_from_u64(SEED + 1);
    let (tree, joints) = random_tree(&mut rng, 30);
    for _ in 0..50 {
        let a = joints[rng.gen_range(0..joints.len())];
        let b = joints[rng.gen_range(0..joints.len())];
        let lca = tree.common_ancestor(a, b).unwrap();

        assert!(lca == a || tree.is_ancestor(lca, a));
        assert!(lca == b || tree.is_ancestor(lca, b));
        // No branch of the ancestor is above both
        for branch in tree.branches(lca) {
            let over_a = *branch == a || tree.is_ancestor(*branch, a);
            let over_b = *branch == b || tree.is_ancestor(*branch, b);
            assert!(!(over_a && over_b));
        }
    }
}

#[test]
fn test_limits_hold_for_any_q() {
    let mut rng = StdRng::seed_from_u64(SEED + 2);
    let mut arm = two_link();
    arm.tree.set_limits(arm.elbow, -1.0, 2.0);
    for _ in 0..100 {
        let x = rng.gen_range(-10.0..10.0);
        let within = arm.tree.try_q(arm.elbow, x);
        let q = arm.tree.q(arm.elbow);
        assert!((-1.0..=2.0).contains(&q));
        assert_eq!(within, (-1.0..=2.0).contains(&x));
        if within {
            assert_eq!(q, x);
        }
    }
}

#[test]
fn test_set_q_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(SEED + 3);
    let (mut tree, joints) = random_tree(&mut rng, 8);
    let leaf = *joints.last().unwrap();
    let before = tree.full_t(leaf);
    for joint in &joints {
        let q = tree.q(*joint);
        tree.set_q(*joint, q);
    }
    let after = tree.full_t(leaf);
    assert!((before.translation.vector - after.translation.vector).norm() < 1e-12);
    assert!(before.rotation.angle_to(&after.rotation) < 1e-12);
}

#[test]
fn test_reconfigure_moves_subtree() {
    let mut arm = two_link();
    arm.tree
        .reconfigure(arm.elbow, |joint| joint.set_dh(crate::kinematic_joint::DhParameters::new(0.0, 0.0, 50.0, 0.0)))
        .unwrap();
    assert_point_near(&arm.tree.world_position(arm.hand), &Point3::new(130.0, 0.0, 0.0), 1e-9);
}

#[test]
fn test_theta_and_offset() {
    let mut tree = KinematicTree::new();
    let base = tree.insert(KinematicJoint::revolute("base").with_q_offset(FRAC_PI_2));
    let link = tree
        .add_child(base, KinematicJoint::fixed("link").with_dh(5.0, FRAC_PI_2, 10.0, 0.0))
        .unwrap();
    // theta turns the link, the base offset turns it once more
    assert_point_near(&tree.world_position(link), &Point3::new(-10.0, 0.0, 5.0), 1e-9);
    let expected = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI);
    assert!(tree.world_quaternion(link).angle_to(&expected) < 1e-9);
    assert_near(tree.joint(link).d(), 5.0, 1e-12, "d");
}
