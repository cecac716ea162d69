//! Helper functions

use std::f64::consts::{PI, TAU};

use nalgebra::{Isometry3, UnitQuaternion};

/// Brings an angle into `[-π, π]`, nearest representation of the same direction.
pub fn normalize_angle(a: f64) -> f64 {
    a - (a / TAU).round() * TAU
}

/// Normalizes an angle into `(-π, π)` by shifting it half a turn towards zero first.
/// Zero stays zero.
pub fn ang_norm(a: f64) -> f64 {
    if a == 0.0 {
        return 0.0;
    }
    let bias = PI.copysign(a);
    (a + bias) % TAU - bias
}

/// Distance between two angles, between 0 and π.
pub fn ang_dist(a1: f64, a2: f64) -> f64 {
    let angle = (a1 - a2).abs() % TAU;
    if angle > PI { TAU - angle } else { angle }
}

/// Print joint values, converting radians to degrees.
#[allow(dead_code)]
pub fn dump_joints(joints: &[f64]) {
    let mut row_str = String::new();
    for computed in joints {
        row_str.push_str(&format!("{:5.2} ", computed.to_degrees()));
    }
    println!("[{}]", row_str.trim_end());
}

pub fn dump_pose(isometry: &Isometry3<f64>) {
    let translation = isometry.translation.vector;
    let rotation: UnitQuaternion<f64> = isometry.rotation;

    println!(
        "x: {:.5}, y: {:.5}, z: {:.5},  quat: {:.5},{:.5},{:.5},{:.5}",
        translation.x, translation.y, translation.z, rotation.i, rotation.j, rotation.k, rotation.w
    );
}

/// formatting for YAML output
pub(crate) fn deg(x: &f64) -> String {
    if *x == 0.0 {
        return "0".to_string();
    }
    format!("deg({:.4})", x.to_degrees())
}

pub fn assert_pose_eq(ta: &Isometry3<f64>, tb: &Isometry3<f64>,
                 distance_tolerance: f64, angular_tolerance: f64) -> bool {
    fn bad(ta: &Isometry3<f64>, tb: &Isometry3<f64>) {
        dump_pose(ta);
        dump_pose(tb);
    }

    let translation_distance = (ta.translation.vector - tb.translation.vector).norm();
    let angular_distance = ta.rotation.angle_to(&tb.rotation);

    if translation_distance.abs() > distance_tolerance {
        bad(ta, tb);
        panic!("Poses have too different translations");
    }

    if angular_distance.abs() > angular_tolerance {
        bad(ta, tb);
        panic!("Poses have too different angles");
    }
    true
}
