//! Position and orientation targets for the IK solvers.
//!
//! A target may leave some freedom to the solver: a `Point` must be matched exactly,
//! while a `Plane` accepts any point on it. Each target reports an error gradient,
//! the direction of decreasing error from a candidate effector pose.

extern crate nalgebra as na;

use na::{Point3, Unit, UnitQuaternion, Vector3};

/// Degenerate axes shorter than this are treated as zero.
const AXIS_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub enum Position {
    /// No freedom, must reach the point.
    Point(Point3<f64>),

    /// One freedom, slide along the line.
    Line {
        origin: Point3<f64>,
        direction: Unit<Vector3<f64>>,
    },

    /// Two freedoms, anywhere on the plane `normal · p + d = 0`.
    Plane {
        normal: Unit<Vector3<f64>>,
        d: f64,
    },
}

impl Position {
    pub fn point(x: f64, y: f64, z: f64) -> Self {
        Position::Point(Point3::new(x, y, z))
    }

    /// Line through `origin`. A zero direction degenerates into the point `origin`.
    pub fn line(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
        match Unit::try_new(direction, AXIS_EPSILON) {
            Some(direction) => Position::Line { origin, direction },
            None => Position::Point(origin),
        }
    }

    /// Plane with the given normal and offset. The normal is normalized, and `d` scaled
    /// with it, so the plane stays the same. Returns None for a zero normal.
    pub fn plane(normal: Vector3<f64>, d: f64) -> Option<Self> {
        let length = normal.norm();
        if length < AXIS_EPSILON {
            return None;
        }
        Some(Position::Plane {
            normal: Unit::new_unchecked(normal / length),
            d: d / length,
        })
    }

    /// Vector from `p` to the closest point satisfying this constraint.
    pub fn error_gradient(&self, p: &Point3<f64>, _r: &UnitQuaternion<f64>) -> Vector3<f64> {
        match self {
            Position::Point(target) => target - p,
            Position::Line { origin, direction } => {
                let direction = direction.into_inner();
                let along = (p - origin).dot(&direction);
                (origin + direction * along) - p
            }
            Position::Plane { normal, d } => {
                let normal = normal.into_inner();
                let t = -(p.coords.dot(&normal) + d);
                normal * t
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Orientation {
    /// No freedom, exact rotation.
    Rotation(UnitQuaternion<f64>),

    /// One freedom: the effector z axis must point along the given axis, roll is free.
    Parallel(Unit<Vector3<f64>>),

    /// The effector `local_axis` must stay within `half_angle` of `target_axis`.
    Cone {
        local_axis: Unit<Vector3<f64>>,
        target_axis: Unit<Vector3<f64>>,
        half_angle: f64,
    },
}

impl Orientation {
    pub fn parallel(axis: Vector3<f64>) -> Option<Self> {
        Unit::try_new(axis, AXIS_EPSILON).map(Orientation::Parallel)
    }

    pub fn cone(local_axis: Vector3<f64>, target_axis: Vector3<f64>, half_angle: f64) -> Option<Self> {
        Some(Orientation::Cone {
            local_axis: Unit::try_new(local_axis, AXIS_EPSILON)?,
            target_axis: Unit::try_new(target_axis, AXIS_EPSILON)?,
            half_angle: half_angle.abs(),
        })
    }

    /// Rotation (in world frame) that takes the current effector rotation `r` towards
    /// the closest rotation satisfying this constraint.
    pub fn error_gradient(&self, _p: &Point3<f64>, r: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
        match self {
            Orientation::Rotation(target) => target * r.inverse(),
            Orientation::Parallel(target) => {
                let current = r * Vector3::z();
                rotation_towards(&current, target, 0.0)
            }
            Orientation::Cone { local_axis, target_axis, half_angle } => {
                let current = r * local_axis.into_inner();
                rotation_towards(&current, target_axis, *half_angle)
            }
        }
    }
}

/// Rotation bringing `from` to within `slack` radians of `to`. Identity if already there.
fn rotation_towards(from: &Vector3<f64>, to: &Unit<Vector3<f64>>, slack: f64) -> UnitQuaternion<f64> {
    let to = to.into_inner();
    let cross = from.cross(&to);
    let angle = cross.norm().atan2(from.dot(&to));
    if angle <= slack {
        return UnitQuaternion::identity();
    }
    let axis = match Unit::try_new(cross, AXIS_EPSILON) {
        Some(axis) => axis,
        // Antiparallel, any perpendicular axis will do
        None => {
            let helper = if from.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
            match Unit::try_new(from.cross(&helper), AXIS_EPSILON) {
                Some(axis) => axis,
                None => return UnitQuaternion::identity(),
            }
        }
    };
    UnitQuaternion::from_axis_angle(&axis, angle - slack)
}
