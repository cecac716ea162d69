//! A single joint of a kinematic tree: Denavit-Hartenberg geometry, actuation value and limits.
//!
//! The DH fields are applied in the order `d, θ, r, α`: θ and d align the previous joint's
//! x axis with this joint's x axis, r translates along that x axis to this joint's origin,
//! and α rotates about it to define this joint's z (actuation) axis. Hence
//!
//! ```text
//! To = Translation(r·cosθ, r·sinθ, d) · Rz(θ) · Rx(α)
//! Tq = To · Rz(q + q_offset)    (revolute)
//! Tq = To · Tz(q + q_offset)    (prismatic)
//! ```
//!
//! Both transforms are cached and recomputed whenever a DH field or q changes. Tree
//! structure (parent and branches) is kept by [`crate::kinematic_tree::KinematicTree`].

use std::fmt;

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

use crate::link_component::LinkComponent;

/// Values this close outside the limits still count as within limits for [`KinematicJoint::try_q`].
pub const LIMIT_TOLERANCE: f64 = f32::EPSILON as f64 * 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JointType {
    #[default]
    Revolute,
    Prismatic,
}

impl JointType {
    pub fn from_name(name: &str) -> Option<JointType> {
        match name.trim().to_ascii_lowercase().as_str() {
            "revolute" => Some(JointType::Revolute),
            "prismatic" => Some(JointType::Prismatic),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JointType::Revolute => "revolute",
            JointType::Prismatic => "prismatic",
        }
    }
}

/// Key into an external output (motor) numbering. Only passed through by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActuatorKey {
    Index(usize),
    Name(String),
}

impl fmt::Display for ActuatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorKey::Index(index) => write!(f, "{}", index),
            ActuatorKey::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Denavit-Hartenberg parameters of a joint (fixed geometry).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DhParameters {
    pub d: f64,
    pub theta: f64,
    pub r: f64,
    pub alpha: f64,
}

impl DhParameters {
    pub fn new(d: f64, theta: f64, r: f64, alpha: f64) -> Self {
        DhParameters { d, theta, r, alpha }
    }

    /// Transform of these parameters with q = 0.
    pub fn transform(&self) -> Isometry3<f64> {
        let (sin, cos) = self.theta.sin_cos();
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.theta)
            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), self.alpha);
        Isometry3::from_parts(
            Translation3::new(self.r * cos, self.r * sin, self.d),
            rotation,
        )
    }
}

#[derive(Debug, Clone)]
pub struct KinematicJoint {
    pub name: String,
    /// Cross-reference to the motor driving this joint, if any.
    pub output: Option<ActuatorKey>,
    /// Mass and collision data of the link frame itself.
    pub link: LinkComponent,
    /// Further parts rigidly attached to the link frame.
    pub components: Vec<LinkComponent>,

    joint_type: JointType,
    dh: DhParameters,
    q_offset: f64,
    q: f64,
    qmin: f64,
    qmax: f64,
    ik_solver: String,

    to: Isometry3<f64>,
    tq: Isometry3<f64>,
}

impl KinematicJoint {
    pub fn new(name: impl Into<String>, joint_type: JointType) -> Self {
        KinematicJoint {
            name: name.into(),
            output: None,
            link: LinkComponent::default(),
            components: Vec::new(),
            joint_type,
            dh: DhParameters::default(),
            q_offset: 0.0,
            q: 0.0,
            qmin: 0.0,
            qmax: 0.0,
            ik_solver: String::new(),
            to: Isometry3::identity(),
            tq: Isometry3::identity(),
        }
    }

    /// Revolute joint free to turn a full circle.
    pub fn revolute(name: impl Into<String>) -> Self {
        Self::new(name, JointType::Revolute).with_limits(-std::f64::consts::PI, std::f64::consts::PI)
    }

    /// Prismatic joint, immobile until limits are given.
    pub fn prismatic(name: impl Into<String>) -> Self {
        Self::new(name, JointType::Prismatic)
    }

    /// Immobile frame (qmin == qmax == 0).
    pub fn fixed(name: impl Into<String>) -> Self {
        Self::new(name, JointType::Revolute)
    }

    pub fn with_dh(mut self, d: f64, theta: f64, r: f64, alpha: f64) -> Self {
        self.set_dh(DhParameters::new(d, theta, r, alpha));
        self
    }

    pub fn with_limits(mut self, qmin: f64, qmax: f64) -> Self {
        self.set_limits(qmin, qmax);
        self
    }

    pub fn with_q_offset(mut self, q_offset: f64) -> Self {
        self.set_q_offset(q_offset);
        self
    }

    pub fn with_q(mut self, q: f64) -> Self {
        self.set_q(q);
        self
    }

    pub fn with_output(mut self, output: ActuatorKey) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_ik_solver(mut self, solver: impl Into<String>) -> Self {
        self.ik_solver = solver.into();
        self
    }

    pub fn with_mass(mut self, mass: f64, center_of_mass: nalgebra::Point3<f64>) -> Self {
        self.link.mass = mass;
        self.link.center_of_mass = center_of_mass;
        self
    }

    pub fn joint_type(&self) -> JointType {
        self.joint_type
    }

    pub fn dh(&self) -> &DhParameters {
        &self.dh
    }

    pub fn d(&self) -> f64 {
        self.dh.d
    }

    pub fn theta(&self) -> f64 {
        self.dh.theta
    }

    pub fn r(&self) -> f64 {
        self.dh.r
    }

    pub fn alpha(&self) -> f64 {
        self.dh.alpha
    }

    pub fn q_offset(&self) -> f64 {
        self.q_offset
    }

    pub fn q(&self) -> f64 {
        self.q
    }

    pub fn qmin(&self) -> f64 {
        self.qmin
    }

    pub fn qmax(&self) -> f64 {
        self.qmax
    }

    /// Name of the IK solver this joint asks for, empty for the default.
    pub fn ik_solver(&self) -> &str {
        &self.ik_solver
    }

    /// DH transform from the parent link frame, ignoring q.
    pub fn to(&self) -> &Isometry3<f64> {
        &self.to
    }

    /// DH transform from the parent link frame, including q.
    pub fn tq(&self) -> &Isometry3<f64> {
        &self.tq
    }

    /// Origin of this joint in the parent link frame.
    pub fn position(&self) -> Vector3<f64> {
        self.tq.translation.vector
    }

    /// Rotation of this joint's link frame relative to the parent link frame.
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.tq.rotation
    }

    pub fn set_joint_type(&mut self, joint_type: JointType) {
        self.joint_type = joint_type;
        self.update_tq();
    }

    pub fn set_dh(&mut self, dh: DhParameters) {
        self.dh = dh;
        self.to = dh.transform();
        self.update_tq();
    }

    pub fn set_q_offset(&mut self, q_offset: f64) {
        self.q_offset = q_offset;
        self.update_tq();
    }

    pub fn set_ik_solver(&mut self, solver: impl Into<String>) {
        self.ik_solver = solver.into();
    }

    /// Sets the joint limits (in either order) and clamps q into them.
    pub fn set_limits(&mut self, qmin: f64, qmax: f64) {
        let (qmin, qmax) = if qmin <= qmax { (qmin, qmax) } else { (qmax, qmin) };
        self.qmin = qmin;
        self.qmax = qmax;
        self.assign_q(self.q.clamp(qmin, qmax));
    }

    /// Joints with equal limits are fixed frames, skipped by the solvers.
    pub fn is_mobile(&self) -> bool {
        self.qmin != self.qmax
    }

    /// True if `x` is within the joint limits, inclusive.
    pub fn valid_q(&self, x: f64) -> bool {
        self.qmin <= x && x <= self.qmax
    }

    /// Moves to `x` clamped into the limits. Returns false if `x` had to be clamped by more
    /// than [`LIMIT_TOLERANCE`]; this is the joint limit signal the solvers rely on.
    pub fn try_q(&mut self, x: f64) -> bool {
        if x.is_nan() {
            return false;
        }
        if x > self.qmax {
            self.assign_q(self.qmax);
            x - LIMIT_TOLERANCE < self.qmax
        } else if x < self.qmin {
            self.assign_q(self.qmin);
            x + LIMIT_TOLERANCE > self.qmin
        } else {
            self.assign_q(x);
            true
        }
    }

    /// Moves to `x` clamped into the limits, without reporting whether clamping happened.
    pub fn set_q(&mut self, x: f64) {
        if !x.is_nan() {
            self.assign_q(x.clamp(self.qmin, self.qmax));
        }
    }

    /// Locks the joint at `x`, making it immobile.
    pub fn freeze_q(&mut self, x: f64) {
        self.qmin = x;
        self.qmax = x;
        self.assign_q(x);
    }

    fn assign_q(&mut self, x: f64) {
        if self.q != x {
            self.q = x;
            self.update_tq();
        }
    }

    fn update_tq(&mut self) {
        let value = self.q + self.q_offset;
        self.tq = match self.joint_type {
            JointType::Revolute => self.to * Isometry3::rotation(Vector3::z() * value),
            JointType::Prismatic => self.to * Isometry3::translation(0.0, 0.0, value),
        };
    }
}
