//! Error types for tree construction and chain loading

use thiserror::Error;

use crate::kinematic_tree::JointId;

/// Structural errors of the kinematic tree. These are configuration mistakes,
/// expected only while a chain is being built or loaded, never during control.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KinematicsError {
    #[error("Joint handle {0} does not refer to a live joint in this tree")]
    InvalidJoint(JointId),

    #[error("Joint {0} cannot be added as a branch of itself")]
    SelfBranch(JointId),

    #[error("Joint {branch} already has parent {parent}, remove it there first")]
    AlreadyAttached { branch: JointId, parent: JointId },

    #[error("Adding {branch} under {parent} would create a cycle")]
    Cycle { branch: JointId, parent: JointId },

    #[error("Joint {branch} is not a branch of {parent}")]
    NotABranch { branch: JointId, parent: JointId },

    #[error("Solver '{solver}' does not support this chain: {reason}")]
    UnsupportedChain { solver: String, reason: String },

    #[error("No IK solver could be constructed for joint {joint} (requested '{requested}')")]
    NoSolver { joint: JointId, requested: String },
}

/// Unified error to report failures while reading or writing chain descriptions.
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse Error: {0}")]
    ParseError(String),

    #[error("Missing Field: {0}")]
    MissingField(String),

    #[error("Wrong angle representation: {0}")]
    WrongAngle(String),

    #[error("Invalid chain structure: {0}")]
    Structure(#[from] KinematicsError),
}
