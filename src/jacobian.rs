extern crate nalgebra as na;
use na::{DMatrix, DVector, Isometry3, Point3, Vector6};

use crate::kinematic_tree::{JointId, KinematicTree};

/// Struct representing the Jacobian matrix of the mobile joints above an effector
pub struct Jacobian {
    /// A 6xN matrix, one column per mobile joint, root first.
    ///
    /// The Jacobian matrix maps the joint velocities to the end-effector velocities.
    /// Each column corresponds to a joint, and each row corresponds to a degree of freedom
    /// of the end-effector (linear and angular velocities).
    matrix: DMatrix<f64>,

    /// Joints of the columns, in the same order.
    joints: Vec<JointId>,

    /// Singular values below this are treated as zero by the pseudoinverse
    epsilon: f64,
}

impl Jacobian {
    /// Constructs the Jacobian of point `p` (world frame) for the current configuration of the
    /// mobile joints among `joint` and its ancestors.
    ///
    /// # Arguments
    ///
    /// * `tree` - The kinematic tree holding the chain
    /// * `joint` - Last joint of the chain, usually the effector
    /// * `p` - Point moved by the chain, in world coordinates
    /// * `epsilon` - Singular value cutoff for the pseudoinverse
    pub fn new(tree: &KinematicTree, joint: JointId, p: &Point3<f64>, epsilon: f64) -> Self {
        let mut joints: Vec<JointId> = std::iter::once(joint)
            .chain(tree.ancestors(joint))
            .filter(|j| tree.joint(*j).is_mobile())
            .collect();
        joints.reverse();

        let columns = tree.mobile_jacobian(joint, p);
        let matrix = DMatrix::from_fn(6, columns.len(), |row, column| columns[column][row]);
        Self { matrix, joints, epsilon }
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Joints the columns (and the entries of returned vectors) refer to.
    pub fn joints(&self) -> &[JointId] {
        &self.joints
    }

    /// Computes the joint velocities required to achieve a desired end-effector velocity
    ///
    /// # Arguments
    ///
    /// * `desired_end_effector_velocity` - An Isometry3 representing the desired linear and angular velocity of the end-effector
    ///
    /// # Returns
    ///
    /// One velocity per mobile joint, or an error message if the computation fails.
    pub fn velocities(&self, desired_end_effector_velocity: &Isometry3<f64>) -> Result<Vec<f64>, &'static str> {
        self.velocities_from_vector(&twist(desired_end_effector_velocity))
    }

    /// Computes the joint velocities required to achieve a desired end-effector velocity,
    /// given as a 6D vector of linear and angular velocity. The chain rarely has six
    /// mobile joints, so this is always a least squares solution through the pseudoinverse.
    pub fn velocities_from_vector(&self, desired_end_effector_velocity: &Vector6<f64>) -> Result<Vec<f64>, &'static str> {
        if self.joints.is_empty() {
            return Ok(Vec::new());
        }
        let svd = self.matrix.clone().svd(true, true);
        let pseudo_inverse = svd.pseudo_inverse(self.epsilon)?;
        let desired = DVector::from_column_slice(desired_end_effector_velocity.as_slice());
        Ok((pseudo_inverse * desired).iter().copied().collect())
    }

    /// Computes the joint torques required to achieve a desired end-effector force/torque
    ///
    /// # Arguments
    ///
    /// * `desired_force_torque` - isometry structure representing forces and torgues
    ///                            rather than dimensions and angles.
    pub fn torques(&self, desired_force_torque: &Isometry3<f64>) -> Vec<f64> {
        self.torques_from_vector(&twist(desired_force_torque))
    }

    /// Computes the joint torques required to achieve a desired end-effector force/torque
    pub fn torques_from_vector(&self, desired_force_torque: &Vector6<f64>) -> Vec<f64> {
        let desired = DVector::from_column_slice(desired_force_torque.as_slice());
        (self.matrix.transpose() * desired).iter().copied().collect()
    }
}

/// Linear and angular part of an isometry, stacked.
fn twist(isometry: &Isometry3<f64>) -> Vector6<f64> {
    let linear = isometry.translation.vector;
    let angular = isometry.rotation.scaled_axis();
    Vector6::new(linear.x, linear.y, linear.z, angular.x, angular.y, angular.z)
}
