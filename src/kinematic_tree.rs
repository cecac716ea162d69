//! Tree of kinematic joints.
//!
//! Joints live in an arena and are addressed by [`JointId`] handles. Each entry keeps its
//! parent handle and the handles of its branches, so the tree owns every joint exactly once
//! and cycles are rejected when a branch is attached. Handles of removed joints become stale
//! and are never reused for a different joint.
//!
//! Query methods taking a `JointId` panic on a stale handle, like indexing a slice does.
//! Structural operations return [`KinematicsError::InvalidJoint`] instead.

use std::fmt;
use std::ops::Index;
use std::sync::mpsc::Receiver;

use nalgebra::{Isometry3, Matrix4, Point3, Rotation3, UnitQuaternion, Vector3, Vector4, Vector6};

use crate::errors::KinematicsError;
use crate::events::{EventBus, TreeEvent};
use crate::kinematic_joint::{ActuatorKey, JointType, KinematicJoint};
use crate::link_component::BoundingBox3;
use crate::solver_registry::{Solver, resolve_solver};

/// Handle of a joint in a [`KinematicTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId {
    index: u32,
    generation: u32,
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

#[derive(Debug, Clone)]
struct Node {
    joint: KinematicJoint,
    parent: Option<JointId>,
    branches: Vec<JointId>,
    solver: Option<Solver>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug, Clone, Default)]
pub struct KinematicTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    events: EventBus,
}

/// Iterator over the ancestors of a joint, nearest first.
pub struct Ancestors<'a> {
    tree: &'a KinematicTree,
    next: Option<JointId>,
}

impl Iterator for Ancestors<'_> {
    type Item = JointId;

    fn next(&mut self) -> Option<JointId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

impl Index<JointId> for KinematicTree {
    type Output = KinematicJoint;

    fn index(&self, id: JointId) -> &KinematicJoint {
        self.joint(id)
    }
}

impl KinematicTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an unattached joint. It is a root until added as a branch somewhere.
    pub fn insert(&mut self, joint: KinematicJoint) -> JointId {
        let node = Node {
            joint,
            parent: None,
            branches: Vec::new(),
            solver: None,
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            JointId { index, generation: slot.generation }
        } else {
            self.slots.push(Slot { generation: 0, node: Some(node) });
            JointId { index: (self.slots.len() - 1) as u32, generation: 0 }
        }
    }

    /// Inserts `joint` and attaches it as a branch of `parent`.
    pub fn add_child(&mut self, parent: JointId, joint: KinematicJoint) -> Result<JointId, KinematicsError> {
        if !self.contains(parent) {
            return Err(KinematicsError::InvalidJoint(parent));
        }
        let child = self.insert(joint);
        self.add_branch(parent, child)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: JointId) -> bool {
        self.node(id).is_some()
    }

    fn node(&self, id: JointId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: JointId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    fn live(&self, id: JointId) -> &Node {
        match self.node(id) {
            Some(node) => node,
            None => panic!("stale joint handle {}", id),
        }
    }

    fn live_mut(&mut self, id: JointId) -> &mut Node {
        match self.node_mut(id) {
            Some(node) => node,
            None => panic!("stale joint handle {}", id),
        }
    }

    pub fn get(&self, id: JointId) -> Option<&KinematicJoint> {
        self.node(id).map(|node| &node.joint)
    }

    /// # Panics
    /// If `id` is stale.
    pub fn joint(&self, id: JointId) -> &KinematicJoint {
        &self.live(id).joint
    }

    /// All live joints, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (JointId, &KinematicJoint)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().map(|node| {
                (JointId { index: index as u32, generation: slot.generation }, &node.joint)
            })
        })
    }

    pub fn roots(&self) -> Vec<JointId> {
        self.iter()
            .map(|(id, _)| id)
            .filter(|id| self.parent(*id).is_none())
            .collect()
    }

    /// First joint with the given name.
    pub fn find(&self, name: &str) -> Option<JointId> {
        self.iter().find(|(_, joint)| joint.name == name).map(|(id, _)| id)
    }

    pub fn subscribe(&mut self) -> Receiver<TreeEvent> {
        self.events.subscribe()
    }

    /// Changes joint configuration (DH parameters, type, solver name, ...) through `f`.
    /// Cached solvers of the joint and its descendants are dropped, as their chain geometry
    /// may have changed, and a [`TreeEvent::Reconfigured`] is published.
    pub fn reconfigure<F>(&mut self, id: JointId, f: F) -> Result<(), KinematicsError>
    where
        F: FnOnce(&mut KinematicJoint),
    {
        let node = self.node_mut(id).ok_or(KinematicsError::InvalidJoint(id))?;
        f(&mut node.joint);
        self.drop_solvers(id);
        self.events.publish(TreeEvent::Reconfigured(id));
        Ok(())
    }

    fn drop_solvers(&mut self, id: JointId) {
        for joint in self.subtree(id) {
            if let Some(node) = self.node_mut(joint) {
                node.solver = None;
            }
        }
    }

    // ---- structure ----

    /// Attaches `branch` (a root) under `parent`. A joint that already has a parent, the same
    /// one included, must be removed there first.
    pub fn add_branch(&mut self, parent: JointId, branch: JointId) -> Result<JointId, KinematicsError> {
        if !self.contains(parent) {
            return Err(KinematicsError::InvalidJoint(parent));
        }
        let current_parent = self.node(branch).ok_or(KinematicsError::InvalidJoint(branch))?.parent;
        if branch == parent {
            return Err(KinematicsError::SelfBranch(branch));
        }
        if let Some(p) = current_parent {
            return Err(KinematicsError::AlreadyAttached { branch, parent: p });
        }
        if self.is_ancestor(branch, parent) {
            return Err(KinematicsError::Cycle { branch, parent });
        }

        self.live_mut(branch).parent = Some(parent);
        self.live_mut(parent).branches.push(branch);
        self.drop_solvers(branch);
        self.events.publish(TreeEvent::BranchAdded { parent, branch });
        Ok(branch)
    }

    /// Detaches `branch` from `parent`; it stays in the tree as a root of its own subtree.
    pub fn remove_branch(&mut self, parent: JointId, branch: JointId) -> Result<JointId, KinematicsError> {
        if !self.contains(parent) {
            return Err(KinematicsError::InvalidJoint(parent));
        }
        if self.node(branch).ok_or(KinematicsError::InvalidJoint(branch))?.parent != Some(parent) {
            return Err(KinematicsError::NotABranch { branch, parent });
        }
        self.live_mut(parent).branches.retain(|b| *b != branch);
        self.live_mut(branch).parent = None;
        self.drop_solvers(branch);
        self.events.publish(TreeEvent::BranchRemoved { parent, branch });
        Ok(branch)
    }

    /// Destroys every joint below `id`.
    pub fn clear_branches(&mut self, id: JointId) -> Result<(), KinematicsError> {
        let branches = self.node(id).ok_or(KinematicsError::InvalidJoint(id))?.branches.clone();
        for branch in branches {
            self.remove_branch(id, branch)?;
            self.destroy(branch);
        }
        Ok(())
    }

    /// Detaches `id` from its parent, if any, and destroys it with its whole subtree.
    pub fn remove(&mut self, id: JointId) -> Result<(), KinematicsError> {
        let parent = self.node(id).ok_or(KinematicsError::InvalidJoint(id))?.parent;
        if let Some(parent) = parent {
            self.remove_branch(parent, id)?;
        }
        self.destroy(id);
        Ok(())
    }

    fn destroy(&mut self, id: JointId) {
        for joint in self.subtree(id) {
            let slot = &mut self.slots[joint.index as usize];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(joint.index);
        }
    }

    pub fn parent(&self, id: JointId) -> Option<JointId> {
        self.live(id).parent
    }

    pub fn branches(&self, id: JointId) -> &[JointId] {
        &self.live(id).branches
    }

    pub fn is_branch(&self, parent: JointId, id: JointId) -> bool {
        self.node(id).is_some_and(|node| node.parent == Some(parent))
    }

    /// First branch, in insertion order. Only meaningful for unbranched chains.
    pub fn next_joint(&self, id: JointId) -> Option<JointId> {
        self.branches(id).first().copied()
    }

    /// Ancestors of `id`, starting with its parent.
    pub fn ancestors(&self, id: JointId) -> Ancestors<'_> {
        Ancestors { tree: self, next: self.parent(id) }
    }

    /// True if `ancestor` is `id` or lies on the path from `id` to the root.
    pub fn is_ancestor(&self, ancestor: JointId, id: JointId) -> bool {
        id == ancestor || self.ancestors(id).any(|a| a == ancestor)
    }

    pub fn root(&self, id: JointId) -> JointId {
        self.ancestors(id).last().unwrap_or(id)
    }

    /// 0 for a root, otherwise one plus the depth of the parent.
    pub fn depth(&self, id: JointId) -> usize {
        self.ancestors(id).count()
    }

    pub fn next_mobile_ancestor(&self, id: JointId) -> Option<JointId> {
        self.ancestors(id).find(|a| self.joint(*a).is_mobile())
    }

    /// Names from the root down to `id`, each preceded by `separator`.
    pub fn path(&self, id: JointId, separator: &str) -> String {
        let mut names: Vec<&str> = self.ancestors(id).map(|a| self.joint(a).name.as_str()).collect();
        names.reverse();
        names.push(&self.joint(id).name);
        names.iter().map(|name| format!("{}{}", separator, name)).collect()
    }

    /// `id` and all joints below it, parents before children.
    pub fn subtree(&self, id: JointId) -> Vec<JointId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.node(current) {
                result.push(current);
                stack.extend(node.branches.iter().rev());
            }
        }
        result
    }

    // ---- actuation values ----

    pub fn q(&self, id: JointId) -> f64 {
        self.joint(id).q()
    }

    /// See [`KinematicJoint::try_q`].
    pub fn try_q(&mut self, id: JointId, x: f64) -> bool {
        self.live_mut(id).joint.try_q(x)
    }

    pub fn set_q(&mut self, id: JointId, x: f64) {
        self.live_mut(id).joint.set_q(x);
    }

    /// Fixes the joint at `x`. Solvers below it are dropped, they hold a copy of its limits.
    pub fn freeze_q(&mut self, id: JointId, x: f64) {
        self.live_mut(id).joint.freeze_q(x);
        self.drop_solvers(id);
    }

    /// Like [`Self::freeze_q`], cached solvers of the subtree are rebuilt on next use.
    pub fn set_limits(&mut self, id: JointId, qmin: f64, qmax: f64) {
        self.live_mut(id).joint.set_limits(qmin, qmax);
        self.drop_solvers(id);
    }

    /// Sets q = 0 on `id` and every mobile joint below it.
    pub fn zero_children_q(&mut self, id: JointId) {
        for joint in self.subtree(id) {
            self.live_mut(joint).joint.set_q(0.0);
        }
    }

    /// Sets q = 0 on `id` and every mobile joint up to the root.
    pub fn zero_ancestor_q(&mut self, id: JointId) {
        let path: Vec<JointId> = std::iter::once(id).chain(self.ancestors(id)).collect();
        for joint in path {
            self.live_mut(joint).joint.set_q(0.0);
        }
    }

    // ---- transforms ----

    /// Product of `Tq` from just below `end` down to `id`. With `end == None`, up to the root.
    fn chain_t(&self, id: JointId, end: Option<JointId>) -> Isometry3<f64> {
        let mut t = Isometry3::identity();
        let mut current = Some(id);
        while let Some(joint) = current {
            if Some(joint) == end {
                break;
            }
            let node = self.live(joint);
            t = node.joint.tq() * t;
            current = node.parent;
        }
        t
    }

    /// Transform from the link frame of `id` to the root (world) frame.
    pub fn full_t(&self, id: JointId) -> Isometry3<f64> {
        self.chain_t(id, None)
    }

    /// Transform from the world frame to the link frame of `id`.
    pub fn full_inv_t(&self, id: JointId) -> Isometry3<f64> {
        self.full_t(id).inverse()
    }

    /// Lowest joint that is an ancestor of (or equal to) both. Both chains are walked up
    /// in lockstep, so a near common ancestor is found without walking to the root.
    pub fn common_ancestor(&self, a: JointId, b: JointId) -> Option<JointId> {
        if a == b {
            return Some(a);
        }
        let mut seen_a = vec![a];
        let mut seen_b = vec![b];
        let mut walk_a = self.parent(a);
        let mut walk_b = self.parent(b);
        while walk_a.is_some() || walk_b.is_some() {
            if let Some(x) = walk_a {
                if seen_b.contains(&x) {
                    return Some(x);
                }
                seen_a.push(x);
                walk_a = self.parent(x);
            }
            if let Some(y) = walk_b {
                if seen_a.contains(&y) {
                    return Some(y);
                }
                seen_b.push(y);
                walk_b = self.parent(y);
            }
        }
        None
    }

    /// Transform from the link frame of `from` to the link frame of `to`. Joints in
    /// different trees are related through their roots, as if both roots coincided.
    pub fn t_between(&self, from: JointId, to: JointId) -> Isometry3<f64> {
        if from == to {
            return Isometry3::identity();
        }
        match self.common_ancestor(from, to) {
            Some(lca) => {
                let from_up = self.chain_t(from, Some(lca));
                let to_up = self.chain_t(to, Some(lca));
                to_up.inverse() * from_up
            }
            None => self.full_inv_t(to) * self.full_t(from),
        }
    }

    /// Rotation from the link frame of `from` to the link frame of `to`.
    pub fn quaternion_between(&self, from: JointId, to: JointId) -> UnitQuaternion<f64> {
        self.t_between(from, to).rotation
    }

    /// Origin of the joint in world coordinates.
    pub fn world_position(&self, id: JointId) -> Point3<f64> {
        Point3::from(self.full_t(id).translation.vector)
    }

    pub fn world_quaternion(&self, id: JointId) -> UnitQuaternion<f64> {
        self.full_t(id).rotation
    }

    pub fn world_rotation(&self, id: JointId) -> Rotation3<f64> {
        self.world_quaternion(id).to_rotation_matrix()
    }

    /// Origin of the parent frame, expressed in the link frame of `id`.
    pub fn parent_position(&self, id: JointId) -> Point3<f64> {
        self.joint(id).tq().inverse_transform_point(&Point3::origin())
    }

    // ---- Jacobian ----

    /// Column of the Jacobian for moving point `p` (world frame) by this joint:
    /// linear velocity on top, angular velocity below.
    pub fn joint_jacobian(&self, id: JointId, p: &Point3<f64>) -> Vector6<f64> {
        let t = self.full_t(id);
        let z = t.rotation * Vector3::z();
        match self.joint(id).joint_type() {
            JointType::Revolute => {
                let lever = p - Point3::from(t.translation.vector);
                let linear = z.cross(&lever);
                Vector6::new(linear.x, linear.y, linear.z, z.x, z.y, z.z)
            }
            JointType::Prismatic => Vector6::new(z.x, z.y, z.z, 0.0, 0.0, 0.0),
        }
    }

    /// Jacobian columns of `id` and all its ancestors, root first.
    pub fn full_jacobian(&self, id: JointId, p: &Point3<f64>) -> Vec<Vector6<f64>> {
        let mut chain: Vec<JointId> = std::iter::once(id).chain(self.ancestors(id)).collect();
        chain.reverse();
        chain.iter().map(|joint| self.joint_jacobian(*joint, p)).collect()
    }

    /// Jacobian columns of the mobile joints among `id` and its ancestors, root first.
    pub fn mobile_jacobian(&self, id: JointId, p: &Point3<f64>) -> Vec<Vector6<f64>> {
        let mut chain: Vec<JointId> = std::iter::once(id)
            .chain(self.ancestors(id))
            .filter(|joint| self.joint(*joint).is_mobile())
            .collect();
        chain.reverse();
        chain.iter().map(|joint| self.joint_jacobian(*joint, p)).collect()
    }

    // ---- mass and bounds ----

    /// Homogeneous mass vector of the joint's own link and components, branches excluded.
    pub fn sum_link_center_of_mass(&self, id: JointId) -> Vector4<f64> {
        let joint = self.joint(id);
        joint
            .components
            .iter()
            .fold(joint.link.mass_vector(), |sum, component| sum + component.mass_vector())
    }

    /// Homogeneous mass vector `[Σ m·c; Σ m]` of the joint and everything below it, in the
    /// joint's link frame.
    pub fn sum_center_of_mass(&self, id: JointId) -> Vector4<f64> {
        let mut sum = self.sum_link_center_of_mass(id);
        for branch in self.branches(id) {
            let to_here: Matrix4<f64> = self.joint(*branch).tq().to_homogeneous();
            sum += to_here * self.sum_center_of_mass(*branch);
        }
        sum
    }

    /// Center of mass and total mass of the joint and everything below it. With no mass
    /// at all, the center is returned unnormalized (the origin).
    pub fn center_of_mass(&self, id: JointId) -> (Point3<f64>, f64) {
        let sum = self.sum_center_of_mass(id);
        let mass = sum.w;
        let mut center = Point3::new(sum.x, sum.y, sum.z);
        if mass > f64::EPSILON {
            center /= mass;
        }
        (center, mass)
    }

    pub fn has_mass(&self, id: JointId) -> bool {
        let joint = self.joint(id);
        joint.link.has_mass() || joint.components.iter().any(|c| c.has_mass())
    }

    /// Bounding box of the joint's link and components, in its link frame.
    pub fn aabb(&self, id: JointId) -> BoundingBox3 {
        let joint = self.joint(id);
        let mut bb = joint.link.aabb();
        for component in &joint.components {
            bb.merge(&component.aabb());
        }
        bb
    }

    // ---- actuator cross-reference ----

    fn array_slot(joint: &KinematicJoint, base: usize, len: usize) -> Option<usize> {
        match joint.output {
            Some(ActuatorKey::Index(index)) if index >= base && index - base < len => Some(index - base),
            _ => None,
        }
    }

    /// Writes q of `id` and its descendants into `values[key - base]`, for integer keys.
    pub fn push_children_q(&self, id: JointId, values: &mut [f64], base: usize) {
        for joint in self.subtree(id) {
            let joint = self.joint(joint);
            if let Some(slot) = Self::array_slot(joint, base, values.len()) {
                values[slot] = joint.q();
            }
        }
    }

    /// Writes q of `id` and its ancestors into `values[key - base]`, for integer keys.
    pub fn push_ancestors_q(&self, id: JointId, values: &mut [f64], base: usize) {
        for joint in std::iter::once(id).chain(self.ancestors(id)) {
            let joint = self.joint(joint);
            if let Some(slot) = Self::array_slot(joint, base, values.len()) {
                values[slot] = joint.q();
            }
        }
    }

    /// Sets q of mobile `id` and descendants from `values[key - base]`.
    pub fn pull_children_q(&mut self, id: JointId, values: &[f64], base: usize) {
        for joint in self.subtree(id) {
            self.pull_q(joint, values, base);
        }
    }

    /// Sets q of mobile `id` and ancestors from `values[key - base]`.
    pub fn pull_ancestors_q(&mut self, id: JointId, values: &[f64], base: usize) {
        let path: Vec<JointId> = std::iter::once(id).chain(self.ancestors(id)).collect();
        for joint in path {
            self.pull_q(joint, values, base);
        }
    }

    fn pull_q(&mut self, id: JointId, values: &[f64], base: usize) {
        let joint = &mut self.live_mut(id).joint;
        if joint.is_mobile() {
            if let Some(slot) = Self::array_slot(joint, base, values.len()) {
                joint.set_q(values[slot]);
            }
        }
    }

    /// Maps `key - base` to the joint carrying that integer key, over `id` and its
    /// descendants. When keys repeat, the joint nearest `id` wins.
    pub fn build_child_map(&self, id: JointId, base: usize, len: usize) -> Vec<Option<JointId>> {
        let mut map = vec![None; len];
        for joint in self.subtree(id) {
            if let Some(slot) = Self::array_slot(self.joint(joint), base, len) {
                if map[slot].is_none() {
                    map[slot] = Some(joint);
                }
            }
        }
        map
    }

    /// Joint carrying `key` within the subtree of `id`.
    pub fn find_by_key(&self, id: JointId, key: &ActuatorKey) -> Option<JointId> {
        self.subtree(id)
            .into_iter()
            .find(|joint| self.joint(*joint).output.as_ref() == Some(key))
    }

    // ---- copies ----

    /// Independent tree holding copies of `id` and its ancestors only, with no side
    /// branches. Returns the tree and the handle of the copy of `id`.
    pub fn clone_branch(&self, id: JointId) -> (KinematicTree, JointId) {
        let mut copy = KinematicTree::new();
        let leaf = copy.insert(self.joint(id).clone());
        let mut below = leaf;
        for ancestor in self.ancestors(id) {
            let above = copy.insert(self.joint(ancestor).clone());
            copy.live_mut(above).branches.push(below);
            copy.live_mut(below).parent = Some(above);
            below = above;
        }
        (copy, leaf)
    }

    /// Independent tree holding a deep copy of `id` and everything below it.
    /// Returns the tree and the handle of the copied root.
    pub fn clone_subtree(&self, id: JointId) -> (KinematicTree, JointId) {
        let mut copy = KinematicTree::new();
        let root = copy.insert(self.joint(id).clone());
        let mut pending = vec![(id, root)];
        while let Some((source, target)) = pending.pop() {
            for branch in self.branches(source) {
                let cloned = copy.insert(self.joint(*branch).clone());
                copy.live_mut(cloned).parent = Some(target);
                copy.live_mut(target).branches.push(cloned);
                pending.push((*branch, cloned));
            }
        }
        (copy, root)
    }

    // ---- solvers ----

    /// IK solver for chains ending at `id`, built on first use from the joint's solver name
    /// and cached until the chain is reconfigured.
    pub fn get_ik(&mut self, id: JointId) -> Result<Solver, KinematicsError> {
        let node = self.node(id).ok_or(KinematicsError::InvalidJoint(id))?;
        if let Some(solver) = &node.solver {
            return Ok(solver.clone());
        }
        let solver = resolve_solver(node.joint.ik_solver(), self, id)?;
        self.live_mut(id).solver = Some(solver.clone());
        Ok(solver)
    }
}
