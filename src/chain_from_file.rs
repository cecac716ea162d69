//! Supports reading and writing kinematic chains as YAML (optional)

use std::path::Path;

use nalgebra::{Point3, UnitQuaternion, Vector3};
use regex::Regex;
use yaml_rust2::{Yaml, YamlLoader};

use crate::errors::ParameterError;
use crate::kinematic_joint::{ActuatorKey, JointType, KinematicJoint};
use crate::kinematic_tree::{JointId, KinematicTree};
use crate::link_component::LinkComponent;
use crate::utils::deg;

impl KinematicTree {
    /// Read the chain from YAML file. YAML file like this is supported:
    /// ```yaml
    /// # Three link leg with a foot pad
    /// chain:
    ///   - name: hip_yaw
    ///     min: deg(-90)
    ///     max: deg(90)
    ///   - name: hip_pitch
    ///     alpha: deg(90)
    ///     min: -3.1416
    ///     max: 3.1416
    ///   - - name: pad      # side branch rooted at hip_pitch
    ///       r: 5
    ///   - name: knee
    ///     r: 40
    ///     min: -180°
    ///     max: 180°
    ///   - name: foot
    ///     r: 50
    /// ```
    /// Each mapping is a joint attached to the previous joint of the same sequence, a nested
    /// sequence is a branch of the joint preceding it. Joints without limits are immobile.
    ///
    /// Angles may be given in radians, as `deg(angle)` or as `angle°`. Returns the tree and the
    /// handle of the first joint.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<(KinematicTree, JointId), ParameterError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Same as [`KinematicTree::from_yaml_file`], from a string.
    pub fn from_yaml_str(contents: &str) -> Result<(KinematicTree, JointId), ParameterError> {
        let documents = YamlLoader::load_from_str(contents)
            .map_err(|e| ParameterError::ParseError(format!("{}", e)))?;
        let document = documents
            .first()
            .ok_or_else(|| ParameterError::MissingField("chain".into()))?;
        let chain = document["chain"]
            .as_vec()
            .ok_or_else(|| ParameterError::MissingField("chain (sequence of joints)".into()))?;

        let mut tree = KinematicTree::new();
        let root = load_sequence(&mut tree, chain, None)?
            .ok_or_else(|| ParameterError::ParseError("chain has no joints".into()))?;
        Ok((tree, root))
    }

    /// Writes the subtree under `root` in the format [`KinematicTree::from_yaml_str`] reads.
    /// The last branch of every joint continues the sequence, the others become nested
    /// sequences, so reading the text back keeps the branch order.
    pub fn to_yaml(&self, root: JointId) -> String {
        let mut out = String::from("chain:\n");
        write_sequence(self, root, 2, &mut out);
        out
    }
}

/// Loads joints of one sequence, attaching the first of them to `parent`.
/// Returns the first joint of the sequence.
fn load_sequence(
    tree: &mut KinematicTree,
    items: &[Yaml],
    parent: Option<JointId>,
) -> Result<Option<JointId>, ParameterError> {
    let mut first = None;
    let mut previous = parent;
    for item in items {
        match item {
            Yaml::Array(branch) => {
                let Some(base) = previous else {
                    return Err(ParameterError::ParseError(
                        "branch sequence must follow the joint it is attached to".into(),
                    ));
                };
                load_sequence(tree, branch, Some(base))?;
            }
            Yaml::Hash(_) => {
                let joint = parse_joint(item)?;
                let id = match previous {
                    Some(parent) => tree.add_child(parent, joint)?,
                    None => tree.insert(joint),
                };
                first.get_or_insert(id);
                previous = Some(id);
            }
            other => {
                return Err(ParameterError::ParseError(format!(
                    "expected joint mapping or branch sequence, got {:?}",
                    other
                )));
            }
        }
    }
    Ok(first)
}

fn parse_joint(yaml: &Yaml) -> Result<KinematicJoint, ParameterError> {
    let name = yaml["name"]
        .as_str()
        .ok_or_else(|| ParameterError::MissingField("joint name".into()))?;

    let joint_type = match optional(yaml, "type") {
        None => JointType::Revolute,
        Some(value) => {
            let type_name = value
                .as_str()
                .ok_or_else(|| ParameterError::ParseError(format!("{}: joint type must be a string", name)))?;
            JointType::from_name(type_name)
                .ok_or_else(|| ParameterError::ParseError(format!("{}: unknown joint type '{}'", name, type_name)))?
        }
    };

    // Actuation values are angles only for revolute joints
    let actuation = |field: &str| -> Result<f64, ParameterError> {
        match joint_type {
            JointType::Revolute => angle_or(yaml, field, 0.0),
            JointType::Prismatic => number_or(yaml, field, 0.0),
        }
    };

    let mut joint = KinematicJoint::new(name, joint_type)
        .with_dh(
            number_or(yaml, "d", 0.0)?,
            angle_or(yaml, "theta", 0.0)?,
            number_or(yaml, "r", 0.0)?,
            angle_or(yaml, "alpha", 0.0)?,
        )
        .with_q_offset(actuation("q_offset")?)
        .with_limits(actuation("min")?, actuation("max")?)
        .with_q(actuation("q")?);

    if let Some(solver) = optional(yaml, "ik_solver") {
        let solver = solver
            .as_str()
            .ok_or_else(|| ParameterError::ParseError(format!("{}: ik_solver must be a string", name)))?;
        joint = joint.with_ik_solver(solver);
    }

    if let Some(output) = optional(yaml, "output") {
        joint = joint.with_output(parse_output(output)?);
    }

    joint.link.mass = number_or(yaml, "mass", 0.0)?;
    if let Some(center) = optional(yaml, "center_of_mass") {
        joint.link.center_of_mass = Point3::from(parse_vector(center, "center_of_mass")?);
    }

    if let Some(components) = optional(yaml, "components") {
        let components = components
            .as_vec()
            .ok_or_else(|| ParameterError::ParseError(format!("{}: components must be a sequence", name)))?;
        for component in components {
            joint.components.push(parse_component(component)?);
        }
    }
    Ok(joint)
}

fn parse_component(yaml: &Yaml) -> Result<LinkComponent, ParameterError> {
    let mut component = LinkComponent::with_mass(number_or(yaml, "mass", 0.0)?, Point3::origin());
    if let Some(center) = optional(yaml, "center_of_mass") {
        component.center_of_mass = Point3::from(parse_vector(center, "center_of_mass")?);
    }
    component.collision_model = optional(yaml, "collision_model")
        .and_then(Yaml::as_str)
        .map(str::to_string);
    component.visual_model = optional(yaml, "visual_model")
        .and_then(Yaml::as_str)
        .map(str::to_string);
    if let Some(scale) = optional(yaml, "scale") {
        component.collision_scale = parse_vector(scale, "scale")?;
    }
    if let Some(axis) = optional(yaml, "rotation_axis") {
        component.collision_rotation = UnitQuaternion::from_scaled_axis(parse_vector(axis, "rotation_axis")?);
    }
    if let Some(offset) = optional(yaml, "offset") {
        component.collision_offset = parse_vector(offset, "offset")?;
    }
    Ok(component)
}

fn parse_output(yaml: &Yaml) -> Result<ActuatorKey, ParameterError> {
    match yaml {
        Yaml::Integer(index) => usize::try_from(*index)
            .map(ActuatorKey::Index)
            .map_err(|_| ParameterError::ParseError(format!("output index {} is negative", index))),
        Yaml::String(name) => Ok(ActuatorKey::Name(name.clone())),
        other => Err(ParameterError::ParseError(format!("output must be an index or a name, got {:?}", other))),
    }
}

/// Missing keys and keys without value are both absent.
fn optional<'a>(yaml: &'a Yaml, field: &str) -> Option<&'a Yaml> {
    let value = &yaml[field];
    match value {
        Yaml::BadValue | Yaml::Null => None,
        _ => Some(value),
    }
}

fn number(yaml: &Yaml, field: &str) -> Result<f64, ParameterError> {
    match yaml {
        Yaml::Integer(value) => Ok(*value as f64),
        Yaml::Real(_) => yaml
            .as_f64()
            .ok_or_else(|| ParameterError::ParseError(format!("{}: bad number", field))),
        Yaml::String(text) => text
            .trim()
            .parse()
            .map_err(|_| ParameterError::ParseError(format!("{}: '{}' is not a number", field, text))),
        other => Err(ParameterError::ParseError(format!("{}: expected number, got {:?}", field, other))),
    }
}

fn number_or(yaml: &Yaml, field: &str, default: f64) -> Result<f64, ParameterError> {
    optional(yaml, field).map_or(Ok(default), |value| number(value, field))
}

fn angle_or(yaml: &Yaml, field: &str, default: f64) -> Result<f64, ParameterError> {
    match optional(yaml, field) {
        None => Ok(default),
        Some(Yaml::String(text)) => parse_angle(text),
        Some(value) => number(value, field),
    }
}

fn parse_vector(yaml: &Yaml, field: &str) -> Result<Vector3<f64>, ParameterError> {
    match yaml.as_vec().map(Vec::as_slice) {
        Some([x, y, z]) => Ok(Vector3::new(number(x, field)?, number(y, field)?, number(z, field)?)),
        _ => Err(ParameterError::ParseError(format!("{}: expected [x, y, z]", field))),
    }
}

/// Parses `deg(<number>)`, `<number>°` or plain radians.
fn parse_angle(attr_value: &str) -> Result<f64, ParameterError> {
    let re = Regex::new(r"^deg\(\s*(-?\d+(\.\d+)?)\s*\)$|^(-?\d+(\.\d+)?)\s*°$")
        .map_err(|_| ParameterError::ParseError("Invalid regex pattern".to_string()))?;
    let attr_value = attr_value.trim();

    if let Some(caps) = re.captures(attr_value) {
        let degrees_str = caps
            .get(1)
            .or_else(|| caps.get(3))
            .ok_or_else(|| ParameterError::WrongAngle(format!("Bad representation: {}", attr_value)))?
            .as_str();
        let degrees: f64 = degrees_str
            .parse()
            .map_err(|_| ParameterError::WrongAngle(attr_value.to_string()))?;
        Ok(degrees.to_radians())
    } else {
        // Plain number, radians
        attr_value
            .parse()
            .map_err(|_| ParameterError::WrongAngle(attr_value.to_string()))
    }
}

fn write_sequence(tree: &KinematicTree, first: JointId, indent: usize, out: &mut String) {
    let mut current = Some(first);
    while let Some(id) = current {
        write_joint(tree.joint(id), indent, out);
        // Branches are attached in the order they are read, so the continuation goes last
        current = match tree.branches(id).split_last() {
            Some((last, sides)) => {
                for side in sides {
                    out.push_str(&format!("{:indent$}-\n", "", indent = indent));
                    write_sequence(tree, *side, indent + 2, out);
                }
                Some(*last)
            }
            None => None,
        };
    }
}

fn write_joint(joint: &KinematicJoint, indent: usize, out: &mut String) {
    let pad = " ".repeat(indent + 2);
    let actuation = |x: f64| match joint.joint_type() {
        JointType::Revolute => deg(&x),
        JointType::Prismatic => format!("{}", x),
    };

    out.push_str(&format!("{:indent$}- name: {:?}\n", "", joint.name, indent = indent));
    out.push_str(&format!("{}type: {}\n", pad, joint.joint_type().name()));
    out.push_str(&format!("{}d: {}\n", pad, joint.d()));
    out.push_str(&format!("{}theta: {}\n", pad, deg(&joint.theta())));
    out.push_str(&format!("{}r: {}\n", pad, joint.r()));
    out.push_str(&format!("{}alpha: {}\n", pad, deg(&joint.alpha())));
    out.push_str(&format!("{}q_offset: {}\n", pad, actuation(joint.q_offset())));
    out.push_str(&format!("{}min: {}\n", pad, actuation(joint.qmin())));
    out.push_str(&format!("{}max: {}\n", pad, actuation(joint.qmax())));
    out.push_str(&format!("{}q: {}\n", pad, actuation(joint.q())));
    if !joint.ik_solver().is_empty() {
        out.push_str(&format!("{}ik_solver: {}\n", pad, joint.ik_solver()));
    }
    match &joint.output {
        Some(ActuatorKey::Index(index)) => {
            out.push_str(&format!("{}output: {}\n", pad, index));
        }
        Some(ActuatorKey::Name(name)) => {
            out.push_str(&format!("{}output: {:?}\n", pad, name));
        }
        None => {}
    }
    if joint.link.has_mass() {
        out.push_str(&format!("{}mass: {}\n", pad, joint.link.mass));
        out.push_str(&format!("{}center_of_mass: {}\n", pad, vector(&joint.link.center_of_mass.coords)));
    }
    if !joint.components.is_empty() {
        out.push_str(&format!("{}components:\n", pad));
        for component in &joint.components {
            write_component(component, indent + 4, out);
        }
    }
}

fn write_component(component: &LinkComponent, indent: usize, out: &mut String) {
    let pad = " ".repeat(indent + 2);
    out.push_str(&format!("{:indent$}- mass: {}\n", "", component.mass, indent = indent));
    out.push_str(&format!("{}center_of_mass: {}\n", pad, vector(&component.center_of_mass.coords)));
    if let Some(model) = &component.collision_model {
        out.push_str(&format!("{}collision_model: {:?}\n", pad, model));
    }
    if let Some(model) = &component.visual_model {
        out.push_str(&format!("{}visual_model: {:?}\n", pad, model));
    }
    out.push_str(&format!("{}scale: {}\n", pad, vector(&component.collision_scale)));
    out.push_str(&format!("{}rotation_axis: {}\n", pad, vector(&component.collision_rotation.scaled_axis())));
    out.push_str(&format!("{}offset: {}\n", pad, vector(&component.collision_offset)));
}

fn vector(v: &Vector3<f64>) -> String {
    format!("[{}, {}, {}]", v.x, v.y, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_parse_angle() {
        assert!((parse_angle("deg(90)").unwrap() - FRAC_PI_2).abs() < 1e-12);
        assert!((parse_angle("deg(-45.5)").unwrap() + 45.5_f64.to_radians()).abs() < 1e-12);
        assert!((parse_angle("180°").unwrap() - PI).abs() < 1e-12);
        assert!((parse_angle(" 1.25 ").unwrap() - 1.25).abs() < 1e-12);
        assert!(matches!(parse_angle("ninety"), Err(ParameterError::WrongAngle(_))));
        assert!(matches!(parse_angle("deg(x)"), Err(ParameterError::WrongAngle(_))));
    }

    #[test]
    fn test_defaults() {
        let (tree, root) = KinematicTree::from_yaml_str("chain:\n  - name: only\n").unwrap();
        let joint = tree.joint(root);
        assert_eq!(joint.name, "only");
        assert_eq!(joint.joint_type(), JointType::Revolute);
        assert!(!joint.is_mobile());
        assert_eq!(joint.ik_solver(), "");
        assert!(joint.output.is_none());
    }

    #[test]
    fn test_branches_and_fields() {
        let yaml = r#"
chain:
  - name: base
    min: deg(-90)
    max: 90°
    output: 3
  - - name: side
      type: prismatic
      alpha: deg(90)
      min: 0
      max: 20
      q: 5
      output: gripper
  - name: arm
    r: 40
    ik_solver: PlanarThreeLinkArm
    mass: 2
    center_of_mass: [20, 0, 0]
"#;
        let (tree, base) = KinematicTree::from_yaml_str(yaml).unwrap();
        assert_eq!(tree.len(), 3);
        let side = tree.find("side").unwrap();
        let arm = tree.find("arm").unwrap();
        assert_eq!(tree.branches(base), &[side, arm]);
        assert_eq!(tree.next_joint(base), Some(side));

        assert!((tree.joint(base).qmin() + FRAC_PI_2).abs() < 1e-12);
        assert!((tree.joint(base).qmax() - FRAC_PI_2).abs() < 1e-12);
        assert_eq!(tree.joint(base).output, Some(ActuatorKey::Index(3)));

        let side_joint = tree.joint(side);
        assert_eq!(side_joint.joint_type(), JointType::Prismatic);
        assert_eq!(side_joint.q(), 5.0);
        assert_eq!(side_joint.qmax(), 20.0);
        assert_eq!(side_joint.output, Some(ActuatorKey::Name("gripper".into())));

        let arm_joint = tree.joint(arm);
        assert_eq!(arm_joint.r(), 40.0);
        assert_eq!(arm_joint.ik_solver(), "PlanarThreeLinkArm");
        assert_eq!(arm_joint.link.mass, 2.0);
        assert_eq!(arm_joint.link.center_of_mass, Point3::new(20.0, 0.0, 0.0));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            KinematicTree::from_yaml_str("links: []"),
            Err(ParameterError::MissingField(_))
        ));
        assert!(matches!(
            KinematicTree::from_yaml_str("chain:\n  - r: 10\n"),
            Err(ParameterError::MissingField(_))
        ));
        assert!(matches!(
            KinematicTree::from_yaml_str("chain:\n  - name: a\n    theta: deg(ninety)\n"),
            Err(ParameterError::WrongAngle(_))
        ));
        assert!(matches!(
            KinematicTree::from_yaml_str("chain:\n  - - name: orphan\n"),
            Err(ParameterError::ParseError(_))
        ));
        assert!(matches!(
            KinematicTree::from_yaml_str("chain:\n  - name: a\n    type: spherical\n"),
            Err(ParameterError::ParseError(_))
        ));
        assert!(matches!(
            KinematicTree::from_yaml_str("chain: [\n"),
            Err(ParameterError::ParseError(_))
        ));
    }

    #[test]
    fn test_components() {
        let yaml = r#"
chain:
  - name: link
    components:
      - mass: 1.5
        center_of_mass: [1, 2, 3]
        collision_model: Cube
        scale: [2, 4, 6]
        offset: [10, 0, 0]
"#;
        let (tree, root) = KinematicTree::from_yaml_str(yaml).unwrap();
        let component = &tree.joint(root).components[0];
        assert_eq!(component.mass, 1.5);
        assert_eq!(component.center_of_mass, Point3::new(1.0, 2.0, 3.0));
        let bb = tree.aabb(root);
        assert!((bb.mins - Point3::new(9.0, -2.0, -3.0)).norm() < 1e-12);
        assert!((bb.maxs - Point3::new(11.0, 2.0, 3.0)).norm() < 1e-12);
    }
}
