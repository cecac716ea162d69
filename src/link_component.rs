//! Passive link data carried by joints: mass and collision box. Solvers never read it,
//! it is only aggregated for physics and visualization consumers.

use nalgebra::{Point3, UnitQuaternion, Vector3, Vector4};

/// Axis aligned bounding box. A box with `mins > maxs` is empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox3 {
    pub mins: Point3<f64>,
    pub maxs: Point3<f64>,
}

impl BoundingBox3 {
    pub fn new(mins: Point3<f64>, maxs: Point3<f64>) -> Self {
        BoundingBox3 { mins, maxs }
    }

    /// Empty box that any merge will replace.
    pub fn new_invalid() -> Self {
        BoundingBox3 {
            mins: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            maxs: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mins.x > self.maxs.x || self.mins.y > self.maxs.y || self.mins.z > self.maxs.z
    }

    /// Grow this box to also cover `other`. Merging an empty box changes nothing.
    pub fn merge(&mut self, other: &BoundingBox3) {
        if other.is_empty() {
            return;
        }
        self.mins = self.mins.inf(&other.mins);
        self.maxs = self.maxs.sup(&other.maxs);
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.mins, &self.maxs)
    }

    pub fn dimensions(&self) -> Vector3<f64> {
        if self.is_empty() {
            return Vector3::zeros();
        }
        self.maxs - self.mins
    }
}

/// Mass and collision shape attached to a link frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkComponent {
    pub mass: f64,
    pub center_of_mass: Point3<f64>,

    /// Name of the visual model, passed through for renderers.
    pub visual_model: Option<String>,

    /// Name of the collision primitive (`Cube`, `Cylinder`, ...). None means no collision shape.
    pub collision_model: Option<String>,
    /// Dimensions of the collision primitive.
    pub collision_scale: Vector3<f64>,
    pub collision_rotation: UnitQuaternion<f64>,
    pub collision_offset: Vector3<f64>,
}

impl Default for LinkComponent {
    fn default() -> Self {
        LinkComponent {
            mass: 0.0,
            center_of_mass: Point3::origin(),
            visual_model: None,
            collision_model: None,
            collision_scale: Vector3::new(1.0, 1.0, 1.0),
            collision_rotation: UnitQuaternion::identity(),
            collision_offset: Vector3::zeros(),
        }
    }
}

impl LinkComponent {
    pub fn with_mass(mass: f64, center_of_mass: Point3<f64>) -> Self {
        LinkComponent {
            mass,
            center_of_mass,
            ..Default::default()
        }
    }

    /// Homogeneous mass vector `[m·c; m]`, so several can be summed and then normalized.
    pub fn mass_vector(&self) -> Vector4<f64> {
        let weighted = self.center_of_mass.coords * self.mass;
        Vector4::new(weighted.x, weighted.y, weighted.z, self.mass)
    }

    pub fn has_mass(&self) -> bool {
        self.mass > 0.0
    }

    pub fn has_collision_model(&self) -> bool {
        self.collision_model.as_ref().is_some_and(|m| !m.is_empty())
    }

    /// Bounding box of the collision primitive in the link frame.
    pub fn aabb(&self) -> BoundingBox3 {
        if !self.has_collision_model() {
            return BoundingBox3::new_invalid();
        }
        let mut ex = self.collision_scale / 2.0;
        let q = &self.collision_rotation;

        // Box is symmetric, rotating the corners of one face is enough
        let mut b = (q * ex).abs();
        ex.x = -ex.x;
        b = b.sup(&(q * ex).abs());
        ex.y = -ex.y;
        b = b.sup(&(q * ex).abs());
        ex.x = -ex.x;
        b = b.sup(&(q * ex).abs());

        let offset = Point3::from(self.collision_offset);
        BoundingBox3::new(offset - b, offset + b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    fn cube(scale: Vector3<f64>) -> LinkComponent {
        LinkComponent {
            collision_model: Some("Cube".to_string()),
            collision_scale: scale,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_collision_model_no_box() {
        let component = LinkComponent::with_mass(1.0, Point3::origin());
        assert!(component.aabb().is_empty());
        assert_eq!(component.aabb().dimensions(), Vector3::zeros());
    }

    #[test]
    fn test_axis_aligned_box() {
        let mut component = cube(Vector3::new(2.0, 4.0, 6.0));
        component.collision_offset = Vector3::new(10.0, 0.0, 0.0);
        let bb = component.aabb();
        assert!((bb.mins - Point3::new(9.0, -2.0, -3.0)).norm() < 1e-12);
        assert!((bb.maxs - Point3::new(11.0, 2.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn test_rotated_box_grows() {
        let mut component = cube(Vector3::new(2.0, 2.0, 2.0));
        component.collision_rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_4);
        let dims = component.aabb().dimensions();
        let diagonal = 2.0 * 2.0_f64.sqrt();
        assert!((dims.x - diagonal).abs() < 1e-9);
        assert!((dims.y - diagonal).abs() < 1e-9);
        assert!((dims.z - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_ignores_empty() {
        let mut bb = cube(Vector3::new(1.0, 1.0, 1.0)).aabb();
        let before = bb;
        bb.merge(&BoundingBox3::new_invalid());
        assert_eq!(bb, before);

        let mut empty = BoundingBox3::new_invalid();
        empty.merge(&before);
        assert_eq!(empty, before);
    }

    #[test]
    fn test_mass_vector() {
        let component = LinkComponent::with_mass(2.0, Point3::new(1.0, -1.0, 0.5));
        assert_eq!(component.mass_vector(), Vector4::new(2.0, -2.0, 1.0, 2.0));
        assert!(component.has_mass());
        assert!(!LinkComponent::default().has_mass());
    }
}
