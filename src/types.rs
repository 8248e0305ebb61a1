//! Common value types for 3D container loading.
//!
//! Positions, sizes and rotations are immutable value records; nothing in the
//! solver mutates a box in place. All coordinates live in the container's
//! local frame: x along the length axis, y along the width axis, z up.

use std::ops::{Add, Mul, Sub};

/// Global numerical tolerance for floating-point comparisons.
///
/// Used for general numerical operations such as dimension and weight comparisons.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Tolerance for height comparisons in the Z-plane.
///
/// Slightly larger tolerance for face matching during stacking.
pub const EPSILON_HEIGHT: f64 = 1e-3;

/// Represents a 3D vector or point in space.
///
/// Used for positions, rotated item sizes and center-of-mass calculations.
///
/// # Examples
/// ```
/// use stowplan::types::Vec3;
///
/// let position = Vec3::new(1.0, 2.0, 3.0);
/// let size = Vec3::new(10.0, 20.0, 30.0);
/// let center = position + size * 0.5;
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new 3D vector.
    ///
    /// # Parameters
    /// * `x` - X component (length axis)
    /// * `y` - Y component (width axis)
    /// * `z` - Z component (height axis, up)
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a zero vector (origin).
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Calculates the volume (product of all components).
    ///
    /// Useful for size vectors.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// Calculates the base area (X × Y product).
    #[inline]
    pub fn base_area(&self) -> f64 {
        self.x * self.y
    }

    /// Calculates the 2D distance (XY plane only).
    #[inline]
    pub fn distance_2d(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Half the diagonal of the XY footprint, the reference length for
    /// center-of-mass tolerances expressed in parts-per-thousand.
    #[inline]
    pub fn half_horizontal_diagonal(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt() / 2.0
    }

    /// Checks if the vector fits within another vector (component-wise <=).
    ///
    /// # Parameters
    /// * `container` - The outer vector (e.g. container size)
    /// * `tolerance` - Numerical tolerance for the comparison
    #[inline]
    pub fn fits_within(&self, container: &Self, tolerance: f64) -> bool {
        self.x <= container.x + tolerance
            && self.y <= container.y + tolerance
            && self.z <= container.z + tolerance
    }

    /// Returns the components sorted ascending, e.g. for thin-sheet detection.
    #[inline]
    pub fn sorted_components(&self) -> [f64; 3] {
        let mut parts = [self.x, self.y, self.z];
        parts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        parts
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

/// Trait for objects with 3D extent.
pub trait Dimensional {
    /// Returns the size of the object.
    fn size(&self) -> Vec3;

    /// Calculates the volume.
    fn volume(&self) -> f64 {
        self.size().volume()
    }

    /// Calculates the base area.
    fn base_area(&self) -> f64 {
        self.size().base_area()
    }
}

/// Trait for objects with weight.
pub trait Weighted {
    /// Returns the weight.
    fn weight(&self) -> f64;
}

/// Represents an Axis-Aligned Bounding Box (AABB).
///
/// Used for collision detection, containment tests and support-area overlap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner (position)
    pub min: Vec3,
    /// Maximum corner (position + size)
    pub max: Vec3,
}

impl BoundingBox {
    /// Creates a bounding box from position and size.
    #[inline]
    pub fn from_position_and_size(position: Vec3, size: Vec3) -> Self {
        Self {
            min: position,
            max: position + size,
        }
    }

    /// Checks if two bounding boxes intersect.
    ///
    /// Two boxes overlap iff their intervals overlap on all three axes
    /// simultaneously (Separating Axis Theorem for AABBs).
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        !(self.max.x <= other.min.x
            || other.max.x <= self.min.x
            || self.max.y <= other.min.y
            || other.max.y <= self.min.y
            || self.max.z <= other.min.z
            || other.max.z <= self.min.z)
    }

    /// Calculates the overlap length in one dimension.
    #[inline]
    pub fn overlap_1d(a_min: f64, a_max: f64, b_min: f64, b_max: f64) -> f64 {
        (a_max.min(b_max) - a_min.max(b_min)).max(0.0)
    }

    /// Calculates the overlap area in the XY plane.
    #[inline]
    pub fn overlap_area_xy(&self, other: &Self) -> f64 {
        let overlap_x = Self::overlap_1d(self.min.x, self.max.x, other.min.x, other.max.x);
        let overlap_y = Self::overlap_1d(self.min.y, self.max.y, other.min.y, other.max.y);
        overlap_x * overlap_y
    }

    /// Checks if a point is inside the bounding box.
    #[inline]
    pub fn contains_point(&self, point: &Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Checks if this box lies fully inside [0,L]×[0,W]×[0,H].
    #[inline]
    pub fn within(&self, container: &Vec3, tolerance: f64) -> bool {
        self.min.x >= -tolerance
            && self.min.y >= -tolerance
            && self.min.z >= -tolerance
            && self.max.x <= container.x + tolerance
            && self.max.y <= container.y + tolerance
            && self.max.z <= container.z + tolerance
    }

    /// Returns the size (length, width, height).
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Grows this box so it also covers `other`.
    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Vec3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Vec3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }
}

/// Center of mass accumulator.
///
/// Collects weighted item centers; weightless items contribute nothing, which
/// matches treating balance as a mass-driven constraint only.
#[derive(Clone, Debug, Default)]
pub struct CenterOfMassCalculator {
    weighted_x: f64,
    weighted_y: f64,
    weighted_z: f64,
    total_weight: f64,
}

impl CenterOfMassCalculator {
    /// Creates a new accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a weighted point.
    pub fn add_point(&mut self, center: Vec3, weight: f64) {
        self.weighted_x += center.x * weight;
        self.weighted_y += center.y * weight;
        self.weighted_z += center.z * weight;
        self.total_weight += weight;
    }

    /// Total accumulated weight.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Calculates the center of mass.
    ///
    /// # Returns
    /// `Some(center)` for a valid center of mass, `None` if no weight present
    pub fn compute(&self) -> Option<Vec3> {
        if self.total_weight <= 0.0 {
            None
        } else {
            Some(Vec3::new(
                self.weighted_x / self.total_weight,
                self.weighted_y / self.total_weight,
                self.weighted_z / self.total_weight,
            ))
        }
    }

    /// Horizontal distance of the center of mass to a reference point (XY only).
    pub fn horizontal_deviation(&self, reference: Vec3) -> f64 {
        match self.compute() {
            Some(cm) => cm.distance_2d(&reference),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_vec3_volume_and_area() {
        let size = Vec3::new(10.0, 20.0, 30.0);
        assert!((size.volume() - 6000.0).abs() < EPSILON_GENERAL);
        assert!((size.base_area() - 200.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn test_vec3_fits_within() {
        let small = Vec3::new(5.0, 5.0, 5.0);
        let large = Vec3::new(10.0, 10.0, 10.0);

        assert!(small.fits_within(&large, EPSILON_GENERAL));
        assert!(!large.fits_within(&small, EPSILON_GENERAL));
    }

    #[test]
    fn test_sorted_components() {
        let size = Vec3::new(30.0, 10.0, 20.0);
        assert_eq!(size.sorted_components(), [10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_bounding_box_intersects() {
        let a = BoundingBox::from_position_and_size(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0));
        let b = BoundingBox::from_position_and_size(
            Vec3::new(5.0, 5.0, 5.0),
            Vec3::new(10.0, 10.0, 10.0),
        );
        let c = BoundingBox::from_position_and_size(
            Vec3::new(20.0, 20.0, 20.0),
            Vec3::new(10.0, 10.0, 10.0),
        );

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn touching_boxes_do_not_intersect() {
        let a = BoundingBox::from_position_and_size(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0));
        let b = BoundingBox::from_position_and_size(
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 10.0, 10.0),
        );
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_bounding_box_overlap_area() {
        let a = BoundingBox::from_position_and_size(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0));
        let b = BoundingBox::from_position_and_size(
            Vec3::new(5.0, 5.0, 0.0),
            Vec3::new(10.0, 10.0, 10.0),
        );

        let overlap = a.overlap_area_xy(&b);
        assert!((overlap - 25.0).abs() < EPSILON_GENERAL); // 5x5 overlap
    }

    #[test]
    fn test_bounding_box_within_container() {
        let container = Vec3::new(10.0, 10.0, 10.0);
        let inside =
            BoundingBox::from_position_and_size(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0));
        let sticking_out = BoundingBox::from_position_and_size(
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(6.0, 5.0, 5.0),
        );

        assert!(inside.within(&container, EPSILON_GENERAL));
        assert!(!sticking_out.within(&container, EPSILON_GENERAL));
    }

    #[test]
    fn test_bounding_box_union() {
        let a = BoundingBox::from_position_and_size(Vec3::zero(), Vec3::new(5.0, 5.0, 5.0));
        let b = BoundingBox::from_position_and_size(
            Vec3::new(10.0, 10.0, 10.0),
            Vec3::new(5.0, 5.0, 5.0),
        );
        let u = a.union(&b);
        assert_eq!(u.min, Vec3::zero());
        assert_eq!(u.max, Vec3::new(15.0, 15.0, 15.0));
    }

    #[test]
    fn test_center_of_mass_calculator() {
        let mut calc = CenterOfMassCalculator::new();
        calc.add_point(Vec3::new(0.0, 0.0, 0.0), 10.0);
        calc.add_point(Vec3::new(10.0, 0.0, 4.0), 10.0);

        let center = calc.compute().unwrap();
        assert!((center.x - 5.0).abs() < EPSILON_GENERAL);
        assert!((center.y - 0.0).abs() < EPSILON_GENERAL);
        assert!((center.z - 2.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn center_of_mass_empty_is_none() {
        let calc = CenterOfMassCalculator::new();
        assert!(calc.compute().is_none());
        assert_eq!(calc.horizontal_deviation(Vec3::new(5.0, 5.0, 0.0)), 0.0);
    }
}
