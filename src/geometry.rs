//! Geometry kernel: rotations, collision tests and support areas.
//!
//! Items are axis-aligned cuboids. An orientation is one of the six
//! permutations of the (length, width, height) axis assignment; overlap and
//! containment reduce to interval tests per axis.

use crate::model::PlacedItem;
use crate::types::{BoundingBox, Vec3};

/// The six axis permutations. Index 0 is the unrotated orientation; the tuple
/// says which source component ends up on (x, y, z).
pub const ROTATIONS: [(usize, usize, usize); 6] = [
    (0, 1, 2),
    (0, 2, 1),
    (1, 0, 2),
    (1, 2, 0),
    (2, 0, 1),
    (2, 1, 0),
];

/// Applies a rotation index to an item size.
///
/// # Parameters
/// * `size` - unrotated (length, width, height)
/// * `rotation` - index 0-5 into [`ROTATIONS`]
pub fn rotated_size(size: Vec3, rotation: usize) -> Vec3 {
    let parts = [size.x, size.y, size.z];
    let (ix, iy, iz) = ROTATIONS[rotation % ROTATIONS.len()];
    Vec3::new(parts[ix], parts[iy], parts[iz])
}

/// Rotation indices an item may use. Fixed items only get index 0.
pub fn allowed_rotations(can_rotate: bool) -> &'static [usize] {
    const ALL: [usize; 6] = [0, 1, 2, 3, 4, 5];
    const FIXED: [usize; 1] = [0];
    if can_rotate { &ALL } else { &FIXED }
}

/// Checks whether two placed items overlap in 3D.
///
/// Boxes that merely touch on a face do not overlap.
pub fn intersects(a: &PlacedItem, b: &PlacedItem) -> bool {
    a.bounding_box().intersects(&b.bounding_box())
}

/// Overlap length of two intervals, at least 0.
#[inline]
pub fn overlap_1d(a1: f64, a2: f64, b1: f64, b2: f64) -> f64 {
    BoundingBox::overlap_1d(a1, a2, b1, b2)
}

/// Checks whether a box at `position` with `size` lies fully inside the container.
pub fn within_container(position: Vec3, size: Vec3, container: Vec3, tolerance: f64) -> bool {
    BoundingBox::from_position_and_size(position, size).within(&container, tolerance)
}

/// Checks whether a point lies inside a placed item's box.
pub fn point_inside(point: Vec3, placed: &PlacedItem) -> bool {
    placed.bounding_box().contains_point(&point)
}

/// Total area of the candidate's base covered by the top faces of items
/// directly beneath it.
///
/// Only items whose top face matches the candidate's bottom z (within
/// `height_epsilon`) contribute; supporters may overlap each other in XY, so
/// the sum can slightly overstate coverage for pathological stacks. The floor
/// is not considered here; a candidate resting at z ≈ 0 is fully supported by
/// definition and should be short-circuited by the caller.
pub fn support_area(
    position: Vec3,
    size: Vec3,
    placed: &[PlacedItem],
    height_epsilon: f64,
) -> f64 {
    let base = BoundingBox::from_position_and_size(position, size);
    placed
        .iter()
        .filter(|p| (position.z - p.top_z()).abs() < height_epsilon)
        .map(|p| base.overlap_area_xy(&p.bounding_box()))
        .sum()
}

/// Items whose top face carries the candidate's base (same z-plane, positive
/// XY overlap). Used for heavy-bottom and stagger checks.
pub fn supporters<'a>(
    position: Vec3,
    size: Vec3,
    placed: &'a [PlacedItem],
    height_epsilon: f64,
) -> Vec<&'a PlacedItem> {
    placed
        .iter()
        .filter(|p| {
            (position.z - p.top_z()).abs() < height_epsilon
                && overlap_1d(
                    position.x,
                    position.x + size.x,
                    p.position.x,
                    p.position.x + p.size.x,
                ) > 0.0
                && overlap_1d(
                    position.y,
                    position.y + size.y,
                    p.position.y,
                    p.position.y + p.size.y,
                ) > 0.0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EPSILON_HEIGHT;

    fn placed(position: (f64, f64, f64), size: (f64, f64, f64)) -> PlacedItem {
        PlacedItem {
            spec_index: 0,
            uid: 0,
            position: Vec3::new(position.0, position.1, position.2),
            size: Vec3::new(size.0, size.1, size.2),
            rotation: 0,
            weight: 1.0,
            density: 1.0,
        }
    }

    #[test]
    fn rotation_table_is_a_permutation_set() {
        let size = Vec3::new(10.0, 20.0, 30.0);
        let mut seen = Vec::new();
        for rotation in 0..ROTATIONS.len() {
            let rotated = rotated_size(size, rotation);
            // volume is invariant under axis permutation
            assert!((rotated.volume() - size.volume()).abs() < 1e-9);
            seen.push((rotated.x, rotated.y, rotated.z));
        }
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        seen.dedup();
        assert_eq!(seen.len(), 6, "all six orientations must be distinct");
    }

    #[test]
    fn rotation_zero_is_identity() {
        let size = Vec3::new(10.0, 20.0, 30.0);
        assert_eq!(rotated_size(size, 0), size);
    }

    #[test]
    fn fixed_items_only_get_identity_rotation() {
        assert_eq!(allowed_rotations(false), &[0]);
        assert_eq!(allowed_rotations(true).len(), 6);
    }

    #[test]
    fn test_intersects() {
        let a = placed((0.0, 0.0, 0.0), (10.0, 10.0, 10.0));
        let b = placed((5.0, 5.0, 5.0), (10.0, 10.0, 10.0));
        let c = placed((10.0, 0.0, 0.0), (10.0, 10.0, 10.0));

        assert!(intersects(&a, &b));
        assert!(!intersects(&a, &c), "face contact is not an overlap");
    }

    #[test]
    fn test_within_container() {
        let container = Vec3::new(100.0, 100.0, 100.0);
        assert!(within_container(
            Vec3::zero(),
            Vec3::new(100.0, 100.0, 100.0),
            container,
            1e-6
        ));
        assert!(!within_container(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(100.0, 100.0, 100.0),
            container,
            1e-6
        ));
    }

    #[test]
    fn support_area_sums_multiple_supporters() {
        // Two 10x10 pedestals side by side, candidate 20x10 base spanning both.
        let pedestals = vec![
            placed((0.0, 0.0, 0.0), (10.0, 10.0, 10.0)),
            placed((10.0, 0.0, 0.0), (10.0, 10.0, 10.0)),
        ];
        let area = support_area(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(20.0, 10.0, 5.0),
            &pedestals,
            EPSILON_HEIGHT,
        );
        assert!((area - 200.0).abs() < 1e-9);
    }

    #[test]
    fn support_area_ignores_mismatched_heights() {
        let low = vec![placed((0.0, 0.0, 0.0), (10.0, 10.0, 8.0))];
        let area = support_area(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(10.0, 10.0, 5.0),
            &low,
            EPSILON_HEIGHT,
        );
        assert_eq!(area, 0.0);
    }

    #[test]
    fn supporters_filters_by_plane_and_overlap() {
        let stack = vec![
            placed((0.0, 0.0, 0.0), (10.0, 10.0, 10.0)),
            placed((50.0, 50.0, 0.0), (10.0, 10.0, 10.0)),
        ];
        let found = supporters(
            Vec3::new(2.0, 2.0, 10.0),
            Vec3::new(5.0, 5.0, 5.0),
            &stack,
            EPSILON_HEIGHT,
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].position, Vec3::zero());
    }

    #[test]
    fn test_point_inside() {
        let p = placed((0.0, 0.0, 0.0), (10.0, 10.0, 10.0));
        assert!(point_inside(Vec3::new(5.0, 5.0, 5.0), &p));
        assert!(!point_inside(Vec3::new(15.0, 5.0, 5.0), &p));
    }
}
