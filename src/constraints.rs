//! Constraint model for one solve.
//!
//! Translates container, items and options into the feasibility predicates
//! the solvers consult: bounds, non-overlap, weight, support, heavy-bottom
//! ordering and center-of-mass limits, plus the soft orientation heuristics
//! (flat sheets, long rods, joint staggering) that shape the score without
//! forbidding placements.

use crate::geometry::{self, allowed_rotations, rotated_size};
use crate::model::{ContainerSpec, ItemSpec, PackingOptions, PlacedItem};
use crate::types::{CenterOfMassCalculator, EPSILON_GENERAL, EPSILON_HEIGHT, Vec3};

/// Per-solve feasibility predicates over immutable container/options inputs.
///
/// Holds no placement state; the current placement is always passed in, so the
/// model can be shared freely between search branches.
pub struct ConstraintModel<'a> {
    container: Vec3,
    max_weight: Option<f64>,
    options: &'a PackingOptions,
}

impl<'a> ConstraintModel<'a> {
    pub fn new(container: &ContainerSpec, options: &'a PackingOptions) -> Self {
        Self {
            container: container.size(),
            max_weight: container.max_weight,
            options,
        }
    }

    /// Inner container size.
    #[inline]
    pub fn container_size(&self) -> Vec3 {
        self.container
    }

    #[inline]
    pub fn options(&self) -> &PackingOptions {
        self.options
    }

    /// Bounds check: the box must lie fully inside the container.
    pub fn fits_bounds(&self, position: Vec3, size: Vec3) -> bool {
        geometry::within_container(position, size, self.container, EPSILON_GENERAL)
    }

    /// Non-overlap against every already placed item.
    pub fn free_of_collisions(&self, position: Vec3, size: Vec3, placed: &[PlacedItem]) -> bool {
        let candidate = candidate_box(position, size);
        !placed.iter().any(|p| geometry::intersects(p, &candidate))
    }

    /// Weight check: current payload plus the new item must stay under the limit.
    pub fn weight_allows(&self, current_total: f64, added: f64) -> bool {
        match self.max_weight {
            Some(limit) => current_total + added <= limit + EPSILON_GENERAL,
            None => true,
        }
    }

    /// Whether a single item can ever be carried at all.
    pub fn weight_feasible_alone(&self, weight: f64) -> bool {
        self.weight_allows(0.0, weight)
    }

    /// Fraction of the candidate's base area resting on underlying items.
    /// Items on the floor are fully supported by definition.
    pub fn support_ratio(&self, position: Vec3, size: Vec3, placed: &[PlacedItem]) -> f64 {
        if position.z <= EPSILON_HEIGHT {
            return 1.0;
        }
        let base = size.base_area();
        if base <= EPSILON_GENERAL {
            return 0.0;
        }
        let area = geometry::support_area(position, size, placed, EPSILON_HEIGHT);
        (area / base).min(1.0)
    }

    /// Hard support gate. When `require_support` is off everything passes;
    /// with `strict_support` the configured ratio is mandatory, otherwise an
    /// insufficient ratio only costs score (see [`Self::placement_penalty`]).
    pub fn support_satisfied(&self, ratio: f64) -> bool {
        if !self.options.require_support {
            return true;
        }
        if self.options.strict_support {
            ratio + EPSILON_GENERAL >= self.options.min_support_ratio
        } else {
            // even in lenient mode a floating item is rejected outright
            ratio > EPSILON_GENERAL
        }
    }

    /// The projected center of the candidate must rest on some supporter.
    /// Prevents overhangs that would tip over regardless of area ratio.
    pub fn center_supported(&self, position: Vec3, size: Vec3, placed: &[PlacedItem]) -> bool {
        if !self.options.require_support || position.z <= EPSILON_HEIGHT {
            return true;
        }
        let center = Vec3::new(
            position.x + size.x / 2.0,
            position.y + size.y / 2.0,
            position.z,
        );
        placed.iter().any(|p| {
            (position.z - p.top_z()).abs() < EPSILON_HEIGHT && geometry::point_inside(center, p)
        })
    }

    /// Heavy-bottom rule: the candidate's density must not exceed the density
    /// of any item carrying it by more than the configured ratio (prevents
    /// crushing lighter goods).
    pub fn heavy_bottom_ok(
        &self,
        density: f64,
        position: Vec3,
        size: Vec3,
        placed: &[PlacedItem],
    ) -> bool {
        if !self.options.heavy_bottom || position.z <= EPSILON_HEIGHT {
            return true;
        }
        let threshold = self.options.density_ratio_threshold.max(EPSILON_GENERAL);
        geometry::supporters(position, size, placed, EPSILON_HEIGHT)
            .iter()
            .all(|p| {
                if p.density <= EPSILON_GENERAL {
                    // supporter of unknown density never blocks
                    return true;
                }
                density / p.density <= threshold + EPSILON_GENERAL
            })
    }

    /// Allowed horizontal deviation of the weighted centroid from the
    /// container center, derived from the per-mille tolerance.
    pub fn com_limit(&self) -> f64 {
        self.container.half_horizontal_diagonal() * self.options.center_of_mass_tolerance_per_mille
            / 1000.0
    }

    /// Maximum acceptable center-of-gravity height.
    pub fn cg_height_limit(&self) -> f64 {
        self.container.z * self.options.max_cg_height_ratio
    }

    /// Center of mass after adding the candidate: (horizontal deviation from
    /// container center, CG height). Returns zeros for a weightless load.
    pub fn com_after(
        &self,
        placed: &[PlacedItem],
        position: Vec3,
        size: Vec3,
        weight: f64,
    ) -> (f64, f64) {
        let mut calc = CenterOfMassCalculator::new();
        for p in placed {
            calc.add_point(p.center(), p.weight);
        }
        calc.add_point(position + size * 0.5, weight);
        match calc.compute() {
            Some(cm) => {
                let center = Vec3::new(self.container.x / 2.0, self.container.y / 2.0, 0.0);
                (cm.distance_2d(&center), cm.z)
            }
            None => (0.0, 0.0),
        }
    }

    /// Whether a placement keeps the load balanced within tolerance. Only
    /// consulted when `enable_center_of_mass` is set; the solvers prefer
    /// balanced candidates and fall back to unbalanced ones rather than fail
    /// the whole solve.
    pub fn com_within_tolerance(&self, deviation: f64, cg_height: f64) -> bool {
        if !self.options.enable_center_of_mass {
            return true;
        }
        deviation <= self.com_limit() + EPSILON_GENERAL
            && cg_height <= self.cg_height_limit() + EPSILON_GENERAL
    }

    /// Orientation order for an item: allowed rotation indices, best first
    /// according to the flat-sheet / long-rod preferences.
    pub fn orientation_order(&self, spec: &ItemSpec) -> Vec<usize> {
        let can_rotate = self.options.allow_rotation && spec.rotation_allowed();
        let mut rotations: Vec<usize> = allowed_rotations(can_rotate).to_vec();
        if rotations.len() == 1 {
            return rotations;
        }
        let base = spec.size();
        rotations.sort_by(|&a, &b| {
            let bias_a = self.orientation_bias(spec, rotated_size(base, a));
            let bias_b = self.orientation_bias(spec, rotated_size(base, b));
            bias_b
                .partial_cmp(&bias_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        rotations
    }

    /// Soft preference score for one orientation; higher is better.
    fn orientation_bias(&self, spec: &ItemSpec, size: Vec3) -> f64 {
        let mut bias = 0.0;
        if spec.is_flat_sheet() {
            let [min, mid, max] = spec.size().sorted_components();
            let thin_is_horizontal = (size.z - min).abs() > EPSILON_GENERAL;
            if self.options.flat_sheet_vertical && thin_is_horizontal {
                bias += 2.0;
            }
            if self.options.flat_sheet_long_edge_down && thin_is_horizontal {
                // long edge down: the longest extent stays horizontal
                if (size.z - mid).abs() <= EPSILON_GENERAL
                    && (size.x.max(size.y) - max).abs() <= EPSILON_GENERAL
                {
                    bias += 1.0;
                }
            }
        }
        if spec.is_long_rod() && self.options.long_rod_anti_pierce {
            let [_, _, max] = spec.size().sorted_components();
            // an upright rod pierces whatever settles above it
            if (size.z - max).abs() <= EPSILON_GENERAL {
                bias -= 3.0;
            }
        }
        bias
    }

    /// Soft penalty of placing `spec` at `position` with rotated `size`;
    /// lower is better. Combines low-CG preference, balance deviation,
    /// flat-sheet lean, long-rod corner anchoring and joint staggering.
    pub fn placement_penalty(
        &self,
        spec: &ItemSpec,
        position: Vec3,
        size: Vec3,
        weight: f64,
        placed: &[PlacedItem],
    ) -> f64 {
        let mut penalty = 0.0;
        let container = self.container;

        if self.options.prefer_low_center_of_gravity {
            penalty += position.z / container.z.max(EPSILON_GENERAL);
        }

        if self.options.enable_center_of_mass {
            let (deviation, _) = self.com_after(placed, position, size, weight);
            let limit = self.com_limit().max(EPSILON_GENERAL);
            penalty += 0.5 * (deviation / limit);
        }

        if spec.is_flat_sheet() && self.options.flat_sheet_lean {
            // vertical sheets want a wall at their back
            let wall_distance = distance_to_nearest_wall(position, size, container);
            let span = container.x.min(container.y).max(EPSILON_GENERAL);
            penalty += self.options.flat_sheet_lean_weight * (wall_distance / span);
        }

        if spec.is_long_rod() && self.options.long_rod_corner {
            let corner_distance = distance_to_nearest_corner(position, size, container);
            let diagonal = container.half_horizontal_diagonal().max(EPSILON_GENERAL);
            penalty += self.options.long_rod_corner_weight * (corner_distance / diagonal);
        }

        if self.options.stagger_joints {
            penalty += 0.5 * self.seam_alignment_ratio(position, size, placed);
        }

        penalty
    }

    /// Fraction of supporting seams that line up with the candidate's edges.
    /// 0 = fully staggered brickwork, 1 = every joint aligned.
    fn seam_alignment_ratio(&self, position: Vec3, size: Vec3, placed: &[PlacedItem]) -> f64 {
        let supporters = geometry::supporters(position, size, placed, EPSILON_HEIGHT);
        if supporters.is_empty() {
            return 0.0;
        }
        let min_offset_x = self.options.min_stagger_ratio * size.x;
        let min_offset_y = self.options.min_stagger_ratio * size.y;
        let mut aligned = 0usize;
        for p in &supporters {
            let x_aligned = edge_aligned(
                position.x,
                position.x + size.x,
                p.position.x,
                p.position.x + p.size.x,
                min_offset_x,
            );
            let y_aligned = edge_aligned(
                position.y,
                position.y + size.y,
                p.position.y,
                p.position.y + p.size.y,
                min_offset_y,
            );
            if x_aligned && y_aligned {
                aligned += 1;
            }
        }
        aligned as f64 / supporters.len() as f64
    }
}

/// Whether any edge of interval a falls within `min_offset` of an edge of
/// interval b. Coinciding edges form a continuous vertical joint.
fn edge_aligned(a_min: f64, a_max: f64, b_min: f64, b_max: f64, min_offset: f64) -> bool {
    (a_min - b_min).abs() < min_offset
        || (a_min - b_max).abs() < min_offset
        || (a_max - b_min).abs() < min_offset
        || (a_max - b_max).abs() < min_offset
}

fn candidate_box(position: Vec3, size: Vec3) -> PlacedItem {
    PlacedItem {
        spec_index: usize::MAX,
        uid: usize::MAX,
        position,
        size,
        rotation: 0,
        weight: 0.0,
        density: 0.0,
    }
}

/// Horizontal distance from the box to the nearest container wall.
fn distance_to_nearest_wall(position: Vec3, size: Vec3, container: Vec3) -> f64 {
    let left = position.x;
    let right = container.x - (position.x + size.x);
    let front = position.y;
    let back = container.y - (position.y + size.y);
    left.min(right).min(front).min(back).max(0.0)
}

/// Horizontal distance from the box's nearest corner to the nearest container corner.
fn distance_to_nearest_corner(position: Vec3, size: Vec3, container: Vec3) -> f64 {
    let dx = position.x.min(container.x - (position.x + size.x)).max(0.0);
    let dy = position.y.min(container.y - (position.y + size.y)).max(0.0);
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(max_weight: Option<f64>) -> ContainerSpec {
        ContainerSpec {
            id: None,
            length: 100.0,
            width: 100.0,
            height: 100.0,
            max_weight,
            unit: "cm".to_string(),
        }
    }

    fn item(id: &str, dims: (f64, f64, f64)) -> ItemSpec {
        ItemSpec {
            id: id.to_string(),
            name: id.to_string(),
            length: dims.0,
            width: dims.1,
            height: dims.2,
            weight: Some(1.0),
            quantity: 1,
            color: None,
            can_rotate: None,
            item_type: None,
            is_hollow: None,
            density: None,
        }
    }

    fn placed(position: (f64, f64, f64), size: (f64, f64, f64), density: f64) -> PlacedItem {
        PlacedItem {
            spec_index: 0,
            uid: 0,
            position: Vec3::new(position.0, position.1, position.2),
            size: Vec3::new(size.0, size.1, size.2),
            rotation: 0,
            weight: density * size.0 * size.1 * size.2,
            density,
        }
    }

    #[test]
    fn bounds_and_collision_checks() {
        let spec = container(None);
        let options = PackingOptions::default();
        let model = ConstraintModel::new(&spec, &options);

        assert!(model.fits_bounds(Vec3::zero(), Vec3::new(100.0, 100.0, 100.0)));
        assert!(!model.fits_bounds(Vec3::new(1.0, 0.0, 0.0), Vec3::new(100.0, 10.0, 10.0)));

        let existing = vec![placed((0.0, 0.0, 0.0), (10.0, 10.0, 10.0), 1.0)];
        assert!(!model.free_of_collisions(Vec3::new(5.0, 5.0, 5.0), Vec3::new(10.0, 10.0, 10.0), &existing));
        assert!(model.free_of_collisions(Vec3::new(10.0, 0.0, 0.0), Vec3::new(10.0, 10.0, 10.0), &existing));
    }

    #[test]
    fn weight_limit_is_enforced_when_present() {
        let spec = container(Some(10.0));
        let options = PackingOptions::default();
        let model = ConstraintModel::new(&spec, &options);

        assert!(model.weight_allows(4.0, 6.0));
        assert!(!model.weight_allows(6.0, 6.0));
        assert!(!model.weight_feasible_alone(11.0));

        let unconstrained = container(None);
        let model = ConstraintModel::new(&unconstrained, &options);
        assert!(model.weight_allows(1e9, 1e9));
    }

    #[test]
    fn floor_items_are_fully_supported() {
        let spec = container(None);
        let options = PackingOptions::default();
        let model = ConstraintModel::new(&spec, &options);

        let ratio = model.support_ratio(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0), &[]);
        assert_eq!(ratio, 1.0);
    }

    #[test]
    fn strict_support_rejects_partial_overhang() {
        let spec = container(None);
        let mut options = PackingOptions::default();
        options.strict_support = true;
        options.min_support_ratio = 0.8;
        let model = ConstraintModel::new(&spec, &options);

        let pedestal = vec![placed((0.0, 0.0, 0.0), (10.0, 10.0, 10.0), 1.0)];
        // half the base hangs off the pedestal
        let ratio = model.support_ratio(Vec3::new(5.0, 0.0, 10.0), Vec3::new(10.0, 10.0, 5.0), &pedestal);
        assert!((ratio - 0.5).abs() < 1e-9);
        assert!(!model.support_satisfied(ratio));

        options.strict_support = false;
        let model = ConstraintModel::new(&spec, &options);
        assert!(model.support_satisfied(0.5));
        assert!(!model.support_satisfied(0.0));
    }

    #[test]
    fn heavy_bottom_blocks_dense_on_light() {
        let spec = container(None);
        let options = PackingOptions::default(); // threshold 1.5
        let model = ConstraintModel::new(&spec, &options);

        let light = vec![placed((0.0, 0.0, 0.0), (10.0, 10.0, 10.0), 0.1)];
        assert!(!model.heavy_bottom_ok(
            1.0,
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(10.0, 10.0, 10.0),
            &light
        ));
        assert!(model.heavy_bottom_ok(
            0.1,
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(10.0, 10.0, 10.0),
            &light
        ));
        // floor placements are never blocked
        assert!(model.heavy_bottom_ok(99.0, Vec3::zero(), Vec3::new(10.0, 10.0, 10.0), &light));
    }

    #[test]
    fn com_limit_follows_per_mille_tolerance() {
        let spec = container(None);
        let mut options = PackingOptions::default();
        options.center_of_mass_tolerance_per_mille = 1000.0;
        let model = ConstraintModel::new(&spec, &options);
        // full tolerance equals the half diagonal
        assert!((model.com_limit() - spec.size().half_horizontal_diagonal()).abs() < 1e-9);
    }

    #[test]
    fn com_after_tracks_weighted_centroid() {
        let spec = container(None);
        let options = PackingOptions::default();
        let model = ConstraintModel::new(&spec, &options);

        // single centered item: zero deviation
        let (deviation, cg) = model.com_after(
            &[],
            Vec3::new(45.0, 45.0, 0.0),
            Vec3::new(10.0, 10.0, 10.0),
            5.0,
        );
        assert!(deviation < 1e-9);
        assert!((cg - 5.0).abs() < 1e-9);
    }

    #[test]
    fn flat_sheet_prefers_vertical_orientations() {
        let spec = container(None);
        let options = PackingOptions::default();
        let model = ConstraintModel::new(&spec, &options);

        let sheet = item("sheet", (80.0, 60.0, 5.0));
        let order = model.orientation_order(&sheet);
        let first = rotated_size(sheet.size(), order[0]);
        // thin axis must not point up in the preferred orientation
        assert!((first.z - 5.0).abs() > 1e-9);
    }

    #[test]
    fn fixed_item_has_single_orientation() {
        let spec = container(None);
        let options = PackingOptions::default();
        let model = ConstraintModel::new(&spec, &options);

        let mut fixed = item("fixed", (10.0, 20.0, 30.0));
        fixed.can_rotate = Some(false);
        assert_eq!(model.orientation_order(&fixed), vec![0]);
    }

    #[test]
    fn long_rod_upright_is_penalized() {
        let spec = container(None);
        let options = PackingOptions::default();
        let model = ConstraintModel::new(&spec, &options);

        let rod = item("rod", (90.0, 10.0, 10.0));
        let order = model.orientation_order(&rod);
        let first = rotated_size(rod.size(), order[0]);
        assert!((first.z - 90.0).abs() > 1e-9, "rod must not stand upright first");
    }

    #[test]
    fn corner_anchoring_lowers_penalty_for_rods() {
        let spec = container(None);
        let options = PackingOptions::default();
        let model = ConstraintModel::new(&spec, &options);

        let rod = item("rod", (90.0, 10.0, 10.0));
        let size = rod.size();
        let at_corner = model.placement_penalty(&rod, Vec3::zero(), size, 1.0, &[]);
        let mid_floor =
            model.placement_penalty(&rod, Vec3::new(5.0, 45.0, 0.0), size, 1.0, &[]);
        assert!(at_corner < mid_floor);
    }

    #[test]
    fn staggered_seams_beat_aligned_seams() {
        let spec = container(None);
        let options = PackingOptions::default();
        let model = ConstraintModel::new(&spec, &options);

        let board = item("board", (40.0, 40.0, 10.0));
        let size = board.size();
        let base_layer = vec![
            placed((0.0, 0.0, 0.0), (40.0, 40.0, 10.0), 1.0),
            placed((40.0, 0.0, 0.0), (40.0, 40.0, 10.0), 1.0),
        ];
        let aligned =
            model.placement_penalty(&board, Vec3::new(0.0, 0.0, 10.0), size, 1.0, &base_layer);
        let staggered =
            model.placement_penalty(&board, Vec3::new(20.0, 0.0, 10.0), size, 1.0, &base_layer);
        assert!(staggered < aligned);
    }
}
