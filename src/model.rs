//! Data model for container-loading solve requests.
//!
//! This module defines the entities of one solve:
//! - `ContainerSpec`: the container with dimensions and optional weight limit
//! - `ItemSpec`: one item type with quantity, rotation policy and density
//! - `ItemInstance`: one physical unit after quantity expansion
//! - `PlacedItem`: an instance with chosen position and orientation
//! - `PackingOptions`: the immutable per-solve configuration record
//!
//! All entities are constructed fresh per request and discarded after the
//! response is built; nothing here persists across solves.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{BoundingBox, Dimensional, Vec3, Weighted};

/// An item whose thinnest side is at most this fraction of its middle side
/// counts as a flat sheet (plate, panel, board).
pub const FLAT_SHEET_THICKNESS_RATIO: f64 = 0.15;

/// An item whose longest side is at least this multiple of both other sides
/// counts as a long rod (pipe, profile, beam).
pub const LONG_ROD_ASPECT_RATIO: f64 = 4.0;

/// Validation error for request data.
///
/// Carries field-level detail so the caller can see exactly which value was
/// rejected. Raised before any model building; the solver never sees invalid
/// input.
#[derive(Debug, Clone)]
pub enum ValidationError {
    InvalidDimension(String),
    InvalidWeight(String),
    InvalidQuantity(String),
    InvalidOptions(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidDimension(msg) => write!(f, "Invalid dimension: {}", msg),
            ValidationError::InvalidWeight(msg) => write!(f, "Invalid weight: {}", msg),
            ValidationError::InvalidQuantity(msg) => write!(f, "Invalid quantity: {}", msg),
            ValidationError::InvalidOptions(msg) => write!(f, "Invalid options: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Helper function to validate a single dimension.
fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

/// Validates a weight that may legitimately be zero (unknown mass).
fn validate_weight_value(value: f64, name: &str) -> Result<(), ValidationError> {
    if value < 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidWeight(format!(
            "{} must be non-negative, got: {}",
            name, value
        )));
    }
    Ok(())
}

/// The packing container with capacity limits.
///
/// # Fields
/// * `length`/`width`/`height` - inner dimensions in `unit`
/// * `max_weight` - optional payload limit; absent means unconstrained
/// * `unit` - measurement unit, echoed through to the render output
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ContainerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[schema(example = 12000.0)]
    pub length: f64,
    #[schema(example = 2350.0)]
    pub width: f64,
    #[schema(example = 2600.0)]
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(nullable = true, example = 12000.0)]
    pub max_weight: Option<f64>,
    #[serde(default = "default_unit")]
    #[schema(example = "mm")]
    pub unit: String,
}

fn default_unit() -> String {
    "mm".to_string()
}

impl ContainerSpec {
    /// Validates the container dimensions and weight limit.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_dimension(self.length, "container.length")?;
        validate_dimension(self.width, "container.width")?;
        validate_dimension(self.height, "container.height")?;
        if let Some(max_weight) = self.max_weight {
            if max_weight <= 0.0 || max_weight.is_nan() || max_weight.is_infinite() {
                return Err(ValidationError::InvalidWeight(format!(
                    "container.max_weight must be positive, got: {}",
                    max_weight
                )));
            }
        }
        Ok(())
    }

    /// Inner size as a vector (length, width, height).
    #[inline]
    pub fn size(&self) -> Vec3 {
        Vec3::new(self.length, self.width, self.height)
    }

    /// Inner volume of the container.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.length * self.width * self.height
    }

    /// Geometric center of the floor (XY plane).
    #[inline]
    pub fn floor_center(&self) -> Vec3 {
        Vec3::new(self.length / 2.0, self.width / 2.0, 0.0)
    }
}

impl Dimensional for ContainerSpec {
    fn size(&self) -> Vec3 {
        ContainerSpec::size(self)
    }
}

/// One item type of the request; `quantity` physical units get expanded from it.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ItemSpec {
    #[schema(example = "crate-a")]
    pub id: String,
    #[schema(example = "Wooden crate")]
    pub name: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    /// Weight of one unit; defaults to 0 (unknown).
    #[serde(default)]
    #[schema(nullable = true)]
    pub weight: Option<f64>,
    #[schema(minimum = 1, example = 4)]
    pub quantity: u32,
    #[serde(default)]
    #[schema(nullable = true, example = "#2563eb")]
    pub color: Option<String>,
    /// Whether the six axis-aligned orientations may be tried. Defaults to true.
    #[serde(default)]
    #[schema(nullable = true)]
    pub can_rotate: Option<bool>,
    #[serde(default)]
    #[schema(nullable = true, example = "pallet")]
    pub item_type: Option<String>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub is_hollow: Option<bool>,
    /// Density override; derived from weight/volume when absent.
    #[serde(default)]
    #[schema(nullable = true)]
    pub density: Option<f64>,
}

impl ItemSpec {
    /// Validates dimensions, quantity, weight and density.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let label = |field: &str| format!("items[{}].{}", self.id, field);
        validate_dimension(self.length, &label("length"))?;
        validate_dimension(self.width, &label("width"))?;
        validate_dimension(self.height, &label("height"))?;
        if self.quantity == 0 {
            return Err(ValidationError::InvalidQuantity(format!(
                "items[{}].quantity must be at least 1",
                self.id
            )));
        }
        if let Some(weight) = self.weight {
            validate_weight_value(weight, &label("weight"))?;
        }
        if let Some(density) = self.density {
            if density <= 0.0 || !density.is_finite() {
                return Err(ValidationError::InvalidWeight(format!(
                    "items[{}].density must be positive, got: {}",
                    self.id, density
                )));
            }
        }
        Ok(())
    }

    /// Unrotated size (length, width, height).
    #[inline]
    pub fn size(&self) -> Vec3 {
        Vec3::new(self.length, self.width, self.height)
    }

    /// Volume of one unit.
    #[inline]
    pub fn unit_volume(&self) -> f64 {
        self.length * self.width * self.height
    }

    /// Weight of one unit, 0 when unknown.
    #[inline]
    pub fn unit_weight(&self) -> f64 {
        self.weight.unwrap_or(0.0)
    }

    /// Density of one unit: the explicit override, or weight/volume.
    pub fn effective_density(&self) -> f64 {
        if let Some(density) = self.density {
            return density;
        }
        let volume = self.unit_volume();
        if volume <= 0.0 {
            0.0
        } else {
            self.unit_weight() / volume
        }
    }

    /// Whether rotation is allowed for this item (default yes).
    #[inline]
    pub fn rotation_allowed(&self) -> bool {
        self.can_rotate.unwrap_or(true)
    }

    /// Thin plate-like item: thinnest side much smaller than the others.
    pub fn is_flat_sheet(&self) -> bool {
        let [min, mid, _] = self.size().sorted_components();
        mid > 0.0 && min / mid <= FLAT_SHEET_THICKNESS_RATIO
    }

    /// Rod-like item: one side dominates both others.
    pub fn is_long_rod(&self) -> bool {
        let [min, mid, max] = self.size().sorted_components();
        min > 0.0 && max >= LONG_ROD_ASPECT_RATIO * mid && max >= LONG_ROD_ASPECT_RATIO * min
    }
}

impl Dimensional for ItemSpec {
    fn size(&self) -> Vec3 {
        ItemSpec::size(self)
    }
}

impl Weighted for ItemSpec {
    fn weight(&self) -> f64 {
        self.unit_weight()
    }
}

/// One physical unit derived from an `ItemSpec` through quantity expansion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemInstance {
    /// Index into the request's item list.
    pub spec_index: usize,
    /// Zero-based ordinal among siblings of the same spec.
    pub ordinal: u32,
    /// Request-unique identifier for event reporting.
    pub uid: usize,
}

/// Expands item types into individual instances, preserving request order.
pub fn expand_instances(items: &[ItemSpec]) -> Vec<ItemInstance> {
    let mut instances = Vec::new();
    let mut uid = 0;
    for (spec_index, spec) in items.iter().enumerate() {
        for ordinal in 0..spec.quantity {
            instances.push(ItemInstance {
                spec_index,
                ordinal,
                uid,
            });
            uid += 1;
        }
    }
    instances
}

/// A placed instance with its chosen orientation and minimum-corner position.
///
/// Carries the per-unit physical values the search loops consult constantly,
/// so constraint checks do not have to chase back into the spec list.
#[derive(Clone, Debug)]
pub struct PlacedItem {
    pub spec_index: usize,
    pub uid: usize,
    pub position: Vec3,
    /// Rotated size (after applying `rotation`).
    pub size: Vec3,
    /// Rotation index 0-5 into the axis-permutation table.
    pub rotation: usize,
    pub weight: f64,
    pub density: f64,
}

impl PlacedItem {
    /// Top Z coordinate of the placed item.
    #[inline]
    pub fn top_z(&self) -> f64 {
        self.position.z + self.size.z
    }

    /// Center of the placed item.
    #[inline]
    pub fn center(&self) -> Vec3 {
        self.position + self.size * 0.5
    }

    /// Bounding box of the placed item.
    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_position_and_size(self.position, self.size)
    }
}

impl Dimensional for PlacedItem {
    fn size(&self) -> Vec3 {
        self.size
    }
}

impl Weighted for PlacedItem {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// Why an instance could not be placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnpackedReason {
    NoFeasiblePosition,
    WeightExceeded,
    TimeExhausted,
}

impl UnpackedReason {
    /// Stable machine-readable tag used in the response contract.
    pub fn tag(&self) -> &'static str {
        match self {
            UnpackedReason::NoFeasiblePosition => "no-feasible-position",
            UnpackedReason::WeightExceeded => "weight-exceeded",
            UnpackedReason::TimeExhausted => "time-exhausted",
        }
    }
}

impl std::fmt::Display for UnpackedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnpackedReason::NoFeasiblePosition => {
                write!(f, "no feasible position inside the container")
            }
            UnpackedReason::WeightExceeded => write!(f, "container weight limit exceeded"),
            UnpackedReason::TimeExhausted => write!(f, "time budget exhausted before placement"),
        }
    }
}

/// An instance the solver had to leave behind.
#[derive(Clone, Debug)]
pub struct UnpackedItem {
    pub spec_index: usize,
    pub uid: usize,
    pub reason: UnpackedReason,
}

/// Placement search strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    /// Near-exact branch-and-bound over discrete candidate positions.
    /// `ortools` is accepted for compatibility with the legacy dashboard.
    #[serde(alias = "ortools")]
    Exact,
    /// Fast extreme-point heuristic. `py3dbp` is the legacy alias.
    #[serde(alias = "py3dbp")]
    Greedy,
}

/// The full per-solve configuration record.
///
/// Read-only input to a single solve; no shared mutable state persists
/// between solves. Defaults mirror the dashboard's form defaults.
#[derive(Clone, Debug, Serialize)]
pub struct PackingOptions {
    pub solver: SolverKind,
    pub allow_rotation: bool,
    pub time_limit_sec: f64,
    pub random_seed: Option<u64>,
    pub maximize_compactness: bool,
    pub maximize_volume: bool,
    pub require_support: bool,
    pub min_support_ratio: f64,
    pub strict_support: bool,
    pub enable_center_of_mass: bool,
    pub center_of_mass_tolerance_per_mille: f64,
    pub prefer_low_center_of_gravity: bool,
    pub max_cg_height_ratio: f64,
    pub heavy_bottom: bool,
    pub density_ratio_threshold: f64,
    pub large_items_first: bool,
    pub large_item_threshold_ratio: f64,
    pub greedy_weight_coefficient: f64,
    pub cluster_weight: f64,
    pub flat_sheet_vertical: bool,
    pub flat_sheet_lean: bool,
    pub flat_sheet_lean_weight: f64,
    pub flat_sheet_long_edge_down: bool,
    pub long_rod_corner: bool,
    pub long_rod_corner_weight: f64,
    pub long_rod_anti_pierce: bool,
    pub stagger_joints: bool,
    pub min_stagger_ratio: f64,
}

impl Default for PackingOptions {
    fn default() -> Self {
        Self {
            solver: SolverKind::Greedy,
            allow_rotation: true,
            time_limit_sec: 30.0,
            random_seed: None,
            maximize_compactness: false,
            maximize_volume: true,
            require_support: true,
            min_support_ratio: 0.8,
            strict_support: false,
            enable_center_of_mass: true,
            center_of_mass_tolerance_per_mille: 300.0,
            prefer_low_center_of_gravity: true,
            max_cg_height_ratio: 0.45,
            heavy_bottom: true,
            density_ratio_threshold: 1.5,
            large_items_first: true,
            large_item_threshold_ratio: 0.3,
            greedy_weight_coefficient: 0.7,
            cluster_weight: 1.5,
            flat_sheet_vertical: true,
            flat_sheet_lean: true,
            flat_sheet_lean_weight: 0.5,
            flat_sheet_long_edge_down: true,
            long_rod_corner: true,
            long_rod_corner_weight: 0.5,
            long_rod_anti_pierce: true,
            stagger_joints: true,
            min_stagger_ratio: 0.2,
        }
    }
}

impl PackingOptions {
    /// Validates numeric ranges the heuristics rely on.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.time_limit_sec <= 0.0 || !self.time_limit_sec.is_finite() {
            return Err(ValidationError::InvalidOptions(format!(
                "time_limit_sec must be positive, got: {}",
                self.time_limit_sec
            )));
        }
        for (name, value) in [
            ("min_support_ratio", self.min_support_ratio),
            ("large_item_threshold_ratio", self.large_item_threshold_ratio),
            ("max_cg_height_ratio", self.max_cg_height_ratio),
            ("min_stagger_ratio", self.min_stagger_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) || !value.is_finite() {
                return Err(ValidationError::InvalidOptions(format!(
                    "{} must be between 0 and 1, got: {}",
                    name, value
                )));
            }
        }
        for (name, value) in [
            ("greedy_weight_coefficient", self.greedy_weight_coefficient),
            ("cluster_weight", self.cluster_weight),
            ("density_ratio_threshold", self.density_ratio_threshold),
            (
                "center_of_mass_tolerance_per_mille",
                self.center_of_mass_tolerance_per_mille,
            ),
            ("flat_sheet_lean_weight", self.flat_sheet_lean_weight),
            ("long_rod_corner_weight", self.long_rod_corner_weight),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(ValidationError::InvalidOptions(format!(
                    "{} must be non-negative, got: {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Partial options as sent by the caller; unset fields fall back to the
/// service defaults when resolved.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct PackingOptionsPatch {
    #[schema(nullable = true)]
    pub solver: Option<SolverKind>,
    #[schema(nullable = true)]
    pub allow_rotation: Option<bool>,
    #[schema(nullable = true)]
    pub time_limit_sec: Option<f64>,
    #[schema(nullable = true)]
    pub random_seed: Option<u64>,
    #[schema(nullable = true)]
    pub maximize_compactness: Option<bool>,
    #[schema(nullable = true)]
    pub maximize_volume: Option<bool>,
    #[schema(nullable = true)]
    pub require_support: Option<bool>,
    #[schema(nullable = true)]
    pub min_support_ratio: Option<f64>,
    #[schema(nullable = true)]
    pub strict_support: Option<bool>,
    #[schema(nullable = true)]
    pub enable_center_of_mass: Option<bool>,
    #[schema(nullable = true)]
    pub center_of_mass_tolerance_per_mille: Option<f64>,
    #[schema(nullable = true)]
    pub prefer_low_center_of_gravity: Option<bool>,
    #[schema(nullable = true)]
    pub max_cg_height_ratio: Option<f64>,
    #[schema(nullable = true)]
    pub heavy_bottom: Option<bool>,
    #[schema(nullable = true)]
    pub density_ratio_threshold: Option<f64>,
    #[schema(nullable = true)]
    pub large_items_first: Option<bool>,
    #[schema(nullable = true)]
    pub large_item_threshold_ratio: Option<f64>,
    #[schema(nullable = true)]
    pub greedy_weight_coefficient: Option<f64>,
    #[schema(nullable = true)]
    pub cluster_weight: Option<f64>,
    #[schema(nullable = true)]
    pub flat_sheet_vertical: Option<bool>,
    #[schema(nullable = true)]
    pub flat_sheet_lean: Option<bool>,
    #[schema(nullable = true)]
    pub flat_sheet_lean_weight: Option<f64>,
    #[schema(nullable = true)]
    pub flat_sheet_long_edge_down: Option<bool>,
    #[schema(nullable = true)]
    pub long_rod_corner: Option<bool>,
    #[schema(nullable = true)]
    pub long_rod_corner_weight: Option<f64>,
    #[schema(nullable = true)]
    pub long_rod_anti_pierce: Option<bool>,
    #[schema(nullable = true)]
    pub stagger_joints: Option<bool>,
    #[schema(nullable = true)]
    pub min_stagger_ratio: Option<f64>,
}

impl PackingOptionsPatch {
    /// Overlays this partial record on top of the given defaults.
    pub fn resolve(&self, defaults: &PackingOptions) -> PackingOptions {
        let d = defaults.clone();
        PackingOptions {
            solver: self.solver.unwrap_or(d.solver),
            allow_rotation: self.allow_rotation.unwrap_or(d.allow_rotation),
            time_limit_sec: self.time_limit_sec.unwrap_or(d.time_limit_sec),
            random_seed: self.random_seed.or(d.random_seed),
            maximize_compactness: self.maximize_compactness.unwrap_or(d.maximize_compactness),
            maximize_volume: self.maximize_volume.unwrap_or(d.maximize_volume),
            require_support: self.require_support.unwrap_or(d.require_support),
            min_support_ratio: self.min_support_ratio.unwrap_or(d.min_support_ratio),
            strict_support: self.strict_support.unwrap_or(d.strict_support),
            enable_center_of_mass: self
                .enable_center_of_mass
                .unwrap_or(d.enable_center_of_mass),
            center_of_mass_tolerance_per_mille: self
                .center_of_mass_tolerance_per_mille
                .unwrap_or(d.center_of_mass_tolerance_per_mille),
            prefer_low_center_of_gravity: self
                .prefer_low_center_of_gravity
                .unwrap_or(d.prefer_low_center_of_gravity),
            max_cg_height_ratio: self.max_cg_height_ratio.unwrap_or(d.max_cg_height_ratio),
            heavy_bottom: self.heavy_bottom.unwrap_or(d.heavy_bottom),
            density_ratio_threshold: self
                .density_ratio_threshold
                .unwrap_or(d.density_ratio_threshold),
            large_items_first: self.large_items_first.unwrap_or(d.large_items_first),
            large_item_threshold_ratio: self
                .large_item_threshold_ratio
                .unwrap_or(d.large_item_threshold_ratio),
            greedy_weight_coefficient: self
                .greedy_weight_coefficient
                .unwrap_or(d.greedy_weight_coefficient),
            cluster_weight: self.cluster_weight.unwrap_or(d.cluster_weight),
            flat_sheet_vertical: self.flat_sheet_vertical.unwrap_or(d.flat_sheet_vertical),
            flat_sheet_lean: self.flat_sheet_lean.unwrap_or(d.flat_sheet_lean),
            flat_sheet_lean_weight: self
                .flat_sheet_lean_weight
                .unwrap_or(d.flat_sheet_lean_weight),
            flat_sheet_long_edge_down: self
                .flat_sheet_long_edge_down
                .unwrap_or(d.flat_sheet_long_edge_down),
            long_rod_corner: self.long_rod_corner.unwrap_or(d.long_rod_corner),
            long_rod_corner_weight: self
                .long_rod_corner_weight
                .unwrap_or(d.long_rod_corner_weight),
            long_rod_anti_pierce: self.long_rod_anti_pierce.unwrap_or(d.long_rod_anti_pierce),
            stagger_joints: self.stagger_joints.unwrap_or(d.stagger_joints),
            min_stagger_ratio: self.min_stagger_ratio.unwrap_or(d.min_stagger_ratio),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, dims: (f64, f64, f64)) -> ItemSpec {
        ItemSpec {
            id: id.to_string(),
            name: id.to_string(),
            length: dims.0,
            width: dims.1,
            height: dims.2,
            weight: None,
            quantity: 1,
            color: None,
            can_rotate: None,
            item_type: None,
            is_hollow: None,
            density: None,
        }
    }

    #[test]
    fn container_validation_rejects_bad_dimensions() {
        let mut container = ContainerSpec {
            id: None,
            length: 1000.0,
            width: 1000.0,
            height: 1000.0,
            max_weight: None,
            unit: "mm".to_string(),
        };
        assert!(container.validate().is_ok());

        container.width = 0.0;
        assert!(container.validate().is_err());

        container.width = f64::NAN;
        assert!(container.validate().is_err());
    }

    #[test]
    fn container_validation_rejects_non_positive_max_weight() {
        let container = ContainerSpec {
            id: None,
            length: 10.0,
            width: 10.0,
            height: 10.0,
            max_weight: Some(0.0),
            unit: "mm".to_string(),
        };
        assert!(container.validate().is_err());
    }

    #[test]
    fn item_validation_rejects_zero_quantity() {
        let mut spec = item("a", (10.0, 10.0, 10.0));
        spec.quantity = 0;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn item_weight_zero_is_allowed() {
        let mut spec = item("a", (10.0, 10.0, 10.0));
        spec.weight = Some(0.0);
        assert!(spec.validate().is_ok());
        assert_eq!(spec.unit_weight(), 0.0);
    }

    #[test]
    fn effective_density_derives_from_weight() {
        let mut spec = item("a", (10.0, 10.0, 10.0));
        spec.weight = Some(500.0);
        assert!((spec.effective_density() - 0.5).abs() < 1e-12);

        spec.density = Some(2.0);
        assert_eq!(spec.effective_density(), 2.0);
    }

    #[test]
    fn flat_sheet_and_long_rod_classification() {
        let sheet = item("sheet", (1000.0, 800.0, 20.0));
        assert!(sheet.is_flat_sheet());
        assert!(!sheet.is_long_rod());

        let rod = item("rod", (2000.0, 50.0, 50.0));
        assert!(rod.is_long_rod());
        assert!(!rod.is_flat_sheet());

        let cube = item("cube", (100.0, 100.0, 100.0));
        assert!(!cube.is_flat_sheet());
        assert!(!cube.is_long_rod());
    }

    #[test]
    fn expand_instances_assigns_sequential_uids() {
        let mut a = item("a", (1.0, 1.0, 1.0));
        a.quantity = 2;
        let b = item("b", (2.0, 2.0, 2.0));

        let instances = expand_instances(&[a, b]);
        assert_eq!(instances.len(), 3);
        assert_eq!(instances[0].uid, 0);
        assert_eq!(instances[1].uid, 1);
        assert_eq!(instances[2].uid, 2);
        assert_eq!(instances[1].spec_index, 0);
        assert_eq!(instances[1].ordinal, 1);
        assert_eq!(instances[2].spec_index, 1);
    }

    #[test]
    fn solver_kind_accepts_legacy_aliases() {
        assert_eq!(
            serde_json::from_str::<SolverKind>("\"ortools\"").unwrap(),
            SolverKind::Exact
        );
        assert_eq!(
            serde_json::from_str::<SolverKind>("\"py3dbp\"").unwrap(),
            SolverKind::Greedy
        );
        assert_eq!(
            serde_json::from_str::<SolverKind>("\"exact\"").unwrap(),
            SolverKind::Exact
        );
        assert_eq!(
            serde_json::from_str::<SolverKind>("\"greedy\"").unwrap(),
            SolverKind::Greedy
        );
    }

    #[test]
    fn options_patch_overlays_defaults() {
        let patch: PackingOptionsPatch = serde_json::from_str(
            r#"{"solver": "exact", "time_limit_sec": 5.0, "strict_support": true}"#,
        )
        .unwrap();
        let resolved = patch.resolve(&PackingOptions::default());
        assert_eq!(resolved.solver, SolverKind::Exact);
        assert_eq!(resolved.time_limit_sec, 5.0);
        assert!(resolved.strict_support);
        // untouched fields keep their defaults
        assert!(resolved.allow_rotation);
        assert_eq!(resolved.min_support_ratio, 0.8);
    }

    #[test]
    fn options_validation_rejects_out_of_range_ratios() {
        let mut options = PackingOptions::default();
        options.min_support_ratio = 1.5;
        assert!(options.validate().is_err());

        let mut options = PackingOptions::default();
        options.time_limit_sec = 0.0;
        assert!(options.validate().is_err());
    }
}
