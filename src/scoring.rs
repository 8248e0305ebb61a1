//! Scoring and selection of candidate placements.
//!
//! A placement is judged on volume utilization first, then compactness,
//! then stability. The exact solver compares whole candidate placements with
//! this score; the greedy solver uses it once, to report the quality of the
//! single placement it produced.

use crate::model::{ContainerSpec, PackingOptions, PlacedItem};
use crate::types::{
    CenterOfMassCalculator, Dimensional, EPSILON_GENERAL, EPSILON_HEIGHT, Weighted,
};

/// Relative weight of the utilization term in the composite score.
const VOLUME_WEIGHT: f64 = 1.0;
/// Relative weight of the compactness penalty when enabled.
const COMPACTNESS_WEIGHT: f64 = 0.3;
/// Relative weight of the stability bonus.
const STABILITY_WEIGHT: f64 = 0.1;

/// Quality of one candidate placement.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlacementScore {
    /// used_volume / container_volume.
    pub fill_ratio: f64,
    /// Spread of the placed items' bounding box relative to the container;
    /// 0 for a perfectly tight block.
    pub compactness_penalty: f64,
    /// 0..1, from mean support ratio and center-of-mass deviation.
    pub stability: f64,
    /// Weighted combination used for ranking.
    pub composite: f64,
}

impl PlacementScore {
    /// Ranking per the selection contract: composite first, ties broken by
    /// lower compactness penalty, then by higher stability.
    pub fn better_than(&self, other: &PlacementScore) -> bool {
        if (self.composite - other.composite).abs() > EPSILON_GENERAL {
            return self.composite > other.composite;
        }
        if (self.compactness_penalty - other.compactness_penalty).abs() > EPSILON_GENERAL {
            return self.compactness_penalty < other.compactness_penalty;
        }
        self.stability > other.stability + EPSILON_GENERAL
    }
}

/// Sum of the placed items' volumes. Each instance counts exactly once.
pub fn used_volume(placed: &[PlacedItem]) -> f64 {
    placed.iter().map(|p| p.volume()).sum()
}

/// Evaluates a complete placement against the container and options.
pub fn evaluate(
    container: &ContainerSpec,
    placed: &[PlacedItem],
    options: &PackingOptions,
) -> PlacementScore {
    let container_volume = container.volume();
    if placed.is_empty() || container_volume <= 0.0 {
        return PlacementScore::default();
    }

    let used = used_volume(placed);
    let fill_ratio = used / container_volume;

    let compactness_penalty = {
        let mut bbox = placed[0].bounding_box();
        for p in &placed[1..] {
            bbox = bbox.union(&p.bounding_box());
        }
        ((bbox.size().volume() - used) / container_volume).max(0.0)
    };

    let stability = stability_score(container, placed, options);

    let mut composite = VOLUME_WEIGHT * fill_ratio + STABILITY_WEIGHT * stability;
    if options.maximize_compactness {
        composite -= COMPACTNESS_WEIGHT * compactness_penalty;
    }
    if !options.maximize_volume {
        // utilization still matters, just without dominating
        composite = 0.3 * fill_ratio
            + STABILITY_WEIGHT * stability
            + if options.maximize_compactness {
                -COMPACTNESS_WEIGHT * compactness_penalty
            } else {
                0.0
            };
    }

    PlacementScore {
        fill_ratio,
        compactness_penalty,
        stability,
        composite,
    }
}

/// Stability in 0..1: half from the mean base support ratio, half from how
/// centered the weighted load sits.
fn stability_score(
    container: &ContainerSpec,
    placed: &[PlacedItem],
    _options: &PackingOptions,
) -> f64 {
    let mut support_sum = 0.0;
    for (i, p) in placed.iter().enumerate() {
        if p.position.z <= EPSILON_HEIGHT {
            support_sum += 1.0;
            continue;
        }
        let base = p.size.base_area();
        if base <= EPSILON_GENERAL {
            continue;
        }
        let below: Vec<PlacedItem> = placed
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, q)| q.clone())
            .collect();
        let area = crate::geometry::support_area(p.position, p.size, &below, EPSILON_HEIGHT);
        support_sum += (area / base).min(1.0);
    }
    let mean_support = support_sum / placed.len() as f64;

    let mut calc = CenterOfMassCalculator::new();
    for p in placed {
        calc.add_point(p.center(), p.weight());
    }
    let balance = if calc.total_weight() <= 0.0 {
        // weightless load: balance is moot, count it as neutral
        1.0
    } else {
        let limit = container.size().half_horizontal_diagonal().max(EPSILON_GENERAL);
        (1.0 - calc.horizontal_deviation(container.floor_center()) / limit).max(0.0)
    };

    0.5 * mean_support + 0.5 * balance
}
