//! Placement search.
//!
//! Two interchangeable strategies behind one `solve` entry point:
//! - `Greedy`: extreme-point heuristic; orders instances by a blended
//!   priority and drops each one at the best feasible candidate corner.
//! - `Exact`: depth-first branch-and-bound over the same discrete candidate
//!   positions, keeping the best-scored placement found.
//!
//! Both strategies poll a wall-clock deadline between search steps and return
//! the best-known placement when the budget runs out; an in-progress candidate
//! evaluation always completes, so the result is never half-updated.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::constraints::ConstraintModel;
use crate::geometry::rotated_size;
use crate::model::{
    ContainerSpec, ItemInstance, ItemSpec, PackingOptions, PlacedItem, SolverKind, UnpackedItem,
    UnpackedReason, expand_instances,
};
use crate::scoring::{self, PlacementScore};
use crate::types::{EPSILON_GENERAL, Vec3};

/// Hard cap on search nodes for the exact strategy; the deadline is the
/// primary brake, this catches tiny time limits with huge instances.
const MAX_EXACT_NODES: usize = 200_000;

/// Branching width of the exact strategy: candidate (position, orientation)
/// pairs tried per item before the skip branch.
const EXACT_BRANCH_WIDTH: usize = 3;

/// Upper bound on retained extreme points; keeps candidate scans linear.
const MAX_CANDIDATE_POINTS: usize = 512;

/// Wall-clock budget for one solve.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(seconds: f64) -> Self {
        Self {
            started: Instant::now(),
            budget: Duration::from_secs_f64(seconds.max(0.0)),
        }
    }

    /// True once the budget is used up. Polled between search steps;
    /// never interrupts a step in flight.
    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.budget
    }

    /// Seconds consumed so far.
    pub fn elapsed_sec(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

/// Outcome classification of one solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SolveStatus {
    /// Search space exhausted with every instance placed.
    Optimal,
    /// A valid (possibly partial) placement was found.
    Feasible,
    /// Nothing could be placed although instances were requested.
    Infeasible,
    /// The time budget ran out; the best-known placement is returned.
    Timeout,
}

impl SolveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolveStatus::Optimal => "OPTIMAL",
            SolveStatus::Feasible => "FEASIBLE",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::Timeout => "TIMEOUT",
        }
    }
}

/// Progress events emitted during a solve, suitable for SSE streaming.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum SolveEvent {
    /// Search started after model building.
    Started { instances: usize, solver: SolverKind },
    /// An instance was placed.
    ItemPlaced {
        uid: usize,
        item_id: String,
        position: (f64, f64, f64),
        size: (f64, f64, f64),
        rotation: usize,
    },
    /// An instance could not be placed.
    ItemRejected {
        uid: usize,
        item_id: String,
        reason: String,
    },
    /// Solve finished.
    Finished {
        packed: usize,
        unpacked: usize,
        status: SolveStatus,
        elapsed_sec: f64,
    },
}

/// Result of the placement search, before response shaping.
#[derive(Clone, Debug)]
pub struct SolveOutcome {
    pub placed: Vec<PlacedItem>,
    pub unpacked: Vec<UnpackedItem>,
    pub status: SolveStatus,
    pub score: PlacementScore,
}

impl SolveOutcome {
    /// Whether the mandatory constraints were satisfiable at all. A timeout
    /// with a non-empty partial placement still counts as feasible
    /// (best-effort contract); a timeout with nothing placed does not.
    pub fn is_feasible(&self) -> bool {
        match self.status {
            SolveStatus::Infeasible => false,
            SolveStatus::Timeout | SolveStatus::Feasible => !self.placed.is_empty(),
            SolveStatus::Optimal => true,
        }
    }
}

/// Solves one packing request. Inputs must be validated beforehand.
pub fn solve(container: &ContainerSpec, items: &[ItemSpec], options: &PackingOptions) -> SolveOutcome {
    solve_with_progress(container, items, options, |_| {})
}

/// Like [`solve`], with a callback invoked for every search milestone.
pub fn solve_with_progress(
    container: &ContainerSpec,
    items: &[ItemSpec],
    options: &PackingOptions,
    mut on_event: impl FnMut(&SolveEvent),
) -> SolveOutcome {
    let deadline = Deadline::new(options.time_limit_sec);
    let model = ConstraintModel::new(container, options);
    let instances = expand_instances(items);

    on_event(&SolveEvent::Started {
        instances: instances.len(),
        solver: options.solver,
    });

    // an empty request is trivially packed
    if instances.is_empty() {
        let outcome = SolveOutcome {
            placed: Vec::new(),
            unpacked: Vec::new(),
            status: SolveStatus::Optimal,
            score: PlacementScore::default(),
        };
        on_event(&SolveEvent::Finished {
            packed: 0,
            unpacked: 0,
            status: outcome.status,
            elapsed_sec: deadline.elapsed_sec(),
        });
        return outcome;
    }

    let mut outcome = match options.solver {
        SolverKind::Greedy => greedy_solve(&model, items, &instances, &deadline, &mut on_event),
        SolverKind::Exact => exact_solve(&model, items, &instances, &deadline),
    };
    outcome.score = scoring::evaluate(container, &outcome.placed, options);

    on_event(&SolveEvent::Finished {
        packed: outcome.placed.len(),
        unpacked: outcome.unpacked.len(),
        status: outcome.status,
        elapsed_sec: deadline.elapsed_sec(),
    });
    outcome
}

/// Candidate placement corners: container origin plus the corners opened up
/// by every placed box (extreme points).
#[derive(Clone, Debug)]
struct CandidateSpace {
    points: Vec<Vec3>,
    container: Vec3,
}

impl CandidateSpace {
    fn new(container: Vec3) -> Self {
        Self {
            points: vec![Vec3::zero()],
            container,
        }
    }

    /// Candidate points ordered bottom-up, back-left first.
    fn candidates(&self) -> Vec<Vec3> {
        let mut points = self.points.clone();
        points.sort_by(compare_points);
        points
    }

    /// Registers a committed placement: spawns the three new corner points
    /// and drops points swallowed by the new box.
    fn commit(&mut self, placed: &PlacedItem) {
        let bbox = placed.bounding_box();
        let spawned = [
            Vec3::new(bbox.max.x, bbox.min.y, bbox.min.z),
            Vec3::new(bbox.min.x, bbox.max.y, bbox.min.z),
            Vec3::new(bbox.min.x, bbox.min.y, bbox.max.z),
        ];
        for point in spawned {
            if point.x < self.container.x - EPSILON_GENERAL
                && point.y < self.container.y - EPSILON_GENERAL
                && point.z < self.container.z - EPSILON_GENERAL
            {
                self.points.push(point);
            }
        }
        // drop points strictly inside the new box; its faces stay usable
        self.points.retain(|p| {
            !(p.x > bbox.min.x - EPSILON_GENERAL
                && p.x < bbox.max.x - EPSILON_GENERAL
                && p.y > bbox.min.y - EPSILON_GENERAL
                && p.y < bbox.max.y - EPSILON_GENERAL
                && p.z > bbox.min.z - EPSILON_GENERAL
                && p.z < bbox.max.z - EPSILON_GENERAL)
        });
        self.points.sort_by(compare_points);
        self.points
            .dedup_by(|a, b| a.distance_2d(b) < EPSILON_GENERAL && (a.z - b.z).abs() < EPSILON_GENERAL);
        self.points.truncate(MAX_CANDIDATE_POINTS);
    }
}

fn compare_points(a: &Vec3, b: &Vec3) -> Ordering {
    a.z.partial_cmp(&b.z)
        .unwrap_or(Ordering::Equal)
        .then(a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
        .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
}

/// A feasible (position, orientation) pair with its soft penalty.
#[derive(Clone, Copy, Debug)]
struct RankedCandidate {
    position: Vec3,
    size: Vec3,
    rotation: usize,
    penalty: f64,
    balanced: bool,
}

/// Collects and ranks feasible candidates for one instance, best first.
/// Balanced candidates (within center-of-mass tolerance) win over unbalanced
/// ones; within each group the lower soft penalty wins, ties bottom-up.
fn ranked_candidates(
    model: &ConstraintModel<'_>,
    spec: &ItemSpec,
    space: &CandidateSpace,
    placed: &[PlacedItem],
    limit: usize,
) -> Vec<RankedCandidate> {
    let weight = spec.unit_weight();
    let density = spec.effective_density();
    let mut found: Vec<RankedCandidate> = Vec::new();

    for rotation in model.orientation_order(spec) {
        let size = rotated_size(spec.size(), rotation);
        if !size.fits_within(&model.container_size(), EPSILON_GENERAL) {
            continue;
        }
        for position in space.candidates() {
            if !model.fits_bounds(position, size) {
                continue;
            }
            if !model.free_of_collisions(position, size, placed) {
                continue;
            }
            let ratio = model.support_ratio(position, size, placed);
            if !model.support_satisfied(ratio) {
                continue;
            }
            if !model.center_supported(position, size, placed) {
                continue;
            }
            if !model.heavy_bottom_ok(density, position, size, placed) {
                continue;
            }
            let mut penalty = model.placement_penalty(spec, position, size, weight, placed);
            if ratio < model.options().min_support_ratio {
                // lenient support mode: insufficient coverage costs score
                penalty += model.options().min_support_ratio - ratio;
            }
            let (deviation, cg_height) = model.com_after(placed, position, size, weight);
            found.push(RankedCandidate {
                position,
                size,
                rotation,
                penalty,
                balanced: model.com_within_tolerance(deviation, cg_height),
            });
        }
    }

    found.sort_by(|a, b| {
        b.balanced
            .cmp(&a.balanced)
            .then(a.penalty.partial_cmp(&b.penalty).unwrap_or(Ordering::Equal))
            .then(compare_points(&a.position, &b.position))
            .then(a.rotation.cmp(&b.rotation))
    });
    found.truncate(limit);
    found
}

fn make_placed(spec: &ItemSpec, instance: &ItemInstance, candidate: &RankedCandidate) -> PlacedItem {
    PlacedItem {
        spec_index: instance.spec_index,
        uid: instance.uid,
        position: candidate.position,
        size: candidate.size,
        rotation: candidate.rotation,
        weight: spec.unit_weight(),
        density: spec.effective_density(),
    }
}

// ---------------------------------------------------------------------------
// Greedy strategy
// ---------------------------------------------------------------------------

/// Extreme-point first-fit with dynamic priorities.
///
/// Each round picks the pending instance with the highest priority: large
/// items (above the volume threshold) first, then a blend of relative volume
/// and a clustering bonus for types that already have siblings placed. The
/// seeded jitter only breaks exact priority ties, keeping runs reproducible.
fn greedy_solve(
    model: &ConstraintModel<'_>,
    items: &[ItemSpec],
    instances: &[ItemInstance],
    deadline: &Deadline,
    on_event: &mut impl FnMut(&SolveEvent),
) -> SolveOutcome {
    let options = model.options();
    let container_volume = model.container_size().volume().max(EPSILON_GENERAL);

    let mut rng = StdRng::seed_from_u64(options.random_seed.unwrap_or(0));
    let jitter: HashMap<usize, f64> = instances
        .iter()
        .map(|inst| (inst.uid, rng.r#gen::<f64>() * 1e-9))
        .collect();

    let mut pending: Vec<ItemInstance> = instances.to_vec();
    let mut placed: Vec<PlacedItem> = Vec::new();
    let mut unpacked: Vec<UnpackedItem> = Vec::new();
    let mut space = CandidateSpace::new(model.container_size());
    let mut total_weight = 0.0;
    let mut placed_per_spec: HashMap<usize, u32> = HashMap::new();
    let mut timed_out = false;

    while !pending.is_empty() {
        if deadline.expired() {
            timed_out = true;
            for instance in pending.drain(..) {
                let spec = &items[instance.spec_index];
                on_event(&SolveEvent::ItemRejected {
                    uid: instance.uid,
                    item_id: spec.id.clone(),
                    reason: UnpackedReason::TimeExhausted.tag().to_string(),
                });
                unpacked.push(UnpackedItem {
                    spec_index: instance.spec_index,
                    uid: instance.uid,
                    reason: UnpackedReason::TimeExhausted,
                });
            }
            break;
        }

        let next_index = select_next(items, &pending, &placed_per_spec, &jitter, options, container_volume);
        let instance = pending.remove(next_index);
        let spec = &items[instance.spec_index];
        let weight = spec.unit_weight();

        if !model.weight_allows(total_weight, weight) {
            on_event(&SolveEvent::ItemRejected {
                uid: instance.uid,
                item_id: spec.id.clone(),
                reason: UnpackedReason::WeightExceeded.tag().to_string(),
            });
            unpacked.push(UnpackedItem {
                spec_index: instance.spec_index,
                uid: instance.uid,
                reason: UnpackedReason::WeightExceeded,
            });
            continue;
        }

        match ranked_candidates(model, spec, &space, &placed, 1).first() {
            Some(candidate) => {
                let item = make_placed(spec, &instance, candidate);
                on_event(&SolveEvent::ItemPlaced {
                    uid: item.uid,
                    item_id: spec.id.clone(),
                    position: (item.position.x, item.position.y, item.position.z),
                    size: (item.size.x, item.size.y, item.size.z),
                    rotation: item.rotation,
                });
                total_weight += item.weight;
                *placed_per_spec.entry(instance.spec_index).or_insert(0) += 1;
                space.commit(&item);
                placed.push(item);
            }
            None => {
                on_event(&SolveEvent::ItemRejected {
                    uid: instance.uid,
                    item_id: spec.id.clone(),
                    reason: UnpackedReason::NoFeasiblePosition.tag().to_string(),
                });
                unpacked.push(UnpackedItem {
                    spec_index: instance.spec_index,
                    uid: instance.uid,
                    reason: UnpackedReason::NoFeasiblePosition,
                });
            }
        }
    }

    // the heuristic cannot prove optimality, so a full pack is still Feasible
    let status = if timed_out {
        SolveStatus::Timeout
    } else if placed.is_empty() {
        SolveStatus::Infeasible
    } else {
        SolveStatus::Feasible
    };

    SolveOutcome {
        placed,
        unpacked,
        status,
        score: PlacementScore::default(),
    }
}

/// Picks the pending instance with the best priority key.
fn select_next(
    items: &[ItemSpec],
    pending: &[ItemInstance],
    placed_per_spec: &HashMap<usize, u32>,
    jitter: &HashMap<usize, f64>,
    options: &PackingOptions,
    container_volume: f64,
) -> usize {
    let mut best = 0;
    let mut best_key = priority_key(items, &pending[0], placed_per_spec, jitter, options, container_volume);
    for (i, instance) in pending.iter().enumerate().skip(1) {
        let key = priority_key(items, instance, placed_per_spec, jitter, options, container_volume);
        if key > best_key {
            best = i;
            best_key = key;
        }
    }
    best
}

/// Priority of one instance: (is-large, blended score, jitter, -uid).
fn priority_key(
    items: &[ItemSpec],
    instance: &ItemInstance,
    placed_per_spec: &HashMap<usize, u32>,
    jitter: &HashMap<usize, f64>,
    options: &PackingOptions,
    container_volume: f64,
) -> (bool, f64, f64, i64) {
    let spec = &items[instance.spec_index];
    let relative_volume = spec.unit_volume() / container_volume;
    let large = options.large_items_first && relative_volume >= options.large_item_threshold_ratio;

    let cluster_bonus = if spec.quantity > 0 {
        let siblings = placed_per_spec.get(&instance.spec_index).copied().unwrap_or(0);
        siblings as f64 / spec.quantity as f64
    } else {
        0.0
    };

    let blended =
        options.greedy_weight_coefficient * relative_volume + options.cluster_weight * cluster_bonus;
    let tie = jitter.get(&instance.uid).copied().unwrap_or(0.0);
    (large, blended, tie, -(instance.uid as i64))
}

// ---------------------------------------------------------------------------
// Exact strategy
// ---------------------------------------------------------------------------

struct ExactSearch<'a> {
    model: &'a ConstraintModel<'a>,
    items: &'a [ItemSpec],
    order: Vec<ItemInstance>,
    /// remaining_volume[i] = total volume of order[i..], for pruning.
    remaining_volume: Vec<f64>,
    deadline: &'a Deadline,
    nodes: usize,
    timed_out: bool,
    best_placed: Vec<PlacedItem>,
    best_volume: f64,
    best_score: PlacementScore,
}

/// Branch-and-bound over discrete candidate positions.
///
/// Instances are branched in descending volume order; at each level the
/// top-ranked candidate placements are tried, plus the branch that leaves the
/// instance out. Subtrees that cannot beat the incumbent volume are pruned.
fn exact_solve(
    model: &ConstraintModel<'_>,
    items: &[ItemSpec],
    instances: &[ItemInstance],
    deadline: &Deadline,
) -> SolveOutcome {
    let mut order: Vec<ItemInstance> = instances.to_vec();
    order.sort_by(|a, b| {
        let va = items[a.spec_index].unit_volume();
        let vb = items[b.spec_index].unit_volume();
        vb.partial_cmp(&va)
            .unwrap_or(Ordering::Equal)
            .then(a.uid.cmp(&b.uid))
    });

    let mut remaining_volume = vec![0.0; order.len() + 1];
    for i in (0..order.len()).rev() {
        remaining_volume[i] = remaining_volume[i + 1] + items[order[i].spec_index].unit_volume();
    }

    let mut search = ExactSearch {
        model,
        items,
        order,
        remaining_volume,
        deadline,
        nodes: 0,
        timed_out: false,
        best_placed: Vec::new(),
        best_volume: -1.0,
        best_score: PlacementScore::default(),
    };

    let space = CandidateSpace::new(model.container_size());
    search.descend(0, &mut Vec::new(), &space, 0.0);

    let ExactSearch {
        timed_out,
        best_placed,
        ..
    } = search;

    let placed_uids: std::collections::HashSet<usize> =
        best_placed.iter().map(|p| p.uid).collect();
    let mut unpacked = Vec::new();
    for instance in instances {
        if placed_uids.contains(&instance.uid) {
            continue;
        }
        let spec = &items[instance.spec_index];
        let reason = if !model.weight_feasible_alone(spec.unit_weight()) {
            UnpackedReason::WeightExceeded
        } else if timed_out {
            UnpackedReason::TimeExhausted
        } else {
            UnpackedReason::NoFeasiblePosition
        };
        unpacked.push(UnpackedItem {
            spec_index: instance.spec_index,
            uid: instance.uid,
            reason,
        });
    }

    let status = if best_placed.is_empty() {
        SolveStatus::Infeasible
    } else if timed_out {
        SolveStatus::Timeout
    } else if unpacked.is_empty() {
        SolveStatus::Optimal
    } else {
        SolveStatus::Feasible
    };

    SolveOutcome {
        placed: best_placed,
        unpacked,
        status,
        score: PlacementScore::default(),
    }
}

impl<'a> ExactSearch<'a> {
    fn descend(
        &mut self,
        index: usize,
        placed: &mut Vec<PlacedItem>,
        space: &CandidateSpace,
        total_weight: f64,
    ) {
        self.nodes += 1;
        if self.nodes > MAX_EXACT_NODES || self.deadline.expired() {
            self.timed_out = self.deadline.expired() || self.timed_out;
            return;
        }

        self.record_if_best(placed);

        if index >= self.order.len() {
            return;
        }

        // bound: even packing everything left cannot beat the incumbent
        let current_volume = scoring::used_volume(placed);
        if current_volume + self.remaining_volume[index] <= self.best_volume + EPSILON_GENERAL {
            return;
        }

        let model = self.model;
        let items = self.items;
        let instance = self.order[index];
        let spec = &items[instance.spec_index];
        let weight = spec.unit_weight();

        if model.weight_allows(total_weight, weight) {
            let candidates = ranked_candidates(model, spec, space, placed, EXACT_BRANCH_WIDTH);
            for candidate in candidates {
                let item = make_placed(spec, &instance, &candidate);
                let mut branch_space = space.clone();
                branch_space.commit(&item);
                placed.push(item);
                self.descend(index + 1, placed, &branch_space, total_weight + weight);
                placed.pop();
                if self.timed_out || self.nodes > MAX_EXACT_NODES {
                    return;
                }
            }
        }

        // leave-out branch
        self.descend(index + 1, placed, space, total_weight);
    }

    fn record_if_best(&mut self, placed: &[PlacedItem]) {
        let volume = scoring::used_volume(placed);
        if volume < self.best_volume - EPSILON_GENERAL {
            return;
        }
        let container = ContainerSpec {
            id: None,
            length: self.model.container_size().x,
            width: self.model.container_size().y,
            height: self.model.container_size().z,
            max_weight: None,
            unit: String::new(),
        };
        let score = scoring::evaluate(&container, placed, self.model.options());
        if volume > self.best_volume + EPSILON_GENERAL || score.better_than(&self.best_score) {
            self.best_volume = volume;
            self.best_score = score;
            self.best_placed = placed.to_vec();
        }
    }
}
