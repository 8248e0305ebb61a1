//! External JSON contract of a solve.
//!
//! Pure projection from [`SolveOutcome`](crate::solver::SolveOutcome) into the
//! response shape the dashboard consumes, including the render geometry for
//! the 3D viewer. No packing decisions happen here.

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::{ContainerSpec, ItemSpec, PlacedItem, UnpackedItem};
use crate::solver::SolveOutcome;

/// Default opacity of a rendered solid item.
const OPACITY_SOLID: f64 = 1.0;
/// Hollow items render translucent so their interior stays visible.
const OPACITY_HOLLOW: f64 = 0.55;

/// Render id used when the request names no container id.
const DEFAULT_CONTAINER_ID: &str = "container";

/// Volume bookkeeping of one placement.
#[derive(Clone, Copy, Debug, Serialize, ToSchema)]
pub struct Utilization {
    pub container_volume: f64,
    pub used_volume: f64,
    pub unused_volume: f64,
    pub fill_ratio: f64,
}

#[derive(Clone, Copy, Debug, Serialize, ToSchema)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Copy, Debug, Serialize, ToSchema)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

/// One packed instance in the response, with its rotated size.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct PackedItemOut {
    pub id: String,
    pub name: String,
    pub position: Point3,
    pub size: Dimensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub opacity: f64,
    pub rotation_index: usize,
}

/// One instance that could not be placed, with a machine-readable reason.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct UnpackedItemOut {
    pub id: String,
    pub name: String,
    pub reason: String,
}

/// Container echo inside the render payload. The viewer needs an id for its
/// scene graph, so a missing request id falls back to a fixed one.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct RenderContainer {
    pub id: String,
    pub size: Dimensions,
}

/// Render-ready geometry for the viewer: container plus a flat item list.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct RenderPayload {
    pub unit: String,
    pub container: RenderContainer,
    pub items: Vec<PackedItemOut>,
}

/// Full solve response. The top-level `container` echoes the request spec
/// verbatim; the render payload carries its own viewer-oriented shape.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct PackingResponse {
    pub feasible: bool,
    pub solver_status: String,
    pub message: String,
    pub container: ContainerSpec,
    pub packed_items: Vec<PackedItemOut>,
    pub unpacked_items: Vec<UnpackedItemOut>,
    pub utilization: Utilization,
    pub render: RenderPayload,
}

/// Builds the response for one finished solve.
pub fn build_response(
    container: &ContainerSpec,
    items: &[ItemSpec],
    outcome: &SolveOutcome,
) -> PackingResponse {
    let packed_items: Vec<PackedItemOut> = outcome
        .placed
        .iter()
        .map(|p| packed_item(items, p))
        .collect();

    let unpacked_items: Vec<UnpackedItemOut> = outcome
        .unpacked
        .iter()
        .map(|u| unpacked_item(items, u))
        .collect();

    let render_container = RenderContainer {
        id: container
            .id
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTAINER_ID.to_string()),
        size: Dimensions {
            length: container.length,
            width: container.width,
            height: container.height,
        },
    };

    PackingResponse {
        feasible: outcome.is_feasible(),
        solver_status: outcome.status.as_str().to_string(),
        message: status_message(outcome),
        container: container.clone(),
        packed_items: packed_items.clone(),
        unpacked_items,
        utilization: utilization(container, outcome),
        render: RenderPayload {
            unit: container.unit.clone(),
            container: render_container,
            items: packed_items,
        },
    }
}

fn packed_item(items: &[ItemSpec], placed: &PlacedItem) -> PackedItemOut {
    let spec = &items[placed.spec_index];
    let opacity = if spec.is_hollow.unwrap_or(false) {
        OPACITY_HOLLOW
    } else {
        OPACITY_SOLID
    };
    PackedItemOut {
        id: spec.id.clone(),
        name: spec.name.clone(),
        position: Point3 {
            x: placed.position.x,
            y: placed.position.y,
            z: placed.position.z,
        },
        size: Dimensions {
            length: placed.size.x,
            width: placed.size.y,
            height: placed.size.z,
        },
        color: spec.color.clone(),
        opacity,
        rotation_index: placed.rotation,
    }
}

fn unpacked_item(items: &[ItemSpec], unpacked: &UnpackedItem) -> UnpackedItemOut {
    let spec = &items[unpacked.spec_index];
    UnpackedItemOut {
        id: spec.id.clone(),
        name: spec.name.clone(),
        reason: unpacked.reason.tag().to_string(),
    }
}

fn utilization(container: &ContainerSpec, outcome: &SolveOutcome) -> Utilization {
    let container_volume = container.volume();
    let used_volume: f64 = outcome.placed.iter().map(|p| p.size.volume()).sum();
    let fill_ratio = if container_volume > 0.0 {
        used_volume / container_volume
    } else {
        0.0
    };
    Utilization {
        container_volume,
        used_volume,
        unused_volume: (container_volume - used_volume).max(0.0),
        fill_ratio,
    }
}

fn status_message(outcome: &SolveOutcome) -> String {
    use crate::solver::SolveStatus;
    match outcome.status {
        SolveStatus::Optimal => format!("All {} item(s) packed.", outcome.placed.len()),
        SolveStatus::Feasible if outcome.unpacked.is_empty() => {
            format!("All {} item(s) packed.", outcome.placed.len())
        }
        SolveStatus::Feasible => format!(
            "{} item(s) packed, {} left out.",
            outcome.placed.len(),
            outcome.unpacked.len()
        ),
        SolveStatus::Infeasible => "No item could be placed.".to_string(),
        SolveStatus::Timeout if outcome.placed.is_empty() => {
            "Time limit reached before any item was placed.".to_string()
        }
        SolveStatus::Timeout => format!(
            "Time limit reached; best-effort result with {} item(s) packed.",
            outcome.placed.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackingOptions;
    use crate::solver;

    fn container() -> ContainerSpec {
        ContainerSpec {
            id: Some("c1".to_string()),
            length: 1000.0,
            width: 1000.0,
            height: 1000.0,
            max_weight: None,
            unit: "mm".to_string(),
        }
    }

    fn item(id: &str, dims: (f64, f64, f64), quantity: u32) -> ItemSpec {
        ItemSpec {
            id: id.to_string(),
            name: format!("{id} name"),
            length: dims.0,
            width: dims.1,
            height: dims.2,
            weight: Some(1.0),
            quantity,
            color: Some("#336699".to_string()),
            can_rotate: None,
            item_type: None,
            is_hollow: None,
            density: None,
        }
    }

    #[test]
    fn full_container_reports_fill_ratio_one() {
        let c = container();
        let items = vec![item("cube", (1000.0, 1000.0, 1000.0), 1)];
        let outcome = solver::solve(&c, &items, &PackingOptions::default());
        let response = build_response(&c, &items, &outcome);

        assert!(response.feasible);
        assert_eq!(response.packed_items.len(), 1);
        assert!(response.unpacked_items.is_empty());
        assert!((response.utilization.fill_ratio - 1.0).abs() < 1e-9);
        assert!((response.utilization.unused_volume).abs() < 1e-3);
        assert_eq!(response.render.items.len(), 1);
        assert_eq!(response.render.unit, "mm");
        assert_eq!(response.render.container.id, "c1");
    }

    #[test]
    fn anonymous_container_gets_a_render_id() {
        let mut c = container();
        c.id = None;
        let items = vec![item("cube", (500.0, 500.0, 500.0), 1)];
        let outcome = solver::solve(&c, &items, &PackingOptions::default());
        let response = build_response(&c, &items, &outcome);

        assert_eq!(response.render.container.id, "container");
        // the top-level echo stays faithful to the request
        assert!(response.container.id.is_none());
    }

    #[test]
    fn unpacked_items_carry_reason_tags() {
        let c = container();
        let items = vec![item("big", (1001.0, 1000.0, 1000.0), 1)];
        let outcome = solver::solve(&c, &items, &PackingOptions::default());
        let response = build_response(&c, &items, &outcome);

        assert!(!response.feasible);
        assert_eq!(response.solver_status, "INFEASIBLE");
        assert_eq!(response.unpacked_items.len(), 1);
        assert_eq!(response.unpacked_items[0].reason, "no-feasible-position");
        assert_eq!(response.unpacked_items[0].id, "big");
    }

    #[test]
    fn empty_request_is_trivially_feasible() {
        let c = container();
        let outcome = solver::solve(&c, &[], &PackingOptions::default());
        let response = build_response(&c, &[], &outcome);

        assert!(response.feasible);
        assert_eq!(response.solver_status, "OPTIMAL");
        assert_eq!(response.utilization.fill_ratio, 0.0);
        assert!(response.packed_items.is_empty());
    }

    #[test]
    fn response_serializes_with_contract_field_names() {
        let c = container();
        let items = vec![item("cube", (500.0, 500.0, 500.0), 1)];
        let outcome = solver::solve(&c, &items, &PackingOptions::default());
        let response = build_response(&c, &items, &outcome);
        let json = serde_json::to_value(&response).unwrap();

        assert!(json["feasible"].is_boolean());
        assert!(json["solver_status"].is_string());
        // the container echo is flat, like the request it mirrors
        assert_eq!(json["container"]["length"], 1000.0);
        assert_eq!(json["container"]["width"], 1000.0);
        assert_eq!(json["container"]["height"], 1000.0);
        assert_eq!(json["container"]["unit"], "mm");
        assert_eq!(json["container"]["id"], "c1");
        assert!(
            json["container"].get("max_weight").is_none(),
            "an absent weight limit is omitted, not null"
        );
        assert!(json["utilization"]["container_volume"].is_number());
        assert!(json["render"]["container"]["size"]["length"].is_number());
        assert_eq!(json["render"]["container"]["id"], "c1");
        let first = &json["packed_items"][0];
        assert!(first["position"]["x"].is_number());
        assert!(first["size"]["height"].is_number());
        assert_eq!(first["rotation_index"], 0);
        assert_eq!(first["color"], "#336699");
    }

    #[test]
    fn hollow_items_render_translucent() {
        let c = container();
        let mut spec = item("shell", (400.0, 400.0, 400.0), 1);
        spec.is_hollow = Some(true);
        let items = vec![spec];
        let outcome = solver::solve(&c, &items, &PackingOptions::default());
        let response = build_response(&c, &items, &outcome);

        assert!(response.packed_items[0].opacity < 1.0);
    }
}
