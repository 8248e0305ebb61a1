//! REST API for the packing service.
//!
//! Provides HTTP endpoints for communication with the dashboard.
//! Uses Axum as the web framework and supports CORS.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, SolverConfig};
use crate::model::{
    ContainerSpec, ItemSpec, PackingOptions, PackingOptionsPatch, ValidationError,
};
use crate::response::{
    Dimensions, PackedItemOut, PackingResponse, Point3, RenderContainer, RenderPayload,
    UnpackedItemOut, Utilization, build_response,
};
use crate::solver;

#[derive(Clone)]
struct ApiState {
    solver_config: SolverConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>stowplan API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request structure for the solve endpoints.
///
/// `options` is a partial overlay; omitted fields fall back to the
/// service defaults.
#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "container": {
            "id": "std-40ft",
            "length": 12000.0,
            "width": 2300.0,
            "height": 2400.0,
            "max_weight": 26000.0,
            "unit": "mm"
        },
        "items": [
            {
                "id": "crate-1",
                "name": "Crate",
                "length": 1200.0,
                "width": 800.0,
                "height": 900.0,
                "weight": 150.0,
                "quantity": 4
            }
        ],
        "options": { "solver": "greedy", "time_limit_sec": 30.0 }
    })
)]
pub struct PackingRequest {
    pub container: ContainerSpec,
    pub items: Vec<ItemSpec>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub options: Option<PackingOptionsPatch>,
}

struct ValidatedRequest {
    container: ContainerSpec,
    items: Vec<ItemSpec>,
    options: PackingOptions,
}

impl ValidatedRequest {
    fn instance_count(&self) -> usize {
        self.items.iter().map(|i| i.quantity as usize).sum()
    }
}

impl PackingRequest {
    fn into_validated(self, config: &SolverConfig) -> Result<ValidatedRequest, ValidationError> {
        self.container.validate()?;
        for item in &self.items {
            item.validate()?;
        }

        let mut options = match &self.options {
            Some(patch) => patch.resolve(config.default_options()),
            None => config.default_options().clone(),
        };
        options.time_limit_sec = config.clamp_time_limit(options.time_limit_sec);
        options.validate()?;

        Ok(ValidatedRequest {
            container: self.container,
            items: self.items,
            options,
        })
    }
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn parse_packing_request(
    payload: Result<Json<PackingRequest>, JsonRejection>,
    config: &SolverConfig,
) -> Result<ValidatedRequest, Response> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return Err(json_deserialize_error(err)),
    };

    payload
        .into_validated(config)
        .map_err(|err| validation_error(err.to_string()))
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_solve, handle_solve_stream, handle_health),
    components(
        schemas(
            PackingRequest,
            ContainerSpec,
            ItemSpec,
            PackingOptionsPatch,
            PackingResponse,
            PackedItemOut,
            UnpackedItemOut,
            Utilization,
            RenderPayload,
            RenderContainer,
            Point3,
            Dimensions,
            ErrorResponse,
            HealthResponse
        )
    ),
    tags((name = "packing", description = "Endpoints for container loading optimization"))
)]
struct ApiDoc;

/// Starts the API server.
///
/// Configures CORS for cross-origin requests from the dashboard.
/// Blocks until the server is terminated.
pub async fn start_api_server(config: ApiConfig, solver_config: SolverConfig) {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let state = ApiState { solver_config };

    let app = Router::new()
        // API endpoints
        .route("/packing/solve", post(handle_solve))
        .route("/packing/solve_stream", post(handle_solve_stream))
        .route("/health", get(handle_health))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state);

    let addr = config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            panic!("❌ Could not bind API server to {}: {}", addr, err);
        }
    };

    let display_host = config.display_host().to_string();
    println!(
        "🚀 Server running on http://{}:{}",
        display_host,
        config.port()
    );
    if config.binds_to_all_interfaces() {
        println!("💡 Local access: http://localhost:{}", config.port());
    }
    println!("📦 API Endpoints:");
    println!("   - POST /packing/solve");
    println!("   - POST /packing/solve_stream");
    println!("   - GET /health");
    println!("📑 Documentation:");
    println!("   - GET /docs");
    println!("   - GET /docs/openapi.json");

    if let Err(err) = axum::serve(listener, app).await {
        eprintln!("❌ API server terminated with an error: {err}");
    }
}

/// Handler for POST /packing/solve.
///
/// Runs the solver to completion and returns the full packing response.
/// The solve itself runs on the blocking pool; one request never stalls
/// the async executor.
#[utoipa::path(
    post,
    path = "/packing/solve",
    request_body = PackingRequest,
    responses(
        (status = 200, description = "Solve finished, possibly with unpacked items", body = PackingResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid container, item or option data",
            body = ErrorResponse
        ),
        (status = 500, description = "Solver task failed", body = ErrorResponse)
    ),
    tag = "packing"
)]
async fn handle_solve(
    State(state): State<ApiState>,
    payload: Result<Json<PackingRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_packing_request(payload, &state.solver_config) {
        Ok(request) => request,
        Err(response) => return response,
    };

    println!(
        "📥 New solve request: {} item types, {} instances, solver {:?}",
        request.items.len(),
        request.instance_count(),
        request.options.solver
    );

    let result = tokio::task::spawn_blocking(move || {
        let outcome = solver::solve(&request.container, &request.items, &request.options);
        build_response(&request.container, &request.items, &outcome)
    })
    .await;

    match result {
        Ok(response) => {
            println!(
                "📦 Result: {} packed, {} unpacked, status {}",
                response.packed_items.len(),
                response.unpacked_items.len(),
                response.solver_status
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => {
            eprintln!("❌ Solver task failed: {err}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Solver task failed",
                err.to_string(),
            )
        }
    }
}

/// Handler for POST /packing/solve_stream (SSE).
///
/// Streams solve events in real-time as Server-Sent Events (text/event-stream).
/// The dashboard can visualize placements live without waiting for the
/// complete result; the final event carries the status.
#[utoipa::path(
    post,
    path = "/packing/solve_stream",
    request_body = PackingRequest,
    responses(
        (
            status = 200,
            description = "Streams solve events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid container, item or option data",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_solve_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PackingRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_packing_request(payload, &state.solver_config) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        solver::solve_with_progress(&request.container, &request.items, &request.options, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                if tx.blocking_send(json).is_err() {
                    // Receiver has closed the stream; remaining events are discarded.
                    return;
                }
            }
        });
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for GET /health.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "packing"
)]
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
