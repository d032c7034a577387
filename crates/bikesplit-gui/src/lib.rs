//! Bikesplit GUI - Web API for bike split simulation
//!
//! Features:
//! - `/api/simulate` runs a course with query-string params
//! - Chart series for elevation, velocity and power losses
//! - Presets and input bounds for building the form

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bikesplit_sim::{
    check_bounds, downsample,
    params::{presets, ALL_SPECS},
    report::{chart_rows, ChartRow, DEFAULT_MAX_POINTS},
    simulate_with_limits, summarize, CourseSource, ParamSpec, SimError, SimLimits,
    SimWarning, SimulationMeta, SimulationParams, SimulationResult, SimulationState, Summary,
    Units,
};
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tower_http::services::ServeDir;

/// Wall-clock budget for one request's integration.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates the Axum router with all routes
pub fn create_router() -> Router {
    Router::new()
        .route("/api/simulate", get(handle_simulate))
        .route("/api/chart/{chart_type}", get(handle_chart_data))
        .route("/api/presets", get(handle_presets))
        .route("/api/params", get(handle_params))
        .fallback_service(ServeDir::new("crates/bikesplit-gui/templates"))
}

// ---------------------------------------------------------------------------
// Request config
// ---------------------------------------------------------------------------

/// Simulation configuration from query params
#[derive(Debug, Clone)]
struct SimConfig {
    course_url: Option<String>,
    params: SimulationParams,
    units: Units,
    max_points: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            course_url: None,
            params: SimulationParams::default(),
            units: Units::Metric,
            max_points: DEFAULT_MAX_POINTS,
        }
    }
}

/// Parse config from query parameters. Unparseable values keep their defaults.
fn parse_config(query: &HashMap<String, String>) -> SimConfig {
    let mut config = SimConfig::default();

    macro_rules! parse_param {
        ($($field:ident).+, $name:expr, $type:ty) => {
            if let Some(val) = query.get($name).and_then(|v| v.parse::<$type>().ok()) {
                config.$($field).+ = val;
            }
        };
    }

    parse_param!(params.avg_power_watts, "avgPowerWatts", f64);
    parse_param!(params.avg_cda, "avgCdA", f64);
    parse_param!(params.avg_crr, "avgCrr", f64);
    parse_param!(params.loss_drivetrain, "lossDrivetrain", f64);
    parse_param!(params.mass_bike_kg, "massBikeKg", f64);
    parse_param!(params.mass_rider_kg, "massRiderKg", f64);
    parse_param!(params.ambient_temp_celsius, "ambientTempCelsius", f64);
    parse_param!(params.relative_humidity, "relativeHumidity", f64);
    parse_param!(params.timestep, "timestep", f64);
    parse_param!(params.velocity_min, "velocityMin", f64);
    parse_param!(units, "units", Units);
    parse_param!(max_points, "maxPoints", usize);

    config.course_url = query.get("course_url").cloned();
    config
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Sim(SimError),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl From<SimError> for ApiError {
    fn from(e: SimError) -> Self {
        Self::Sim(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Sim(e @ (SimError::Course(_) | SimError::EmptyCourse)) => {
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            Self::Sim(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        tracing::warn!(%status, "{detail}");
        (status, Json(ErrorBody { detail })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Full simulation response
#[derive(Serialize)]
struct SimulationResponse {
    states: Vec<SimulationState>,
    errors: Vec<SimWarning>,
    meta: SimulationMeta,
    summary: Summary,
}

#[derive(Serialize)]
struct ChartData {
    rows: Vec<ChartRow>,
    categories: Vec<&'static str>,
    title: String,
    y_label: String,
}

/// Handle simulation request
async fn handle_simulate(
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<SimulationResponse>, ApiError> {
    let config = parse_config(&query);
    let result = run_simulation(&config).await?;
    Ok(Json(build_response(result, &config)))
}

/// Handle specific chart data requests
async fn handle_chart_data(
    Path(chart_type): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<ChartData>, ApiError> {
    let config = parse_config(&query);
    let result = run_simulation(&config).await?;
    let states = downsample(&result.states, config.max_points);
    generate_chart_data(&chart_type, &states, config.units).map(Json)
}

#[derive(Serialize)]
struct PresetsResponse {
    crr: HashMap<&'static str, f64>,
    drivetrain: HashMap<&'static str, f64>,
    cda: HashMap<&'static str, f64>,
}

async fn handle_presets() -> Json<PresetsResponse> {
    Json(PresetsResponse {
        crr: presets::CRR.into_iter().collect(),
        drivetrain: presets::DRIVETRAIN.into_iter().collect(),
        cda: presets::CDA.into_iter().collect(),
    })
}

async fn handle_params() -> Json<HashMap<&'static str, ParamSpec>> {
    Json(ALL_SPECS.into_iter().collect())
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Validate, fetch the course, then integrate on the blocking pool.
async fn run_simulation(config: &SimConfig) -> Result<SimulationResult, ApiError> {
    let url = config
        .course_url
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("missing course_url".to_string()))?;

    let violations = check_bounds(&config.params);
    if !violations.is_empty() {
        let msgs: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
        return Err(ApiError::BadRequest(msgs.join("; ")));
    }

    // Only remote courses; never read the server's filesystem on request.
    let source = match CourseSource::parse(url) {
        src @ CourseSource::Url(_) => src,
        CourseSource::Path(_) => {
            return Err(ApiError::BadRequest(format!("not an http(s) url: {url}")))
        }
    };

    let started = Instant::now();
    let course = source.load().await.map_err(SimError::from)?;
    let params = config.params;
    let limits = SimLimits {
        max_wall_time: Some(REQUEST_TIMEOUT),
        ..Default::default()
    };
    let mut result =
        tokio::task::spawn_blocking(move || simulate_with_limits(&course, &params, &limits))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))??;
    result.meta.compute_sec = started.elapsed().as_secs_f64();

    tracing::info!(
        course = url,
        steps = result.states.len(),
        compute_sec = result.meta.compute_sec,
        "simulated"
    );
    Ok(result)
}

fn build_response(result: SimulationResult, config: &SimConfig) -> SimulationResponse {
    let summary = summarize(&result, config.units);
    SimulationResponse {
        states: downsample(&result.states, config.max_points),
        errors: result.errors,
        meta: result.meta,
        summary,
    }
}

fn generate_chart_data(
    chart_type: &str,
    states: &[SimulationState],
    units: Units,
) -> Result<ChartData, ApiError> {
    let rows = chart_rows(states, units);
    let chart = match chart_type {
        "elevation" => ChartData {
            rows,
            categories: vec!["alt"],
            title: "Elevation".to_string(),
            y_label: format!("Elevation ({})", units.elevation_label()),
        },
        "velocity" => ChartData {
            rows,
            categories: vec!["v"],
            title: "Velocity".to_string(),
            y_label: format!("Speed ({})", units.speed_label()),
        },
        "power" => ChartData {
            rows,
            categories: vec!["P_drag", "P_roll", "P_grav"],
            title: "Power Losses".to_string(),
            y_label: "Power (W)".to_string(),
        },
        other => return Err(ApiError::BadRequest(format!("unknown chart: {other}"))),
    };
    Ok(chart)
}
