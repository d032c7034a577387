use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::atmosphere::{air_density, celsius_to_kelvin, G};
use crate::course::{Course, CourseSource};
use crate::error::SimError;
use crate::interp::{interpolate, locate, Field};
use crate::params::SimulationParams;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------
/// Steps before the power override may kick in; avoids triggering at v = 0.
const WARMUP_ITERS: u64 = 50;
const DEFAULT_MAX_ITERS: u64 = 10_000_000;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------
/// Guards against runs that never reach the finish.
#[derive(Debug, Clone)]
pub struct SimLimits {
    pub max_iterations: u64,
    pub max_wall_time: Option<Duration>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for SimLimits {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERS,
            max_wall_time: None,
            cancel: None,
        }
    }
}

impl SimLimits {
    fn check(&self, iter: u64, started: Instant) -> Result<(), SimError> {
        if iter > self.max_iterations {
            return Err(SimError::NonConvergent {
                iterations: iter - 1,
            });
        }
        if let Some(limit) = self.max_wall_time {
            let elapsed = started.elapsed();
            if elapsed > limit {
                return Err(SimError::TimedOut {
                    elapsed_sec: elapsed.as_secs_f64(),
                });
            }
        }
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(SimError::Cancelled);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------
/// Rider state after one timestep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub t: f64,   // s
    pub x: f64,   // m
    pub v: f64,   // m/s
    pub alt: f64, // m
    pub rho: f64, // kg/m³
    #[serde(rename = "F_drag")]
    pub f_drag: f64, // N
    #[serde(rename = "F_grav")]
    pub f_grav: f64, // N
    #[serde(rename = "F_roll")]
    pub f_roll: f64, // N
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimWarning {
    /// The rider had to exceed target power to hold the minimum velocity.
    #[serde(rename = "override_power")]
    OverridePower,
}

impl SimWarning {
    pub fn tag(self) -> &'static str {
        match self {
            Self::OverridePower => "override_power",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationMeta {
    pub total_distance_meters: f64,
    pub total_gain_meters: f64,
    pub compute_sec: f64,
    pub compute_iters: u64,
    #[serde(flatten)]
    pub params: SimulationParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub states: Vec<SimulationState>,
    pub errors: Vec<SimWarning>,
    pub meta: SimulationMeta,
}

impl SimulationResult {
    pub fn override_count(&self) -> usize {
        self.errors
            .iter()
            .filter(|w| **w == SimWarning::OverridePower)
            .count()
    }

    pub fn finish_time(&self) -> f64 {
        self.states.last().map(|s| s.t).unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Forces
// ---------------------------------------------------------------------------
/// Resistive forces at one instant, in newtons.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Forces {
    pub drag: f64,
    pub grav: f64,
    pub roll: f64,
}

impl Forces {
    /// Zero headwind is assumed.
    pub fn compute(rho: f64, cda: f64, crr: f64, mass: f64, v: f64, theta: f64) -> Self {
        Self {
            drag: 0.5 * rho * cda * v.powi(2),
            grav: G * mass * theta.sin(),
            roll: G * mass * crr * theta.cos(),
        }
    }

    pub fn total(&self) -> f64 {
        self.drag + self.grav + self.roll
    }
}

/// Tractive force at the wheel after drivetrain losses. Speeds below 1 m/s
/// are treated as 1 m/s so the force stays finite from a standing start.
pub fn drivetrain_force(power: f64, loss_pct: f64, v: f64) -> f64 {
    power * (1.0 - 0.01 * loss_pct) / v.max(1.0)
}

// ---------------------------------------------------------------------------
// Main Loop
// ---------------------------------------------------------------------------
/// Run the simulation with default limits.
pub fn simulate(course: &Course, p: &SimulationParams) -> Result<SimulationResult, SimError> {
    simulate_with_limits(course, p, &SimLimits::default())
}

/// Explicit Euler integration of the rider along the course until the
/// finish distance is reached.
pub fn simulate_with_limits(
    course: &Course,
    p: &SimulationParams,
    limits: &SimLimits,
) -> Result<SimulationResult, SimError> {
    let started = Instant::now();
    let points = &course.data;
    if points.is_empty() {
        return Err(SimError::EmptyCourse);
    }

    let total_dist = course.total_distance();
    let mass = p.total_mass();
    let tk = celsius_to_kelvin(p.ambient_temp_celsius);
    let rh = p.relative_humidity / 100.0;

    let mut states = Vec::new();
    let mut errors = Vec::new();

    let mut hint = 0;
    let mut t = 0.0;
    let mut x = 0.0;
    let mut v = 0.0;
    let mut iter: u64 = 1;

    while x < total_dist {
        limits.check(iter, started).inspect_err(|e| {
            tracing::warn!(iter, x, "simulation aborted: {e}");
        })?;

        let mut f_dt = drivetrain_force(p.avg_power_watts, p.loss_drivetrain, v);

        // 1. Environment
        let b = locate(points, hint, x);
        let alt = interpolate(points, b, x, Field::Elevation);
        let theta = interpolate(points, b, x, Field::Grade);
        let rho = air_density(alt, tk, rh);

        // 2. Resistive forces
        let f = Forces::compute(rho, p.avg_cda, p.avg_crr, mass, v, theta);

        // 3. Power-limited climb: push harder rather than drop below velocity_min
        let f_hold = f.total() + mass * (p.velocity_min - v) / p.timestep;
        if iter > WARMUP_ITERS && f_dt < f_hold {
            tracing::debug!(iter, x, f_dt, f_hold, "power override");
            f_dt = f_hold;
            errors.push(SimWarning::OverridePower);
        }

        // 4. Dynamics
        let accel = (f_dt - f.total()) / mass;

        // Position uses the pre-update velocity
        x += p.timestep * v;
        v += p.timestep * accel;
        t += p.timestep;
        hint = b.lo;

        states.push(SimulationState {
            t,
            x,
            v,
            alt,
            rho,
            f_drag: f.drag,
            f_grav: f.grav,
            f_roll: f.roll,
        });

        iter += 1;
    }

    let compute_sec = started.elapsed().as_secs_f64();
    tracing::info!(
        iters = iter,
        overrides = errors.len(),
        finish_sec = t,
        compute_sec,
        "simulation complete"
    );

    Ok(SimulationResult {
        states,
        errors,
        meta: SimulationMeta {
            total_distance_meters: course.meta.total_distance_meters,
            total_gain_meters: course.meta.total_gain_meters,
            compute_sec,
            compute_iters: iter,
            params: *p,
        },
    })
}

/// Load the course once, then simulate. `compute_sec` covers both.
pub async fn simulate_source(
    source: &CourseSource,
    p: &SimulationParams,
    limits: &SimLimits,
) -> Result<SimulationResult, SimError> {
    let started = Instant::now();
    let course = source.load().await?;
    let mut result = simulate_with_limits(&course, p, limits)?;
    result.meta.compute_sec = started.elapsed().as_secs_f64();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::{CourseMeta, CoursePoint};

    fn flat_km() -> Course {
        Course::new(
            vec![
                CoursePoint { x: 0.0, y: 0.0, a: 0.0 },
                CoursePoint { x: 1000.0, y: 0.0, a: 0.0 },
            ],
            CourseMeta {
                total_distance_meters: 1000.0,
                total_gain_meters: 0.0,
            },
        )
    }

    fn scenario_params() -> SimulationParams {
        SimulationParams {
            avg_power_watts: 250.0,
            avg_cda: 0.28,
            avg_crr: 0.004,
            loss_drivetrain: 3.0,
            mass_bike_kg: 10.0,
            mass_rider_kg: 75.0,
            ambient_temp_celsius: 20.0,
            relative_humidity: 50.0,
            timestep: 0.1,
            velocity_min: 1.0,
        }
    }

    /// Flat for 200 m, then a 15% wall to 1 km.
    fn wall_course() -> Course {
        let theta = 0.15f64.atan();
        Course::new(
            vec![
                CoursePoint { x: 0.0, y: 0.0, a: 0.0 },
                CoursePoint { x: 200.0, y: 0.0, a: 0.0 },
                CoursePoint { x: 200.5, y: 0.0, a: theta },
                CoursePoint { x: 1000.0, y: 120.0, a: theta },
            ],
            CourseMeta {
                total_distance_meters: 1000.0,
                total_gain_meters: 120.0,
            },
        )
    }

    #[test]
    fn test_flat_scenario() {
        let r = simulate(&flat_km(), &scenario_params()).unwrap();

        assert!(!r.states.is_empty());
        let last = r.states.last().unwrap();
        assert!(last.x >= 1000.0, "finished at {}", last.x);
        assert!(r.errors.is_empty(), "unexpected warnings: {:?}", r.errors);

        // velocity rises monotonically towards terminal speed
        for w in r.states.windows(2) {
            assert!(w[1].v >= w[0].v, "v dropped at t = {}", w[1].t);
        }
        let tail: Vec<f64> = r.states.iter().rev().take(10).map(|s| s.v).collect();
        let spread = tail[0] - tail[tail.len() - 1];
        assert!(spread < 0.05, "not settling, spread = {spread}");
        assert!(last.v > 8.0 && last.v < 14.0, "v = {}", last.v);

        assert_eq!(r.meta.compute_iters, r.states.len() as u64 + 1);
        assert_eq!(r.meta.total_distance_meters, 1000.0);
        assert_eq!(r.meta.params, scenario_params());
    }

    #[test]
    fn test_time_and_distance_monotonic() {
        let p = scenario_params();
        let r = simulate(&wall_course(), &p).unwrap();
        assert!((r.states[0].t - p.timestep).abs() < 1e-12);
        for w in r.states.windows(2) {
            assert!((w[1].t - w[0].t - p.timestep).abs() < 1e-9);
            assert!(w[1].x >= w[0].x);
        }
    }

    #[test]
    fn test_first_step_uses_pre_update_velocity() {
        let r = simulate(&flat_km(), &scenario_params()).unwrap();
        // v starts at zero, so the first step cannot move the rider
        assert_eq!(r.states[0].x, 0.0);
        assert!(r.states[0].v > 0.0);
        assert_eq!(r.states[1].x, 0.1 * r.states[0].v);
    }

    #[test]
    fn test_flat_gravity_and_rolling_are_constant() {
        let p = scenario_params();
        let r = simulate(&flat_km(), &p).unwrap();
        let roll = G * p.total_mass() * p.avg_crr;
        for s in &r.states {
            assert_eq!(s.f_grav, 0.0);
            assert!((s.f_roll - roll).abs() < 1e-12);
        }
    }

    #[test]
    fn test_override_on_steep_wall() {
        let p = SimulationParams {
            avg_power_watts: 100.0,
            velocity_min: 2.0,
            ..scenario_params()
        };
        let r = simulate(&wall_course(), &p).unwrap();

        assert!(r.override_count() > 0);
        assert!(r.errors.iter().all(|w| w.tag() == "override_power"));

        let first = r
            .states
            .iter()
            .enumerate()
            .skip(WARMUP_ITERS as usize)
            .position(|(_, s)| (s.v - p.velocity_min).abs() < 1e-9)
            .map(|i| i + WARMUP_ITERS as usize)
            .expect("override never held velocity at the minimum");
        for s in &r.states[first..] {
            assert!(s.v >= p.velocity_min - 1e-9, "v = {} at t = {}", s.v, s.t);
        }
        assert!(r.states.last().unwrap().x >= 1000.0);
    }

    #[test]
    fn test_no_override_during_warmup() {
        // steep from the start: nothing can be flagged before iteration 51
        let theta = 0.2f64.atan();
        let course = Course::new(
            vec![
                CoursePoint { x: 0.0, y: 0.0, a: theta },
                CoursePoint { x: 100.0, y: 20.0, a: theta },
            ],
            CourseMeta::default(),
        );
        let p = SimulationParams {
            avg_power_watts: 50.0,
            ..scenario_params()
        };
        let r = simulate(&course, &p).unwrap();
        let warmup = WARMUP_ITERS as usize;

        // the rider rolls back below velocity_min while the override is off
        assert!(r.states[..warmup].iter().any(|s| s.v < p.velocity_min));
        assert!(r.states[warmup - 1].v < p.velocity_min);

        // iteration 51 is the first to hold the floor
        assert!((r.states[warmup].v - p.velocity_min).abs() < 1e-9);
        for s in &r.states[warmup..] {
            assert!(s.v >= p.velocity_min - 1e-9, "v = {} at t = {}", s.v, s.t);
        }

        // 50 W never beats gravity here, so every later step is flagged
        assert_eq!(r.override_count(), r.states.len() - warmup);
    }

    #[test]
    fn test_empty_course() {
        let course = Course::new(vec![], CourseMeta::default());
        let err = simulate(&course, &scenario_params()).unwrap_err();
        assert!(matches!(err, SimError::EmptyCourse));
    }

    #[test]
    fn test_zero_distance_course_has_no_states() {
        let course = Course::new(
            vec![CoursePoint { x: 0.0, y: 0.0, a: 0.0 }],
            CourseMeta::default(),
        );
        let r = simulate(&course, &scenario_params()).unwrap();
        assert!(r.states.is_empty());
        assert_eq!(r.meta.compute_iters, 1);
    }

    #[test]
    fn test_iteration_cap() {
        // zero power and no floor on velocity: the rider never moves
        let p = SimulationParams {
            avg_power_watts: 0.0,
            velocity_min: 0.0,
            ..scenario_params()
        };
        let limits = SimLimits {
            max_iterations: 500,
            ..Default::default()
        };
        let err = simulate_with_limits(&flat_km(), &p, &limits).unwrap_err();
        assert!(
            matches!(err, SimError::NonConvergent { iterations: 500 }),
            "got {err:?}"
        );
    }

    #[test]
    fn test_cancellation() {
        let flag = Arc::new(AtomicBool::new(true));
        let limits = SimLimits {
            cancel: Some(flag),
            ..Default::default()
        };
        let err = simulate_with_limits(&flat_km(), &scenario_params(), &limits).unwrap_err();
        assert!(matches!(err, SimError::Cancelled));
    }

    #[test]
    fn test_wall_time_limit() {
        let limits = SimLimits {
            max_wall_time: Some(Duration::ZERO),
            ..Default::default()
        };
        let err = simulate_with_limits(&flat_km(), &scenario_params(), &limits).unwrap_err();
        assert!(matches!(err, SimError::TimedOut { .. }));
    }

    #[test]
    fn test_result_wire_format() {
        let r = simulate(&flat_km(), &scenario_params()).unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert!(json["states"][0]["F_drag"].is_number());
        assert!(json["meta"]["computeIters"].is_u64());
        assert_eq!(json["meta"]["avgPowerWatts"], 250.0);
        assert_eq!(
            serde_json::to_string(&SimWarning::OverridePower).unwrap(),
            "\"override_power\""
        );
    }

    #[tokio::test]
    async fn test_simulate_source_from_file() {
        let path = std::env::temp_dir()
            .join(format!("bikesplit_flat_km_{}.json", std::process::id()));
        std::fs::write(&path, serde_json::to_string(&flat_km()).unwrap()).unwrap();

        let source = CourseSource::Path(path.clone());
        let r = simulate_source(&source, &scenario_params(), &SimLimits::default())
            .await
            .unwrap();
        assert!(r.states.last().unwrap().x >= 1000.0);
        let _ = std::fs::remove_file(path);
    }
}
