//! Post-processing of a finished run for display: unit conversion,
//! downsampling for charts and summary statistics.

use serde::{Deserialize, Serialize};

use crate::sim::{SimulationResult, SimulationState};

pub const MPS_TO_MPH: f64 = 2.23694;
pub const MPS_TO_KMH: f64 = 3.6;
pub const M_TO_FT: f64 = 3.28084;
pub const M_TO_MI: f64 = 0.621371 / 1000.0;

/// Most charting libraries choke well before 10k points.
pub const DEFAULT_MAX_POINTS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn speed(self, mps: f64) -> f64 {
        match self {
            Self::Metric => mps * MPS_TO_KMH,
            Self::Imperial => mps * MPS_TO_MPH,
        }
    }

    /// Course distance in km or miles.
    pub fn distance(self, m: f64) -> f64 {
        match self {
            Self::Metric => m / 1000.0,
            Self::Imperial => m * M_TO_MI,
        }
    }

    /// Elevation in m or ft.
    pub fn elevation(self, m: f64) -> f64 {
        match self {
            Self::Metric => m,
            Self::Imperial => m * M_TO_FT,
        }
    }

    pub fn speed_label(self) -> &'static str {
        match self {
            Self::Metric => "km/h",
            Self::Imperial => "mph",
        }
    }

    pub fn distance_label(self) -> &'static str {
        match self {
            Self::Metric => "km",
            Self::Imperial => "mi",
        }
    }

    pub fn elevation_label(self) -> &'static str {
        match self {
            Self::Metric => "m",
            Self::Imperial => "ft",
        }
    }
}

impl std::str::FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            other => Err(format!("unknown units: {other}")),
        }
    }
}

/// Keep every Nth state so at most about `max_points` remain.
pub fn downsample(states: &[SimulationState], max_points: usize) -> Vec<SimulationState> {
    let nth = states.len().div_ceil(max_points.max(1)).max(1);
    states.iter().step_by(nth).copied().collect()
}

/// `HH:MM:SS`, each component floored.
pub fn format_hms(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub units: Units,
    pub finish_sec: f64,
    pub predicted_finish: String,
    pub avg_speed: f64,
    pub total_gain: f64,
    pub avg_drag_watts: f64,
    pub avg_roll_watts: f64,
    pub avg_grav_watts: f64,
    pub override_count: usize,
}

pub fn summarize(result: &SimulationResult, units: Units) -> Summary {
    let states = &result.states;
    let finish_sec = result.finish_time();
    Summary {
        units,
        finish_sec,
        predicted_finish: format_hms(finish_sec),
        avg_speed: units.speed(mean(states.iter().map(|s| s.v))),
        total_gain: units.elevation(result.meta.total_gain_meters),
        avg_drag_watts: mean(states.iter().map(|s| s.v * s.f_drag)),
        avg_roll_watts: mean(states.iter().map(|s| s.v * s.f_roll)),
        avg_grav_watts: mean(states.iter().map(|s| s.v * s.f_grav)),
        override_count: result.override_count(),
    }
}

/// One converted row for charting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow {
    pub t: String,
    pub x: f64,
    pub v: f64,
    pub alt: f64,
    #[serde(rename = "P_drag")]
    pub p_drag: f64,
    #[serde(rename = "P_roll")]
    pub p_roll: f64,
    #[serde(rename = "P_grav")]
    pub p_grav: f64,
}

pub fn chart_rows(states: &[SimulationState], units: Units) -> Vec<ChartRow> {
    states
        .iter()
        .map(|s| ChartRow {
            t: format_hms(s.t),
            x: units.distance(s.x),
            v: units.speed(s.v),
            alt: units.elevation(s.alt),
            p_drag: s.v * s.f_drag,
            p_roll: s.v * s.f_roll,
            p_grav: s.v * s.f_grav,
        })
        .collect()
}
