//! Parameter definitions, input bounds and equipment presets.
//!
//! The engine trusts whatever it is given; the bounds here are for front ends
//! that accept user input.

use serde::{Deserialize, Serialize};

/// Rider, equipment and environment configuration for one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationParams {
    pub avg_power_watts: f64,
    #[serde(rename = "avgCdA")]
    pub avg_cda: f64, // m²
    pub avg_crr: f64,
    pub loss_drivetrain: f64, // percent 0-100
    pub mass_bike_kg: f64,
    pub mass_rider_kg: f64,
    pub ambient_temp_celsius: f64,
    pub relative_humidity: f64, // percent 0-100

    // Integration controls
    pub timestep: f64,     // s
    pub velocity_min: f64, // m/s
}

impl SimulationParams {
    pub fn total_mass(&self) -> f64 {
        self.mass_bike_kg + self.mass_rider_kg
    }
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            avg_power_watts: 250.0,
            avg_cda: presets::cda::AERO,
            avg_crr: presets::crr::AVERAGE,
            loss_drivetrain: presets::drivetrain::AVERAGE,
            mass_bike_kg: 10.0,
            mass_rider_kg: 75.0,
            ambient_temp_celsius: 20.0,
            relative_humidity: 0.0,
            timestep: 0.1,
            velocity_min: 1.0,
        }
    }
}

/// Parameter specification with bounds and step size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSpec {
    /// Human-readable label.
    pub label: &'static str,
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
    /// Step size for inputs.
    pub step: f64,
}

impl ParamSpec {
    pub const fn new(label: &'static str, min: f64, max: f64, step: f64) -> Self {
        Self {
            label,
            min,
            max,
            step,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Rider and equipment parameters.
pub mod rider {
    use super::ParamSpec;

    pub const POWER: ParamSpec = ParamSpec::new("Average Power (W)", 50.0, 1000.0, 1.0);
    pub const CDA: ParamSpec = ParamSpec::new("CdA (m²)", 0.1, 1.0, 0.001);
    pub const CRR: ParamSpec = ParamSpec::new("Crr", 0.001, 0.01, 0.0001);
    pub const DRIVETRAIN_LOSS: ParamSpec = ParamSpec::new("Drivetrain Loss (%)", 0.1, 15.0, 0.05);
    pub const RIDER_MASS: ParamSpec = ParamSpec::new("Rider Mass (kg)", 10.0, 200.0, 0.5);
    pub const BIKE_MASS: ParamSpec = ParamSpec::new("Bike Mass (kg)", 1.0, 30.0, 0.1);
}

/// Environmental parameters.
pub mod environment {
    use super::ParamSpec;

    pub const TEMPERATURE: ParamSpec = ParamSpec::new("Temperature (°C)", -18.0, 45.0, 1.0);
    pub const HUMIDITY: ParamSpec = ParamSpec::new("Relative Humidity (%)", 0.0, 100.0, 1.0);
}

/// Every bounded parameter with its wire name.
pub const ALL_SPECS: [(&str, ParamSpec); 8] = [
    ("avgPowerWatts", rider::POWER),
    ("avgCdA", rider::CDA),
    ("avgCrr", rider::CRR),
    ("lossDrivetrain", rider::DRIVETRAIN_LOSS),
    ("massRiderKg", rider::RIDER_MASS),
    ("massBikeKg", rider::BIKE_MASS),
    ("ambientTempCelsius", environment::TEMPERATURE),
    ("relativeHumidity", environment::HUMIDITY),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundViolation {
    pub name: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl std::fmt::Display for BoundViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} = {} is outside [{}, {}]",
            self.name, self.value, self.min, self.max
        )
    }
}

/// List every user-facing parameter that falls outside its input bounds.
pub fn check_bounds(p: &SimulationParams) -> Vec<BoundViolation> {
    let values = [
        p.avg_power_watts,
        p.avg_cda,
        p.avg_crr,
        p.loss_drivetrain,
        p.mass_rider_kg,
        p.mass_bike_kg,
        p.ambient_temp_celsius,
        p.relative_humidity,
    ];
    ALL_SPECS
        .iter()
        .zip(values)
        .filter(|((_, spec), v)| !spec.contains(*v))
        .map(|((name, spec), value)| BoundViolation {
            name: *name,
            value,
            min: spec.min,
            max: spec.max,
        })
        .collect()
}

/// Equipment presets.
pub mod presets {
    /// Rolling resistance, derived from power loss at 18 mph for a 42.5 kg
    /// wheel load.
    pub mod crr {
        pub const BAD: f64 = 0.00495; // poor road, puncture-resistant tires
        pub const AVERAGE: f64 = 0.00375; // new pavement
        pub const GOOD: f64 = 0.0035; // new pavement, race tire
        pub const EXCELLENT: f64 = 0.0033; // race tire and latex tube
    }

    /// Drivetrain loss in percent.
    pub mod drivetrain {
        pub const BAD: f64 = 6.5; // 48/12, dirty
        pub const AVERAGE: f64 = 4.7; // 53/13, dry lube
        pub const GOOD: f64 = 3.7; // 53/13, hot melt wax
        pub const EXCELLENT: f64 = 1.9; // track 56/16, hot melt wax
    }

    pub mod cda {
        pub const UPRIGHT: f64 = 0.32;
        pub const DROPS: f64 = 0.30;
        pub const AERO: f64 = 0.28;
        pub const OPTIMIZED: f64 = 0.23;
        pub const PRO: f64 = 0.20;
    }

    pub const CRR: [(&str, f64); 4] = [
        ("bad", crr::BAD),
        ("average", crr::AVERAGE),
        ("good", crr::GOOD),
        ("excellent", crr::EXCELLENT),
    ];

    pub const DRIVETRAIN: [(&str, f64); 4] = [
        ("bad", drivetrain::BAD),
        ("average", drivetrain::AVERAGE),
        ("good", drivetrain::GOOD),
        ("excellent", drivetrain::EXCELLENT),
    ];

    pub const CDA: [(&str, f64); 5] = [
        ("upright", cda::UPRIGHT),
        ("drops", cda::DROPS),
        ("aero", cda::AERO),
        ("optimized", cda::OPTIMIZED),
        ("pro", cda::PRO),
    ];

    /// Case-insensitive preset lookup.
    pub fn lookup(table: &[(&str, f64)], name: &str) -> Option<f64> {
        table
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_within_bounds() {
        assert!(check_bounds(&SimulationParams::default()).is_empty());
    }

    #[test]
    fn test_bounds_report_violations() {
        let p = SimulationParams {
            avg_power_watts: 20.0,
            relative_humidity: 120.0,
            ..Default::default()
        };
        let v = check_bounds(&p);
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].name, "avgPowerWatts");
        assert_eq!(v[1].name, "relativeHumidity");
        assert_eq!(v[1].to_string(), "relativeHumidity = 120 is outside [0, 100]");
    }

    #[test]
    fn test_preset_lookup() {
        assert_eq!(presets::lookup(&presets::CDA, "Aero"), Some(0.28));
        assert_eq!(presets::lookup(&presets::DRIVETRAIN, "excellent"), Some(1.9));
        assert_eq!(presets::lookup(&presets::CRR, "unknown"), None);
    }

    #[test]
    fn test_params_wire_names() {
        let json = serde_json::to_value(SimulationParams::default()).unwrap();
        assert_eq!(json["avgPowerWatts"], 250.0);
        assert_eq!(json["avgCdA"], 0.28);
        assert_eq!(json["lossDrivetrain"], 4.7);
        assert_eq!(json["velocityMin"], 1.0);

        let partial: SimulationParams =
            serde_json::from_str(r#"{"avgPowerWatts": 300, "massRiderKg": 68}"#).unwrap();
        assert_eq!(partial.avg_power_watts, 300.0);
        assert_eq!(partial.mass_rider_kg, 68.0);
        assert_eq!(partial.timestep, 0.1);
    }

    #[test]
    fn test_param_spec() {
        let spec = ParamSpec::new("Test", 0.0, 100.0, 1.0);
        assert_eq!(spec.label, "Test");
        assert!(spec.contains(0.0));
        assert!(spec.contains(100.0));
        assert!(!spec.contains(100.5));
    }
}
