//! Air density from altitude, temperature and humidity.

pub const G: f64 = 9.80665; // m/s²
pub const MOLAR_MASS_AIR: f64 = 0.0289644; // kg/mol
pub const GAS_CONSTANT: f64 = 8.3144598; // N·m/(mol·K)
pub const SEA_LEVEL_PRESSURE: f64 = 101_325.0; // Pa
pub const ZERO_CELSIUS_K: f64 = 273.15;
pub const GAS_CONSTANT_DRY_AIR: f64 = 287.05; // J/(kg·K)
/// Ratio of vapour to dry-air molar mass, subtracted from one.
pub const VAPOR_DENSITY_DEFICIT: f64 = 0.378;

pub fn celsius_to_kelvin(c: f64) -> f64 {
    c + ZERO_CELSIUS_K
}

/// Barometric pressure of dry air at `altitude` (m) for temperature `tk` (K).
pub fn pressure_at(altitude: f64, tk: f64) -> f64 {
    SEA_LEVEL_PRESSURE * ((-G * MOLAR_MASS_AIR * altitude) / (GAS_CONSTANT * tk)).exp()
}

/// Saturation vapour pressure (Pa) via the Tetens equation.
/// Below 0°C the fit over ice is used.
pub fn saturation_vapor_pressure(tk: f64) -> f64 {
    let tc = tk - ZERO_CELSIUS_K;
    if tk < ZERO_CELSIUS_K {
        611.0 * (21.875 * tc / (tc + 265.5)).exp()
    } else {
        611.0 * (17.27 * tc / (tc + 237.3)).exp()
    }
}

/// Air density (kg/m³).
///
/// * `altitude` - meters
/// * `tk` - temperature in Kelvin
/// * `rh` - relative humidity as a fraction 0-1
///
/// Not guarded against non-physical inputs (e.g. negative Kelvin).
pub fn air_density(altitude: f64, tk: f64, rh: f64) -> f64 {
    let p = pressure_at(altitude, tk);
    let pv = rh * saturation_vapor_pressure(tk);
    p / (GAS_CONSTANT_DRY_AIR * tk) * (1.0 - VAPOR_DENSITY_DEFICIT * pv / p)
}
