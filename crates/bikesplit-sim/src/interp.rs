//! Course lookup: bracket a distance between two samples and interpolate.
//!
//! Lookups are a forward-only sweep. The caller threads the returned bracket's
//! lower index back in as the next hint, which is valid as long as the query
//! distance never decreases within a run.

use crate::course::CoursePoint;

/// Indices of the samples immediately before and after a distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bracket {
    pub lo: usize,
    pub hi: usize,
}

/// Interpolatable sample fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Elevation,
    Grade,
}

impl Field {
    fn of(self, p: &CoursePoint) -> f64 {
        match self {
            Self::Elevation => p.y,
            Self::Grade => p.a,
        }
    }
}

/// Find the bracket around `x`, scanning forward from `hint`.
///
/// Near the start the bracket clamps to `[0, 1]`, past the end to the last two
/// samples. A single-sample course collapses to `[0, 0]`. `points` must not be
/// empty.
pub fn locate(points: &[CoursePoint], hint: usize, x: f64) -> Bracket {
    let n = points.len();
    let mut i = hint;
    while i < n && points[i].x < x {
        i += 1;
    }

    let last = n.saturating_sub(1);
    if i <= 1 {
        Bracket { lo: 0, hi: 1.min(last) }
    } else if i >= n {
        Bracket { lo: last - 1, hi: last }
    } else {
        Bracket { lo: i - 1, hi: i }
    }
}

/// Linear interpolation of `field` at `x` inside `b`. The fraction is clamped
/// to 0-1, so overshoot past the bracket holds the end value.
pub fn interpolate(points: &[CoursePoint], b: Bracket, x: f64, field: Field) -> f64 {
    let p0 = &points[b.lo];
    let p1 = &points[b.hi];
    let alpha = (x - p0.x) / (p1.x - p0.x);
    // 0/0 on duplicate distances
    let alpha = if alpha.is_nan() { 0.0 } else { alpha.clamp(0.0, 1.0) };
    field.of(p0) * (1.0 - alpha) + field.of(p1) * alpha
}
