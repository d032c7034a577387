//! Course definitions and loading.
//!
//! A course is an ordered list of distance/elevation/grade samples plus the
//! declared totals, as served by the course host:
//!
//! ```json
//! {
//!   "data": [{ "x": 0.0, "y": 12.0, "a": 0.0 }, { "x": 25.0, "y": 12.5, "a": 0.02 }],
//!   "meta": { "totalDistanceMeters": 90000.0, "totalGainMeters": 850.0 }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CourseError;

/// One course sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoursePoint {
    pub x: f64, // distance along course (m)
    pub y: f64, // elevation (m)
    pub a: f64, // grade angle (rad)
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseMeta {
    pub total_distance_meters: f64,
    pub total_gain_meters: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub data: Vec<CoursePoint>,
    pub meta: CourseMeta,
}

impl Course {
    pub fn new(data: Vec<CoursePoint>, meta: CourseMeta) -> Self {
        Self { data, meta }
    }

    /// Distance the rider has to cover.
    ///
    /// The exact distance of the course file wins over the declared race
    /// distance; the declared value is only used when there are no points or
    /// the last point sits at zero.
    pub fn total_distance(&self) -> f64 {
        match self.data.last() {
            Some(p) if p.x != 0.0 && !p.x.is_nan() => p.x,
            _ => self.meta.total_distance_meters,
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, CourseError> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Where a course comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseSource {
    Url(String),
    Path(PathBuf),
}

impl CourseSource {
    /// `http://` and `https://` strings are URLs, anything else a file path.
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            Self::Url(s.to_string())
        } else {
            Self::Path(PathBuf::from(s))
        }
    }

    pub async fn load(&self) -> Result<Course, CourseError> {
        match self {
            Self::Url(url) => fetch_course(url).await,
            Self::Path(path) => load_course_file(path),
        }
    }
}

impl std::fmt::Display for CourseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Fetch a course over HTTP. Non-2xx responses are errors; there is no retry.
pub async fn fetch_course(url: &str) -> Result<Course, CourseError> {
    let response = reqwest::get(url).await?.error_for_status()?;
    let body = response.text().await?;
    let course = Course::from_json_str(&body)?;
    tracing::debug!(url, points = course.data.len(), "fetched course");
    Ok(course)
}

pub fn load_course_file(path: impl AsRef<Path>) -> Result<Course, CourseError> {
    let text = std::fs::read_to_string(path.as_ref())?;
    Course::from_json_str(&text)
}
