//! Bikesplit Simulation Library
//!
//! Predicts bike split time on a course by integrating the forces acting on
//! a rider: drivetrain-derated leg power against aerodynamic drag, gravity and
//! rolling resistance.

pub mod atmosphere;
pub mod course;
pub mod error;
pub mod interp;
pub mod params;
pub mod report;
pub mod sim;

// Re-export main types
pub use course::{fetch_course, load_course_file, Course, CourseMeta, CoursePoint, CourseSource};
pub use error::{CourseError, SimError};
pub use params::{check_bounds, ParamSpec, SimulationParams};
pub use report::{downsample, summarize, Summary, Units};
pub use sim::{
    simulate, simulate_source, simulate_with_limits, SimLimits, SimWarning, SimulationMeta,
    SimulationResult, SimulationState,
};
