use thiserror::Error;

#[derive(Error, Debug)]
pub enum CourseError {
    #[error("failed to fetch course: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to read course file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed course data: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error("course has no points")]
    EmptyCourse,
    #[error("simulation did not converge after {iterations} iterations")]
    NonConvergent { iterations: u64 },
    #[error("simulation exceeded its time budget after {elapsed_sec:.2} s")]
    TimedOut { elapsed_sec: f64 },
    #[error("simulation cancelled")]
    Cancelled,
}
