use thiserror::Error;

/// Top-level error type for the planning pipeline.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid contact schedule: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Trajectory error: {0}")]
    Trajectory(#[from] TrajectoryError),

    #[error("Solver error at step {step}: {source}")]
    Solver {
        step: usize,
        #[source]
        source: SolverError,
    },

    #[error("Dynamics sequence too short: expected {expected} states, got {got}")]
    SequenceLength { expected: usize, got: usize },

    #[error("Kinematics sequence write out of order: expected index {expected}, got {got}")]
    Sequence { expected: usize, got: usize },

    #[error("Dynamics optimization failed: {0}")]
    Dynamics(String),
}

/// Configuration errors. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("num_time_steps must be > 0")]
    ZeroTimeSteps,

    #[error("Invalid dt: {0} (must be > 0)")]
    InvalidDt(f64),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Contact schedule validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("contact plan has no end-effectors")]
    NoEndEffectors,

    #[error("end-effector {end_effector} has no contact events")]
    NoContacts { end_effector: usize },

    #[error("end-effector {end_effector}, contact {index}: end time {end} precedes start time {start}")]
    InvertedInterval {
        end_effector: usize,
        index: usize,
        start: f64,
        end: f64,
    },

    #[error("end-effector {end_effector}, contact {index}: starts at {start} before previous contact ends at {previous_end}")]
    Overlap {
        end_effector: usize,
        index: usize,
        start: f64,
        previous_end: f64,
    },
}

/// Piecewise trajectory construction and sampling errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrajectoryError {
    #[error("sample time {time} outside trajectory [{start}, {end}] (end-effector {end_effector}, axis {axis})")]
    OutOfBounds {
        end_effector: usize,
        axis: usize,
        time: f64,
        start: f64,
        end: f64,
    },

    #[error("segment starting at {start} does not continue previous segment ending at {previous_end}")]
    NonContiguous { start: f64, previous_end: f64 },

    #[error("trajectory has no segments")]
    Empty,
}

/// Failures reported by an inverse-kinematics solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("task matrix is singular")]
    Singular,

    #[error("QP solver did not converge: {status}")]
    NotConverged { status: &'static str },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("QP setup rejected: {0}")]
    Setup(&'static str),
}

impl SolverError {
    /// Attach the timestep at which the solve failed.
    pub const fn at_step(self, step: usize) -> PlannerError {
        PlannerError::Solver { step, source: self }
    }
}
