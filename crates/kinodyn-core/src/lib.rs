// kinodyn-core: configuration, errors and shared state types for the
// kinematics-dynamics co-optimization pipeline.

pub mod config;
pub mod error;
pub mod types;

pub use config::{IkConfig, PlannerConfig};
pub use error::{ConfigError, PlannerError, ScheduleError, SolverError, TrajectoryError};
pub use types::{
    DynamicsSequence, DynamicsState, InitialState, KinematicState, KinematicsSequence,
    time_vector,
};
