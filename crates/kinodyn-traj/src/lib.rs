//! End-effector reference synthesis from a discrete contact schedule.
//!
//! ```text
//! ContactPlanProvider ──► ContactSchedule ──► EndEffectorTrajectory ──► ReferenceSample
//!      (raw records)        (validated)        (3 × PiecewisePolynomial)   (per timestep)
//! ```
//!
//! Each end-effector axis is a piecewise polynomial: a constant segment per
//! contact and a zero-velocity/zero-acceleration transition per swing phase.
//! The vertical transition passes through a clearance via-point at its
//! midpoint so the foot lifts instead of dragging.

pub mod contact;
pub mod endeffector;
pub mod piecewise;
pub mod polynomial;

pub use contact::{ContactEvent, ContactPlan, ContactPlanProvider, ContactRecord, ContactSchedule};
pub use endeffector::{
    EndEffectorReferences, EndEffectorTrajectory, EndEffectorTrajectoryGenerator, ReferenceSample,
};
pub use piecewise::PiecewisePolynomial;
pub use polynomial::PolynomialSegment;
