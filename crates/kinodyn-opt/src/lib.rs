//! Kinematics-dynamics co-optimization for legged motion planning.
//!
//! [`KinematicsOptimizer`] turns a dynamics sequence (CoM and centroidal
//! momentum per timestep) and a contact plan into a whole-body kinematics
//! sequence by per-timestep IK and manifold integration. [`MotionPlanner`]
//! alternates it with an external [`DynamicsOptimizer`] for a fixed number
//! of rounds.
//!
//! ```text
//! DynamicsOnly ──► Alternating(0) ──► ... ──► Alternating(K-1) ──► Done
//!   dynamics        kinematics, dynamics        kinematics, dynamics
//! ```

pub mod driver;
pub mod kinematics;

pub use driver::{DynamicsOptimizer, MotionPlan, MotionPlanner, PlannerPhase};
pub use kinematics::{InitialPostureReport, KinematicsOptimizer};
