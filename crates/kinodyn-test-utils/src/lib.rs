//! Shared test fixtures and utilities for kinodyn crates.
//!
//! Provides a stock quadruped with matching initial state and contact plans,
//! mock IK solvers and dynamics optimizers that record what they were asked,
//! and deterministic RNG setup.

pub mod fixtures;
pub mod mocks;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use fixtures::{
    constant_dynamics, quadruped, quadruped_config, stance_plan, standing_configuration,
    standing_initial_state, two_contact_plan,
};
pub use mocks::{
    DynamicsCall, FailingIkSolver, IkCall, RecordingIkSolver, ScriptedDynamicsOptimizer,
};
pub use rng::{random_contact_plan, seeded_rng};
