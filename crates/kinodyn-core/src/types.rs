//! Shared state types exchanged between the dynamics and kinematics optimizers.

use nalgebra::{DVector, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::PlannerError;

// ---------------------------------------------------------------------------
// Dynamics
// ---------------------------------------------------------------------------

/// Centroidal reference at one timestep, as produced by the dynamics optimizer.
///
/// Momenta use the physical (unnormalized) convention.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DynamicsState {
    /// Center of mass position in world frame (m).
    pub com: Vector3<f64>,
    /// Linear momentum (kg m/s).
    pub lmom: Vector3<f64>,
    /// Angular momentum about the CoM (kg m^2/s).
    pub amom: Vector3<f64>,
}

/// Ordered per-timestep centroidal references.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DynamicsSequence {
    states: Vec<DynamicsState>,
}

impl DynamicsSequence {
    pub const fn new(states: Vec<DynamicsState>) -> Self {
        Self { states }
    }

    pub fn states(&self) -> &[DynamicsState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl FromIterator<DynamicsState> for DynamicsSequence {
    fn from_iter<I: IntoIterator<Item = DynamicsState>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Initial state
// ---------------------------------------------------------------------------

/// Robot state at the start of the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    /// Initial center of mass target.
    pub com: Vector3<f64>,
    /// Initial contact position of every end-effector.
    pub endeffector_positions: Vec<Vector3<f64>>,
}

impl InitialState {
    pub fn num_end_effectors(&self) -> usize {
        self.endeffector_positions.len()
    }
}

// ---------------------------------------------------------------------------
// Kinematics
// ---------------------------------------------------------------------------

/// Kinematic result at one timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinematicState {
    /// Center of mass at `q`.
    pub com: Vector3<f64>,
    /// Linear momentum at `(q, v)`.
    pub lmom: Vector3<f64>,
    /// Angular momentum about the CoM at `(q, v)`.
    pub amom: Vector3<f64>,
    /// Generalized positions: base position, base quaternion (xyzw), joints.
    pub q: DVector<f64>,
    /// Generalized velocities: base linear, base angular, joint rates.
    pub v: DVector<f64>,
    /// World-frame end-effector positions at `q`.
    pub endeffector_positions: Vec<Vector3<f64>>,
}

impl KinematicState {
    /// A zeroed state with the given configuration/velocity dimensions.
    pub fn zeros(nq: usize, nv: usize) -> Self {
        Self {
            com: Vector3::zeros(),
            lmom: Vector3::zeros(),
            amom: Vector3::zeros(),
            q: DVector::zeros(nq),
            v: DVector::zeros(nv),
            endeffector_positions: Vec::new(),
        }
    }
}

/// Per-timestep kinematics result of one optimization pass.
///
/// Reallocated at the start of every pass and tagged with that pass number.
/// Writes must arrive in index order: state `it + 1` is derived from the
/// integrated state `it`, so a hole in the sequence can never be valid.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KinematicsSequence {
    states: Vec<KinematicState>,
    filled: usize,
    pass: u32,
}

impl KinematicsSequence {
    /// Allocate `num_time_steps` zeroed states for pass `pass`.
    pub fn with_capacity(num_time_steps: usize, nq: usize, nv: usize, pass: u32) -> Self {
        Self {
            states: vec![KinematicState::zeros(nq, nv); num_time_steps],
            filled: 0,
            pass,
        }
    }

    /// Store the state for timestep `it`.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Sequence`] unless `it` is the next unfilled index.
    pub fn record(&mut self, it: usize, state: KinematicState) -> Result<(), PlannerError> {
        if it != self.filled || it >= self.states.len() {
            return Err(PlannerError::Sequence {
                expected: self.filled,
                got: it,
            });
        }
        self.states[it] = state;
        self.filled += 1;
        Ok(())
    }

    /// All allocated states, including ones not yet written this pass.
    pub fn states(&self) -> &[KinematicState] {
        &self.states
    }

    /// The states written so far this pass.
    pub fn populated(&self) -> &[KinematicState] {
        &self.states[..self.filled]
    }

    /// State at `it`, if it has been written.
    pub fn get(&self, it: usize) -> Option<&KinematicState> {
        self.populated().get(it)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of states written this pass.
    pub const fn filled(&self) -> usize {
        self.filled
    }

    /// Whether every timestep has been written.
    pub fn is_complete(&self) -> bool {
        !self.states.is_empty() && self.filled == self.states.len()
    }

    /// The kinematics pass this buffer belongs to.
    pub const fn pass(&self) -> u32 {
        self.pass
    }
}

/// Time stamps `[0, dt, 2 dt, ...]` for `num_time_steps` samples.
#[allow(clippy::cast_precision_loss)]
pub fn time_vector(num_time_steps: usize, dt: f64) -> Vec<f64> {
    (0..num_time_steps).map(|it| it as f64 * dt).collect()
}
