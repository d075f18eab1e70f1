//! Mock collaborators for testing.
//!
//! Both mocks record every call so tests can check what the co-optimizer
//! and the driver passed across their seams.

use kinodyn_core::{
    DynamicsSequence, InitialState, KinematicsSequence, PlannerError, SolverError,
};
use kinodyn_ik::{IkSolver, IkTargets, KinematicsModel};
use kinodyn_opt::DynamicsOptimizer;
use kinodyn_traj::ContactPlanProvider;
use nalgebra::{DVector, Vector3};

// ---------------------------------------------------------------------------
// RecordingIkSolver
// ---------------------------------------------------------------------------

/// Arguments of one IK call.
#[derive(Debug, Clone, PartialEq)]
pub struct IkCall {
    pub q: DVector<f64>,
    pub v: DVector<f64>,
    pub com: Vector3<f64>,
    pub lmom: Vector3<f64>,
    pub amom: Vector3<f64>,
    pub endeff_positions: Vec<Vector3<f64>>,
    pub endeff_velocities: Vec<Vector3<f64>>,
    pub endeff_contacts: Vec<bool>,
}

/// An IK solver that records its inputs and returns a fixed velocity,
/// zero unless set with [`RecordingIkSolver::with_response`].
#[derive(Debug, Default)]
pub struct RecordingIkSolver {
    response: Option<DVector<f64>>,
    calls: Vec<IkCall>,
}

impl RecordingIkSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `v` from every call instead of zeros.
    pub fn with_response(v: DVector<f64>) -> Self {
        Self {
            response: Some(v),
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[IkCall] {
        &self.calls
    }
}

impl IkSolver for RecordingIkSolver {
    fn compute(
        &mut self,
        model: &dyn KinematicsModel,
        q: &DVector<f64>,
        v: &DVector<f64>,
        targets: &IkTargets<'_>,
    ) -> Result<DVector<f64>, SolverError> {
        self.calls.push(IkCall {
            q: q.clone(),
            v: v.clone(),
            com: targets.com,
            lmom: targets.lmom,
            amom: targets.amom,
            endeff_positions: targets.endeff_positions.to_vec(),
            endeff_velocities: targets.endeff_velocities.to_vec(),
            endeff_contacts: targets.endeff_contacts.to_vec(),
        });
        Ok(self
            .response
            .clone()
            .unwrap_or_else(|| DVector::zeros(model.nv())))
    }
}

// ---------------------------------------------------------------------------
// FailingIkSolver
// ---------------------------------------------------------------------------

/// Returns zero velocity until call `fail_at`, then fails with
/// [`SolverError::Singular`] on every call.
#[derive(Debug)]
pub struct FailingIkSolver {
    fail_at: usize,
    calls: usize,
}

impl FailingIkSolver {
    pub const fn new(fail_at: usize) -> Self {
        Self { fail_at, calls: 0 }
    }

    pub const fn calls(&self) -> usize {
        self.calls
    }
}

impl IkSolver for FailingIkSolver {
    fn compute(
        &mut self,
        model: &dyn KinematicsModel,
        _q: &DVector<f64>,
        _v: &DVector<f64>,
        _targets: &IkTargets<'_>,
    ) -> Result<DVector<f64>, SolverError> {
        let call = self.calls;
        self.calls += 1;
        if call >= self.fail_at {
            return Err(SolverError::Singular);
        }
        Ok(DVector::zeros(model.nv()))
    }
}

// ---------------------------------------------------------------------------
// ScriptedDynamicsOptimizer
// ---------------------------------------------------------------------------

/// What a dynamics optimizer received on one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicsCall {
    /// Pass number of the kinematics sequence, if one was given.
    pub kinematics_pass: Option<u32>,
    pub kinematics_len: Option<usize>,
    pub kinematics_complete: bool,
}

/// A dynamics optimizer that returns a fixed sequence.
#[derive(Debug)]
pub struct ScriptedDynamicsOptimizer {
    output: DynamicsSequence,
    fail_on_call: Option<usize>,
    calls: Vec<DynamicsCall>,
}

impl ScriptedDynamicsOptimizer {
    pub const fn new(output: DynamicsSequence) -> Self {
        Self {
            output,
            fail_on_call: None,
            calls: Vec::new(),
        }
    }

    /// Fail with [`PlannerError::Dynamics`] on call index `call`.
    #[must_use]
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn calls(&self) -> &[DynamicsCall] {
        &self.calls
    }
}

impl DynamicsOptimizer for ScriptedDynamicsOptimizer {
    fn optimize(
        &mut self,
        _initial: &InitialState,
        _contacts: &dyn ContactPlanProvider,
        kinematics: Option<&KinematicsSequence>,
    ) -> Result<DynamicsSequence, PlannerError> {
        let index = self.calls.len();
        self.calls.push(DynamicsCall {
            kinematics_pass: kinematics.map(KinematicsSequence::pass),
            kinematics_len: kinematics.map(KinematicsSequence::len),
            kinematics_complete: kinematics.is_some_and(KinematicsSequence::is_complete),
        });
        if self.fail_on_call == Some(index) {
            return Err(PlannerError::Dynamics(format!(
                "scripted failure on call {index}"
            )));
        }
        Ok(self.output.clone())
    }
}
