//! Outer kinematics-dynamics iteration.

use kinodyn_core::{
    time_vector, DynamicsSequence, InitialState, KinematicsSequence, PlannerConfig, PlannerError,
};
use kinodyn_ik::{IkSolver, KinematicsModel};
use kinodyn_traj::{ContactPlanProvider, EndEffectorReferences};
use tracing::info;

use crate::kinematics::KinematicsOptimizer;

/// External centroidal dynamics optimizer.
pub trait DynamicsOptimizer {
    /// Optimize the centroidal trajectory for the contact plan.
    ///
    /// `kinematics` is `None` on the first call of a plan and the latest
    /// kinematics sequence afterwards.
    ///
    /// # Errors
    ///
    /// Implementations report their own failures, typically as
    /// [`PlannerError::Dynamics`].
    fn optimize(
        &mut self,
        initial: &InitialState,
        contacts: &dyn ContactPlanProvider,
        kinematics: Option<&KinematicsSequence>,
    ) -> Result<DynamicsSequence, PlannerError>;
}

/// Where the outer iteration currently stands.
///
/// After a failure the phase stays at the step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerPhase {
    Init,
    DynamicsOnly,
    /// Round `k` of `0..K`.
    Alternating(u32),
    Done,
}

/// Final result of a planning run.
///
/// `kinematics` and `end_effector_motion` are `None` when no round was
/// configured and only the dynamics-only pass ran.
#[derive(Debug, Clone)]
pub struct MotionPlan {
    pub kinematics: Option<KinematicsSequence>,
    /// Sampled end-effector references of the last kinematics pass.
    pub end_effector_motion: Option<EndEffectorReferences>,
    pub dynamics: DynamicsSequence,
    pub time_vector: Vec<f64>,
}

/// Alternates dynamics and kinematics optimization a fixed number of times.
pub struct MotionPlanner<D, M, S> {
    dynamics: D,
    kinematics: KinematicsOptimizer<M, S>,
    phase: PlannerPhase,
}

impl<D, M, S> MotionPlanner<D, M, S>
where
    D: DynamicsOptimizer,
    M: KinematicsModel,
    S: IkSolver,
{
    /// # Errors
    ///
    /// Returns [`PlannerError::Config`] on invalid configuration.
    pub fn new(config: PlannerConfig, dynamics: D, model: M, solver: S) -> Result<Self, PlannerError> {
        Ok(Self {
            dynamics,
            kinematics: KinematicsOptimizer::new(config, model, solver)?,
            phase: PlannerPhase::Init,
        })
    }

    pub const fn phase(&self) -> PlannerPhase {
        self.phase
    }

    pub const fn dynamics(&self) -> &D {
        &self.dynamics
    }

    pub const fn kinematics(&self) -> &KinematicsOptimizer<M, S> {
        &self.kinematics
    }

    pub const fn config(&self) -> &PlannerConfig {
        self.kinematics.config()
    }

    /// Run dynamics once, then `kin_dyn_iterations` rounds of kinematics
    /// followed by dynamics, each consuming the other's latest output.
    ///
    /// # Errors
    ///
    /// The first failing optimization aborts the run; nothing is retried.
    pub fn optimize_motion(
        &mut self,
        initial: &InitialState,
        contacts: &dyn ContactPlanProvider,
    ) -> Result<MotionPlan, PlannerError> {
        let rounds = self.config().kin_dyn_iterations;

        self.phase = PlannerPhase::DynamicsOnly;
        info!(rounds, "dynamics-only pass");
        let mut dynamics = self.dynamics.optimize(initial, contacts, None)?;

        for round in 0..rounds {
            self.phase = PlannerPhase::Alternating(round);
            info!(round, "kinematics-dynamics round");
            let kinematics = self.kinematics.optimize(initial, contacts, &dynamics)?;
            dynamics = self.dynamics.optimize(initial, contacts, Some(kinematics))?;
        }

        self.phase = PlannerPhase::Done;
        info!("motion planning done");
        let ran_kinematics = rounds > 0;
        let config = self.config();
        Ok(MotionPlan {
            kinematics: ran_kinematics.then(|| self.kinematics.sequence().clone()),
            end_effector_motion: self
                .kinematics
                .references()
                .filter(|_| ran_kinematics)
                .cloned(),
            dynamics,
            time_vector: time_vector(config.num_time_steps, config.dt),
        })
    }
}
