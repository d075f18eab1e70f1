//! Kinematics-dynamics co-optimizer.
//!
//! One pass runs, in order: reset the result buffer, ingest the dynamics
//! references, generate end-effector references from the contact plan,
//! solve the initial posture (cached across passes), then the sequential
//! IK/integration loop over every timestep.

use kinodyn_core::{
    ConfigError, DynamicsSequence, DynamicsState, InitialState, KinematicsSequence,
    PlannerConfig, PlannerError, SolverError,
};
use kinodyn_ik::manifold::{self, BASE_NQ, BASE_NV};
use kinodyn_ik::{IkSolver, IkTargets, KinematicsModel};
use kinodyn_traj::{
    ContactPlanProvider, ContactSchedule, EndEffectorReferences, EndEffectorTrajectoryGenerator,
};
use nalgebra::{DVector, UnitQuaternion, Vector3};
use tracing::{debug, info, warn};

/// Outcome of the initial-posture solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialPostureReport {
    pub converged: bool,
    /// IK corrections applied.
    pub iterations: u32,
    /// Norm of the last correction.
    pub residual: f64,
}

/// Initial posture together with the state it was solved for.
#[derive(Debug, Clone)]
struct CachedPosture {
    initial: InitialState,
    q: DVector<f64>,
    v: DVector<f64>,
    report: InitialPostureReport,
}

/// Whole-body kinematics optimizer tracking dynamics and contact references.
pub struct KinematicsOptimizer<M, S> {
    config: PlannerConfig,
    model: M,
    solver: S,
    generator: EndEffectorTrajectoryGenerator,
    sequence: KinematicsSequence,
    dynamics_refs: Vec<DynamicsState>,
    references: Option<EndEffectorReferences>,
    posture: Option<CachedPosture>,
    passes: u32,
}

impl<M: KinematicsModel, S: IkSolver> KinematicsOptimizer<M, S> {
    /// # Errors
    ///
    /// Returns [`PlannerError::Config`] if the configuration is invalid or the
    /// default joint positions do not match the model.
    pub fn new(config: PlannerConfig, model: M, solver: S) -> Result<Self, PlannerError> {
        config.validate()?;
        let n_joints = model.nv() - BASE_NV;
        if !config.default_joint_positions.is_empty()
            && config.default_joint_positions.len() != n_joints
        {
            return Err(ConfigError::InvalidValue {
                field: "default_joint_positions".into(),
                message: format!(
                    "expected {n_joints} values, got {}",
                    config.default_joint_positions.len()
                ),
            }
            .into());
        }

        Ok(Self {
            generator: EndEffectorTrajectoryGenerator::from_config(&config),
            config,
            model,
            solver,
            sequence: KinematicsSequence::default(),
            dynamics_refs: Vec::new(),
            references: None,
            posture: None,
            passes: 0,
        })
    }

    pub const fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub const fn model(&self) -> &M {
        &self.model
    }

    pub const fn solver(&self) -> &S {
        &self.solver
    }

    /// Result of the latest pass.
    pub const fn sequence(&self) -> &KinematicsSequence {
        &self.sequence
    }

    /// End-effector references of the latest pass.
    pub const fn references(&self) -> Option<&EndEffectorReferences> {
        self.references.as_ref()
    }

    /// Cached initial configuration, once solved.
    pub fn initial_configuration(&self) -> Option<&DVector<f64>> {
        self.posture.as_ref().map(|p| &p.q)
    }

    pub fn initial_report(&self) -> Option<InitialPostureReport> {
        self.posture.as_ref().map(|p| p.report)
    }

    /// Number of passes started so far.
    pub const fn passes(&self) -> u32 {
        self.passes
    }

    /// Start a new pass: a fresh, zeroed sequence tagged with the next pass
    /// number. References from the previous pass are dropped.
    pub fn reset(&mut self) {
        self.passes += 1;
        self.sequence = KinematicsSequence::with_capacity(
            self.config.num_time_steps,
            self.model.nq(),
            self.model.nv(),
            self.passes,
        );
        self.dynamics_refs.clear();
        self.references = None;
    }

    /// Copy the per-timestep CoM and momentum references.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::SequenceLength`] if `dynamics` is shorter than
    /// the horizon. Extra states are ignored.
    pub fn ingest_dynamics(&mut self, dynamics: &DynamicsSequence) -> Result<(), PlannerError> {
        let expected = self.config.num_time_steps;
        if dynamics.len() < expected {
            return Err(PlannerError::SequenceLength {
                expected,
                got: dynamics.len(),
            });
        }
        self.dynamics_refs.clear();
        self.dynamics_refs
            .extend_from_slice(&dynamics.states()[..expected]);
        Ok(())
    }

    /// Build and sample the end-effector references for this pass.
    ///
    /// # Errors
    ///
    /// Propagates schedule validation and trajectory sampling errors.
    pub fn generate_references(
        &mut self,
        contacts: &dyn ContactPlanProvider,
    ) -> Result<&EndEffectorReferences, PlannerError> {
        let references = self.build_references(contacts)?;
        Ok(self.references.insert(references))
    }

    fn build_references(
        &self,
        contacts: &dyn ContactPlanProvider,
    ) -> Result<EndEffectorReferences, PlannerError> {
        let schedule = ContactSchedule::from_provider(contacts)?;
        Ok(self
            .generator
            .generate(&schedule, self.config.num_time_steps, self.config.dt)?)
    }

    /// Solve for a posture with the CoM at the initial target, zero momentum,
    /// every end-effector on its initial contact and a level base.
    ///
    /// The result is cached; calling again with the same initial state
    /// returns the cached report without touching the solver. Hitting the
    /// iteration cap is reported, not fatal: the last iterate is kept.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Solver`] (at step 0) if an IK call fails.
    pub fn optimize_initial_posture(
        &mut self,
        initial: &InitialState,
    ) -> Result<InitialPostureReport, PlannerError> {
        self.solve_initial_posture(initial).map(|p| p.report)
    }

    fn solve_initial_posture(
        &mut self,
        initial: &InitialState,
    ) -> Result<CachedPosture, PlannerError> {
        if let Some(cached) = self.posture.as_ref().filter(|p| p.initial == *initial) {
            return Ok(cached.clone());
        }

        let nv = self.model.nv();
        let mut q = self.model.neutral_configuration();
        for (j, &value) in self.config.default_joint_positions.iter().enumerate() {
            q[BASE_NQ + j] = value;
        }
        manifold::set_base_position(&mut q, &initial.com);
        manifold::set_base_orientation(&mut q, &UnitQuaternion::identity());

        let v_zero = DVector::zeros(nv);
        let velocities = vec![Vector3::zeros(); initial.num_end_effectors()];
        let contacts = vec![true; initial.num_end_effectors()];

        let mut report = InitialPostureReport {
            converged: false,
            iterations: 0,
            residual: f64::INFINITY,
        };
        while report.iterations < self.config.max_initial_iterations {
            let targets = IkTargets {
                com: initial.com,
                lmom: Vector3::zeros(),
                amom: leveling_momentum(&q, self.config.initial_orientation_gain),
                endeff_positions: &initial.endeffector_positions,
                endeff_velocities: &velocities,
                endeff_contacts: &contacts,
            };
            let correction = self
                .solver
                .compute(&self.model, &q, &v_zero, &targets)
                .and_then(|x| check_velocity(x, nv))
                .map_err(|e| e.at_step(0))?;
            q = self.model.integrate(&q, &correction, 1.0);
            report.iterations += 1;
            report.residual = correction.norm();
            if report.residual < self.config.initial_tolerance {
                report.converged = true;
                break;
            }
        }

        if report.converged {
            info!(
                iterations = report.iterations,
                residual = report.residual,
                "initial posture converged"
            );
        } else {
            warn!(
                iterations = report.iterations,
                residual = report.residual,
                "initial posture did not converge, keeping last iterate"
            );
        }

        let posture = CachedPosture {
            initial: initial.clone(),
            q,
            v: v_zero,
            report,
        };
        self.posture = Some(posture.clone());
        Ok(posture)
    }

    /// Run one kinematics pass.
    ///
    /// # Errors
    ///
    /// Fails on short dynamics input, invalid contact plans, uncovered
    /// sample times, IK failures and solver output of the wrong size. A
    /// failed timestep aborts the pass; the sequence then holds only the
    /// states before it.
    pub fn optimize(
        &mut self,
        initial: &InitialState,
        contacts: &dyn ContactPlanProvider,
        dynamics: &DynamicsSequence,
    ) -> Result<&KinematicsSequence, PlannerError> {
        self.reset();
        self.ingest_dynamics(dynamics)?;
        let generated = self.build_references(contacts)?;
        let CachedPosture { mut q, mut v, .. } = self.solve_initial_posture(initial)?;
        let references = &*self.references.insert(generated);
        let dt = self.config.dt;
        let nv = self.model.nv();

        for (it, reference) in self.dynamics_refs.iter().enumerate() {
            let positions = references.positions(it);
            let velocities = references.velocities(it);
            let in_contact = references.contacts(it);
            let targets = IkTargets {
                com: reference.com,
                lmom: reference.lmom,
                amom: leveling_momentum(&q, self.config.orientation_gain) + reference.amom,
                endeff_positions: &positions,
                endeff_velocities: &velocities,
                endeff_contacts: &in_contact,
            };
            v = self
                .solver
                .compute(&self.model, &q, &v, &targets)
                .and_then(|x| check_velocity(x, nv))
                .map_err(|e| e.at_step(it))?;
            self.sequence.record(it, self.model.kinematic_state(&q, &v))?;
            q = self.model.integrate(&q, &v, dt);
        }

        debug!(
            pass = self.passes,
            steps = self.sequence.filled(),
            "kinematics pass complete"
        );
        Ok(&self.sequence)
    }
}

/// Reject solver output that does not fit the model's velocity space.
fn check_velocity(v: DVector<f64>, nv: usize) -> Result<DVector<f64>, SolverError> {
    if v.len() == nv {
        Ok(v)
    } else {
        Err(SolverError::DimensionMismatch {
            expected: nv,
            got: v.len(),
        })
    }
}

/// Angular momentum nudging the base toward level, `gain * log(I * R^-1)`.
fn leveling_momentum(q: &DVector<f64>, gain: f64) -> Vector3<f64> {
    manifold::orientation_error(&UnitQuaternion::identity(), &manifold::base_orientation(q)) * gain
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinodyn_ik::{FloatingBaseModel, QuadrupedGeometry};

    /// Returns zero velocity and counts calls.
    #[derive(Default)]
    struct Still {
        calls: usize,
    }

    impl IkSolver for Still {
        fn compute(
            &mut self,
            model: &dyn KinematicsModel,
            _q: &DVector<f64>,
            _v: &DVector<f64>,
            _targets: &IkTargets<'_>,
        ) -> Result<DVector<f64>, SolverError> {
            self.calls += 1;
            Ok(DVector::zeros(model.nv()))
        }
    }

    fn optimizer(config: PlannerConfig) -> Result<KinematicsOptimizer<FloatingBaseModel, Still>, PlannerError> {
        let model = FloatingBaseModel::quadruped(&QuadrupedGeometry::default());
        KinematicsOptimizer::new(config, model, Still::default())
    }

    fn initial_state() -> InitialState {
        InitialState {
            com: Vector3::new(0.0, 0.0, 0.28),
            endeffector_positions: vec![Vector3::zeros(); 4],
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let config = PlannerConfig {
            num_time_steps: 0,
            ..PlannerConfig::default()
        };
        assert!(matches!(
            optimizer(config),
            Err(PlannerError::Config(ConfigError::ZeroTimeSteps))
        ));
    }

    #[test]
    fn rejects_wrong_default_posture_length() {
        let config = PlannerConfig {
            default_joint_positions: vec![0.0; 5],
            ..PlannerConfig::default()
        };
        assert!(matches!(
            optimizer(config),
            Err(PlannerError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn reset_allocates_versioned_sequence() {
        let mut opt = optimizer(PlannerConfig::default()).unwrap();
        opt.reset();
        assert_eq!(opt.sequence().pass(), 1);
        assert_eq!(opt.sequence().len(), 100);
        assert_eq!(opt.sequence().filled(), 0);
        assert_eq!(opt.sequence().states()[0].q.len(), 19);
        opt.reset();
        assert_eq!(opt.sequence().pass(), 2);
    }

    #[test]
    fn short_dynamics_is_rejected() {
        let mut opt = optimizer(PlannerConfig::default()).unwrap();
        let short: DynamicsSequence = (0..10).map(|_| DynamicsState::default()).collect();
        let err = opt.ingest_dynamics(&short).unwrap_err();
        assert!(matches!(
            err,
            PlannerError::SequenceLength {
                expected: 100,
                got: 10
            }
        ));
    }

    #[test]
    fn initial_posture_uses_seed_and_caches() {
        let config = PlannerConfig {
            default_joint_positions: QuadrupedGeometry::default().standing_joint_positions(),
            ..PlannerConfig::default()
        };
        let mut opt = optimizer(config).unwrap();
        let initial = initial_state();

        let report = opt.optimize_initial_posture(&initial).unwrap();
        assert!(report.converged);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.residual, 0.0);

        let q = opt.initial_configuration().unwrap().clone();
        assert_eq!(manifold::base_position(&q), initial.com);
        assert_eq!(q[BASE_NQ + 1], 0.8);

        opt.optimize_initial_posture(&initial).unwrap();
        assert_eq!(opt.solver().calls, 1);
        assert_eq!(opt.initial_configuration(), Some(&q));
    }

    #[test]
    fn wrong_sized_velocity_is_rejected() {
        assert_eq!(check_velocity(DVector::zeros(18), 18).map(|v| v.len()), Ok(18));
        assert_eq!(
            check_velocity(DVector::zeros(3), 18).unwrap_err(),
            SolverError::DimensionMismatch { expected: 18, got: 3 }
        );
    }

    #[test]
    fn leveling_momentum_vanishes_when_level() {
        let q = manifold::neutral(12);
        assert_eq!(leveling_momentum(&q, 1e-2), Vector3::zeros());
    }
}
