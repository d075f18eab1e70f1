//! Integration test: one kinematics pass against the stock quadruped.
//!
//! Mock solvers check what the co-optimizer hands across the IK seam; the
//! QP-backed solver checks that the tracked motion follows the references.

use approx::assert_relative_eq;
use kinodyn_core::{
    DynamicsSequence, DynamicsState, PlannerConfig, PlannerError, ScheduleError, SolverError,
    TrajectoryError,
};
use kinodyn_ik::manifold::{self, BASE_NQ, BASE_NV};
use kinodyn_ik::{FloatingBaseModel, IkSolver, IkTargets, KinematicsModel, PointContactIk};
use kinodyn_opt::KinematicsOptimizer;
use kinodyn_test_utils::{
    constant_dynamics, quadruped, quadruped_config, stance_plan, standing_initial_state,
    two_contact_plan, FailingIkSolver, RecordingIkSolver,
};
use kinodyn_traj::{ContactPlan, ContactRecord};
use nalgebra::{DVector, Vector3};

fn optimizer<S: IkSolver>(
    config: PlannerConfig,
    solver: S,
) -> KinematicsOptimizer<FloatingBaseModel, S> {
    KinematicsOptimizer::new(config, quadruped(), solver).unwrap()
}

/// Dynamics with a distinct angular momentum at every step.
#[allow(clippy::cast_precision_loss)]
fn spinning_dynamics(n: usize, com: Vector3<f64>) -> DynamicsSequence {
    (0..n)
        .map(|it| DynamicsState {
            com,
            lmom: Vector3::new(0.01, 0.0, 0.0),
            amom: Vector3::new(0.001 * it as f64, -0.02, 0.5 - 0.003 * it as f64),
        })
        .collect()
}

/// Constant base pitch rate, everything else still.
fn pitching_response() -> DVector<f64> {
    let mut v = DVector::zeros(quadruped().nv());
    v[4] = 0.1;
    v
}

#[test]
fn zero_orientation_gain_passes_raw_angular_momentum() {
    let initial = standing_initial_state();
    let config = PlannerConfig {
        orientation_gain: 0.0,
        max_initial_iterations: 1,
        ..quadruped_config()
    };
    let dynamics = spinning_dynamics(config.num_time_steps, initial.com);
    let mut opt = optimizer(config, RecordingIkSolver::with_response(pitching_response()));

    opt.optimize(&initial, &stance_plan(&initial, 1.0), &dynamics)
        .unwrap();

    let calls = opt.solver().calls();
    assert_eq!(calls.len(), 1 + 100);
    // The base is pitched after the posture solve, so a nonzero gain would
    // show up in the target.
    assert!(manifold::base_orientation(&calls[1].q).angle() > 0.05);
    for (it, reference) in dynamics.states().iter().enumerate() {
        let call = &calls[1 + it];
        assert_eq!(call.amom, reference.amom, "step {it}");
        assert_eq!(call.lmom, reference.lmom, "step {it}");
        assert_eq!(call.com, reference.com, "step {it}");
    }
}

#[test]
fn orientation_gain_levels_tilted_base() {
    let initial = standing_initial_state();
    let config = PlannerConfig {
        max_initial_iterations: 1,
        ..quadruped_config()
    };
    let dynamics = constant_dynamics(config.num_time_steps, initial.com);
    let mut opt = optimizer(config, RecordingIkSolver::with_response(pitching_response()));

    opt.optimize(&initial, &stance_plan(&initial, 1.0), &dynamics)
        .unwrap();

    // Positive pitch calls for negative pitch momentum.
    let calls = opt.solver().calls();
    for call in &calls[1..] {
        assert!(call.amom.y < 0.0);
        assert_relative_eq!(call.amom.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(call.amom.z, 0.0, epsilon = 1e-12);
    }
}

#[test]
fn initial_posture_levels_with_its_own_gain() {
    let initial = standing_initial_state();
    let config = PlannerConfig {
        orientation_gain: 0.0,
        max_initial_iterations: 2,
        ..quadruped_config()
    };
    let mut opt = optimizer(config, RecordingIkSolver::with_response(pitching_response()));

    opt.optimize_initial_posture(&initial).unwrap();

    // The first correction pitched the base; the second call pushes back.
    let calls = opt.solver().calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].amom, Vector3::zeros());
    assert!(calls[1].amom.y < 0.0);
}

#[test]
fn initial_posture_keeps_last_iterate_at_cap() {
    let initial = standing_initial_state();
    let config = PlannerConfig {
        max_initial_iterations: 3,
        ..quadruped_config()
    };
    let response = pitching_response();
    let mut expected = quadruped().neutral_configuration();
    for (j, &value) in config.default_joint_positions.iter().enumerate() {
        expected[BASE_NQ + j] = value;
    }
    manifold::set_base_position(&mut expected, &initial.com);
    for _ in 0..3 {
        expected = manifold::integrate(&expected, &response, 1.0);
    }
    let dynamics = constant_dynamics(config.num_time_steps, initial.com);
    let mut opt = optimizer(config, RecordingIkSolver::with_response(response));

    let report = opt.optimize_initial_posture(&initial).unwrap();
    assert!(!report.converged);
    assert_eq!(report.iterations, 3);
    assert_relative_eq!(report.residual, 0.1, epsilon = 1e-12);
    assert_eq!(opt.initial_configuration(), Some(&expected));

    let sequence = opt
        .optimize(&initial, &stance_plan(&initial, 1.0), &dynamics)
        .unwrap();
    assert!(sequence.is_complete());
    assert_eq!(sequence.states()[0].q, expected);
    assert_eq!(opt.solver().calls().len(), 3 + 100);
}

#[test]
fn wrong_sized_solver_output_aborts_pass() {
    let initial = standing_initial_state();
    let config = quadruped_config();
    let dynamics = constant_dynamics(config.num_time_steps, initial.com);
    let mut opt = optimizer(config, RecordingIkSolver::with_response(DVector::zeros(3)));

    let err = opt
        .optimize(&initial, &stance_plan(&initial, 1.0), &dynamics)
        .unwrap_err();

    assert!(matches!(
        err,
        PlannerError::Solver {
            step: 0,
            source: SolverError::DimensionMismatch {
                expected: 18,
                got: 3
            }
        }
    ));
    assert!(opt.initial_configuration().is_none());
    assert_eq!(opt.solver().calls().len(), 1);
}

/// Returns correctly sized zeros for `good` calls, then a truncated vector.
struct Truncating {
    good: usize,
    calls: usize,
}

impl IkSolver for Truncating {
    fn compute(
        &mut self,
        model: &dyn KinematicsModel,
        _q: &DVector<f64>,
        _v: &DVector<f64>,
        _targets: &IkTargets<'_>,
    ) -> Result<DVector<f64>, SolverError> {
        self.calls += 1;
        let len = if self.calls > self.good { model.nv() - 1 } else { model.nv() };
        Ok(DVector::zeros(len))
    }
}

#[test]
fn wrong_sized_tracking_output_reports_step() {
    let initial = standing_initial_state();
    let config = quadruped_config();
    let dynamics = constant_dynamics(config.num_time_steps, initial.com);
    let mut opt = optimizer(config, Truncating { good: 1 + 5, calls: 0 });

    let err = opt
        .optimize(&initial, &stance_plan(&initial, 1.0), &dynamics)
        .unwrap_err();

    assert!(matches!(
        err,
        PlannerError::Solver {
            step: 5,
            source: SolverError::DimensionMismatch { .. }
        }
    ));
    assert_eq!(opt.sequence().filled(), 5);
}

#[test]
fn tracking_starts_from_initial_posture_at_rest() {
    let initial = standing_initial_state();
    let config = quadruped_config();
    let dynamics = constant_dynamics(config.num_time_steps, initial.com);
    let mut opt = optimizer(config, RecordingIkSolver::new());

    opt.optimize(&initial, &stance_plan(&initial, 1.0), &dynamics)
        .unwrap();

    let q0 = opt.initial_configuration().unwrap().clone();
    let calls = opt.solver().calls();
    assert_eq!(calls[1].q, q0);
    assert_eq!(calls[1].v, DVector::zeros(BASE_NV + 12));
    assert_eq!(manifold::base_position(&q0), initial.com);
    assert_eq!(opt.sequence().states()[0].q, q0);
}

#[test]
fn stance_references_are_static_contacts() {
    let initial = standing_initial_state();
    let config = quadruped_config();
    let dynamics = constant_dynamics(config.num_time_steps, initial.com);
    let mut opt = optimizer(config, RecordingIkSolver::new());

    opt.optimize(&initial, &stance_plan(&initial, 1.0), &dynamics)
        .unwrap();

    for call in &opt.solver().calls()[1..] {
        assert_eq!(call.endeff_positions, initial.endeffector_positions);
        assert!(call.endeff_velocities.iter().all(|v| *v == Vector3::zeros()));
        assert_eq!(call.endeff_contacts, vec![true; 4]);
    }
}

#[test]
fn swinging_feet_are_flagged() {
    let initial = standing_initial_state();
    let config = quadruped_config();
    let dynamics = constant_dynamics(config.num_time_steps, initial.com);
    let plan = two_contact_plan(&initial, 1.0, Vector3::new(0.05, 0.0, 0.0));
    let mut opt = optimizer(config, RecordingIkSolver::new());

    opt.optimize(&initial, &plan, &dynamics).unwrap();

    let calls = opt.solver().calls();
    // t = 0.3: BL and FR swing, FL and BR stand.
    assert_eq!(calls[1 + 30].endeff_contacts, vec![false, true, true, false]);
    // t = 0.7: the other diagonal.
    assert_eq!(calls[1 + 70].endeff_contacts, vec![true, false, false, true]);
    assert!(calls[1 + 30].endeff_positions[0].z > 0.05);

    let references = opt.references().unwrap();
    assert_eq!(references.num_time_steps(), 100);
    assert_eq!(references.num_end_effectors(), 4);
}

#[test]
fn initial_posture_is_solved_once() {
    let initial = standing_initial_state();
    let config = quadruped_config();
    let dynamics = constant_dynamics(config.num_time_steps, initial.com);
    let plan = stance_plan(&initial, 1.0);
    let mut opt = optimizer(config, RecordingIkSolver::new());

    opt.optimize(&initial, &plan, &dynamics).unwrap();
    assert_eq!(opt.sequence().pass(), 1);
    opt.optimize(&initial, &plan, &dynamics).unwrap();
    assert_eq!(opt.sequence().pass(), 2);
    assert!(opt.sequence().is_complete());

    assert_eq!(opt.passes(), 2);
    assert_eq!(opt.solver().calls().len(), 1 + 100 + 100);
}

#[test]
fn failed_step_aborts_pass() {
    let initial = standing_initial_state();
    let config = quadruped_config();
    let dynamics = constant_dynamics(config.num_time_steps, initial.com);
    let mut opt = optimizer(config, FailingIkSolver::new(1 + 30));

    let err = opt
        .optimize(&initial, &stance_plan(&initial, 1.0), &dynamics)
        .unwrap_err();

    assert!(matches!(
        err,
        PlannerError::Solver {
            step: 30,
            source: SolverError::Singular
        }
    ));
    assert_eq!(opt.sequence().filled(), 30);
    assert!(!opt.sequence().is_complete());
    assert_eq!(opt.solver().calls(), 32);
}

#[test]
fn failed_initial_posture_reports_step_zero() {
    let initial = standing_initial_state();
    let config = quadruped_config();
    let dynamics = constant_dynamics(config.num_time_steps, initial.com);
    let mut opt = optimizer(config, FailingIkSolver::new(0));

    let err = opt
        .optimize(&initial, &stance_plan(&initial, 1.0), &dynamics)
        .unwrap_err();

    assert!(matches!(err, PlannerError::Solver { step: 0, .. }));
    assert!(opt.initial_configuration().is_none());
    assert_eq!(opt.sequence().filled(), 0);
}

#[test]
fn end_effector_without_contacts_is_rejected() {
    let initial = standing_initial_state();
    let config = quadruped_config();
    let dynamics = constant_dynamics(config.num_time_steps, initial.com);
    let mut records: Vec<Vec<ContactRecord>> = initial
        .endeffector_positions
        .iter()
        .map(|&p| vec![ContactRecord::new(0.0, 1.0, p)])
        .collect();
    records[3].clear();
    let mut opt = optimizer(config, RecordingIkSolver::new());

    let err = opt
        .optimize(&initial, &ContactPlan::new(records), &dynamics)
        .unwrap_err();

    assert!(matches!(
        err,
        PlannerError::Schedule(ScheduleError::NoContacts { end_effector: 3 })
    ));
    assert!(opt.solver().calls().is_empty());
}

#[test]
fn uncovered_horizon_is_rejected() {
    let initial = standing_initial_state();
    let config = quadruped_config();
    let dynamics = constant_dynamics(config.num_time_steps, initial.com);
    let mut opt = optimizer(config, RecordingIkSolver::new());

    let err = opt
        .optimize(&initial, &stance_plan(&initial, 0.5), &dynamics)
        .unwrap_err();

    assert!(matches!(
        err,
        PlannerError::Trajectory(TrajectoryError::OutOfBounds { .. })
    ));
}

#[test]
fn qp_initial_posture_matches_contacts() {
    let initial = standing_initial_state();
    let config = quadruped_config();
    let ik = config.ik.clone();
    let mut opt = optimizer(config, PointContactIk::new(ik));

    let report = opt.optimize_initial_posture(&initial).unwrap();
    assert!(report.iterations >= 1);

    let q = opt.initial_configuration().unwrap().clone();
    let model = opt.model();
    for (foot, target) in model
        .forward_kinematics(&q)
        .iter()
        .zip(&initial.endeffector_positions)
    {
        assert_relative_eq!(*foot, *target, epsilon = 1e-3);
    }
    assert_relative_eq!(model.center_of_mass(&q), initial.com, epsilon = 1e-3);

    // Second call is served from the cache.
    let again = opt.optimize_initial_posture(&initial).unwrap();
    assert_eq!(again, report);
    assert_eq!(opt.initial_configuration(), Some(&q));
}

#[test]
fn qp_tracking_keeps_stance_feet_planted() {
    let initial = standing_initial_state();
    let config = quadruped_config();
    let ik = config.ik.clone();
    let dynamics = constant_dynamics(config.num_time_steps, initial.com);
    let plan = two_contact_plan(&initial, 1.0, Vector3::new(0.05, 0.0, 0.0));
    let mut opt = optimizer(config, PointContactIk::new(ik));

    let sequence = opt.optimize(&initial, &plan, &dynamics).unwrap().clone();
    assert!(sequence.is_complete());

    let references = opt.references().unwrap();
    for (it, state) in sequence.states().iter().enumerate() {
        assert_eq!(state.q.len(), BASE_NQ + 12);
        assert_relative_eq!(state.q.fixed_rows::<4>(3).norm(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(state.com, initial.com, epsilon = 2e-2);
        for (eff, sample) in references.step(it).iter().enumerate() {
            if sample.in_contact {
                assert_relative_eq!(
                    state.endeffector_positions[eff],
                    sample.position,
                    epsilon = 2e-2
                );
            }
        }
    }
    // BL is in the air mid-swing.
    assert!(sequence.states()[30].endeffector_positions[0].z > 0.03);
}
