//! Stock robot, initial state and contact plans.

use kinodyn_core::{DynamicsSequence, DynamicsState, InitialState, PlannerConfig};
use kinodyn_ik::manifold::BASE_NQ;
use kinodyn_ik::{FloatingBaseModel, KinematicsModel, QuadrupedGeometry};
use kinodyn_traj::{ContactPlan, ContactRecord};
use nalgebra::{DVector, Vector3};

/// The default quadruped, end-effectors ordered BL, FL, BR, FR.
pub fn quadruped() -> FloatingBaseModel {
    FloatingBaseModel::quadruped(&QuadrupedGeometry::default())
}

/// Default planner configuration seeded with the standing posture.
pub fn quadruped_config() -> PlannerConfig {
    PlannerConfig {
        default_joint_positions: QuadrupedGeometry::default().standing_joint_positions(),
        ..PlannerConfig::default()
    }
}

/// Level standing configuration with every foot on `z = 0`.
pub fn standing_configuration() -> DVector<f64> {
    let geometry = QuadrupedGeometry::default();
    let mut q = quadruped().neutral_configuration();
    q[2] = geometry.standing_height();
    for (i, value) in geometry.standing_joint_positions().into_iter().enumerate() {
        q[BASE_NQ + i] = value;
    }
    q
}

/// CoM and foot positions of [`standing_configuration`].
pub fn standing_initial_state() -> InitialState {
    let model = quadruped();
    let q = standing_configuration();
    InitialState {
        com: model.center_of_mass(&q),
        endeffector_positions: model.forward_kinematics(&q),
    }
}

/// Every end-effector holds its initial position for the whole horizon.
pub fn stance_plan(initial: &InitialState, horizon: f64) -> ContactPlan {
    ContactPlan::new(
        initial
            .endeffector_positions
            .iter()
            .map(|&p| vec![ContactRecord::new(0.0, horizon, p)])
            .collect(),
    )
}

/// Trot: two contacts per foot, displaced by `step`.
///
/// BL and FR swing during `[0.2, 0.4] * horizon`, FL and BR during
/// `[0.6, 0.8] * horizon`.
pub fn two_contact_plan(initial: &InitialState, horizon: f64, step: Vector3<f64>) -> ContactPlan {
    ContactPlan::new(
        initial
            .endeffector_positions
            .iter()
            .enumerate()
            .map(|(eff, &p)| {
                let (lift, touch) = if eff == 0 || eff == 3 { (0.2, 0.4) } else { (0.6, 0.8) };
                vec![
                    ContactRecord::new(0.0, lift * horizon, p),
                    ContactRecord::new(touch * horizon, horizon, p + step),
                ]
            })
            .collect(),
    )
}

/// `num_time_steps` copies of a resting centroidal state at `com`.
pub fn constant_dynamics(num_time_steps: usize, com: Vector3<f64>) -> DynamicsSequence {
    (0..num_time_steps)
        .map(|_| DynamicsState {
            com,
            ..DynamicsState::default()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
