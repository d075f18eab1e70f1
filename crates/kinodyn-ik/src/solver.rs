//! Momentum-tracking inverse kinematics.
//!
//! Both solvers compute one generalized velocity `x` per call by stacking
//! the weighted tasks
//!
//! ```text
//! momentum:      A(q) x = [lmom + k_c m (com_ref - com(q)); amom]
//! end-effector:  J_e(q) x = vel_ref_e + k_e (pos_ref_e - pos_e(q))
//! ```
//!
//! and minimizing `sum_r w_r (J_r x - b_r)^2 + lambda |x - v|^2`. Contact
//! end-effectors use the contact weight, swinging ones the swing weight.
//!
//! [`PointContactIk`] solves this as a box-constrained QP with Clarabel
//! (`|x_i| <= max_joint_velocity`). [`DampedLeastSquaresIk`] solves the
//! unconstrained damped normal equations and saturates the result.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT::NonnegativeConeT,
};
use kinodyn_core::{IkConfig, SolverError};
use nalgebra::{DMatrix, DVector, Vector3};

use crate::model::KinematicsModel;

/// References for one IK call.
#[derive(Debug, Clone, Copy)]
pub struct IkTargets<'a> {
    pub com: Vector3<f64>,
    pub lmom: Vector3<f64>,
    pub amom: Vector3<f64>,
    pub endeff_positions: &'a [Vector3<f64>],
    pub endeff_velocities: &'a [Vector3<f64>],
    pub endeff_contacts: &'a [bool],
}

/// Computes one generalized velocity tracking momentum and end-effector targets.
pub trait IkSolver {
    /// Solve for the velocity at configuration `q`; `v` is the previous
    /// velocity, used as the regularization anchor.
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] on dimension mismatches or solver failure.
    fn compute(
        &mut self,
        model: &dyn KinematicsModel,
        q: &DVector<f64>,
        v: &DVector<f64>,
        targets: &IkTargets<'_>,
    ) -> Result<DVector<f64>, SolverError>;
}

/// Stacked weighted least-squares tasks.
struct TaskStack {
    jacobian: DMatrix<f64>,
    target: DVector<f64>,
    weights: DVector<f64>,
}

impl TaskStack {
    fn assemble(
        model: &dyn KinematicsModel,
        q: &DVector<f64>,
        v: &DVector<f64>,
        targets: &IkTargets<'_>,
        config: &IkConfig,
    ) -> Result<Self, SolverError> {
        check_len(model.nq(), q.len())?;
        check_len(model.nv(), v.len())?;
        let n_eff = model.num_end_effectors();
        check_len(n_eff, targets.endeff_positions.len())?;
        check_len(n_eff, targets.endeff_velocities.len())?;
        check_len(n_eff, targets.endeff_contacts.len())?;

        let nv = model.nv();
        let rows = 6 + 3 * n_eff;
        let frame = model.update_jacobians(q);

        let mut jacobian = DMatrix::zeros(rows, nv);
        let mut target = DVector::zeros(rows);
        let mut weights = DVector::zeros(rows);

        jacobian
            .rows_mut(0, 6)
            .copy_from(&frame.centroidal_momentum_matrix);
        let lmom = targets.lmom + (targets.com - frame.com) * (config.com_gain * model.total_mass());
        target.fixed_rows_mut::<3>(0).copy_from(&lmom);
        target.fixed_rows_mut::<3>(3).copy_from(&targets.amom);
        weights.rows_mut(0, 6).fill(config.momentum_weight);

        for eff in 0..n_eff {
            let row = 6 + 3 * eff;
            jacobian
                .rows_mut(row, 3)
                .copy_from(&frame.endeffector_jacobians[eff]);
            let velocity = targets.endeff_velocities[eff]
                + (targets.endeff_positions[eff] - frame.endeffector_positions[eff])
                    * config.endeff_gain;
            target.fixed_rows_mut::<3>(row).copy_from(&velocity);
            let weight = if targets.endeff_contacts[eff] {
                config.contact_weight
            } else {
                config.swing_weight
            };
            weights.rows_mut(row, 3).fill(weight);
        }

        Ok(Self {
            jacobian,
            target,
            weights,
        })
    }

    /// `(J^T W J, J^T W b)`.
    fn normal_equations(&self) -> (DMatrix<f64>, DVector<f64>) {
        let weighted_t = self.jacobian.transpose() * DMatrix::from_diagonal(&self.weights);
        let hessian = &weighted_t * &self.jacobian;
        let gradient = weighted_t * &self.target;
        (hessian, gradient)
    }
}

const fn check_len(expected: usize, got: usize) -> Result<(), SolverError> {
    if expected == got {
        Ok(())
    } else {
        Err(SolverError::DimensionMismatch { expected, got })
    }
}

// ---------------------------------------------------------------------------
// PointContactIk
// ---------------------------------------------------------------------------

/// Box-constrained weighted least-squares IK solved with Clarabel.
#[derive(Debug, Clone)]
pub struct PointContactIk {
    config: IkConfig,
}

impl PointContactIk {
    pub const fn new(config: IkConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &IkConfig {
        &self.config
    }
}

impl Default for PointContactIk {
    fn default() -> Self {
        Self::new(IkConfig::default())
    }
}

impl IkSolver for PointContactIk {
    fn compute(
        &mut self,
        model: &dyn KinematicsModel,
        q: &DVector<f64>,
        v: &DVector<f64>,
        targets: &IkTargets<'_>,
    ) -> Result<DVector<f64>, SolverError> {
        let tasks = TaskStack::assemble(model, q, v, targets, &self.config)?;
        let nv = model.nv();
        let lambda = self.config.regularization;

        // 0.5 x^T P x + c^T x
        let (hessian, gradient) = tasks.normal_equations();
        let p_mat = hessian + DMatrix::identity(nv, nv) * lambda;
        let c: Vec<f64> = (-(gradient + v * lambda)).iter().copied().collect();

        // x <= vmax and -x <= vmax
        let mut a_mat = DMatrix::zeros(2 * nv, nv);
        a_mat.rows_mut(0, nv).fill_with_identity();
        a_mat.rows_mut(nv, nv).fill_diagonal(-1.0);
        let b = vec![self.config.max_joint_velocity; 2 * nv];
        let cones = [NonnegativeConeT(2 * nv)];

        let settings = DefaultSettingsBuilder::default()
            .max_iter(self.config.max_solver_iters)
            .verbose(false)
            .build()
            .map_err(|_| SolverError::Setup("invalid solver settings"))?;

        let mut solver = DefaultSolver::new(
            &to_csc(&p_mat, true),
            &c,
            &to_csc(&a_mat, false),
            &b,
            &cones,
            settings,
        )
        .map_err(|_| SolverError::Setup("invalid problem data"))?;

        solver.solve();
        let solution = &solver.solution;
        match &solution.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {
                Ok(DVector::from_column_slice(&solution.x))
            }
            status => Err(SolverError::NotConverged {
                status: status_name(status),
            }),
        }
    }
}

fn status_name(status: &SolverStatus) -> &'static str {
    match status {
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => "primal infeasible",
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => "dual infeasible",
        SolverStatus::MaxIterations => "max iterations",
        SolverStatus::MaxTime => "max time",
        SolverStatus::NumericalError => "numerical error",
        SolverStatus::InsufficientProgress => "insufficient progress",
        _ => "unsolved",
    }
}

/// Entries at or below this magnitude are left out of the sparse pattern.
const SPARSE_ZERO: f64 = 1e-15;

/// Column-compressed copy of `m` for Clarabel.
///
/// With `upper_only` only entries with `row <= col` are kept, which is the
/// form Clarabel expects for the quadratic cost.
fn to_csc(m: &DMatrix<f64>, upper_only: bool) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = Vec::with_capacity(ncols + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    colptr.push(0);
    for (j, column) in m.column_iter().enumerate() {
        let rows = if upper_only { (j + 1).min(nrows) } else { nrows };
        for (i, &value) in column.iter().take(rows).enumerate() {
            if value.abs() > SPARSE_ZERO {
                rowval.push(i);
                nzval.push(value);
            }
        }
        colptr.push(rowval.len());
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

// ---------------------------------------------------------------------------
// DampedLeastSquaresIk
// ---------------------------------------------------------------------------

/// Damped least-squares IK.
///
/// `x = v + Jw^T (Jw Jw^T + lambda I)^-1 (bw - Jw v)` with `Jw = W^1/2 J`,
/// then every component is clamped to the velocity bound.
#[derive(Debug, Clone)]
pub struct DampedLeastSquaresIk {
    config: IkConfig,
}

impl DampedLeastSquaresIk {
    pub const fn new(config: IkConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &IkConfig {
        &self.config
    }
}

impl Default for DampedLeastSquaresIk {
    fn default() -> Self {
        Self::new(IkConfig::default())
    }
}

impl IkSolver for DampedLeastSquaresIk {
    fn compute(
        &mut self,
        model: &dyn KinematicsModel,
        q: &DVector<f64>,
        v: &DVector<f64>,
        targets: &IkTargets<'_>,
    ) -> Result<DVector<f64>, SolverError> {
        let tasks = TaskStack::assemble(model, q, v, targets, &self.config)?;
        let sqrt_w = tasks.weights.map(f64::sqrt);
        let mut jw = tasks.jacobian;
        for (mut row, w) in jw.row_iter_mut().zip(sqrt_w.iter()) {
            row *= *w;
        }
        let residual = tasks.target.component_mul(&sqrt_w) - &jw * v;

        let m = jw.nrows();
        let damped = &jw * jw.transpose() + DMatrix::identity(m, m) * self.config.regularization;
        let Some(chol) = damped.cholesky() else {
            return Err(SolverError::Singular);
        };
        let step = jw.transpose() * chol.solve(&residual);

        let bound = self.config.max_joint_velocity;
        Ok((v + step).map(|x| x.clamp(-bound, bound)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold;
    use crate::model::{FloatingBaseModel, QuadrupedGeometry};
    use approx::assert_relative_eq;

    fn standing() -> (FloatingBaseModel, DVector<f64>) {
        let geometry = QuadrupedGeometry::default();
        let model = FloatingBaseModel::quadruped(&geometry);
        let mut q = model.neutral_configuration();
        q[2] = geometry.standing_height();
        for (i, value) in geometry.standing_joint_positions().into_iter().enumerate() {
            q[manifold::BASE_NQ + i] = value;
        }
        (model, q)
    }

    struct Scenario {
        positions: Vec<Vector3<f64>>,
        velocities: Vec<Vector3<f64>>,
        contacts: Vec<bool>,
        com: Vector3<f64>,
    }

    impl Scenario {
        fn holding(model: &FloatingBaseModel, q: &DVector<f64>) -> Self {
            Self {
                positions: model.forward_kinematics(q),
                velocities: vec![Vector3::zeros(); 4],
                contacts: vec![true; 4],
                com: model.center_of_mass(q),
            }
        }

        fn targets(&self) -> IkTargets<'_> {
            IkTargets {
                com: self.com,
                lmom: Vector3::zeros(),
                amom: Vector3::zeros(),
                endeff_positions: &self.positions,
                endeff_velocities: &self.velocities,
                endeff_contacts: &self.contacts,
            }
        }
    }

    fn solvers() -> Vec<Box<dyn IkSolver>> {
        vec![
            Box::new(PointContactIk::default()),
            Box::new(DampedLeastSquaresIk::default()),
        ]
    }

    #[test]
    fn satisfied_targets_give_zero_velocity() {
        let (model, q) = standing();
        let scenario = Scenario::holding(&model, &q);
        for mut solver in solvers() {
            let x = solver
                .compute(&model, &q, &DVector::zeros(model.nv()), &scenario.targets())
                .unwrap();
            assert_relative_eq!(x.norm(), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn com_error_moves_body_with_feet_planted() {
        let (model, q) = standing();
        let mut scenario = Scenario::holding(&model, &q);
        let shift = Vector3::new(0.02, -0.01, 0.01);
        scenario.com += shift;

        for mut solver in solvers() {
            let x = solver
                .compute(&model, &q, &DVector::zeros(model.nv()), &scenario.targets())
                .unwrap();
            let frame = model.update_jacobians(&q);
            let (lmom, amom) = frame.centroidal_momentum(&x);
            assert_relative_eq!(lmom, shift * model.total_mass(), epsilon = 1e-3);
            assert_relative_eq!(amom, Vector3::zeros(), epsilon = 1e-3);
            for jac in &frame.endeffector_jacobians {
                let foot_velocity: Vector3<f64> = (jac * &x).fixed_rows::<3>(0).into_owned();
                assert_relative_eq!(foot_velocity, Vector3::zeros(), epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn swing_foot_tracks_velocity_reference() {
        let (model, q) = standing();
        let mut scenario = Scenario::holding(&model, &q);
        scenario.contacts[1] = false;
        scenario.velocities[1] = Vector3::new(0.0, 0.0, 0.3);

        let mut solver = PointContactIk::default();
        let x = solver
            .compute(&model, &q, &DVector::zeros(model.nv()), &scenario.targets())
            .unwrap();
        let frame = model.update_jacobians(&q);
        let swing: Vector3<f64> = (&frame.endeffector_jacobians[1] * &x).fixed_rows::<3>(0).into_owned();
        assert_relative_eq!(swing, Vector3::new(0.0, 0.0, 0.3), epsilon = 1e-3);
    }

    #[test]
    fn velocity_bound_is_respected() {
        let (model, q) = standing();
        let mut scenario = Scenario::holding(&model, &q);
        scenario.com += Vector3::new(5.0, 0.0, 0.0);
        let config = IkConfig {
            max_joint_velocity: 0.1,
            ..IkConfig::default()
        };
        let mut qp = PointContactIk::new(config.clone());
        let mut dls = DampedLeastSquaresIk::new(config);
        let v0 = DVector::zeros(model.nv());
        for x in [
            qp.compute(&model, &q, &v0, &scenario.targets()).unwrap(),
            dls.compute(&model, &q, &v0, &scenario.targets()).unwrap(),
        ] {
            assert!(x.amax() <= 0.1 + 1e-6, "max |x| = {}", x.amax());
        }
    }

    #[test]
    fn mismatched_targets_are_rejected() {
        let (model, q) = standing();
        let mut scenario = Scenario::holding(&model, &q);
        scenario.contacts.pop();
        for mut solver in solvers() {
            let err = solver
                .compute(&model, &q, &DVector::zeros(model.nv()), &scenario.targets())
                .unwrap_err();
            assert_eq!(err, SolverError::DimensionMismatch { expected: 4, got: 3 });
        }
    }

    #[test]
    fn mismatched_velocity_is_rejected() {
        let (model, q) = standing();
        let scenario = Scenario::holding(&model, &q);
        let err = PointContactIk::default()
            .compute(&model, &q, &DVector::zeros(3), &scenario.targets())
            .unwrap_err();
        assert_eq!(err, SolverError::DimensionMismatch { expected: 18, got: 3 });
    }

    #[test]
    fn csc_upper_tri_drops_lower_entries() {
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let csc = to_csc(&m, true);
        assert_eq!(csc.nzval, vec![2.0, 1.0, 3.0]);
        assert_eq!(csc.rowval, vec![0, 0, 1]);
        assert_eq!(csc.colptr, vec![0, 1, 3]);
    }

    #[test]
    fn csc_skips_zeros_column_major() {
        let m = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, -1.0, 4.0, 0.0]);
        let csc = to_csc(&m, false);
        assert_eq!(csc.nzval, vec![1.0, 4.0, -1.0]);
        assert_eq!(csc.rowval, vec![0, 2, 1]);
        assert_eq!(csc.colptr, vec![0, 2, 3]);
    }
}
