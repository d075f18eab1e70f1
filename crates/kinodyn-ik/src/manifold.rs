//! Free-flyer configuration manifold.
//!
//! Configuration layout (`nq = 7 + n`):
//!
//! ```text
//! q = [p_x, p_y, p_z, q_x, q_y, q_z, q_w, joint_1 .. joint_n]
//! ```
//!
//! Velocity layout (`nv = 6 + n`), base twist expressed in the world frame:
//!
//! ```text
//! v = [v_x, v_y, v_z, w_x, w_y, w_z, rate_1 .. rate_n]
//! ```
//!
//! Orientation is never added component-wise: integration composes the
//! exponential map of `w * dt` onto the base quaternion.

use nalgebra::{DVector, Quaternion, UnitQuaternion, Vector3};

/// Configuration entries used by the base pose.
pub const BASE_NQ: usize = 7;
/// Velocity entries used by the base twist.
pub const BASE_NV: usize = 6;

pub const fn nq(n_joints: usize) -> usize {
    BASE_NQ + n_joints
}

pub const fn nv(n_joints: usize) -> usize {
    BASE_NV + n_joints
}

/// Identity base pose at the origin with all joints at zero.
pub fn neutral(n_joints: usize) -> DVector<f64> {
    let mut q = DVector::zeros(nq(n_joints));
    q[6] = 1.0;
    q
}

pub fn base_position(q: &DVector<f64>) -> Vector3<f64> {
    Vector3::new(q[0], q[1], q[2])
}

/// Base orientation, renormalized.
pub fn base_orientation(q: &DVector<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_quaternion(Quaternion::new(q[6], q[3], q[4], q[5]))
}

pub fn set_base_position(q: &mut DVector<f64>, position: &Vector3<f64>) {
    q[0] = position.x;
    q[1] = position.y;
    q[2] = position.z;
}

pub fn set_base_orientation(q: &mut DVector<f64>, orientation: &UnitQuaternion<f64>) {
    let coords = orientation.quaternion().coords; // [x, y, z, w]
    q[3] = coords[0];
    q[4] = coords[1];
    q[5] = coords[2];
    q[6] = coords[3];
}

/// Integrate velocity `v` over `dt` starting from `q`.
///
/// # Panics
///
/// Panics if `q` and `v` do not describe the same number of joints.
pub fn integrate(q: &DVector<f64>, v: &DVector<f64>, dt: f64) -> DVector<f64> {
    assert_eq!(
        q.len() - BASE_NQ,
        v.len() - BASE_NV,
        "q and v must have the same number of joints"
    );
    let n_joints = q.len() - BASE_NQ;
    let mut next = q.clone();

    let linear: Vector3<f64> = v.fixed_rows::<3>(0).into_owned();
    set_base_position(&mut next, &(base_position(q) + linear * dt));

    let rotation: Vector3<f64> = v.fixed_rows::<3>(3).into_owned() * dt;
    if rotation != Vector3::zeros() {
        let orientation = UnitQuaternion::from_scaled_axis(rotation) * base_orientation(q);
        set_base_orientation(&mut next, &orientation);
    }

    for j in 0..n_joints {
        next[BASE_NQ + j] += v[BASE_NV + j] * dt;
    }
    next
}

/// Rotation vector taking `current` to `goal`, `log(goal * current^-1)`.
pub fn orientation_error(
    goal: &UnitQuaternion<f64>,
    current: &UnitQuaternion<f64>,
) -> Vector3<f64> {
    (goal * current.inverse()).scaled_axis()
}
