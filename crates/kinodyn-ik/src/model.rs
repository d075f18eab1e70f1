//! Floating-base kinematics model.
//!
//! [`KinematicsModel`] is the capability set the co-optimizer needs from a
//! robot: evaluate the center of mass, end-effector positions and their
//! Jacobians at a configuration, map generalized velocity to centroidal
//! momentum, and integrate on the configuration manifold.
//!
//! [`FloatingBaseModel`] implements it for a rigid base carrying serial
//! limbs whose links are lumped point masses.

use kinodyn_core::KinematicState;
use nalgebra::{DMatrix, DVector, Isometry3, Matrix3, Point3, Translation3, Vector3};

use crate::chain::{ChainJoint, KinematicChain};
use crate::manifold::{self, BASE_NV};

/// Kinematic quantities evaluated at one configuration.
#[derive(Debug, Clone)]
pub struct KinematicsFrame {
    pub com: Vector3<f64>,
    /// World-frame end-effector positions.
    pub endeffector_positions: Vec<Vector3<f64>>,
    /// `3 x nv` translational Jacobian of every end-effector.
    pub endeffector_jacobians: Vec<DMatrix<f64>>,
    /// `6 x nv` map from generalized velocity to `[linear; angular]`
    /// momentum, the angular part taken about the CoM.
    pub centroidal_momentum_matrix: DMatrix<f64>,
}

impl KinematicsFrame {
    /// `(linear, angular)` centroidal momentum for velocity `v`.
    pub fn centroidal_momentum(&self, v: &DVector<f64>) -> (Vector3<f64>, Vector3<f64>) {
        let h = &self.centroidal_momentum_matrix * v;
        (Vector3::new(h[0], h[1], h[2]), Vector3::new(h[3], h[4], h[5]))
    }
}

/// Robot kinematics as seen by the IK solvers and the co-optimizer.
pub trait KinematicsModel {
    /// Configuration dimension.
    fn nq(&self) -> usize;

    /// Velocity dimension.
    fn nv(&self) -> usize;

    fn num_end_effectors(&self) -> usize;

    fn total_mass(&self) -> f64;

    /// Identity base pose at the origin, joints at zero.
    fn neutral_configuration(&self) -> DVector<f64>;

    /// Evaluate positions, Jacobians and the centroidal momentum matrix at `q`.
    ///
    /// # Panics
    ///
    /// Implementations may panic if `q.len() != self.nq()`.
    fn update_jacobians(&self, q: &DVector<f64>) -> KinematicsFrame;

    fn forward_kinematics(&self, q: &DVector<f64>) -> Vec<Vector3<f64>> {
        self.update_jacobians(q).endeffector_positions
    }

    fn center_of_mass(&self, q: &DVector<f64>) -> Vector3<f64> {
        self.update_jacobians(q).com
    }

    fn centroidal_momentum(
        &self,
        q: &DVector<f64>,
        v: &DVector<f64>,
    ) -> (Vector3<f64>, Vector3<f64>) {
        self.update_jacobians(q).centroidal_momentum(v)
    }

    /// Integrate `v` over `dt` on the configuration manifold.
    fn integrate(&self, q: &DVector<f64>, v: &DVector<f64>, dt: f64) -> DVector<f64> {
        manifold::integrate(q, v, dt)
    }

    /// Full kinematic record of `(q, v)`.
    fn kinematic_state(&self, q: &DVector<f64>, v: &DVector<f64>) -> KinematicState {
        let frame = self.update_jacobians(q);
        let (lmom, amom) = frame.centroidal_momentum(v);
        KinematicState {
            com: frame.com,
            lmom,
            amom,
            q: q.clone(),
            v: v.clone(),
            endeffector_positions: frame.endeffector_positions,
        }
    }
}

/// One limb: a chain mounted on the base. Its end-effector is the chain tip.
#[derive(Debug, Clone)]
pub struct Limb {
    pub name: String,
    /// Chain root pose in the base frame.
    pub mount: Isometry3<f64>,
    pub chain: KinematicChain,
}

/// Rigid floating base with serial point-mass limbs.
///
/// Joint coordinates are laid out limb by limb in the order given at
/// construction; end-effector `i` is the tip of limb `i`.
#[derive(Debug, Clone)]
pub struct FloatingBaseModel {
    base_mass: f64,
    /// Base rotational inertia about its origin, base frame.
    base_inertia: Matrix3<f64>,
    limbs: Vec<Limb>,
    /// Index of each limb's first joint among the joint coordinates.
    joint_offsets: Vec<usize>,
    n_joints: usize,
}

impl FloatingBaseModel {
    pub fn new(base_mass: f64, base_inertia: Matrix3<f64>, limbs: Vec<Limb>) -> Self {
        let mut joint_offsets = Vec::with_capacity(limbs.len());
        let mut n_joints = 0;
        for limb in &limbs {
            joint_offsets.push(n_joints);
            n_joints += limb.chain.dof();
        }
        Self {
            base_mass,
            base_inertia,
            limbs,
            joint_offsets,
            n_joints,
        }
    }

    /// Four three-joint legs in the order BL, FL, BR, FR.
    pub fn quadruped(geometry: &QuadrupedGeometry) -> Self {
        let g = geometry;
        let corners = [("BL", -1.0, 1.0), ("FL", 1.0, 1.0), ("BR", -1.0, -1.0), ("FR", 1.0, -1.0)];
        let limbs = corners
            .iter()
            .map(|&(name, sx, sy)| {
                let joints = vec![
                    ChainJoint::revolute(format!("{name}_HAA"), Vector3::zeros(), Vector3::x())
                        .with_limits(-0.8, 0.8)
                        .with_link(g.hip_mass, Vector3::zeros()),
                    ChainJoint::revolute(format!("{name}_HFE"), Vector3::zeros(), Vector3::y())
                        .with_link(
                            g.upper_leg_mass,
                            Vector3::new(0.0, 0.0, -0.5 * g.upper_leg_length),
                        ),
                    ChainJoint::revolute(
                        format!("{name}_KFE"),
                        Vector3::new(0.0, 0.0, -g.upper_leg_length),
                        Vector3::y(),
                    )
                    .with_link(
                        g.lower_leg_mass,
                        Vector3::new(0.0, 0.0, -0.5 * g.lower_leg_length),
                    ),
                ];
                Limb {
                    name: name.to_owned(),
                    mount: Isometry3::translation(sx * g.hip_offset_x, sy * g.hip_offset_y, 0.0),
                    chain: KinematicChain::new(
                        joints,
                        Isometry3::translation(0.0, 0.0, -g.lower_leg_length),
                    ),
                }
            })
            .collect();
        Self::new(g.base_mass, g.base_inertia, limbs)
    }

    pub fn limbs(&self) -> &[Limb] {
        &self.limbs
    }

    pub fn end_effector_names(&self) -> Vec<&str> {
        self.limbs.iter().map(|l| l.name.as_str()).collect()
    }

    pub const fn num_joints(&self) -> usize {
        self.n_joints
    }

    /// Jacobian of a point on a limb moved by the first `active` joints.
    #[allow(clippy::too_many_arguments)]
    fn point_jacobian(
        &self,
        base_position: &Vector3<f64>,
        point: &Vector3<f64>,
        joints: &[ChainJoint],
        origins: &[Vector3<f64>],
        axes: &[Vector3<f64>],
        offset: usize,
        active: usize,
    ) -> DMatrix<f64> {
        let mut jac = base_point_jacobian(self.nv(), base_position, point);
        for i in 0..active {
            let column = if joints[i].is_prismatic {
                axes[i]
            } else {
                axes[i].cross(&(point - origins[i]))
            };
            jac.fixed_view_mut::<3, 1>(0, BASE_NV + offset + i)
                .copy_from(&column);
        }
        jac
    }
}

/// Jacobian of a point rigidly attached to the base.
fn base_point_jacobian(nv: usize, base_position: &Vector3<f64>, point: &Vector3<f64>) -> DMatrix<f64> {
    let mut jac = DMatrix::zeros(3, nv);
    jac.fixed_view_mut::<3, 3>(0, 0)
        .copy_from(&Matrix3::identity());
    // w x r = -[r]x w
    jac.fixed_view_mut::<3, 3>(0, 3)
        .copy_from(&(-(point - base_position).cross_matrix()));
    jac
}

impl KinematicsModel for FloatingBaseModel {
    fn nq(&self) -> usize {
        manifold::nq(self.n_joints)
    }

    fn nv(&self) -> usize {
        manifold::nv(self.n_joints)
    }

    fn num_end_effectors(&self) -> usize {
        self.limbs.len()
    }

    fn total_mass(&self) -> f64 {
        self.base_mass + self.limbs.iter().map(|l| l.chain.mass()).sum::<f64>()
    }

    fn neutral_configuration(&self) -> DVector<f64> {
        manifold::neutral(self.n_joints)
    }

    fn update_jacobians(&self, q: &DVector<f64>) -> KinematicsFrame {
        assert_eq!(q.len(), self.nq(), "q.len() must equal model nq");
        let nv = self.nv();
        let base_position = manifold::base_position(q);
        let base_orientation = manifold::base_orientation(q);
        let base_pose = Isometry3::from_parts(Translation3::from(base_position), base_orientation);

        // (mass, world position, 3 x nv Jacobian) of every lumped mass.
        let mut masses = vec![(
            self.base_mass,
            base_position,
            base_point_jacobian(nv, &base_position, &base_position),
        )];
        let mut endeffector_positions = Vec::with_capacity(self.limbs.len());
        let mut endeffector_jacobians = Vec::with_capacity(self.limbs.len());

        for (limb, &offset) in self.limbs.iter().zip(&self.joint_offsets) {
            let dof = limb.chain.dof();
            let joint_q: Vec<f64> = q.rows(manifold::BASE_NQ + offset, dof).iter().copied().collect();
            let frames = limb.chain.frames(&joint_q);
            let limb_pose = base_pose * limb.mount;
            let to_world = |p: &Vector3<f64>| (limb_pose * Point3::from(*p)).coords;

            let origins: Vec<Vector3<f64>> = frames.origins.iter().map(to_world).collect();
            let axes: Vec<Vector3<f64>> = frames.axes.iter().map(|a| limb_pose.rotation * *a).collect();
            let joints = limb.chain.joints();

            for (i, link_com) in frames.link_coms.iter().enumerate() {
                let point = to_world(link_com);
                let jac = self.point_jacobian(&base_position, &point, joints, &origins, &axes, offset, i + 1);
                masses.push((joints[i].link_mass, point, jac));
            }

            let ee = to_world(&frames.ee_position);
            endeffector_jacobians.push(
                self.point_jacobian(&base_position, &ee, joints, &origins, &axes, offset, dof),
            );
            endeffector_positions.push(ee);
        }

        let total_mass = self.total_mass();
        let com = masses
            .iter()
            .fold(Vector3::<f64>::zeros(), |acc, (m, p, _)| acc + p * *m)
            / total_mass;

        let mut cmm = DMatrix::zeros(6, nv);
        for (m, p, jac) in &masses {
            let mut linear = cmm.rows_mut(0, 3);
            linear += jac * *m;
            let mut angular = cmm.rows_mut(3, 3);
            angular += (p - com).cross_matrix() * jac * *m;
        }
        let rot = base_orientation.to_rotation_matrix().into_inner();
        let world_inertia = rot * self.base_inertia * rot.transpose();
        let mut rotational = cmm.fixed_view_mut::<3, 3>(3, 3);
        rotational += world_inertia;

        KinematicsFrame {
            com,
            endeffector_positions,
            endeffector_jacobians,
            centroidal_momentum_matrix: cmm,
        }
    }
}

/// Dimensions and masses of the stock quadruped.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadrupedGeometry {
    pub base_mass: f64,
    pub base_inertia: Matrix3<f64>,
    /// Hip mount distance from the base origin along x.
    pub hip_offset_x: f64,
    /// Hip mount distance from the base origin along y.
    pub hip_offset_y: f64,
    pub upper_leg_length: f64,
    pub lower_leg_length: f64,
    pub hip_mass: f64,
    pub upper_leg_mass: f64,
    pub lower_leg_mass: f64,
}

impl Default for QuadrupedGeometry {
    fn default() -> Self {
        Self {
            base_mass: 8.6,
            base_inertia: Matrix3::new(0.07, 0.0, 0.0, 0.0, 0.26, 0.0, 0.0, 0.0, 0.28),
            hip_offset_x: 0.2,
            hip_offset_y: 0.1,
            upper_leg_length: 0.2,
            lower_leg_length: 0.2,
            hip_mass: 0.3,
            upper_leg_mass: 0.6,
            lower_leg_mass: 0.2,
        }
    }
}

impl QuadrupedGeometry {
    /// Bent-knee standing posture, feet below the hips.
    pub fn standing_joint_positions(&self) -> Vec<f64> {
        [0.0, 0.8, -1.6].repeat(4)
    }

    /// Height of the hips above the feet in the standing posture.
    pub fn standing_height(&self) -> f64 {
        (self.upper_leg_length + self.lower_leg_length) * 0.8_f64.cos()
    }
}
