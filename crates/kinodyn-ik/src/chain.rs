//! Serial kinematic chain of one limb.
//!
//! A [`KinematicChain`] is an ordered list of joints from the limb mount to
//! the end-effector. Each joint carries the point mass of the link it moves,
//! so the chain yields both the geometry for Jacobians and the mass
//! distribution for the centroidal momentum matrix.

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, UnitVector3, Vector3};

/// A single joint in the kinematic chain.
#[derive(Debug, Clone)]
pub struct ChainJoint {
    pub name: String,
    /// Static transform from the parent link frame to this joint frame.
    pub origin: Isometry3<f64>,
    /// Joint axis in the joint's local frame.
    pub axis: UnitVector3<f64>,
    /// Whether this is a prismatic joint (false = revolute).
    pub is_prismatic: bool,
    pub lower_limit: f64,
    pub upper_limit: f64,
    /// Mass of the child link, lumped at `com_offset`.
    pub link_mass: f64,
    /// Child link center of mass in the moving joint frame.
    pub com_offset: Vector3<f64>,
}

impl ChainJoint {
    /// Massless revolute joint at `xyz` from the parent frame.
    pub fn revolute(name: impl Into<String>, xyz: Vector3<f64>, axis: Vector3<f64>) -> Self {
        Self {
            name: name.into(),
            origin: Isometry3::from_parts(Translation3::from(xyz), UnitQuaternion::identity()),
            axis: UnitVector3::new_normalize(axis),
            is_prismatic: false,
            lower_limit: -std::f64::consts::PI,
            upper_limit: std::f64::consts::PI,
            link_mass: 0.0,
            com_offset: Vector3::zeros(),
        }
    }

    #[must_use]
    pub fn with_limits(mut self, lower: f64, upper: f64) -> Self {
        self.lower_limit = lower;
        self.upper_limit = upper;
        self
    }

    #[must_use]
    pub fn with_link(mut self, mass: f64, com_offset: Vector3<f64>) -> Self {
        self.link_mass = mass;
        self.com_offset = com_offset;
        self
    }
}

/// Joint geometry of a chain at one configuration, in the chain root frame.
#[derive(Debug, Clone)]
pub struct ChainFrames {
    /// Joint origins, recorded before the joint's own motion.
    pub origins: Vec<Vector3<f64>>,
    pub axes: Vec<Vector3<f64>>,
    /// Link centers of mass; `link_coms[i]` moves with joints `0..=i`.
    pub link_coms: Vec<Vector3<f64>>,
    pub ee_position: Vector3<f64>,
}

/// An ordered kinematic chain from limb mount to end-effector.
#[derive(Debug, Clone)]
pub struct KinematicChain {
    joints: Vec<ChainJoint>,
    /// Transform from the last joint's child link to the end-effector frame.
    ee_offset: Isometry3<f64>,
}

impl KinematicChain {
    pub const fn new(joints: Vec<ChainJoint>, ee_offset: Isometry3<f64>) -> Self {
        Self { joints, ee_offset }
    }

    /// Number of actuated degrees of freedom.
    pub fn dof(&self) -> usize {
        self.joints.len()
    }

    pub fn joint_names(&self) -> Vec<&str> {
        self.joints.iter().map(|j| j.name.as_str()).collect()
    }

    pub fn joints(&self) -> &[ChainJoint] {
        &self.joints
    }

    pub const fn ee_offset(&self) -> &Isometry3<f64> {
        &self.ee_offset
    }

    /// Sum of all link masses.
    pub fn mass(&self) -> f64 {
        self.joints.iter().map(|j| j.link_mass).sum()
    }

    /// End-effector pose in the chain root frame.
    ///
    /// # Panics
    ///
    /// Panics if `q.len() != self.dof()`.
    pub fn forward_kinematics(&self, q: &[f64]) -> Isometry3<f64> {
        assert_eq!(q.len(), self.dof(), "q.len() must equal chain DOF");

        let mut transform = Isometry3::identity();
        for (joint, &angle) in self.joints.iter().zip(q.iter()) {
            transform *= joint.origin;
            transform *= joint_transform(&joint.axis, joint.is_prismatic, angle);
        }
        transform * self.ee_offset
    }

    /// Per-joint frames for Jacobian and momentum computation.
    ///
    /// # Panics
    ///
    /// Panics if `q.len() != self.dof()`.
    pub fn frames(&self, q: &[f64]) -> ChainFrames {
        assert_eq!(q.len(), self.dof(), "q.len() must equal chain DOF");

        let mut transform = Isometry3::identity();
        let mut origins = Vec::with_capacity(self.dof());
        let mut axes = Vec::with_capacity(self.dof());
        let mut link_coms = Vec::with_capacity(self.dof());

        for (joint, &angle) in self.joints.iter().zip(q.iter()) {
            transform *= joint.origin;
            origins.push(transform.translation.vector);
            axes.push(transform.rotation * joint.axis.into_inner());

            transform *= joint_transform(&joint.axis, joint.is_prismatic, angle);
            link_coms.push((transform * Point3::from(joint.com_offset)).coords);
        }

        ChainFrames {
            origins,
            axes,
            link_coms,
            ee_position: (transform * self.ee_offset).translation.vector,
        }
    }

    /// Clamp joint positions to their limits.
    pub fn clamp_joints(&self, q: &mut [f64]) {
        for (value, joint) in q.iter_mut().zip(&self.joints) {
            *value = value.clamp(joint.lower_limit, joint.upper_limit);
        }
    }
}

/// Transform of a single joint at a given position.
fn joint_transform(axis: &UnitVector3<f64>, is_prismatic: bool, position: f64) -> Isometry3<f64> {
    if is_prismatic {
        Isometry3::from_parts(
            Translation3::from(axis.into_inner() * position),
            UnitQuaternion::identity(),
        )
    } else {
        Isometry3::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_axis_angle(axis, position),
        )
    }
}
