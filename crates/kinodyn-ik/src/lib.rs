//! Kinematics and inverse kinematics for floating-base legged robots.
//!
//! Provides the [`KinematicsModel`] capability trait (forward kinematics,
//! end-effector Jacobians, centroidal momentum matrix), a concrete
//! [`FloatingBaseModel`] assembled from per-limb [`KinematicChain`]s, the
//! free-flyer configuration manifold, and IK solvers that track centroidal
//! momentum and end-effector motion.
//!
//! # Architecture
//!
//! ```text
//! KinematicChain(s) ──► FloatingBaseModel ──► KinematicsFrame ──► IkSolver ──► joint velocity
//!                                                                      │
//!                                                   manifold::integrate ◄┘
//! ```

pub mod chain;
pub mod manifold;
pub mod model;
pub mod solver;

pub use chain::{ChainJoint, KinematicChain};
pub use model::{FloatingBaseModel, KinematicsFrame, KinematicsModel, Limb, QuadrupedGeometry};
pub use solver::{DampedLeastSquaresIk, IkSolver, IkTargets, PointContactIk};
