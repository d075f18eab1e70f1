//! End-effector reference trajectories built from a contact schedule.

use kinodyn_core::{PlannerConfig, TrajectoryError};
use nalgebra::Vector3;

use crate::contact::{ContactEvent, ContactSchedule};
use crate::piecewise::{PiecewisePolynomial, TIME_EPS};
use crate::polynomial::PolynomialSegment;

/// Index of the vertical axis.
const Z_AXIS: usize = 2;

/// Position/velocity reference of one end-effector at one timestep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferenceSample {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    /// True iff `velocity` is exactly zero.
    ///
    /// A swinging foot whose interpolated velocity happens to vanish at a
    /// sample (e.g. the instant of lift-off) is reported as in contact.
    pub in_contact: bool,
}

impl ReferenceSample {
    pub fn new(position: Vector3<f64>, velocity: Vector3<f64>) -> Self {
        Self {
            position,
            velocity,
            in_contact: velocity == Vector3::zeros(),
        }
    }
}

/// Three per-axis piecewise polynomials for one end-effector.
#[derive(Clone, Debug, PartialEq)]
pub struct EndEffectorTrajectory {
    end_effector: usize,
    axes: [PiecewisePolynomial; 3],
}

impl EndEffectorTrajectory {
    pub const fn end_effector(&self) -> usize {
        self.end_effector
    }

    pub fn axis(&self, axis: usize) -> &PiecewisePolynomial {
        &self.axes[axis]
    }

    /// Position and velocity at `t`.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryError::OutOfBounds`] if `t` is not covered.
    pub fn sample(&self, t: f64) -> Result<ReferenceSample, TrajectoryError> {
        let mut position = Vector3::zeros();
        let mut velocity = Vector3::zeros();
        for (axis, traj) in self.axes.iter().enumerate() {
            let segment = traj.segment_at(t).ok_or_else(|| {
                let (start, end) = traj.bounds().unwrap_or((f64::NAN, f64::NAN));
                TrajectoryError::OutOfBounds {
                    end_effector: self.end_effector,
                    axis,
                    time: t,
                    start,
                    end,
                }
            })?;
            position[axis] = segment.evaluate(t);
            velocity[axis] = segment.derivative(t);
        }
        Ok(ReferenceSample::new(position, velocity))
    }
}

/// Sampled references for every timestep and end-effector.
#[derive(Clone, Debug, PartialEq)]
pub struct EndEffectorReferences {
    num_time_steps: usize,
    num_end_effectors: usize,
    /// Row-major: `samples[it * num_end_effectors + eff]`.
    samples: Vec<ReferenceSample>,
}

impl EndEffectorReferences {
    pub const fn num_time_steps(&self) -> usize {
        self.num_time_steps
    }

    pub const fn num_end_effectors(&self) -> usize {
        self.num_end_effectors
    }

    /// Reference of end-effector `eff` at timestep `it`.
    pub fn sample(&self, it: usize, eff: usize) -> &ReferenceSample {
        &self.samples[it * self.num_end_effectors + eff]
    }

    /// References of all end-effectors at timestep `it`.
    pub fn step(&self, it: usize) -> &[ReferenceSample] {
        let start = it * self.num_end_effectors;
        &self.samples[start..start + self.num_end_effectors]
    }

    pub fn positions(&self, it: usize) -> Vec<Vector3<f64>> {
        self.step(it).iter().map(|s| s.position).collect()
    }

    pub fn velocities(&self, it: usize) -> Vec<Vector3<f64>> {
        self.step(it).iter().map(|s| s.velocity).collect()
    }

    pub fn contacts(&self, it: usize) -> Vec<bool> {
        self.step(it).iter().map(|s| s.in_contact).collect()
    }

    /// Motion of a single end-effector over the whole horizon.
    pub fn motion(&self, eff: usize) -> impl Iterator<Item = &ReferenceSample> + '_ {
        self.samples
            .iter()
            .skip(eff)
            .step_by(self.num_end_effectors.max(1))
    }
}

/// Builds per-axis piecewise trajectories from a contact schedule and
/// samples them on the planning grid.
#[derive(Clone, Debug)]
pub struct EndEffectorTrajectoryGenerator {
    /// Swing apex height above the higher of the two contacts (m).
    clearance: f64,
}

impl EndEffectorTrajectoryGenerator {
    pub const fn new(clearance: f64) -> Self {
        Self { clearance }
    }

    pub const fn from_config(config: &PlannerConfig) -> Self {
        Self::new(config.foot_clearance)
    }

    pub const fn clearance(&self) -> f64 {
        self.clearance
    }

    /// Build the trajectory of every end-effector in the schedule.
    ///
    /// # Errors
    ///
    /// Propagates [`TrajectoryError::NonContiguous`] from segment assembly.
    pub fn build(
        &self,
        schedule: &ContactSchedule,
    ) -> Result<Vec<EndEffectorTrajectory>, TrajectoryError> {
        (0..schedule.num_end_effectors())
            .map(|eff| self.build_end_effector(eff, schedule.events(eff)))
            .collect()
    }

    /// Build one end-effector's trajectory from its contact events.
    pub fn build_end_effector(
        &self,
        eff: usize,
        events: &[ContactEvent],
    ) -> Result<EndEffectorTrajectory, TrajectoryError> {
        let mut axes = [
            PiecewisePolynomial::new(),
            PiecewisePolynomial::new(),
            PiecewisePolynomial::new(),
        ];

        for (i, contact) in events.iter().enumerate() {
            for (axis, traj) in axes.iter_mut().enumerate() {
                traj.push(PolynomialSegment::constant(
                    contact.start_time(),
                    contact.end_time(),
                    contact.position()[axis],
                ))?;
            }

            let Some(next) = events.get(i + 1) else {
                continue;
            };
            let (lift_off, touch_down) = (contact.end_time(), next.start_time());
            if touch_down - lift_off <= TIME_EPS {
                continue;
            }
            for (axis, traj) in axes.iter_mut().enumerate() {
                let from = contact.position()[axis];
                let to = next.position()[axis];
                let via = (axis == Z_AXIS).then(|| from.max(to) + self.clearance);
                traj.push(PolynomialSegment::transition(
                    lift_off, touch_down, from, to, via,
                ))?;
            }
        }

        if axes[0].is_empty() {
            return Err(TrajectoryError::Empty);
        }
        Ok(EndEffectorTrajectory {
            end_effector: eff,
            axes,
        })
    }

    /// Sample trajectories at `it * dt` for `it` in `0..num_time_steps`.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryError::OutOfBounds`] if the schedule does not
    /// cover a sample time.
    #[allow(clippy::cast_precision_loss)]
    pub fn sample(
        trajectories: &[EndEffectorTrajectory],
        num_time_steps: usize,
        dt: f64,
    ) -> Result<EndEffectorReferences, TrajectoryError> {
        let num_end_effectors = trajectories.len();
        let mut samples = Vec::with_capacity(num_time_steps * num_end_effectors);
        for it in 0..num_time_steps {
            let t = it as f64 * dt;
            for traj in trajectories {
                samples.push(traj.sample(t)?);
            }
        }
        Ok(EndEffectorReferences {
            num_time_steps,
            num_end_effectors,
            samples,
        })
    }

    /// Build and sample in one step.
    pub fn generate(
        &self,
        schedule: &ContactSchedule,
        num_time_steps: usize,
        dt: f64,
    ) -> Result<EndEffectorReferences, TrajectoryError> {
        let trajectories = self.build(schedule)?;
        Self::sample(&trajectories, num_time_steps, dt)
    }
}
