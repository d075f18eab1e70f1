use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_num_time_steps() -> usize {
    100
}
const fn default_dt() -> f64 {
    0.01
}
const fn default_kin_dyn_iterations() -> u32 {
    2
}
const fn default_max_initial_iterations() -> u32 {
    50
}
const fn default_initial_tolerance() -> f64 {
    1e-5
}
const fn default_orientation_gain() -> f64 {
    1e-2
}
const fn default_initial_orientation_gain() -> f64 {
    1e-2
}
const fn default_foot_clearance() -> f64 {
    0.1
}
const fn default_momentum_weight() -> f64 {
    1.0
}
const fn default_contact_weight() -> f64 {
    100.0
}
const fn default_swing_weight() -> f64 {
    10.0
}
const fn default_com_gain() -> f64 {
    1.0
}
const fn default_endeff_gain() -> f64 {
    1.0
}
const fn default_regularization() -> f64 {
    1e-6
}
const fn default_max_joint_velocity() -> f64 {
    50.0
}
const fn default_max_solver_iters() -> u32 {
    100
}

// ---------------------------------------------------------------------------
// IkConfig
// ---------------------------------------------------------------------------

/// Task weights and feedback gains for the per-timestep IK solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IkConfig {
    /// Weight of the centroidal momentum task.
    #[serde(default = "default_momentum_weight")]
    pub momentum_weight: f64,

    /// Weight of an end-effector velocity task while the foot is in contact.
    #[serde(default = "default_contact_weight")]
    pub contact_weight: f64,

    /// Weight of an end-effector velocity task while the foot is swinging.
    #[serde(default = "default_swing_weight")]
    pub swing_weight: f64,

    /// Proportional gain turning CoM position error into a linear-momentum
    /// correction (scaled by total mass).
    #[serde(default = "default_com_gain")]
    pub com_gain: f64,

    /// Proportional gain turning end-effector position error into a
    /// velocity correction.
    #[serde(default = "default_endeff_gain")]
    pub endeff_gain: f64,

    /// Tikhonov regularization on the generalized velocity.
    #[serde(default = "default_regularization")]
    pub regularization: f64,

    /// Symmetric bound on every generalized velocity component.
    #[serde(default = "default_max_joint_velocity")]
    pub max_joint_velocity: f64,

    /// Iteration cap handed to the QP solver.
    #[serde(default = "default_max_solver_iters")]
    pub max_solver_iters: u32,
}

impl Default for IkConfig {
    fn default() -> Self {
        Self {
            momentum_weight: default_momentum_weight(),
            contact_weight: default_contact_weight(),
            swing_weight: default_swing_weight(),
            com_gain: default_com_gain(),
            endeff_gain: default_endeff_gain(),
            regularization: default_regularization(),
            max_joint_velocity: default_max_joint_velocity(),
            max_solver_iters: default_max_solver_iters(),
        }
    }
}

impl IkConfig {
    /// Validate weights and gains. Returns Err on invalid values.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("ik.momentum_weight", self.momentum_weight),
            ("ik.contact_weight", self.contact_weight),
            ("ik.swing_weight", self.swing_weight),
            ("ik.com_gain", self.com_gain),
            ("ik.endeff_gain", self.endeff_gain),
        ];
        for (field, value) in non_negative {
            if !(value >= 0.0) {
                return Err(invalid(field, "must be >= 0"));
            }
        }
        if !(self.regularization > 0.0) {
            return Err(invalid("ik.regularization", "must be > 0"));
        }
        if !(self.max_joint_velocity > 0.0) {
            return Err(invalid("ik.max_joint_velocity", "must be > 0"));
        }
        if self.max_solver_iters == 0 {
            return Err(invalid("ik.max_solver_iters", "must be > 0"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PlannerConfig
// ---------------------------------------------------------------------------

/// Immutable planner configuration, passed to every component at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Number of timesteps in the planning horizon.
    #[serde(default = "default_num_time_steps")]
    pub num_time_steps: usize,

    /// Timestep in seconds.
    #[serde(default = "default_dt")]
    pub dt: f64,

    /// Number of kinematics+dynamics rounds after the first dynamics pass;
    /// 0 stops after the dynamics-only pass.
    #[serde(default = "default_kin_dyn_iterations")]
    pub kin_dyn_iterations: u32,

    /// Iteration cap for the initial-posture solve.
    #[serde(default = "default_max_initial_iterations")]
    pub max_initial_iterations: u32,

    /// Correction norm below which the initial-posture solve stops.
    #[serde(default = "default_initial_tolerance")]
    pub initial_tolerance: f64,

    /// Gain on the base-leveling term blended into the angular-momentum target.
    #[serde(default = "default_orientation_gain")]
    pub orientation_gain: f64,

    /// Base-leveling gain of the initial-posture solve, independent of the
    /// tracking gain.
    #[serde(default = "default_initial_orientation_gain")]
    pub initial_orientation_gain: f64,

    /// Swing-foot clearance above the higher of the two contact heights (m).
    #[serde(default = "default_foot_clearance")]
    pub foot_clearance: f64,

    /// Joint angles seeding the initial-posture solve. Empty = model neutral.
    #[serde(default)]
    pub default_joint_positions: Vec<f64>,

    /// IK task weights and gains.
    #[serde(default)]
    pub ik: IkConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            num_time_steps: default_num_time_steps(),
            dt: default_dt(),
            kin_dyn_iterations: default_kin_dyn_iterations(),
            max_initial_iterations: default_max_initial_iterations(),
            initial_tolerance: default_initial_tolerance(),
            orientation_gain: default_orientation_gain(),
            initial_orientation_gain: default_initial_orientation_gain(),
            foot_clearance: default_foot_clearance(),
            default_joint_positions: Vec::new(),
            ik: IkConfig::default(),
        }
    }
}

impl PlannerConfig {
    /// Validate configuration. Returns Err on invalid values.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_time_steps == 0 {
            return Err(ConfigError::ZeroTimeSteps);
        }
        if !(self.dt > 0.0) || !self.dt.is_finite() {
            return Err(ConfigError::InvalidDt(self.dt));
        }
        if self.max_initial_iterations == 0 {
            return Err(invalid("max_initial_iterations", "must be >= 1"));
        }
        if !(self.initial_tolerance > 0.0) {
            return Err(invalid("initial_tolerance", "must be > 0"));
        }
        if !(self.orientation_gain >= 0.0) {
            return Err(invalid("orientation_gain", "must be >= 0"));
        }
        if !(self.initial_orientation_gain >= 0.0) {
            return Err(invalid("initial_orientation_gain", "must be >= 0"));
        }
        if !(self.foot_clearance >= 0.0) {
            return Err(invalid("foot_clearance", "must be >= 0"));
        }
        self.ik.validate()
    }

    /// Planning horizon in seconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn horizon(&self) -> f64 {
        self.num_time_steps as f64 * self.dt
    }

    /// Parse and validate from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}
