//! Scalar polynomial pieces for end-effector trajectories.
//!
//! A segment is stored in the normalized phase `s = (t - t0) / (t1 - t0)`,
//! so evaluation is a Horner pass over monomial coefficients and the time
//! derivative is the analytic phase derivative divided by the duration.
//!
//! Transitions use the minimum-jerk quintic
//!
//! ```text
//! x(s) = x0 + (x1 - x0) (10 s^3 - 15 s^4 + 6 s^5)
//! ```
//!
//! which has zero velocity and acceleration at both ends. A midpoint via-point
//! adds `c s^3 (1 - s)^3`: that term has a triple root at each end, so the
//! boundary conditions survive and the degree rises to six.

/// Value of `s^3 (1 - s)^3` at `s = 0.5`.
const VIA_BUMP_AT_MID: f64 = 1.0 / 64.0;

/// One scalar interpolation piece over `[t0, t1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct PolynomialSegment {
    t0: f64,
    t1: f64,
    /// Monomial coefficients in the normalized phase, lowest order first.
    coeffs: Vec<f64>,
}

impl PolynomialSegment {
    /// Degenerate segment holding `value` over `[t0, t1]`.
    pub fn constant(t0: f64, t1: f64, value: f64) -> Self {
        Self {
            t0,
            t1,
            coeffs: vec![value],
        }
    }

    /// Smooth blend from `start` at `t0` to `end` at `t1` with zero boundary
    /// velocity and acceleration.
    ///
    /// With `via = Some(v)` the segment also passes through `v` at the
    /// midpoint of the interval.
    pub fn transition(t0: f64, t1: f64, start: f64, end: f64, via: Option<f64>) -> Self {
        let delta = end - start;
        let coeffs = match via {
            None => vec![start, 0.0, 0.0, 10.0 * delta, -15.0 * delta, 6.0 * delta],
            Some(via) => {
                // Quintic passes through start + delta / 2 at s = 0.5.
                let c = (via - start - 0.5 * delta) / VIA_BUMP_AT_MID;
                // s^3 (1 - s)^3 = s^3 - 3 s^4 + 3 s^5 - s^6
                vec![
                    start,
                    0.0,
                    0.0,
                    10.0 * delta + c,
                    -15.0 * delta - 3.0 * c,
                    6.0 * delta + 3.0 * c,
                    -c,
                ]
            }
        };
        Self { t0, t1, coeffs }
    }

    pub const fn start_time(&self) -> f64 {
        self.t0
    }

    pub const fn end_time(&self) -> f64 {
        self.t1
    }

    pub fn duration(&self) -> f64 {
        self.t1 - self.t0
    }

    /// Polynomial degree in the phase variable.
    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    /// Whether the segment is constant in time.
    pub fn is_constant(&self) -> bool {
        self.coeffs.len() == 1
    }

    /// Whether `t` lies within `[t0, t1]`.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.t0 && t <= self.t1
    }

    /// Interpolated value at `t`. Times outside `[t0, t1]` are clamped.
    pub fn evaluate(&self, t: f64) -> f64 {
        let s = self.phase(t);
        self.coeffs.iter().rev().fold(0.0, |acc, &c| acc * s + c)
    }

    /// Analytic time derivative at `t`. Times outside `[t0, t1]` are clamped.
    ///
    /// Exactly zero on constant segments.
    #[allow(clippy::cast_precision_loss)]
    pub fn derivative(&self, t: f64) -> f64 {
        if self.is_constant() {
            return 0.0;
        }
        let s = self.phase(t);
        let ds = self
            .coeffs
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .fold(0.0, |acc, (k, &c)| acc * s + k as f64 * c);
        ds / self.duration()
    }

    fn phase(&self, t: f64) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 {
            return 0.0;
        }
        ((t - self.t0) / duration).clamp(0.0, 1.0)
    }
}
