//! Gap-free sequence of polynomial segments covering one axis of motion.

use kinodyn_core::TrajectoryError;

use crate::polynomial::PolynomialSegment;

/// Slack on segment joins and on the outer bounds, absorbing the rounding of
/// `it * dt` sample times.
pub const TIME_EPS: f64 = 1e-9;

/// Ordered, contiguous segments. Exactly one segment is active at any time:
/// segment `i` owns `[t0_i, t1_i)` and the last one also owns its end.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PiecewisePolynomial {
    segments: Vec<PolynomialSegment>,
}

impl PiecewisePolynomial {
    pub const fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Append a segment that must start where the previous one ends.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryError::NonContiguous`] on a gap or overlap.
    pub fn push(&mut self, segment: PolynomialSegment) -> Result<(), TrajectoryError> {
        if let Some(last) = self.segments.last() {
            if (segment.start_time() - last.end_time()).abs() > TIME_EPS {
                return Err(TrajectoryError::NonContiguous {
                    start: segment.start_time(),
                    previous_end: last.end_time(),
                });
            }
        }
        self.segments.push(segment);
        Ok(())
    }

    pub fn segments(&self) -> &[PolynomialSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// `(start, end)` of the covered interval.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        Some((
            self.segments.first()?.start_time(),
            self.segments.last()?.end_time(),
        ))
    }

    /// The segment active at `t`, or `None` outside the covered interval.
    pub fn segment_at(&self, t: f64) -> Option<&PolynomialSegment> {
        let (start, end) = self.bounds()?;
        if t < start - TIME_EPS || t > end + TIME_EPS {
            return None;
        }
        let idx = self.segments.partition_point(|seg| seg.end_time() <= t);
        self.segments.get(idx).or_else(|| self.segments.last())
    }

    /// Value at `t`, or `None` outside the covered interval.
    pub fn evaluate(&self, t: f64) -> Option<f64> {
        self.segment_at(t).map(|seg| seg.evaluate(t))
    }

    /// Time derivative at `t`, or `None` outside the covered interval.
    pub fn derivative(&self, t: f64) -> Option<f64> {
        self.segment_at(t).map(|seg| seg.derivative(t))
    }
}
