//! Contact plans and their normalized, validated schedule form.

use kinodyn_core::ScheduleError;
use nalgebra::Vector3;

use crate::piecewise::TIME_EPS;

/// Raw contact record as produced by a contact planner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactRecord {
    pub start_time: f64,
    pub end_time: f64,
    /// World-frame contact position.
    pub position: Vector3<f64>,
}

impl ContactRecord {
    pub const fn new(start_time: f64, end_time: f64, position: Vector3<f64>) -> Self {
        Self {
            start_time,
            end_time,
            position,
        }
    }
}

/// Read-only source of per-end-effector contact records.
pub trait ContactPlanProvider {
    /// Number of end-effectors the plan covers.
    fn num_end_effectors(&self) -> usize;

    /// Time-ordered contact records for end-effector `eff`.
    fn contact_records(&self, eff: usize) -> &[ContactRecord];
}

/// In-memory contact plan: `records[eff]` is the record list of one end-effector.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContactPlan {
    records: Vec<Vec<ContactRecord>>,
}

impl ContactPlan {
    pub const fn new(records: Vec<Vec<ContactRecord>>) -> Self {
        Self { records }
    }
}

impl ContactPlanProvider for ContactPlan {
    fn num_end_effectors(&self) -> usize {
        self.records.len()
    }

    fn contact_records(&self, eff: usize) -> &[ContactRecord] {
        self.records.get(eff).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// One immutable contact placement of one end-effector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactEvent {
    end_effector: usize,
    position: Vector3<f64>,
    start_time: f64,
    end_time: f64,
}

impl ContactEvent {
    pub const fn end_effector(&self) -> usize {
        self.end_effector
    }

    pub const fn position(&self) -> &Vector3<f64> {
        &self.position
    }

    pub const fn start_time(&self) -> f64 {
        self.start_time
    }

    pub const fn end_time(&self) -> f64 {
        self.end_time
    }
}

/// Validated contact schedule.
///
/// For every end-effector the events are non-empty, time-sorted and
/// non-overlapping (`end_time[i] <= start_time[i + 1]`); gaps are swing phases.
#[derive(Clone, Debug, PartialEq)]
pub struct ContactSchedule {
    events: Vec<Vec<ContactEvent>>,
}

impl ContactSchedule {
    /// Extract and validate a schedule from a contact plan.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::NoContacts`] if any end-effector has no
    /// records, and the interval errors if records are inverted or overlap.
    pub fn from_provider(plan: &dyn ContactPlanProvider) -> Result<Self, ScheduleError> {
        let n_eff = plan.num_end_effectors();
        if n_eff == 0 {
            return Err(ScheduleError::NoEndEffectors);
        }

        let mut events = Vec::with_capacity(n_eff);
        for eff in 0..n_eff {
            let records = plan.contact_records(eff);
            if records.is_empty() {
                return Err(ScheduleError::NoContacts { end_effector: eff });
            }

            let mut eff_events: Vec<ContactEvent> = Vec::with_capacity(records.len());
            for (index, record) in records.iter().enumerate() {
                if record.end_time < record.start_time {
                    return Err(ScheduleError::InvertedInterval {
                        end_effector: eff,
                        index,
                        start: record.start_time,
                        end: record.end_time,
                    });
                }
                if let Some(previous) = eff_events.last() {
                    if record.start_time < previous.end_time - TIME_EPS {
                        return Err(ScheduleError::Overlap {
                            end_effector: eff,
                            index,
                            start: record.start_time,
                            previous_end: previous.end_time,
                        });
                    }
                }
                eff_events.push(ContactEvent {
                    end_effector: eff,
                    position: record.position,
                    start_time: record.start_time,
                    end_time: record.end_time,
                });
            }
            events.push(eff_events);
        }

        Ok(Self { events })
    }

    pub fn num_end_effectors(&self) -> usize {
        self.events.len()
    }

    /// Contact events of end-effector `eff`, time-ordered.
    pub fn events(&self, eff: usize) -> &[ContactEvent] {
        self.events.get(eff).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Position of each end-effector's first contact.
    pub fn initial_positions(&self) -> Vec<Vector3<f64>> {
        self.events.iter().map(|e| e[0].position).collect()
    }
}
