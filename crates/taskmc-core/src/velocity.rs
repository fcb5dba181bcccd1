//! Historical estimation accuracy of completed work.

use serde::Serialize;

use crate::duration::{Duration, WorkCalendar};
use crate::store::{AttributeFormatError, AttributeKeys, TaskRecord};

/// A completed task's estimate, time actually spent, and their ratio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VelocityObservation {
    pub task_id: String,
    pub estimated: Duration,
    pub actual: Duration,
    /// `estimated / actual`; above 1.0 means the task went faster than estimated.
    pub velocity: f64,
}

/// Velocity samples for every completed record that has both an estimate and
/// an actual duration.
pub fn derive_velocities(
    completed: &[TaskRecord],
    keys: &AttributeKeys,
    calendar: &WorkCalendar,
) -> Result<Vec<f64>, AttributeFormatError> {
    Ok(derive_observations(completed, keys, calendar)?
        .into_iter()
        .map(|observation| observation.velocity)
        .collect())
}

pub fn derive_observations(
    completed: &[TaskRecord],
    keys: &AttributeKeys,
    calendar: &WorkCalendar,
) -> Result<Vec<VelocityObservation>, AttributeFormatError> {
    let mut observations = Vec::new();
    for record in completed {
        let has_ratio_inputs =
            record.get(&keys.estimated).is_some() && record.get(&keys.actual).is_some();
        if !has_ratio_inputs {
            if record.get(&keys.velocity).is_some() {
                // No conversion from a stored velocity value is defined yet.
                tracing::debug!(task = %record.id, "ignoring precomputed velocity");
            }
            continue;
        }
        let (Some(estimated), Some(actual)) = (
            record.duration(&keys.estimated, calendar)?,
            record.duration(&keys.actual, calendar)?,
        ) else {
            continue;
        };
        if actual.is_zero() {
            tracing::debug!(task = %record.id, "skipping task with zero active time");
            continue;
        }
        if estimated.is_zero() {
            tracing::debug!(task = %record.id, "skipping task with zero estimate");
            continue;
        }
        observations.push(VelocityObservation {
            task_id: record.id.clone(),
            estimated,
            actual,
            velocity: estimated.as_secs_f64() / actual.as_secs_f64(),
        });
    }
    Ok(observations)
}

/// Arithmetic mean of the samples, `None` when there are none.
pub fn mean_velocity(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> AttributeKeys {
        AttributeKeys::default()
    }

    fn done(id: &str, estimated: &str, actual: &str) -> TaskRecord {
        TaskRecord::new(id)
            .with("estimatedtime", estimated)
            .with("totalactivetime", actual)
    }

    #[test]
    fn ratio_is_estimated_over_actual() {
        let records = vec![done("task-001", "2h", "1h"), done("task-002", "1h", "PT2H")];
        let velocities =
            derive_velocities(&records, &keys(), &WorkCalendar::default()).expect("derive");
        assert_eq!(velocities, vec![2.0, 0.5]);
    }

    #[test]
    fn records_missing_attributes_are_skipped() {
        let records = vec![
            TaskRecord::new("task-001"),
            TaskRecord::new("task-002").with("estimatedtime", "2h"),
            TaskRecord::new("task-003").with("totalactivetime", "2h"),
            TaskRecord::new("task-004").with("velocity", "1.5"),
            done("task-005", "3h", "3h"),
        ];
        let velocities =
            derive_velocities(&records, &keys(), &WorkCalendar::default()).expect("derive");
        assert_eq!(velocities, vec![1.0]);
    }

    #[test]
    fn zero_actual_time_is_skipped() {
        let records = vec![done("task-001", "2h", "0"), done("task-002", "2h", "4h")];
        let velocities =
            derive_velocities(&records, &keys(), &WorkCalendar::default()).expect("derive");
        assert_eq!(velocities, vec![0.5]);
    }

    #[test]
    fn zero_estimate_yields_no_sample() {
        let records = vec![done("task-001", "0", "1h"), done("task-002", "2h", "1h")];
        let velocities =
            derive_velocities(&records, &keys(), &WorkCalendar::default()).expect("derive");
        assert_eq!(velocities, vec![2.0]);
        assert_eq!(mean_velocity(&velocities), Some(2.0));
    }

    #[test]
    fn malformed_duration_is_an_error() {
        let records = vec![done("task-001", "2h", "1h"), done("task-002", "a while", "1h")];
        let err = derive_velocities(&records, &keys(), &WorkCalendar::default())
            .expect_err("malformed");
        assert_eq!(err.task_id, "task-002");
    }

    #[test]
    fn observations_keep_task_context() {
        let records = vec![done("task-007", "1d", "4h")];
        let observations =
            derive_observations(&records, &keys(), &WorkCalendar::default()).expect("derive");
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].task_id, "task-007");
        assert_eq!(observations[0].estimated.as_secs(), 28_800);
        assert_eq!(observations[0].actual.as_secs(), 14_400);
        assert_eq!(observations[0].velocity, 2.0);
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean_velocity(&[]), None);
        assert_eq!(mean_velocity(&[1.0, 2.0, 3.0]), Some(2.0));
    }
}
