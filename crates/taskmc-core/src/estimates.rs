use crate::duration::{Duration, WorkCalendar};
use crate::store::{AttributeFormatError, AttributeKeys, TaskRecord};

/// Remaining estimates for the pending backlog, one per estimated record.
///
/// Time already spent on a started task is not subtracted.
pub fn collect_estimates(
    pending: &[TaskRecord],
    keys: &AttributeKeys,
    calendar: &WorkCalendar,
) -> Result<Vec<Duration>, AttributeFormatError> {
    let mut estimates = Vec::with_capacity(pending.len());
    for record in pending {
        match record.duration(&keys.estimated, calendar)? {
            Some(estimate) => estimates.push(estimate),
            None => tracing::debug!(task = %record.id, "pending task has no estimate"),
        }
    }
    Ok(estimates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_one_estimate_per_estimated_task() {
        let pending = vec![
            TaskRecord::new("task-001").with("estimatedtime", "PT1H30M"),
            TaskRecord::new("task-002"),
            TaskRecord::new("task-003").with("estimatedtime", "1d"),
            TaskRecord::new("task-004").with("estimatedtime", "0"),
        ];
        let estimates =
            collect_estimates(&pending, &AttributeKeys::default(), &WorkCalendar::default())
                .expect("collect");
        assert_eq!(
            estimates,
            vec![
                Duration::from_secs(5_400),
                Duration::from_secs(28_800),
                Duration::ZERO
            ]
        );
    }

    #[test]
    fn honours_custom_attribute_names() {
        let keys = AttributeKeys {
            estimated: "estimate".to_string(),
            ..AttributeKeys::default()
        };
        let pending = vec![
            TaskRecord::new("task-001").with("estimate", "2h"),
            TaskRecord::new("task-002").with("estimatedtime", "2h"),
        ];
        let estimates =
            collect_estimates(&pending, &keys, &WorkCalendar::default()).expect("collect");
        assert_eq!(estimates, vec![Duration::from_secs(7_200)]);
    }

    #[test]
    fn malformed_estimate_is_an_error() {
        let pending = vec![TaskRecord::new("task-001").with("estimatedtime", "2 fortnights")];
        let err = collect_estimates(&pending, &AttributeKeys::default(), &WorkCalendar::default())
            .expect_err("malformed");
        assert_eq!(err.task_id, "task-001");
    }
}
