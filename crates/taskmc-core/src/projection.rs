use chrono::{NaiveDateTime, TimeDelta};

use crate::duration::{Duration, WorkCalendar};
use crate::simulation::SimulationRun;

/// Map working-time trial totals onto wall-clock dates after `start`.
///
/// Working time is spread evenly over every calendar hour: with an 8h day and
/// a 5 day week each working second takes `7/5 * 24/8` wall-clock seconds. No
/// weekends or holidays are modelled.
///
/// Dates past the end of the representable range are clamped to
/// `NaiveDateTime::MAX`; see [`is_out_of_range`].
pub fn project_dates(
    start: NaiveDateTime,
    run: &SimulationRun,
    calendar: &WorkCalendar,
) -> Vec<NaiveDateTime> {
    let scale = calendar.calendar_scale();
    let mut clamped = 0_usize;
    let dates: Vec<NaiveDateTime> = run
        .results()
        .iter()
        .map(|&working| {
            project_date(start, working, scale).unwrap_or_else(|| {
                clamped += 1;
                NaiveDateTime::MAX
            })
        })
        .collect();
    if clamped > 0 {
        tracing::warn!(
            clamped,
            trials = run.len(),
            "projected completion is past the last representable date"
        );
    }
    dates
}

/// True for a projection that was clamped by [`project_dates`].
pub fn is_out_of_range(date: NaiveDateTime) -> bool {
    date == NaiveDateTime::MAX
}

fn project_date(start: NaiveDateTime, working: Duration, scale: f64) -> Option<NaiveDateTime> {
    let wall_clock = (working.as_secs_f64() * scale).round();
    TimeDelta::try_seconds(wall_clock as i64).and_then(|delta| start.checked_add_signed(delta))
}
