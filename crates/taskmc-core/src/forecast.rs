//! End-to-end forecast: load the backlog, simulate, project, report.

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

use crate::config::{Settings, ValidatedSettings};
use crate::duration::Duration;
use crate::estimates::collect_estimates;
use crate::projection::project_dates;
use crate::report::{
    cumulative_probabilities, headline, histogram_rows, render_report, HistogramRow,
    PercentileDate,
};
use crate::simulation::{simulate, SimulationError, SimulationRun};
use crate::store::{AttributeFormatError, BacklogSnapshot, StoreError, TaskStore};
use crate::velocity::{derive_velocities, mean_velocity};

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Format(#[from] AttributeFormatError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

#[derive(Debug, Clone)]
pub struct Forecast {
    pub start: NaiveDateTime,
    pub estimates: Vec<Duration>,
    pub velocities: Vec<f64>,
    pub run: SimulationRun,
    /// Projected completion date per trial, ascending.
    pub dates: Vec<NaiveDateTime>,
    pub headline: Vec<PercentileDate>,
    pub histogram: Vec<HistogramRow>,
}

/// Machine readable digest of a [`Forecast`].
#[derive(Debug, Clone, Serialize)]
pub struct ForecastSummary {
    pub start: NaiveDateTime,
    pub seed: Option<u64>,
    pub trials: usize,
    pub pending_estimates: usize,
    pub remaining_estimate: Duration,
    pub velocity_samples: usize,
    pub mean_velocity: Option<f64>,
    pub earliest: Option<NaiveDateTime>,
    pub latest: Option<NaiveDateTime>,
    pub percentiles: Vec<PercentileDate>,
    pub histogram: Vec<HistogramRow>,
}

pub fn run_forecast(
    store: &dyn TaskStore,
    settings: &ValidatedSettings,
    start: NaiveDateTime,
) -> Result<Forecast, ForecastError> {
    let BacklogSnapshot { completed, pending } = store.load_snapshot()?;
    let velocities = derive_velocities(&completed, &settings.attributes, &settings.calendar)?;
    let estimates = collect_estimates(&pending, &settings.attributes, &settings.calendar)?;
    tracing::info!(
        completed = completed.len(),
        pending = pending.len(),
        velocity_samples = velocities.len(),
        estimates = estimates.len(),
        "backlog loaded"
    );

    let run = simulate(&estimates, &velocities, &settings.simulation_options())?;
    let dates = project_dates(start, &run, &settings.calendar);
    let probs = cumulative_probabilities(dates.len());
    let headline = headline(&dates, &settings.percentiles);
    let histogram = histogram_rows(&dates, &probs);

    Ok(Forecast {
        start,
        estimates,
        velocities,
        run,
        dates,
        headline,
        histogram,
    })
}

impl Forecast {
    pub fn render(&self, settings: &Settings) -> String {
        render_report(
            &self.headline,
            &self.histogram,
            settings.display_width,
            settings.glyphs,
        )
    }

    pub fn remaining_estimate(&self) -> Duration {
        Duration::from_secs(
            self.estimates
                .iter()
                .fold(0_u64, |total, estimate| total.saturating_add(estimate.as_secs())),
        )
    }

    pub fn summary(&self) -> ForecastSummary {
        ForecastSummary {
            start: self.start,
            seed: self.run.seed(),
            trials: self.run.len(),
            pending_estimates: self.estimates.len(),
            remaining_estimate: self.remaining_estimate(),
            velocity_samples: self.velocities.len(),
            mean_velocity: mean_velocity(&self.velocities),
            earliest: self.dates.first().copied(),
            latest: self.dates.last().copied(),
            percentiles: self.headline.clone(),
            histogram: self.histogram.clone(),
        }
    }
}
