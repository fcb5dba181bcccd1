//! Evidence-based scheduling for a markdown task backlog.
//!
//! Historical velocity (estimated / actual time) of completed tasks is
//! resampled over the pending estimates to forecast a distribution of
//! completion dates.

pub mod backlog;
pub mod config;
pub mod duration;
pub mod estimates;
pub mod forecast;
pub mod projection;
pub mod report;
pub mod simulation;
pub mod store;
pub mod task;
pub mod velocity;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
