use std::collections::BTreeMap;
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duration::{WorkCalendar, DEFAULT_DAYS_PER_WEEK, DEFAULT_HOURS_PER_DAY};
use crate::report::{BarGlyphs, DEFAULT_DISPLAY_WIDTH, DEFAULT_PERCENTILES};
use crate::simulation::{SimulationOptions, DEFAULT_TRIALS};
use crate::store::AttributeKeys;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Missing task attribute name for `{0}`; set attributes.{0} in .taskmc.toml")]
    MissingAttribute(&'static str),
    #[error("Invalid setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },
}

/// On-disk configuration. Every field is optional so project and global
/// files can be layered.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskmcConfig {
    /// Backlog directory relative to the config file.
    pub root_dir: Option<String>,
    pub working_hours_per_day: Option<f64>,
    pub working_days_per_week: Option<f64>,
    pub trials: Option<usize>,
    /// Report width in characters.
    pub display_width: Option<usize>,
    pub seed: Option<u64>,
    pub parallel: Option<bool>,
    /// Headline probabilities, e.g. `[0.7, 0.95]`.
    pub percentiles: Option<Vec<f64>>,
    pub fill_glyph: Option<char>,
    pub empty_glyph: Option<char>,
    pub attributes: Option<AttributeConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AttributeConfig {
    pub estimated: Option<String>,
    pub actual: Option<String>,
    pub velocity: Option<String>,
}

pub fn config_filename_candidates() -> [&'static str; 2] {
    [".taskmc.toml", ".taskmcrc"]
}

pub fn resolve_user_home_dir() -> Option<PathBuf> {
    ["HOME", "USERPROFILE"].iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    })
}

pub fn resolve_taskmc_home_dir() -> Option<PathBuf> {
    if let Ok(value) = std::env::var("TASKMC_HOME") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    resolve_user_home_dir().map(|home| home.join(".taskmc"))
}

pub fn global_config_path() -> Option<PathBuf> {
    resolve_taskmc_home_dir().map(|home| home.join("config.toml"))
}

pub fn find_config_root(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .find(|candidate| {
            config_filename_candidates()
                .iter()
                .any(|name| candidate.join(name).is_file())
        })
        .map(Path::to_path_buf)
}

fn read_config(path: &Path) -> Result<TaskmcConfig, ConfigError> {
    let text = fs::read_to_string(path)?;
    toml::from_str::<TaskmcConfig>(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_config(repo_root: &Path) -> Result<Option<TaskmcConfig>, ConfigError> {
    for name in config_filename_candidates() {
        let path = repo_root.join(name);
        if path.is_file() {
            return read_config(&path).map(Some);
        }
    }
    Ok(None)
}

pub fn load_global_config() -> Result<Option<TaskmcConfig>, ConfigError> {
    match global_config_path() {
        Some(path) if path.is_file() => read_config(&path).map(Some),
        _ => Ok(None),
    }
}

/// Fully resolved settings, before validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub root_dir: Option<String>,
    pub calendar: WorkCalendar,
    pub trials: usize,
    pub display_width: usize,
    pub seed: Option<u64>,
    pub parallel: bool,
    pub percentiles: Vec<f64>,
    pub glyphs: BarGlyphs,
    pub attributes: AttributeKeys,
    /// Where each value came from: "project", "global", "cli" or "default".
    pub sources: BTreeMap<&'static str, &'static str>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::layered(None, None)
    }
}

impl Settings {
    /// Load the project config under `repo_root` and the global config, then layer them.
    pub fn resolve(repo_root: &Path) -> Result<Settings, ConfigError> {
        let project = load_config(repo_root)?;
        let global = load_global_config()?;
        Ok(Settings::layered(project.as_ref(), global.as_ref()))
    }

    /// Project values win over global values, which win over built-in defaults.
    pub fn layered(project: Option<&TaskmcConfig>, global: Option<&TaskmcConfig>) -> Settings {
        let mut sources = BTreeMap::new();
        let defaults = AttributeKeys::default();
        let glyph_defaults = BarGlyphs::default();

        let (root_dir, source) = layer(project, global, |c| c.root_dir.clone());
        sources.insert("root_dir", source);
        let (hours_per_day, source) = layer(project, global, |c| c.working_hours_per_day);
        sources.insert("working_hours_per_day", source);
        let (days_per_week, source) = layer(project, global, |c| c.working_days_per_week);
        sources.insert("working_days_per_week", source);
        let (trials, source) = layer(project, global, |c| c.trials);
        sources.insert("trials", source);
        let (display_width, source) = layer(project, global, |c| c.display_width);
        sources.insert("display_width", source);
        let (seed, source) = layer(project, global, |c| c.seed);
        sources.insert("seed", source);
        let (parallel, source) = layer(project, global, |c| c.parallel);
        sources.insert("parallel", source);
        let (percentiles, source) = layer(project, global, |c| c.percentiles.clone());
        sources.insert("percentiles", source);
        let (fill, source) = layer(project, global, |c| c.fill_glyph);
        sources.insert("fill_glyph", source);
        let (empty, source) = layer(project, global, |c| c.empty_glyph);
        sources.insert("empty_glyph", source);
        let (estimated, source) = layer(project, global, |c| attribute(c, |a| &a.estimated));
        sources.insert("attributes.estimated", source);
        let (actual, source) = layer(project, global, |c| attribute(c, |a| &a.actual));
        sources.insert("attributes.actual", source);
        let (velocity, source) = layer(project, global, |c| attribute(c, |a| &a.velocity));
        sources.insert("attributes.velocity", source);

        Settings {
            root_dir,
            calendar: WorkCalendar {
                hours_per_day: hours_per_day.unwrap_or(DEFAULT_HOURS_PER_DAY),
                days_per_week: days_per_week.unwrap_or(DEFAULT_DAYS_PER_WEEK),
            },
            trials: trials.unwrap_or(DEFAULT_TRIALS),
            display_width: display_width.unwrap_or(DEFAULT_DISPLAY_WIDTH),
            seed,
            parallel: parallel.unwrap_or(true),
            percentiles: percentiles.unwrap_or_else(|| DEFAULT_PERCENTILES.to_vec()),
            glyphs: BarGlyphs {
                fill: fill.unwrap_or(glyph_defaults.fill),
                empty: empty.unwrap_or(glyph_defaults.empty),
            },
            attributes: AttributeKeys {
                estimated: estimated.unwrap_or(defaults.estimated),
                actual: actual.unwrap_or(defaults.actual),
                velocity: velocity.unwrap_or(defaults.velocity),
            },
            sources,
        }
    }

    pub fn source(&self, key: &str) -> &'static str {
        self.sources.get(key).copied().unwrap_or("default")
    }

    /// Record a command-line override's provenance.
    pub fn mark_cli(&mut self, key: &'static str) {
        self.sources.insert(key, "cli");
    }

    pub fn simulation_options(&self) -> SimulationOptions {
        SimulationOptions {
            trials: self.trials,
            seed: self.seed,
            parallel: self.parallel,
        }
    }

    /// Check every value the pipeline relies on.
    pub fn validate(self) -> Result<ValidatedSettings, ConfigError> {
        if self.attributes.estimated.trim().is_empty() {
            return Err(ConfigError::MissingAttribute("estimated"));
        }
        if self.attributes.actual.trim().is_empty() {
            return Err(ConfigError::MissingAttribute("actual"));
        }
        let hours = self.calendar.hours_per_day;
        if !(hours > 0.0 && hours <= 24.0) {
            return Err(invalid("working_hours_per_day", format!("{hours} is not in (0, 24]")));
        }
        let days = self.calendar.days_per_week;
        if !(days > 0.0 && days <= 7.0) {
            return Err(invalid("working_days_per_week", format!("{days} is not in (0, 7]")));
        }
        if self.trials == 0 {
            return Err(invalid("trials", "at least one trial is required".to_string()));
        }
        if let Some(p) = self.percentiles.iter().find(|p| !(**p > 0.0 && **p <= 1.0)) {
            return Err(invalid("percentiles", format!("{p} is not in (0, 1]")));
        }
        // "YYYY.MM.DD HH:MM" plus the two space gap, plus at least one bar column.
        let min_width = 16 + 2 + 1;
        if self.display_width < min_width {
            return Err(invalid(
                "display_width",
                format!("{} is narrower than {min_width}", self.display_width),
            ));
        }
        let glyphs = [
            ("fill_glyph", self.glyphs.fill),
            ("empty_glyph", self.glyphs.empty),
        ];
        for (key, glyph) in glyphs {
            if glyph.is_control() {
                return Err(invalid(key, format!("{glyph:?} is not printable")));
            }
        }
        tracing::debug!(
            trials = self.trials,
            hours_per_day = hours,
            days_per_week = days,
            "settings validated"
        );
        Ok(ValidatedSettings(self))
    }
}

fn layer<T>(
    project: Option<&TaskmcConfig>,
    global: Option<&TaskmcConfig>,
    get: impl Fn(&TaskmcConfig) -> Option<T>,
) -> (Option<T>, &'static str) {
    if let Some(value) = project.and_then(&get) {
        return (Some(value), "project");
    }
    if let Some(value) = global.and_then(&get) {
        return (Some(value), "global");
    }
    (None, "default")
}

fn attribute(
    config: &TaskmcConfig,
    get: impl Fn(&AttributeConfig) -> &Option<String>,
) -> Option<String> {
    config
        .attributes
        .as_ref()
        .and_then(|attrs| get(attrs).clone())
}

fn invalid(key: &'static str, reason: String) -> ConfigError {
    ConfigError::InvalidSetting { key, reason }
}

/// Settings that passed [`Settings::validate`]. Only this type is accepted by
/// the forecast pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidatedSettings(Settings);

impl Deref for ValidatedSettings {
    type Target = Settings;

    fn deref(&self) -> &Settings {
        &self.0
    }
}
