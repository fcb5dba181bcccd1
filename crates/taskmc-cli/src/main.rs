use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use taskmc_core::backlog::{locate_backlog_dir, resolve_backlog_dir};
use taskmc_core::config::{find_config_root, Settings, ValidatedSettings};
use taskmc_core::forecast::run_forecast;
use taskmc_core::store::{BacklogStore, TaskStore};
use taskmc_core::velocity::{derive_observations, mean_velocity};

mod version;

#[derive(Parser)]
#[command(
    name = "taskmc",
    version = version::FULL,
    about = "Evidence-based completion forecasts for a markdown task backlog"
)]
struct Cli {
    /// Project or backlog directory (defaults to the nearest one above the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Simulate the pending backlog and print completion probabilities (default)
    Forecast(ForecastArgs),
    /// List the velocity of every completed task
    Velocities {
        #[arg(long)]
        json: bool,
    },
    /// Show resolved settings and where each value came from
    Config {
        #[arg(long)]
        json: bool,
    },
    /// Print version information
    Version,
}

#[derive(Args, Default)]
struct ForecastArgs {
    /// Forecast start, "YYYY-MM-DD HH:MM" (defaults to now)
    #[arg(long, value_parser = parse_start)]
    start: Option<NaiveDateTime>,
    /// Number of simulated trials
    #[arg(long)]
    trials: Option<usize>,
    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
    /// Report width in characters
    #[arg(long)]
    width: Option<usize>,
    /// Run trials on the current thread only
    #[arg(long)]
    serial: bool,
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let command = cli
        .command
        .unwrap_or_else(|| Command::Forecast(ForecastArgs::default()));
    match command {
        Command::Forecast(args) => forecast(cli.root.as_deref(), args),
        Command::Velocities { json } => velocities(cli.root.as_deref(), json),
        Command::Config { json } => show_config(cli.root.as_deref(), json),
        Command::Version => {
            println!("taskmc {}", version::FULL);
            Ok(())
        }
    }
}

/// `TASKMC_LOG` wins over `-v`; output goes to stderr so reports stay pipeable.
fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "taskmc=debug,taskmc_core=debug",
        _ => "taskmc=trace,taskmc_core=trace",
    };
    let filter =
        EnvFilter::try_from_env("TASKMC_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

fn parse_start(value: &str) -> Result<NaiveDateTime, String> {
    let value = value.trim();
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("expected \"YYYY-MM-DD HH:MM\", got `{value}`"))
}

fn now_to_the_minute() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_second(0)
        .and_then(|value| value.with_nanosecond(0))
        .unwrap_or(now)
}

struct Workspace {
    config_root: PathBuf,
    settings: Settings,
}

fn workspace(root: Option<&Path>) -> Result<Workspace> {
    let start = match root {
        Some(root) => root.to_path_buf(),
        None => std::env::current_dir().context("current directory")?,
    };
    let config_root = find_config_root(&start).unwrap_or_else(|| start.clone());
    let settings = Settings::resolve(&config_root)
        .with_context(|| format!("load settings for {}", config_root.display()))?;
    Ok(Workspace {
        config_root,
        settings,
    })
}

fn open_store(root: Option<&Path>, workspace: &Workspace) -> Result<BacklogStore> {
    let root_dir = workspace.settings.root_dir.as_deref();
    let backlog_dir = match root {
        Some(root) => resolve_backlog_dir(root, root_dir)
            .or_else(|_| resolve_backlog_dir(&workspace.config_root, root_dir))?,
        None => resolve_backlog_dir(&workspace.config_root, root_dir).or_else(|_| {
            let cwd = std::env::current_dir()?;
            locate_backlog_dir(&cwd, root_dir).map_err(anyhow::Error::from)
        })?,
    };
    tracing::debug!(backlog = %backlog_dir.display(), "backlog located");
    Ok(BacklogStore::open(&backlog_dir)?)
}

fn forecast(root: Option<&Path>, args: ForecastArgs) -> Result<()> {
    let mut workspace = workspace(root)?;
    let settings = &mut workspace.settings;
    if let Some(trials) = args.trials {
        settings.trials = trials;
        settings.mark_cli("trials");
    }
    if let Some(seed) = args.seed {
        settings.seed = Some(seed);
        settings.mark_cli("seed");
    }
    if let Some(width) = args.width {
        settings.display_width = width;
        settings.mark_cli("display_width");
    }
    if args.serial {
        settings.parallel = false;
        settings.mark_cli("parallel");
    }
    let settings: ValidatedSettings = workspace.settings.clone().validate()?;
    let store = open_store(root, &workspace)?;

    let start = args.start.unwrap_or_else(now_to_the_minute);
    let forecast = run_forecast(&store, &settings, start)
        .with_context(|| format!("forecast backlog {}", store.backlog_dir().display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&forecast.summary())?);
    } else {
        print!("{}", forecast.render(&settings));
    }
    Ok(())
}

fn velocities(root: Option<&Path>, json: bool) -> Result<()> {
    let workspace = workspace(root)?;
    let settings = workspace.settings.clone().validate()?;
    let store = open_store(root, &workspace)?;
    let completed = store.load_completed()?;
    let observations = derive_observations(&completed, &settings.attributes, &settings.calendar)?;
    let samples: Vec<f64> = observations.iter().map(|obs| obs.velocity).collect();
    let mean = mean_velocity(&samples);

    if json {
        let payload = json!({
            "samples": observations.len(),
            "mean": mean,
            "observations": observations,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if observations.is_empty() {
        println!(
            "No completed tasks with both {} and {}.",
            settings.attributes.estimated, settings.attributes.actual
        );
        return Ok(());
    }
    let id_width = observations
        .iter()
        .map(|obs| obs.task_id.chars().count())
        .max()
        .unwrap_or(0)
        .max("task".len());
    println!(
        "{:<id_width$}  {:>10}  {:>10}  {:>8}",
        "task", "estimated", "actual", "velocity"
    );
    for obs in &observations {
        println!(
            "{:<id_width$}  {:>10}  {:>10}  {:>8.2}",
            obs.task_id,
            obs.estimated.to_string(),
            obs.actual.to_string(),
            obs.velocity
        );
    }
    if let Some(mean) = mean {
        println!();
        println!("{} samples, mean velocity {:.2}", observations.len(), mean);
    }
    Ok(())
}

fn show_config(root: Option<&Path>, json: bool) -> Result<()> {
    let workspace = workspace(root)?;
    let settings = &workspace.settings;
    if json {
        println!("{}", serde_json::to_string_pretty(settings)?);
        return Ok(());
    }

    let percentiles: Vec<String> = settings.percentiles.iter().map(f64::to_string).collect();
    let rows = [
        ("root_dir", settings.root_dir.clone().unwrap_or_else(|| "-".to_string())),
        ("working_hours_per_day", settings.calendar.hours_per_day.to_string()),
        ("working_days_per_week", settings.calendar.days_per_week.to_string()),
        ("trials", settings.trials.to_string()),
        ("display_width", settings.display_width.to_string()),
        (
            "seed",
            settings
                .seed
                .map(|seed| seed.to_string())
                .unwrap_or_else(|| "random".to_string()),
        ),
        ("parallel", settings.parallel.to_string()),
        ("percentiles", percentiles.join(", ")),
        ("fill_glyph", settings.glyphs.fill.to_string()),
        ("empty_glyph", settings.glyphs.empty.to_string()),
        ("attributes.estimated", settings.attributes.estimated.clone()),
        ("attributes.actual", settings.attributes.actual.clone()),
        ("attributes.velocity", settings.attributes.velocity.clone()),
    ];
    println!("config root: {}", workspace.config_root.display());
    for (key, value) in rows {
        println!("{key:<22} {value:<20} ({})", settings.source(key));
    }
    if let Err(err) = settings.clone().validate() {
        println!();
        println!("warning: {err}");
    }
    Ok(())
}
