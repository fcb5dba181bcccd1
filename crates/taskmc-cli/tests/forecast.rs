use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

fn bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_taskmc"));
    cmd.env_remove("TASKMC_LOG");
    cmd
}

fn write_task(tasks_dir: &Path, id: &str, status: &str, extra: &str) {
    let content = format!(
        "---\n\
id: {id}\n\
title: Task {id}\n\
status: {status}\n\
{extra}\
---\n\
\n\
## Notes\n\
- seed\n"
    );
    fs::write(tasks_dir.join(format!("{id} - task.md")), content).expect("write task");
}

/// A backlog whose every completed task took exactly its estimate.
fn unit_velocity_backlog(temp: &TempDir) -> std::path::PathBuf {
    let tasks_dir = temp.path().join("backlog").join("tasks");
    fs::create_dir_all(&tasks_dir).expect("tasks dir");
    write_task(
        &tasks_dir,
        "task-001",
        "Done",
        "estimatedtime: 2h\ntotalactivetime: PT2H\n",
    );
    write_task(
        &tasks_dir,
        "task-002",
        "Done",
        "estimatedtime: 30min\ntotalactivetime: 1800\n",
    );
    write_task(&tasks_dir, "task-003", "To Do", "estimatedtime: 1h\n");
    write_task(&tasks_dir, "task-004", "In Progress", "estimatedtime: 3600\n");
    // Isolate from any global config on the machine running the tests.
    let home = temp.path().join("home");
    fs::create_dir_all(&home).expect("home");
    home
}

#[test]
fn forecast_prints_headline_and_histogram() {
    let temp = TempDir::new().expect("tempdir");
    let home = unit_velocity_backlog(&temp);

    let out = bin()
        .env("TASKMC_HOME", &home)
        .arg("--root")
        .arg(temp.path())
        .args(["forecast", "--start", "2026-03-02 09:00", "--trials", "50", "--seed", "7"])
        .output()
        .expect("forecast");
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let stdout = String::from_utf8_lossy(&out.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    // 2h of work at velocity 1.0 is 8.4 wall-clock hours.
    assert_eq!(lines[0], "70% probability of completion by 2026.03.02 17:24");
    assert_eq!(lines[1], "95% probability of completion by 2026.03.02 17:24");
    assert_eq!(lines[2], "");
    assert_eq!(lines.len(), 3 + 29);
    assert!(lines[3..].iter().all(|line| line.chars().count() == 80));
}

#[test]
fn forecast_json_and_width_override() {
    let temp = TempDir::new().expect("tempdir");
    let home = unit_velocity_backlog(&temp);

    let out = bin()
        .env("TASKMC_HOME", &home)
        .arg("--root")
        .arg(temp.path())
        .args([
            "forecast",
            "--start",
            "2026-03-02 09:00",
            "--trials",
            "20",
            "--seed",
            "7",
            "--serial",
            "--json",
        ])
        .output()
        .expect("forecast json");
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(json["trials"], 20);
    assert_eq!(json["seed"], 7);
    assert_eq!(json["pending_estimates"], 2);
    assert_eq!(json["remaining_estimate"], 7200);
    assert_eq!(json["percentiles"][0]["date"], "2026-03-02T17:24:00");

    let out = bin()
        .env("TASKMC_HOME", &home)
        .arg("--root")
        .arg(temp.path())
        .args(["forecast", "--start", "2026-03-02 09:00", "--width", "40"])
        .output()
        .expect("forecast narrow");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.lines().skip(3).all(|line| line.chars().count() == 40));
}

#[test]
fn project_config_drives_the_forecast() {
    let temp = TempDir::new().expect("tempdir");
    let home = unit_velocity_backlog(&temp);
    fs::write(
        temp.path().join(".taskmc.toml"),
        "trials = 10\nseed = 3\nworking_hours_per_day = 24.0\nworking_days_per_week = 7.0\n",
    )
    .expect("config");

    let out = bin()
        .env("TASKMC_HOME", &home)
        .arg("--root")
        .arg(temp.path())
        .args(["forecast", "--start", "2026-03-02 09:00", "--json"])
        .output()
        .expect("forecast");
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(json["trials"], 10);
    // A 24x7 calendar maps working time straight onto the clock.
    assert_eq!(json["latest"], "2026-03-02T11:00:00");

    let out = bin()
        .env("TASKMC_HOME", &home)
        .arg("--root")
        .arg(temp.path())
        .arg("config")
        .output()
        .expect("config");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("trials"));
    assert!(stdout
        .lines()
        .any(|line| line.starts_with("trials") && line.ends_with("(project)")));
    assert!(stdout
        .lines()
        .any(|line| line.starts_with("display_width") && line.ends_with("(default)")));
}

#[test]
fn velocities_lists_completed_tasks() {
    let temp = TempDir::new().expect("tempdir");
    let home = unit_velocity_backlog(&temp);

    let out = bin()
        .env("TASKMC_HOME", &home)
        .arg("--root")
        .arg(temp.path())
        .args(["velocities", "--json"])
        .output()
        .expect("velocities");
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(json["samples"], 2);
    assert_eq!(json["mean"], 1.0);
    assert_eq!(json["observations"][0]["task_id"], "task-001");

    let out = bin()
        .env("TASKMC_HOME", &home)
        .arg("--root")
        .arg(temp.path())
        .arg("velocities")
        .output()
        .expect("velocities text");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("task-002"));
    assert!(stdout.contains("2 samples, mean velocity 1.00"));
}

#[test]
fn missing_history_fails_with_message() {
    let temp = TempDir::new().expect("tempdir");
    let tasks_dir = temp.path().join("tasks");
    fs::create_dir_all(&tasks_dir).expect("tasks dir");
    write_task(&tasks_dir, "task-001", "To Do", "estimatedtime: 1d\n");
    let home = temp.path().join("home");

    let out = bin()
        .env("TASKMC_HOME", &home)
        .arg("--root")
        .arg(temp.path())
        .arg("forecast")
        .output()
        .expect("forecast");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("No usable velocity samples"), "stderr: {stderr}");
}

#[test]
fn malformed_estimate_names_the_task() {
    let temp = TempDir::new().expect("tempdir");
    let tasks_dir = temp.path().join("tasks");
    fs::create_dir_all(&tasks_dir).expect("tasks dir");
    write_task(
        &tasks_dir,
        "task-001",
        "Done",
        "estimatedtime: 1h\ntotalactivetime: 1h\n",
    );
    write_task(&tasks_dir, "task-002", "To Do", "estimatedtime: soon\n");
    let home = temp.path().join("home");

    let out = bin()
        .env("TASKMC_HOME", &home)
        .arg("--root")
        .arg(temp.path())
        .arg("forecast")
        .output()
        .expect("forecast");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("task-002"), "stderr: {stderr}");
}

#[test]
fn invalid_trials_are_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let home = unit_velocity_backlog(&temp);

    let out = bin()
        .env("TASKMC_HOME", &home)
        .arg("--root")
        .arg(temp.path())
        .args(["forecast", "--trials", "0"])
        .output()
        .expect("forecast");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("trials"), "stderr: {stderr}");
}

#[test]
fn version_subcommand_prints_version() {
    let out = bin().arg("version").output().expect("version");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with(&format!("taskmc {}", env!("CARGO_PKG_VERSION"))));
}
