use std::path::PathBuf;
use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(text.trim().to_string())
}

struct GitStamp {
    sha: String,
    count: String,
    dirty: &'static str,
}

fn stamp() -> Option<GitStamp> {
    let git_dir = PathBuf::from(git(&["rev-parse", "--absolute-git-dir"])?);
    for tracked in ["HEAD", "index", "logs/HEAD"] {
        println!("cargo:rerun-if-changed={}", git_dir.join(tracked).display());
    }
    let sha = git(&["rev-parse", "--short", "HEAD"])?;
    let count = git(&["rev-list", "--count", "HEAD"]).unwrap_or_else(|| "0".to_string());
    let clean = Command::new("git")
        .args(["diff", "--quiet", "HEAD"])
        .status()
        .map(|status| status.success())
        .unwrap_or(true);
    Some(GitStamp {
        sha,
        count,
        dirty: if clean { "" } else { ".dirty" },
    })
}

fn main() {
    // Outside a checkout (crate tarballs, vendored sources) the stamp is `nogit`.
    let stamp = stamp().unwrap_or(GitStamp {
        sha: "nogit".to_string(),
        count: "0".to_string(),
        dirty: "",
    });
    println!("cargo:rustc-env=TASKMC_GIT_SHA={}", stamp.sha);
    println!("cargo:rustc-env=TASKMC_GIT_COUNT={}", stamp.count);
    println!("cargo:rustc-env=TASKMC_GIT_DIRTY={}", stamp.dirty);
}
