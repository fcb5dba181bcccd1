pub const FULL: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "+git.",
    env!("TASKMC_GIT_COUNT"),
    ".",
    env!("TASKMC_GIT_SHA"),
    env!("TASKMC_GIT_DIRTY")
);
