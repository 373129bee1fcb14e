use std::time::Duration;

/// How many submission pipelines may be in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Wall-clock budget for one submission's compile, run and compare stages.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const SEMAPHORE_CLOSED_ERR: &str = "submission semaphore unexpectedly closed";
