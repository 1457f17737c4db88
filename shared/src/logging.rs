//! Shared logging utilities for consistent tracing across all jobs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{error, info};

/// Global job identity - set once at startup
static JOB: OnceLock<Job> = OnceLock::new();
/// When the job identity was set
static STARTED: OnceLock<Instant> = OnceLock::new();

/// The scheduled job (or administrative command) this process is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Job {
    Sync,
    Pair,
    Reconcile,
    Remind,
    Confirm,
    /// Library use without an explicit job (tests, embedding)
    Adhoc,
}

impl Job {
    /// Initialize the global job identity; later calls keep the first value
    pub fn init(job: Job) -> &'static Job {
        STARTED.get_or_init(Instant::now);
        JOB.get_or_init(|| job)
    }

    /// Get the global job identity, `Adhoc` when never initialized
    pub fn current() -> &'static Job {
        JOB.get().unwrap_or(&Job::Adhoc)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::Sync => write!(f, "sync"),
            Job::Pair => write!(f, "pair"),
            Job::Reconcile => write!(f, "reconcile"),
            Job::Remind => write!(f, "remind"),
            Job::Confirm => write!(f, "confirm"),
            Job::Adhoc => write!(f, "adhoc"),
        }
    }
}

/// Build the per-crate filter directive for a base level
pub fn filter_directive(log_level: Option<&str>) -> String {
    let base_level = log_level.unwrap_or("info");
    format!("matchmaker={base_level},shared={base_level},reqwest=warn,hyper=warn")
}

/// Initialize the stdout tracing subscriber with an optional log level
pub fn init_tracing(log_level: Option<&str>) {
    use tracing_subscriber::{EnvFilter, fmt};

    let directive = filter_directive(log_level);

    // A subscriber may already be installed when embedded; keep it
    let _ = fmt()
        .with_env_filter(EnvFilter::new(&directive))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Milliseconds since the job was initialized, 0 before `Job::init`
pub fn job_elapsed_ms() -> u64 {
    STARTED
        .get()
        .map(|started| u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Macro for job-aware info logging
#[macro_export]
macro_rules! job_info {
    ($job:expr, $($arg:tt)*) => {
        tracing::info!(
            job = %$job,
            elapsed_ms = $crate::logging::job_elapsed_ms(),
            $($arg)*
        );
    };
}

/// Macro for job-aware warning logging
#[macro_export]
macro_rules! job_warn {
    ($job:expr, $($arg:tt)*) => {
        tracing::warn!(
            job = %$job,
            elapsed_ms = $crate::logging::job_elapsed_ms(),
            $($arg)*
        );
    };
}

/// Macro for job-aware error logging
#[macro_export]
macro_rules! job_error {
    ($job:expr, $($arg:tt)*) => {
        tracing::error!(
            job = %$job,
            elapsed_ms = $crate::logging::job_elapsed_ms(),
            $($arg)*
        );
    };
}

/// Macro for job-aware debug logging
#[macro_export]
macro_rules! job_debug {
    ($job:expr, $($arg:tt)*) => {
        tracing::debug!(
            job = %$job,
            elapsed_ms = $crate::logging::job_elapsed_ms(),
            $($arg)*
        );
    };
}

/// Announce the job at startup
pub fn log_startup(job: &Job, details: &str) {
    info!(job = %job, elapsed_ms = 0u64, "Starting {} job ({})", job, details);
}

/// Report the failure that ends a job
pub fn log_error(job: &Job, context: &str, error: &dyn std::fmt::Display) {
    error!(
        job = %job,
        elapsed_ms = job_elapsed_ms(),
        error = %error,
        "{} failed: {}",
        context,
        error
    );
}

/// Report a job outcome together with how long the job has run
pub fn log_success(job: &Job, message: &str) {
    let elapsed_ms = job_elapsed_ms();
    info!(job = %job, elapsed_ms, "{} (after {} ms)", message, elapsed_ms);
}
