//! Common library for the parsync parallel rsync driver
//!
//! A single rsync command is slow when it has to move many large files one after another. This
//! crate splits such a command into three phases:
//!
//! 1. **Discovery** - the command is run with `--dry-run --itemize-changes` and its output is
//!    parsed ([`itemize`]) into a [`plan::SyncPlan`] of regular files and everything else.
//! 2. **Dispatch** - every regular file is queued for a fixed pool of worker threads
//!    ([`pool`]), each running the command restricted to that one file with `--files-from`.
//! 3. **Consolidation** - once all files are done, the command runs one last time with every
//!    dispatched file in `--exclude-from`, taking care of directories, symlinks, deletions and
//!    attribute changes.
//!
//! The [`orchestrate::Orchestrator`] drives these phases. A file that fails to transfer in
//! phase 2 is reported but not retried; the exit code of the run is the exit code of the
//! consolidation pass.
//!
//! # Example
//!
//! ```rust,no_run
//! use common::{orchestrate::Orchestrator, RunConfig};
//!
//! let config = RunConfig {
//!     worker_count: 4,
//!     ..RunConfig::new("rsync -a --delete /data/src/ backup:/data/dst")
//! };
//! let report = Orchestrator::new(config)?.run()?;
//! for failed in report.failed() {
//!     eprintln!("{} failed with exit code {}", failed.path, failed.exit_code);
//! }
//! std::process::exit(report.exit_code);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod command;
pub mod config;
pub mod itemize;
pub mod orchestrate;
pub mod plan;
pub mod pool;

#[cfg(test)]
mod testutils;

pub use config::{OutputConfig, RunConfig};

fn init_tracing(output: &OutputConfig) {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(output.log_level().into())
        .from_env_lossy();
    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
    {
        eprintln!("failed to initialize logging: {error}");
    }
}

/// Set up logging, run `func` and report its outcome
///
/// Returns `None` if `func` failed; the error chain has been printed unless `quiet` is set.
pub fn run<Summary, Func>(output: OutputConfig, func: Func) -> Option<Summary>
where
    Summary: std::fmt::Display,
    Func: FnOnce() -> anyhow::Result<Summary>,
{
    init_tracing(&output);
    match func() {
        Ok(summary) => {
            if output.print_summary || output.verbose > 0 {
                println!("{summary}");
            }
            Some(summary)
        }
        Err(error) => {
            if !output.quiet {
                tracing::error!("{:#}", &error);
            }
            None
        }
    }
}
