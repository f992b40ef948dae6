//! Configuration types for a parallel sync run and its output

use tracing::level_filters::LevelFilter;

/// Number of transfer workers used when none is requested
pub const DEFAULT_WORKER_COUNT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("sync command must not be empty")]
    EmptyCommand,
    #[error("worker count must be at least 1")]
    NoWorkers,
}

/// Settings of one orchestration run, fixed once the run is constructed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// The user's full sync command line, executed through the shell
    pub base_command: String,
    /// Number of parallel transfer workers (must be >= 1)
    pub worker_count: usize,
    /// Maximum number of waiting transfer tasks (0 = unbounded)
    pub queue_capacity: usize,
    /// Log every dispatched task and command line
    pub debug: bool,
}

impl RunConfig {
    pub fn new(base_command: impl Into<String>) -> Self {
        Self {
            base_command: base_command.into(),
            worker_count: DEFAULT_WORKER_COUNT,
            queue_capacity: 0,
            debug: false,
        }
    }

    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_command.trim().is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        if self.worker_count == 0 {
            return Err(ConfigError::NoWorkers);
        }
        Ok(())
    }
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Only report errors
    pub quiet: bool,
    /// Verbosity level: 0=WARN, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Debug mode, raises the level to at least DEBUG
    pub debug: bool,
    /// Print summary statistics at the end
    pub print_summary: bool,
}

impl OutputConfig {
    /// Default log level, `RUST_LOG` takes precedence when set
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::ERROR;
        }
        let level = match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        };
        if self.debug {
            std::cmp::max(level, LevelFilter::DEBUG)
        } else {
            level
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_run_config_is_valid() {
        let config = RunConfig::new("rsync -a /src/ /dst");
        assert_eq!(config.worker_count, DEFAULT_WORKER_COUNT);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_invalid_run_config() {
        assert_eq!(RunConfig::new("  ").validate(), Err(ConfigError::EmptyCommand));
        let config = RunConfig {
            worker_count: 0,
            ..RunConfig::new("rsync -a /src/ /dst")
        };
        assert_eq!(config.validate(), Err(ConfigError::NoWorkers));
    }

    #[test]
    fn log_levels() {
        let output = OutputConfig::default();
        assert_eq!(output.log_level(), LevelFilter::WARN);
        let output = OutputConfig {
            verbose: 1,
            ..Default::default()
        };
        assert_eq!(output.log_level(), LevelFilter::INFO);
        let output = OutputConfig {
            debug: true,
            ..Default::default()
        };
        assert_eq!(output.log_level(), LevelFilter::DEBUG);
        let output = OutputConfig {
            verbose: 3,
            debug: true,
            ..Default::default()
        };
        assert_eq!(output.log_level(), LevelFilter::TRACE);
        let output = OutputConfig {
            quiet: true,
            verbose: 2,
            debug: true,
            ..Default::default()
        };
        assert_eq!(output.log_level(), LevelFilter::ERROR);
    }
}
