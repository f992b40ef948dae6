use tracing::{info, instrument, warn};

use crate::command::{self, SyncCommand};
use crate::config::{ConfigError, RunConfig};
use crate::itemize::{self, EntryKind};
use crate::plan::{KindCounts, SyncPlan};
use crate::pool::{TransferResult, WorkerPool};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Discovering,
    Dispatching,
    Consolidating,
    Done,
    Failed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Phase::Discovering => "discovering",
            Phase::Dispatching => "dispatching",
            Phase::Consolidating => "consolidating",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestrateError {
    #[error("failed to run discovery `{command}`")]
    DiscoverySpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("discovery `{command}` exited with code {exit_code}")]
    DiscoveryExit { command: String, exit_code: i32 },
    #[error("failed to start transfer workers")]
    Workers(#[source] std::io::Error),
    #[error("failed to queue transfer tasks")]
    Dispatch(#[from] workqueue::QueueError),
    #[error("failed to write the exclusion list")]
    ExclusionList(#[source] std::io::Error),
    #[error("failed to run consolidation `{command}`")]
    Consolidation {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Entries found by discovery, per kind
    pub kinds: KindCounts,
    /// Entries left to the consolidation pass
    pub deferred: usize,
    /// Paths transferred in parallel and excluded from consolidation, in dispatch order
    pub dispatched: Vec<String>,
    /// Per-file results, sorted by path
    pub results: Vec<TransferResult>,
    /// Exit code of the consolidation pass, the exit code of the whole run
    pub exit_code: i32,
    pub elapsed: std::time::Duration,
}

impl RunReport {
    pub fn failed(&self) -> impl Iterator<Item = &TransferResult> {
        self.results.iter().filter(|result| !result.succeeded())
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "entries discovered:")?;
        for (kind, count) in &self.kinds {
            writeln!(f, "  {:<12} {:>10}", format!("{kind:?}:"), count)?;
        }
        writeln!(f, "files transferred in parallel: {}", self.dispatched.len())?;
        writeln!(f, "files failed: {}", self.failed().count())?;
        writeln!(f, "entries deferred: {}", self.deferred)?;
        writeln!(f, "consolidation exit code: {}", self.exit_code)?;
        write!(
            f,
            "walltime: {}",
            humantime::format_duration(std::time::Duration::from_millis(
                u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
            ))
        )
    }
}

/// Drives one run through discovery, parallel dispatch and consolidation
#[derive(Debug)]
pub struct Orchestrator {
    config: RunConfig,
    command: SyncCommand,
    phase: Phase,
}

impl Orchestrator {
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    pub fn new(config: RunConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let command = SyncCommand::new(&config.base_command);
        Ok(Self {
            config,
            command,
            phase: Phase::Discovering,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        info!("phase: {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Run all phases
    ///
    /// Per-file failures are part of the report; only a failed discovery or a consolidation pass
    /// that could not be started are errors.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails, the workers cannot be started or the consolidation
    /// command cannot be run.
    pub fn run(&mut self) -> Result<RunReport, OrchestrateError> {
        let result = self.run_phases();
        if result.is_err() {
            self.enter(Phase::Failed);
        }
        result
    }

    fn run_phases(&mut self) -> Result<RunReport, OrchestrateError> {
        let start = std::time::Instant::now();
        let plan = self.discover()?;
        self.enter(Phase::Dispatching);
        // workers live until the end of the run
        let pool = WorkerPool::start(&self.config).map_err(OrchestrateError::Workers)?;
        let (dispatched, mut results) = self.dispatch(&pool, &plan)?;
        self.enter(Phase::Consolidating);
        let exit_code = self.consolidate(&dispatched)?;
        drop(pool);
        self.enter(Phase::Done);
        results.sort_by(|a, b| a.path.cmp(&b.path));
        let report = RunReport {
            kinds: plan.kind_counts(),
            deferred: plan.deferred().len(),
            dispatched,
            results,
            exit_code,
            elapsed: start.elapsed(),
        };
        info!(
            "run finished: {} transferred in parallel, {} failed, exit code {}",
            report.dispatched.len(),
            report.failed().count(),
            report.exit_code
        );
        Ok(report)
    }

    #[instrument(skip(self))]
    fn discover(&self) -> Result<SyncPlan, OrchestrateError> {
        let command = self.command.discovery();
        info!("discovering changes: {}", command);
        let output =
            command::run_captured(&command).map_err(|source| OrchestrateError::DiscoverySpawn {
                command: command.clone(),
                source,
            })?;
        let exit_code = command::exit_code(output.status);
        if exit_code != 0 {
            return Err(OrchestrateError::DiscoveryExit { command, exit_code });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let plan = SyncPlan::classify(itemize::parse(&stdout));
        let kinds = plan.kind_counts();
        info!(
            "discovered {} entries: {} files, {} directories, {} symlinks, {} devices, {} other",
            plan.len(),
            kinds[EntryKind::File],
            kinds[EntryKind::Dir],
            kinds[EntryKind::Symlink],
            kinds[EntryKind::Device],
            kinds[EntryKind::Other],
        );
        if plan.parallelizable().is_empty() {
            warn!(
                "no files will be transferred in parallel; check the output of `{}` to verify",
                command
            );
        }
        Ok(plan)
    }

    #[instrument(skip_all)]
    fn dispatch(
        &self,
        pool: &WorkerPool,
        plan: &SyncPlan,
    ) -> Result<(Vec<String>, Vec<TransferResult>), OrchestrateError> {
        let mut dispatched = Vec::with_capacity(plan.parallelizable().len());
        for task in plan.tasks() {
            dispatched.push(task.path.clone());
            pool.queue().enqueue(task)?;
        }
        info!(
            "dispatched {} files to {} workers",
            dispatched.len(),
            pool.worker_count()
        );
        let results = pool.wait();
        Ok((dispatched, results))
    }

    #[instrument(skip_all)]
    fn consolidate(&self, excluded: &[String]) -> Result<i32, OrchestrateError> {
        let list = command::write_list(excluded.iter().map(|path| command::exclude_pattern(path)))
            .map_err(OrchestrateError::ExclusionList)?;
        let command = self.command.exclude_from(list.path());
        info!("consolidating: {}", command);
        let status = command::run(&command)
            .map_err(|source| OrchestrateError::Consolidation { command, source })?;
        let exit_code = command::exit_code(status);
        if exit_code != 0 {
            warn!(
                "potential problem with the final sync, it failed with exit code {}",
                exit_code
            );
        }
        Ok(exit_code)
    }
}
