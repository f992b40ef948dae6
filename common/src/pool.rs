use std::sync::Arc;

use tracing::{debug, error, warn};
use workqueue::WorkQueue;

use crate::command::{self, SyncCommand};
use crate::config::RunConfig;
use crate::plan::TransferTask;

/// Exit code recorded when the sync tool could not be started at all
pub const SPAWN_FAILED: i32 = -1;

/// Outcome of transferring one file on its own
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferResult {
    pub path: String,
    pub exit_code: i32,
}

impl TransferResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Fixed set of worker threads transferring one queued file at a time
///
/// Workers block on the queue while it is empty and only exit once the pool is dropped, which
/// closes the queue and joins every thread.
#[derive(Debug)]
pub struct WorkerPool {
    queue: Arc<WorkQueue<TransferTask>>,
    results: crossbeam_channel::Receiver<TransferResult>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `config.worker_count` workers
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread cannot be spawned.
    pub fn start(config: &RunConfig) -> std::io::Result<Self> {
        let queue = Arc::new(WorkQueue::new(config.queue_capacity));
        let (sender, results) = crossbeam_channel::unbounded();
        let mut pool = Self {
            queue,
            results,
            workers: Vec::with_capacity(config.worker_count),
        };
        for index in 0..config.worker_count {
            let worker = Worker {
                index,
                command: SyncCommand::new(&config.base_command),
                debug: config.debug,
                queue: Arc::clone(&pool.queue),
                results: sender.clone(),
            };
            // on error the partially started pool is dropped, which stops the running workers
            let handle = std::thread::Builder::new()
                .name(format!("parsync-worker-{index}"))
                .spawn(move || worker.run())?;
            pool.workers.push(handle);
        }
        Ok(pool)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn queue(&self) -> &WorkQueue<TransferTask> {
        &self.queue
    }

    /// Block until every dispatched task is done and collect the results produced so far
    pub fn wait(&self) -> Vec<TransferResult> {
        self.queue.join();
        // workers send a result before marking the task done, so nothing is in flight here
        self.results.try_iter().collect()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.queue.close();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("transfer worker panicked");
            }
        }
    }
}

struct Worker {
    index: usize,
    command: SyncCommand,
    debug: bool,
    queue: Arc<WorkQueue<TransferTask>>,
    results: crossbeam_channel::Sender<TransferResult>,
}

impl Worker {
    fn run(self) {
        while let Some(claim) = self.queue.claim() {
            let task = claim.item();
            if self.debug {
                debug!(worker = self.index, "transferring {}", task.path);
            }
            let exit_code = self.transfer(&task.path);
            if exit_code != 0 {
                warn!(
                    "could not transfer {}, sync failed with exit code {}; continuing",
                    task.path, exit_code
                );
            }
            let result = TransferResult {
                path: task.path.clone(),
                exit_code,
            };
            if let Err(error) = self.results.send(result) {
                // unreachable while the pool owns the receiver
                error!("failed to report result of {}: {error}", task.path);
            }
        }
    }

    fn transfer(&self, path: &str) -> i32 {
        let list = match command::write_list([path]) {
            Ok(list) => list,
            Err(error) => {
                warn!("failed to write file list for {}: {:#}", path, error);
                return SPAWN_FAILED;
            }
        };
        let command_line = self.command.files_from(list.path());
        if self.debug {
            debug!(worker = self.index, "calling: {}", command_line);
        }
        match command::run(&command_line) {
            Ok(status) => command::exit_code(status),
            Err(error) => {
                warn!("failed to run `{}`: {:#}", command_line, error);
                SPAWN_FAILED
            }
        }
        // `list` is dropped here, deleting the file before the next task is claimed
    }
}
