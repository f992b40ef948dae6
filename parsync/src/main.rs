use anyhow::{Context, Result};
use clap::Parser;
use tracing::instrument;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "parsync",
    version,
    about = "Speed up an rsync command by transferring its files in parallel",
    long_about = "`parsync` runs one rsync command in three phases:

  1. the command is run with --dry-run --itemize-changes to find the files that need a transfer
  2. each of those files is transferred on its own by a pool of workers (--files-from)
  3. the command runs once more, excluding the files already transferred (--exclude-from), to
     handle directories, symlinks, deletions and attribute changes

A file that fails in phase 2 is reported and skipped; the exit code of parsync is the exit code
of the final rsync call.

EXAMPLES:
    # Archive mode with deletions, 2 workers
    parsync \"rsync -a --delete /path/to/src/ user@host:/path/to/dest\"

    # 4 workers, print every call
    parsync \"rsync -rltv /path/to/src/ user@host:/path/to/dest\" --num-threads 4 --debug

    # Lower the local priority of all rsync processes
    parsync \"nice -n 19 ionice -c 2 -n 7 rsync -a /path/to/src/ user@host:/path/to/dest\""
)]
struct Args {
    // Transfer options
    /// Number of parallel file transfer workers
    #[arg(
        short = 'n',
        long = "num-threads",
        visible_alias = "num_threads",
        default_value = "2",
        value_name = "N",
        help_heading = "Transfer options"
    )]
    num_threads: usize,

    /// Maximum number of files waiting for a worker, 0 means no limit
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Transfer options"
    )]
    queue_capacity: usize,

    // Progress & output
    /// Enable debugging output: log every dispatched file and rsync call
    #[arg(short = 'd', long = "debug", help_heading = "Progress & output")]
    debug: bool,

    /// Verbose level (implies "summary"): -v INFO / -vv DEBUG / -vvv TRACE (default: WARN)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Quiet mode, only report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // ARGUMENTS
    /// The full rsync command, as a single (quoted) argument
    #[arg(value_name = "RSYNC_COMMAND")]
    command: String,
}

fn report_failures(report: &common::orchestrate::RunReport) {
    let failed: Vec<_> = report.failed().collect();
    if failed.is_empty() {
        return;
    }
    eprintln!("{} file(s) failed to transfer in parallel:", failed.len());
    for result in failed {
        eprintln!("  {} (exit code {})", result.path, result.exit_code);
    }
}

#[instrument(skip(args), fields(workers = args.num_threads))]
fn sync(args: Args) -> Result<common::orchestrate::RunReport> {
    if args.debug {
        tracing::debug!("{:?}", &args);
    }
    let config = common::RunConfig {
        base_command: args.command,
        worker_count: args.num_threads,
        queue_capacity: args.queue_capacity,
        debug: args.debug,
    };
    let mut orchestrator =
        common::orchestrate::Orchestrator::new(config).context("invalid arguments")?;
    let report = orchestrator.run().context("parsync failed")?;
    if !args.quiet {
        report_failures(&report);
    }
    Ok(report)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || sync(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        debug: args.debug,
        print_summary: args.summary,
    };
    match common::run(output, func) {
        Some(report) => std::process::exit(report.exit_code),
        None => std::process::exit(1),
    }
}
