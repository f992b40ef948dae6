//! Building and running invocations of the external sync tool
//!
//! The user's command is an opaque shell command line (it may start with `nice`, quote an
//! `--rsync-path`, ...). Each phase appends its own flags to it and runs it through `sh -c`.

use std::io::Write;
use std::os::unix::process::ExitStatusExt;

/// Flags that turn the user's command into a discovery pass
pub const DISCOVERY_FLAGS: &str = "--dry-run --itemize-changes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCommand {
    base: String,
}

impl SyncCommand {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end().to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Command that lists pending changes without touching the destination
    pub fn discovery(&self) -> String {
        format!("{} {}", self.base, DISCOVERY_FLAGS)
    }

    /// Command restricted to the paths listed in `list`
    pub fn files_from(&self, list: &std::path::Path) -> String {
        format!("{} --files-from={}", self.base, shell_quote(list))
    }

    /// Command skipping the patterns listed in `list`
    pub fn exclude_from(&self, list: &std::path::Path) -> String {
        format!("{} --exclude-from={}", self.base, shell_quote(list))
    }
}

/// Quote a path as a single shell word
pub fn shell_quote(path: &std::path::Path) -> String {
    let path = path.to_string_lossy();
    format!("'{}'", path.replace('\'', r"'\''"))
}

/// Turn an anchored path into an exclude pattern matching only that path
///
/// Backslashes only escape when the pattern contains a wildcard, so plain names are kept as is.
pub fn exclude_pattern(path: &str) -> String {
    if !path.contains(['*', '?', '[']) {
        return path.to_string();
    }
    let mut pattern = String::with_capacity(path.len() + 4);
    for c in path.chars() {
        if matches!(c, '*' | '?' | '[' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern
}

/// Write one entry per line into a temporary file that is deleted when dropped
pub fn write_list<I, S>(lines: I) -> std::io::Result<tempfile::NamedTempFile>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut file = tempfile::Builder::new().prefix("parsync-").tempfile()?;
    {
        let mut writer = std::io::BufWriter::new(file.as_file_mut());
        for line in lines {
            writer.write_all(line.as_ref().as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    Ok(file)
}

fn shell(command_line: &str) -> std::process::Command {
    let mut command = std::process::Command::new("sh");
    command.arg("-c").arg(command_line);
    command
}

/// Run a command line with inherited stdio and wait for it to exit
pub fn run(command_line: &str) -> std::io::Result<std::process::ExitStatus> {
    shell(command_line).status()
}

/// Run a command line capturing its stdout, stderr stays attached to ours
pub fn run_captured(command_line: &str) -> std::io::Result<std::process::Output> {
    shell(command_line)
        .stdin(std::process::Stdio::inherit())
        .stderr(std::process::Stdio::inherit())
        .output()
}

/// Exit code of a finished process, signals map to `128 + signal` like in the shell
pub fn exit_code(status: std::process::ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}
