//! Stand-in for rsync used by the unit tests
//!
//! The fake tool is a shell script that recognizes the flags each phase appends, prints canned
//! itemized output for discovery and records every transfer and the exclusion list it was given.

use std::fmt::Write;

#[derive(Debug, Default)]
pub struct FakeSyncToolBuilder {
    itemized: String,
    discovery_exit: i32,
    consolidation_exit: i32,
    failures: Vec<(String, i32)>,
}

impl FakeSyncToolBuilder {
    /// Output printed by the discovery pass
    pub fn itemized(mut self, output: &str) -> Self {
        self.itemized = output.to_string();
        self
    }

    pub fn discovery_exit(mut self, code: i32) -> Self {
        self.discovery_exit = code;
        self
    }

    pub fn consolidation_exit(mut self, code: i32) -> Self {
        self.consolidation_exit = code;
        self
    }

    /// Make the single-file transfer of `path` exit with `code`
    pub fn fail(mut self, path: &str, code: i32) -> Self {
        self.failures.push((path.to_string(), code));
        self
    }

    pub fn build(self) -> FakeSyncTool {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().to_str().unwrap().to_string();
        std::fs::write(dir.path().join("itemized"), &self.itemized).unwrap();
        let mut failures = String::new();
        for (path, code) in &self.failures {
            writeln!(failures, "            '{path}') exit {code} ;;").unwrap();
        }
        let script = format!(
            r#"#!/bin/sh
state='{state}'
mode=unknown
list=
for arg in "$@"; do
    case "$arg" in
        --dry-run) mode=discover ;;
        --files-from=*) mode=transfer; list="${{arg#--files-from=}}" ;;
        --exclude-from=*) mode=consolidate; list="${{arg#--exclude-from=}}" ;;
    esac
done
if [ -n "$list" ]; then
    echo "$list" >> "$state/lists"
fi
case "$mode" in
    discover)
        echo "$*" >> "$state/discoveries"
        cat "$state/itemized"
        exit {discovery_exit}
        ;;
    transfer)
        path=$(cat "$list")
        echo "$path" >> "$state/transfers"
        case "$path" in
{failures}            *) exit 0 ;;
        esac
        ;;
    consolidate)
        cp "$list" "$state/excluded"
        echo "$*" > "$state/consolidation"
        exit {consolidation_exit}
        ;;
esac
exit 99
"#,
            discovery_exit = self.discovery_exit,
            consolidation_exit = self.consolidation_exit,
        );
        std::fs::write(dir.path().join("fake-rsync"), script).unwrap();
        FakeSyncTool { dir }
    }
}

#[derive(Debug)]
pub struct FakeSyncTool {
    dir: tempfile::TempDir,
}

impl FakeSyncTool {
    pub fn builder() -> FakeSyncToolBuilder {
        FakeSyncToolBuilder::default()
    }

    /// Command line to use as the base command of a run
    pub fn command(&self) -> String {
        format!(
            "sh '{}' -a /src/ /dst",
            self.dir.path().join("fake-rsync").display()
        )
    }

    fn read_lines(&self, name: &str) -> Option<Vec<String>> {
        let content = std::fs::read_to_string(self.dir.path().join(name)).ok()?;
        Some(content.lines().map(str::to_string).collect())
    }

    /// Paths transferred one at a time, in completion order
    pub fn transfers(&self) -> Vec<String> {
        self.read_lines("transfers").unwrap_or_default()
    }

    pub fn discoveries(&self) -> usize {
        self.read_lines("discoveries").map_or(0, |lines| lines.len())
    }

    /// Exclusion list given to the consolidation pass, `None` if it never ran
    pub fn excluded(&self) -> Option<Vec<String>> {
        self.read_lines("excluded")
    }

    /// Arguments of the consolidation pass, `None` if it never ran
    pub fn consolidation_args(&self) -> Option<String> {
        self.read_lines("consolidation").map(|lines| lines.join("\n"))
    }

    /// Every temporary list file handed to the tool
    pub fn list_files(&self) -> Vec<std::path::PathBuf> {
        self.read_lines("lists")
            .unwrap_or_default()
            .into_iter()
            .map(std::path::PathBuf::from)
            .collect()
    }
}
