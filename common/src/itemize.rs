//! Parser for the itemized change list printed by `rsync --itemize-changes`
//!
//! Every changed entry is reported on one line as `YXcstpoguax path`:
//!
//! - `Y` is the update type: `<` sent, `>` received, `c` created locally, `h` hard link,
//!   `.` attributes only
//! - `X` is the entry type: `f` file, `d` directory, `L` symlink, `D` device, `S` special file
//! - `cstpoguax` are per-attribute flags, each either its letter, `.` (unchanged), `+` (new
//!   entry) or `?` (unknown). Older rsync versions print only the first seven (`cstpogz`), so
//!   the trailing `a` and `x` flags are optional.
//!
//! Message lines such as `*deleting   old/file` start with `*` instead. Anything else (headers,
//! transfer statistics) is not part of the change list and is skipped.
//!
//! ```
//! use common::itemize::{parse, EntryKind};
//!
//! let output = "sending incremental file list\n\
//!               >f+++++++++ docs/a.txt\n\
//!               cd+++++++++ docs/\n\
//!               sent 120 bytes  received 24 bytes\n";
//! let entries: Vec<_> = parse(output).collect();
//! assert_eq!(entries.len(), 2);
//! assert_eq!(entries[0].path(), "/docs/a.txt");
//! assert_eq!(entries[0].kind(), EntryKind::File);
//! assert_eq!(entries[1].kind(), EntryKind::Dir);
//! ```

use enum_map::Enum;

static CHANGE_LINE: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(
        r"^(?P<flags>[<>ch.][fdLDS][c.+?][s.+?][tT.+?][p.+?][o.+?][g.+?][uznb.+?][a.+?]?[x.+?]?)\s(?P<path>.+)$",
    )
    .expect("change line pattern must compile")
});

static MESSAGE_LINE: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(r"^(?P<flags>\*[a-zA-Z]+)\s+(?P<path>.+)$")
        .expect("message line pattern must compile")
});

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Enum)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Device,
    Other,
}

impl EntryKind {
    fn from_type_char(type_char: char) -> Self {
        match type_char {
            'f' => EntryKind::File,
            'd' => EntryKind::Dir,
            'L' => EntryKind::Symlink,
            'D' => EntryKind::Device,
            _ => EntryKind::Other,
        }
    }
}

/// One changed filesystem entry reported by the sync tool
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEntry {
    raw_flags: String,
    path: String,
    kind: EntryKind,
}

impl ChangeEntry {
    /// The itemized flag field, e.g. `>f.st......` or `*deleting`
    pub fn raw_flags(&self) -> &str {
        &self.raw_flags
    }

    /// Path of the entry, anchored at the transfer root (always starts with `/`)
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }
}

fn anchor(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Parse a single line of itemized output, `None` if it is not a change line
pub fn parse_line(line: &str) -> Option<ChangeEntry> {
    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(captures) = CHANGE_LINE.captures(line) {
        let raw_flags = captures["flags"].to_string();
        let kind = raw_flags
            .chars()
            .nth(1)
            .map_or(EntryKind::Other, EntryKind::from_type_char);
        let mut path = &captures["path"];
        // link targets are appended to the name, they are not part of the path
        if kind == EntryKind::Symlink {
            path = path.split_once(" -> ").map_or(path, |(name, _)| name);
        }
        if raw_flags.starts_with('h') {
            path = path.split_once(" => ").map_or(path, |(name, _)| name);
        }
        return Some(ChangeEntry {
            raw_flags,
            path: anchor(path),
            kind,
        });
    }
    let captures = MESSAGE_LINE.captures(line)?;
    Some(ChangeEntry {
        raw_flags: captures["flags"].to_string(),
        path: anchor(&captures["path"]),
        kind: EntryKind::Other,
    })
}

/// Lazily parse the captured output of a dry run, skipping lines that are not change lines
pub fn parse(output: &str) -> impl Iterator<Item = ChangeEntry> + '_ {
    output.lines().filter_map(|line| {
        let entry = parse_line(line);
        if entry.is_none() && !line.trim().is_empty() {
            tracing::debug!("skipping non-itemized line: {:?}", line);
        }
        entry
    })
}
