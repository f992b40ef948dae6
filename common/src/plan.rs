use enum_map::EnumMap;

use crate::itemize::{ChangeEntry, EntryKind};

pub type KindCounts = EnumMap<EntryKind, u64>;

/// Unit of work for the transfer workers: one regular file to sync on its own
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferTask {
    pub path: String,
}

/// Changes found by one discovery pass, split by how they are transferred
///
/// Regular files are `parallelizable`; directories, symlinks, devices, deletions and anything
/// else are `deferred` to the consolidation pass. Every entry lands in exactly one of the two,
/// in its original relative order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncPlan {
    parallelizable: Vec<ChangeEntry>,
    deferred: Vec<ChangeEntry>,
}

impl SyncPlan {
    pub fn classify(entries: impl IntoIterator<Item = ChangeEntry>) -> Self {
        let (parallelizable, deferred): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|entry| entry.kind() == EntryKind::File);
        Self {
            parallelizable,
            deferred,
        }
    }

    pub fn parallelizable(&self) -> &[ChangeEntry] {
        &self.parallelizable
    }

    pub fn deferred(&self) -> &[ChangeEntry] {
        &self.deferred
    }

    pub fn tasks(&self) -> impl Iterator<Item = TransferTask> + '_ {
        self.parallelizable.iter().map(|entry| TransferTask {
            path: entry.path().to_string(),
        })
    }

    pub fn kind_counts(&self) -> KindCounts {
        let mut counts = KindCounts::default();
        for entry in self.parallelizable.iter().chain(&self.deferred) {
            counts[entry.kind()] += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.parallelizable.len() + self.deferred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
