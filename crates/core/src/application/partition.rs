//! Affinity partitioning and position ranking
//!
//! Waiting entries are grouped by requested provider (no request = "any
//! provider") and ranked 1..N inside each group by (joined_at, id).
//! Positions are always computed from the snapshot at hand, never cached.

use crate::domain::{Affinity, QueueEntry};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A waiting entry together with its rank inside its affinity partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub entry: QueueEntry,
    pub affinity: Affinity,
    /// 1-based
    pub position: u32,
}

fn join_order(a: &QueueEntry, b: &QueueEntry) -> Ordering {
    a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id))
}

/// Group waiting entries by affinity, each group in join order.
///
/// Non-waiting entries are dropped. The input order does not matter.
pub fn partition_by_affinity(entries: &[QueueEntry]) -> BTreeMap<Affinity, Vec<&QueueEntry>> {
    let mut partitions: BTreeMap<Affinity, Vec<&QueueEntry>> = BTreeMap::new();
    for entry in entries.iter().filter(|e| e.is_waiting()) {
        partitions.entry(entry.affinity()).or_default().push(entry);
    }
    for members in partitions.values_mut() {
        members.sort_by(|a, b| join_order(a, b));
    }
    partitions
}

/// Rank every waiting entry within its partition.
///
/// Output is ordered by ascending position, then join order, so lower
/// positions across all partitions come first.
pub fn rank_by_affinity(entries: &[QueueEntry]) -> Vec<RankedEntry> {
    let mut ranked: Vec<RankedEntry> = partition_by_affinity(entries)
        .into_iter()
        .flat_map(|(affinity, members)| {
            members
                .into_iter()
                .enumerate()
                .map(move |(idx, entry)| RankedEntry {
                    entry: entry.clone(),
                    affinity: affinity.clone(),
                    position: idx as u32 + 1,
                })
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| join_order(&a.entry, &b.entry))
    });
    ranked
}
