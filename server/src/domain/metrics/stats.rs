//! Pipeline outcome counters

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

#[derive(Default)]
struct OutcomeCounters {
    inserted: AtomicU64,
    dropped: AtomicU64,
}

/// Per-project snapshot of pipeline outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeSnapshot {
    pub inserted: u64,
    pub dropped: u64,
}

/// Per-project counts of stored and discarded datapoints.
///
/// Shared across batch workers; counters are monotonic for the lifetime of
/// the processor and periodically logged by the stats task.
#[derive(Default)]
pub struct ProcessorStats {
    projects: DashMap<u32, OutcomeCounters>,
}

impl ProcessorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_inserted(&self, project_id: u32, count: u64) {
        if count > 0 {
            self.projects
                .entry(project_id)
                .or_default()
                .inserted
                .fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn record_dropped(&self, project_id: u32, count: u64) {
        if count > 0 {
            self.projects
                .entry(project_id)
                .or_default()
                .dropped
                .fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Current totals for one project
    pub fn project(&self, project_id: u32) -> OutcomeSnapshot {
        self.projects
            .get(&project_id)
            .map(|c| OutcomeSnapshot {
                inserted: c.inserted.load(Ordering::Relaxed),
                dropped: c.dropped.load(Ordering::Relaxed),
            })
            .unwrap_or(OutcomeSnapshot {
                inserted: 0,
                dropped: 0,
            })
    }

    /// Totals across all projects, sorted by project id for stable logging
    pub fn snapshot(&self) -> Vec<(u32, OutcomeSnapshot)> {
        let mut entries: Vec<(u32, OutcomeSnapshot)> = self
            .projects
            .iter()
            .map(|entry| {
                (
                    *entry.key(),
                    OutcomeSnapshot {
                        inserted: entry.inserted.load(Ordering::Relaxed),
                        dropped: entry.dropped.load(Ordering::Relaxed),
                    },
                )
            })
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_per_project() {
        let stats = ProcessorStats::new();
        stats.record_inserted(1, 10);
        stats.record_inserted(1, 5);
        stats.record_dropped(1, 2);
        stats.record_inserted(2, 7);

        assert_eq!(
            stats.project(1),
            OutcomeSnapshot {
                inserted: 15,
                dropped: 2
            }
        );
        assert_eq!(
            stats.project(2),
            OutcomeSnapshot {
                inserted: 7,
                dropped: 0
            }
        );
    }

    #[test]
    fn test_zero_counts_create_no_entries() {
        let stats = ProcessorStats::new();
        stats.record_inserted(1, 0);
        assert!(stats.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_sorted_by_project() {
        let stats = ProcessorStats::new();
        stats.record_inserted(3, 1);
        stats.record_inserted(1, 1);
        stats.record_inserted(2, 1);

        let ids: Vec<u32> = stats.snapshot().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
