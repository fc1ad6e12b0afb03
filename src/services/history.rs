//! Bounded in-process log of recent processing outcomes.

use std::collections::VecDeque;

use tokio::sync::Mutex;

use crate::models::HistoryEntry;

/// Maximum retained outcomes; the oldest entry is dropped on overflow.
pub const HISTORY_CAPACITY: usize = 100;

/// Fixed-capacity ring of the most recent processing outcomes.
///
/// Written only by the worker; read concurrently by the history
/// endpoint. Readers get a snapshot, oldest first.
pub struct ProcessingHistory {
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl ProcessingHistory {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }

    /// Append an outcome, evicting the oldest past capacity.
    pub async fn push(&self, entry: HistoryEntry) {
        let mut entries = self.entries.lock().await;
        if entries.len() == HISTORY_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Snapshot of retained entries, oldest first.
    pub async fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.lock().await.iter().cloned().collect()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl Default for ProcessingHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn holds_at_most_capacity_dropping_oldest() {
        let history = ProcessingHistory::new();
        for i in 0..150 {
            history
                .push(HistoryEntry::resolved(&format!("barcode-{}", i), "p"))
                .await;
        }

        let entries = history.snapshot().await;
        assert_eq!(entries.len(), HISTORY_CAPACITY);
        // Entries 0..49 were evicted; the snapshot starts at 50.
        assert_eq!(entries[0].barcode, "barcode-50");
        assert_eq!(entries.last().unwrap().barcode, "barcode-149");
    }

    #[tokio::test]
    async fn clear_empties_the_ring() {
        let history = ProcessingHistory::new();
        history.push(HistoryEntry::abandoned("1")).await;
        assert_eq!(history.len().await, 1);
        history.clear().await;
        assert_eq!(history.len().await, 0);
        assert!(history.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn snapshot_preserves_insertion_order() {
        let history = ProcessingHistory::new();
        history.push(HistoryEntry::resolved("a", "x")).await;
        history.push(HistoryEntry::abandoned("b")).await;
        history.push(HistoryEntry::failed("c", "boom")).await;

        let entries = history.snapshot().await;
        let barcodes: Vec<_> = entries.iter().map(|e| e.barcode.as_str()).collect();
        assert_eq!(barcodes, ["a", "b", "c"]);
    }
}
