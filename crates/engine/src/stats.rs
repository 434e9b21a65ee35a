//! Engine counters
//!
//! Cheap atomic counters bumped on the hot paths and surfaced through
//! the context's stats call. Reading a snapshot never blocks writers.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic operation counters
#[derive(Debug, Default)]
pub struct EngineStats {
    arrays_created: AtomicU64,
    arrays_opened: AtomicU64,
    fragments_written: AtomicU64,
    cells_written: AtomicU64,
    read_submits: AtomicU64,
    cells_read: AtomicU64,
    consolidations: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Arrays created since engine construction
    pub arrays_created: u64,
    /// Array opens (including reopens)
    pub arrays_opened: u64,
    /// Fragments written
    pub fragments_written: u64,
    /// Cells written across all fragments
    pub cells_written: u64,
    /// Read submits served
    pub read_submits: u64,
    /// Cells delivered to read buffers
    pub cells_read: u64,
    /// Consolidation passes run
    pub consolidations: u64,
}

impl EngineStats {
    pub(crate) fn on_array_created(&self) {
        self.arrays_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_array_opened(&self) {
        self.arrays_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_fragment_written(&self, cells: u64) {
        self.fragments_written.fetch_add(1, Ordering::Relaxed);
        self.cells_written.fetch_add(cells, Ordering::Relaxed);
    }

    pub(crate) fn on_read_submit(&self, cells: u64) {
        self.read_submits.fetch_add(1, Ordering::Relaxed);
        self.cells_read.fetch_add(cells, Ordering::Relaxed);
    }

    pub(crate) fn on_consolidation(&self) {
        self.consolidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            arrays_created: self.arrays_created.load(Ordering::Relaxed),
            arrays_opened: self.arrays_opened.load(Ordering::Relaxed),
            fragments_written: self.fragments_written.load(Ordering::Relaxed),
            cells_written: self.cells_written.load(Ordering::Relaxed),
            read_submits: self.read_submits.load(Ordering::Relaxed),
            cells_read: self.cells_read.load(Ordering::Relaxed),
            consolidations: self.consolidations.load(Ordering::Relaxed),
        }
    }
}
