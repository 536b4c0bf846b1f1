/*!
 * Context Statistics
 * Totals, live-set snapshots, and leak candidates
 */

use super::report::{self, LeakReport};
use super::{ContextCore, MemContext, GUARD_SIZE};
use crate::types::*;
use std::sync::atomic::Ordering;

/// Bytes of a leaked payload carried into the report's hex dump
pub(crate) const DATA_DUMP_LIMIT: usize = 1024;

pub(crate) fn snapshot_stats(core: &ContextCore) -> ContextStats {
    let live_blocks = core.blocks.len();
    let current_bytes = core.current_bytes.load(Ordering::SeqCst) as usize;

    ContextStats {
        allocs: core.allocs.load(Ordering::SeqCst),
        frees: core.frees.load(Ordering::SeqCst),
        reallocs: core.reallocs.load(Ordering::SeqCst),
        live_blocks,
        current_bytes,
        real_bytes: current_bytes + live_blocks * 2 * GUARD_SIZE,
        peak_bytes: core.peak_bytes.load(Ordering::SeqCst) as usize,
        total_bytes: core.total_bytes.load(Ordering::SeqCst) as usize,
        limit: core.limit,
    }
}

pub(crate) fn snapshot_leaks(core: &ContextCore) -> Vec<LeakRecord> {
    let mut leaks: Vec<LeakRecord> = core
        .blocks
        .iter()
        .map(|entry| {
            let block = entry.value();
            let dump = block.size.min(DATA_DUMP_LIMIT);
            LeakRecord {
                id: *entry.key(),
                size: block.size,
                origin: block.origin,
                data: block.payload()[..dump].to_vec(),
            }
        })
        .collect();

    // The hash table loses allocation order; the per-block sequence number
    // restores it for reporting
    leaks.sort_by_key(|leak| leak.id.seq());
    leaks
}

impl MemContext {
    /// Get context statistics
    pub fn stats(&self) -> ContextStats {
        snapshot_stats(&self.core)
    }

    /// Bytes currently allocated under this context
    pub fn total(&self) -> Size {
        self.core.current_bytes.load(Ordering::SeqCst) as usize
    }

    /// Snapshot of all live blocks, in allocation order
    pub fn live_blocks(&self) -> Vec<BlockInfo> {
        let mut blocks: Vec<BlockInfo> = self
            .core
            .blocks
            .iter()
            .map(|entry| BlockInfo {
                id: *entry.key(),
                size: entry.size,
                origin: entry.origin,
            })
            .collect();

        blocks.sort_by_key(|block| block.id.seq());
        blocks
    }

    /// Get memory pressure level
    pub fn pressure(&self) -> MemoryPressure {
        self.stats().pressure()
    }

    /// Blocks that would be reported as leaks if the context were torn down
    /// now
    pub fn leaks(&self) -> Vec<LeakRecord> {
        snapshot_leaks(&self.core)
    }

    /// Build the full report without tearing the context down
    pub fn leak_report(&self) -> LeakReport {
        report::snapshot_report(&self.core)
    }
}
