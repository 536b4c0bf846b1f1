/*!
 * Tracked Allocation Operations
 * Allocate, reallocate, and free with per-context accounting
 */

use super::{MemContext, TrackedBlock, FILL_ON_FREE};
use crate::types::*;
use log::{error, info, warn};
use std::sync::atomic::Ordering;

impl MemContext {
    /// Allocate a tracked block of `size` bytes.
    ///
    /// A zero-byte request is valid and yields a live zero-size block. On
    /// capacity exhaustion nothing is mutated and `OutOfMemory` is
    /// returned.
    pub fn alloc(&self, size: Size, origin: Provenance) -> TrackResult<BlockId> {
        let core = &self.core;

        // Reserve atomically, revert if the capacity check fails
        let size_u64 = size as u64;
        let used = core.current_bytes.fetch_add(size_u64, Ordering::SeqCst);

        if let Some(limit) = core.limit {
            if used + size_u64 > limit as u64 {
                core.current_bytes.fetch_sub(size_u64, Ordering::SeqCst);

                let available = limit.saturating_sub(used as usize);
                error!(
                    "OOM: context {} requested {} bytes, only {} bytes available ({} used / {} limit)",
                    core.describe(),
                    size,
                    available,
                    used,
                    limit
                );

                return Err(TrackError::OutOfMemory {
                    requested: size,
                    available,
                    used: used as usize,
                    limit,
                });
            }
        }

        let seq = core.next_seq.fetch_add(1, Ordering::SeqCst);
        let block = BlockId::new(core.id, seq);
        core.blocks.insert(block, TrackedBlock::new(size, seq, origin));

        core.allocs.fetch_add(1, Ordering::SeqCst);
        core.total_bytes.fetch_add(size_u64, Ordering::SeqCst);
        core.peak_bytes.fetch_max(used + size_u64, Ordering::SeqCst);

        let now_used = used as usize + size;
        if let Some(level) = self.pressure_at(now_used) {
            warn!(
                "Memory pressure {}: allocated {} bytes as {} for context {} [{}]",
                level,
                size,
                block,
                core.describe(),
                origin
            );
        } else {
            info!(
                "Allocated {} bytes as {} for context {} [{}]",
                size,
                block,
                core.describe(),
                origin
            );
        }

        Ok(block)
    }

    /// Resize a tracked block in place.
    ///
    /// `None` behaves as `alloc`; a new size of zero behaves as `free` and
    /// returns `None`. Otherwise the handle stays valid, the payload prefix
    /// is preserved, the context total moves by the exact delta, and the
    /// provenance is replaced with the new call site. A failed growth
    /// leaves the block and the accounting untouched.
    pub fn realloc(
        &self,
        block: Option<BlockId>,
        new_size: Size,
        origin: Provenance,
    ) -> TrackResult<Option<BlockId>> {
        let Some(block) = block else {
            return self.alloc(new_size, origin).map(Some);
        };

        if new_size == 0 {
            self.free(block)?;
            return Ok(None);
        }

        let core = &self.core;
        let Some(mut entry) = core.blocks.get_mut(&block) else {
            let err = self.classify_missing(block);
            return Err(self.reject(err));
        };

        let old_size = entry.size;
        if new_size > old_size {
            let delta = (new_size - old_size) as u64;
            let used = core.current_bytes.fetch_add(delta, Ordering::SeqCst);

            if let Some(limit) = core.limit {
                if used + delta > limit as u64 {
                    core.current_bytes.fetch_sub(delta, Ordering::SeqCst);

                    let available = limit.saturating_sub(used as usize);
                    error!(
                        "OOM: context {} grow of {} from {} to {} bytes failed, only {} bytes available",
                        core.describe(),
                        block,
                        old_size,
                        new_size,
                        available
                    );

                    return Err(TrackError::OutOfMemory {
                        requested: new_size - old_size,
                        available,
                        used: used as usize,
                        limit,
                    });
                }
            }

            core.total_bytes.fetch_add(delta, Ordering::SeqCst);
            core.peak_bytes.fetch_max(used + delta, Ordering::SeqCst);
        } else {
            core.current_bytes
                .fetch_sub((old_size - new_size) as u64, Ordering::SeqCst);
        }

        entry.resize(new_size);
        entry.origin = origin;
        core.reallocs.fetch_add(1, Ordering::SeqCst);

        info!(
            "Reallocated {} from {} to {} bytes for context {} [{}]",
            block,
            old_size,
            new_size,
            core.describe(),
            origin
        );

        Ok(Some(block))
    }

    /// Release a tracked block.
    ///
    /// Double frees, handles from another context, and untracked handles
    /// are contract violations: reported with provenance and, in strict
    /// mode, escalated to a panic.
    pub fn free(&self, block: BlockId) -> TrackResult<()> {
        let core = &self.core;

        let Some((_, mut dead)) = core.blocks.remove(&block) else {
            let err = self.classify_missing(block);
            return Err(self.reject(err));
        };

        core.frees.fetch_add(1, Ordering::SeqCst);
        core.current_bytes
            .fetch_sub(dead.size as u64, Ordering::SeqCst);
        core.freed.lock().push(block, dead.size, dead.origin);

        // Highlight any stale copies of the payload
        dead.data.fill(FILL_ON_FREE);

        info!(
            "Freed {} bytes ({} real) at {} for context {} (allocated by {})",
            dead.size,
            dead.real_size(),
            block,
            core.describe(),
            dead.origin
        );

        Ok(())
    }

    /// Check if a handle refers to a live block of this context
    pub fn is_live(&self, block: BlockId) -> bool {
        block.context() == self.core.id && self.core.blocks.contains_key(&block)
    }

    /// Get the requested size of a live block
    pub fn block_size(&self, block: BlockId) -> Option<Size> {
        self.core.blocks.get(&block).map(|entry| entry.size)
    }

    pub(super) fn pressure_at(&self, used: Size) -> Option<MemoryPressure> {
        let limit = self.core.limit?;
        let usage_ratio = used as f64 / limit as f64;

        if usage_ratio >= 0.95 {
            Some(MemoryPressure::Critical)
        } else if usage_ratio >= 0.80 {
            Some(MemoryPressure::High)
        } else if usage_ratio >= 0.60 {
            Some(MemoryPressure::Medium)
        } else {
            None
        }
    }
}
