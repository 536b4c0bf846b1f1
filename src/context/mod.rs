/*!
 * Memory Context
 *
 * The accounting boundary for a set of tracked allocations. A context owns
 * its live blocks, keeps byte totals, detects contract violations loudly,
 * and reports leaks when it is torn down.
 *
 * Contexts are cheaply clonable; all clones share one underlying core and
 * the last one dropped emits the leak report.
 */

mod alloc;
mod check;
mod data;
mod freed;
pub mod report;
mod stats;

use crate::types::*;
use ahash::RandomState;
use dashmap::DashMap;
use self::freed::FreedLog;
use log::error;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Bytes of canary guard on each side of a payload
pub(crate) const GUARD_SIZE: usize = 8;

/// Payload fill pattern applied at allocation
pub(crate) const FILL_ON_INIT: u8 = 0x0F;

/// Payload fill pattern applied before release
pub(crate) const FILL_ON_FREE: u8 = 0xFF;

pub(crate) const HEADER_CANARY: [u8; GUARD_SIZE] = 0xCAFE_FACE_CAFE_FACEu64.to_le_bytes();
pub(crate) const FOOTER_CANARY: [u8; GUARD_SIZE] = 0xDEAD_BEEF_DEAD_BEEFu64.to_le_bytes();

static NEXT_CONTEXT_ID: AtomicU32 = AtomicU32::new(1);

/// A tracked block: metadata plus the payload buffer, guard regions
/// included. The handle-table entry is the memory-safe counterpart of a
/// header placed in front of raw allocator memory.
#[derive(Debug)]
pub(crate) struct TrackedBlock {
    /// Bytes requested by the caller
    pub size: Size,
    /// Allocation order within the context, for report ordering
    pub seq: u64,
    /// Call site of the most recent alloc/realloc
    pub origin: Provenance,
    /// Guard region, payload, guard region
    pub data: Vec<u8>,
}

impl TrackedBlock {
    pub(crate) fn new(size: Size, seq: u64, origin: Provenance) -> Self {
        Self {
            size,
            seq,
            origin,
            data: Self::guarded_buffer(size),
        }
    }

    /// Payload buffer with canaries laid down and the payload bytes set to
    /// the init fill pattern
    fn guarded_buffer(size: Size) -> Vec<u8> {
        let mut data = vec![FILL_ON_INIT; size + 2 * GUARD_SIZE];
        data[..GUARD_SIZE].copy_from_slice(&HEADER_CANARY);
        data[GUARD_SIZE + size..].copy_from_slice(&FOOTER_CANARY);
        data
    }

    pub(crate) fn payload(&self) -> &[u8] {
        &self.data[GUARD_SIZE..GUARD_SIZE + self.size]
    }

    pub(crate) fn payload_mut(&mut self) -> &mut [u8] {
        let size = self.size;
        &mut self.data[GUARD_SIZE..GUARD_SIZE + size]
    }

    /// Bytes of the whole allocation, guards included
    pub(crate) fn real_size(&self) -> Size {
        self.size + 2 * GUARD_SIZE
    }

    /// Resize in place, preserving the payload prefix
    pub(crate) fn resize(&mut self, new_size: Size) {
        let mut data = Self::guarded_buffer(new_size);
        let keep = self.size.min(new_size);
        data[GUARD_SIZE..GUARD_SIZE + keep]
            .copy_from_slice(&self.data[GUARD_SIZE..GUARD_SIZE + keep]);
        self.data = data;
        self.size = new_size;
    }
}

pub(crate) struct ContextCore {
    pub(crate) id: ContextId,
    pub(crate) label: Option<String>,
    pub(crate) limit: Option<Size>,
    pub(crate) strict: bool,
    pub(crate) leak_log: Option<PathBuf>,
    pub(crate) blocks: DashMap<BlockId, TrackedBlock, RandomState>,
    pub(crate) next_seq: AtomicU64,
    pub(crate) current_bytes: AtomicU64,
    pub(crate) peak_bytes: AtomicU64,
    pub(crate) total_bytes: AtomicU64,
    pub(crate) allocs: AtomicU64,
    pub(crate) frees: AtomicU64,
    pub(crate) reallocs: AtomicU64,
    pub(crate) freed: Mutex<FreedLog>,
    pub(crate) reported: AtomicBool,
}

impl ContextCore {
    /// Context label for diagnostics, falling back to the numeric id
    pub(crate) fn describe(&self) -> String {
        match &self.label {
            Some(label) => format!("{} (#{})", label, self.id),
            None => format!("#{}", self.id),
        }
    }
}

impl Drop for ContextCore {
    fn drop(&mut self) {
        let _ = report::teardown(self);
    }
}

/// Memory context handle
#[derive(Clone)]
pub struct MemContext {
    pub(crate) core: Arc<ContextCore>,
}

impl MemContext {
    /// Create an unlimited, strict context with no leak-log file
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a context with a byte capacity; allocations beyond it fail
    /// with `OutOfMemory`
    pub fn with_capacity(limit: Size) -> Self {
        Self::builder().capacity(limit).build()
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    pub fn id(&self) -> ContextId {
        self.core.id
    }

    pub fn label(&self) -> Option<&str> {
        self.core.label.as_deref()
    }

    /// Tear the context down and return the leak report for inspection.
    ///
    /// Emits the report through the configured sink exactly once; if other
    /// clones of this context are still alive they keep working, but no
    /// further teardown report fires when they drop.
    pub fn destroy(self) -> report::LeakReport {
        report::teardown(&self.core).unwrap_or_else(|| report::snapshot_report(&self.core))
    }

    /// Report a contract violation: logged with provenance, escalated to a
    /// panic in strict mode, otherwise handed back for the caller to return.
    pub(crate) fn reject(&self, err: TrackError) -> TrackError {
        error!("contract violation in context {}: {}", self.core.describe(), err);
        if self.core.strict {
            panic!("memtrack contract violation: {err}");
        }
        err
    }

    /// Classify a handle that is absent from the block table
    pub(crate) fn classify_missing(&self, block: BlockId) -> TrackError {
        if block.context() != self.core.id {
            return TrackError::ForeignBlock {
                block,
                context: self.core.id,
            };
        }
        let freed = self.core.freed.lock();
        match freed.find(block) {
            Some(record) => {
                log::debug!(
                    "block {} was freed earlier ({} bytes, allocated by {})",
                    block,
                    record.size,
                    record.origin
                );
                TrackError::BlockFreed {
                    block,
                    allocated_at: record.origin,
                }
            }
            None => TrackError::UntrackedBlock { block },
        }
    }
}

impl Default for MemContext {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::traits::TrackedAlloc for MemContext {
    fn alloc(&self, size: Size, origin: Provenance) -> TrackResult<BlockId> {
        MemContext::alloc(self, size, origin)
    }

    fn realloc(
        &self,
        block: Option<BlockId>,
        new_size: Size,
        origin: Provenance,
    ) -> TrackResult<Option<BlockId>> {
        MemContext::realloc(self, block, new_size, origin)
    }

    fn free(&self, block: BlockId) -> TrackResult<()> {
        MemContext::free(self, block)
    }

    fn is_live(&self, block: BlockId) -> bool {
        MemContext::is_live(self, block)
    }

    fn block_size(&self, block: BlockId) -> Option<Size> {
        MemContext::block_size(self, block)
    }
}

impl crate::traits::ContextInfo for MemContext {
    fn stats(&self) -> ContextStats {
        MemContext::stats(self)
    }

    fn total(&self) -> Size {
        MemContext::total(self)
    }

    fn live_blocks(&self) -> Vec<BlockInfo> {
        MemContext::live_blocks(self)
    }
}

impl crate::traits::Validate for MemContext {
    fn check(&self, block: BlockId) -> TrackResult<()> {
        MemContext::check(self, block)
    }

    fn check_all(&self) -> TrackResult<()> {
        MemContext::check_all(self)
    }
}

impl crate::traits::LeakCheck for MemContext {
    fn leaks(&self) -> Vec<LeakRecord> {
        MemContext::leaks(self)
    }

    fn leak_report(&self) -> report::LeakReport {
        MemContext::leak_report(self)
    }
}

/// Context configuration builder
#[derive(Debug, Default)]
pub struct ContextBuilder {
    label: Option<String>,
    limit: Option<Size>,
    lenient: bool,
    leak_log: Option<PathBuf>,
}

impl ContextBuilder {
    /// Human-readable name used in diagnostics and reports, so tracking can
    /// be separated between subsystems (network, gui, ...)
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Byte capacity; allocations beyond it fail with `OutOfMemory`
    pub fn capacity(mut self, limit: Size) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether contract violations abort the process (default) or are
    /// returned as errors
    pub fn strict(mut self, strict: bool) -> Self {
        self.lenient = !strict;
        self
    }

    /// File the teardown leak report is written to. Falls back to stderr if
    /// the file cannot be created.
    pub fn leak_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.leak_log = Some(path.into());
        self
    }

    pub fn build(self) -> MemContext {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::SeqCst);
        MemContext {
            core: Arc::new(ContextCore {
                id,
                label: self.label,
                limit: self.limit,
                strict: !self.lenient,
                leak_log: self.leak_log,
                blocks: DashMap::with_hasher(RandomState::new()),
                next_seq: AtomicU64::new(1),
                current_bytes: AtomicU64::new(0),
                peak_bytes: AtomicU64::new(0),
                total_bytes: AtomicU64::new(0),
                allocs: AtomicU64::new(0),
                frees: AtomicU64::new(0),
                reallocs: AtomicU64::new(0),
                freed: Mutex::new(FreedLog::new()),
                reported: AtomicBool::new(false),
            }),
        }
    }
}
