/*!
 * Tracking Traits
 * Allocation tracking abstractions
 */

use super::context::report::LeakReport;
use super::types::*;

/// Tracked allocator interface
pub trait TrackedAlloc: Send + Sync {
    /// Allocate a tracked block
    fn alloc(&self, size: Size, origin: Provenance) -> TrackResult<BlockId>;

    /// Resize a tracked block in place. `None` behaves as `alloc`; a new
    /// size of zero behaves as `free` and returns `None`.
    fn realloc(
        &self,
        block: Option<BlockId>,
        new_size: Size,
        origin: Provenance,
    ) -> TrackResult<Option<BlockId>>;

    /// Release a tracked block
    fn free(&self, block: BlockId) -> TrackResult<()>;

    /// Check if a handle refers to a live block of this context
    fn is_live(&self, block: BlockId) -> bool;

    /// Get the requested size of a live block
    fn block_size(&self, block: BlockId) -> Option<Size>;
}

/// Context statistics provider
pub trait ContextInfo: Send + Sync {
    /// Get context statistics
    fn stats(&self) -> ContextStats;

    /// Bytes currently allocated under this context
    fn total(&self) -> Size;

    /// Snapshot of all live blocks, in allocation order
    fn live_blocks(&self) -> Vec<BlockInfo>;

    /// Get memory pressure level
    fn pressure(&self) -> MemoryPressure {
        self.stats().pressure()
    }
}

/// Block integrity validation
pub trait Validate: Send + Sync {
    /// Validate one block's canaries and size agreement
    fn check(&self, block: BlockId) -> TrackResult<()>;

    /// Validate every live block; the first fault wins
    fn check_all(&self) -> TrackResult<()>;
}

/// Leak inspection
pub trait LeakCheck: Send + Sync {
    /// Blocks that would be reported as leaks if the context were torn down
    /// now, in allocation order
    fn leaks(&self) -> Vec<LeakRecord>;

    /// Build the full report without tearing the context down
    fn leak_report(&self) -> LeakReport;
}
