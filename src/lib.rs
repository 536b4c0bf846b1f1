/*!
 * memtrack
 * Per-context memory allocation tracking with leak detection
 */

pub mod context;
pub mod global;
pub mod traits;
pub mod types;

// Re-exports
pub use context::report::LeakReport;
pub use context::{ContextBuilder, MemContext};
pub use global::global;
pub use traits::{ContextInfo, LeakCheck, TrackedAlloc, Validate};
pub use types::{
    BlockFault, BlockId, BlockInfo, ContextId, ContextStats, LeakRecord, MemoryPressure,
    Provenance, Size, TrackError, TrackResult,
};
