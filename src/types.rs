/*!
 * Tracking Types
 * Common types for allocation tracking
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Byte count type for tracked allocations
pub type Size = usize;

/// Context identifier type
pub type ContextId = u32;

/// Tracking operation result
pub type TrackResult<T> = Result<T, TrackError>;

/// Opaque handle to a tracked block.
///
/// Sequence numbers are never reused within a context, so a handle that is
/// absent from the block table can be classified precisely: either the block
/// was freed (double free / use after free) or it never belonged to this
/// context at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId {
    context: ContextId,
    seq: u64,
}

impl BlockId {
    pub(crate) fn new(context: ContextId, seq: u64) -> Self {
        Self { context, seq }
    }

    /// Id of the context that minted this handle
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Allocation sequence number within the owning context
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.context, self.seq)
    }
}

/// Call-site record attached to every allocation. Diagnostics only, never
/// affects control flow. Captured by the `origin!()` macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub file: &'static str,
    pub function: &'static str,
    pub line: u32,
}

impl Provenance {
    pub const fn new(file: &'static str, function: &'static str, line: u32) -> Self {
        Self {
            file,
            function,
            line,
        }
    }

    /// File name with the compiler-supplied path prefix stripped
    pub fn short_file(&self) -> &'static str {
        self.file
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or(self.file)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at {}:{}", self.function, self.short_file(), self.line)
    }
}

/// Captures the provenance of the call site: file, enclosing function path,
/// and line number.
#[macro_export]
macro_rules! origin {
    () => {{
        fn __f() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let __name = __type_name_of(__f);
        let __name = __name.strip_suffix("::__f").unwrap_or(__name);
        $crate::types::Provenance::new(::std::file!(), __name, ::std::line!())
    }};
}

/// Tracking errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    #[error("out of memory: requested {requested} bytes, available {available} bytes ({used} used / {limit} limit)")]
    OutOfMemory {
        requested: Size,
        available: Size,
        used: Size,
        limit: Size,
    },

    #[error("block {block} does not belong to context {context}")]
    ForeignBlock { block: BlockId, context: ContextId },

    #[error("block {block} was already freed (allocated by {allocated_at})")]
    BlockFreed {
        block: BlockId,
        allocated_at: Provenance,
    },

    #[error("block {block} is not tracked by this context")]
    UntrackedBlock { block: BlockId },

    #[error("range {offset}+{len} out of bounds for block {block} ({size} bytes)")]
    OutOfBounds {
        block: BlockId,
        offset: Size,
        len: Size,
        size: Size,
    },

    #[error("corruption detected in block {block}: {fault}")]
    Corruption { block: BlockId, fault: BlockFault },
}

impl TrackError {
    /// True for errors that indicate a bug in the calling code rather than a
    /// runtime resource condition. In strict mode these abort the process.
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            TrackError::ForeignBlock { .. }
                | TrackError::BlockFreed { .. }
                | TrackError::UntrackedBlock { .. }
                | TrackError::Corruption { .. }
        )
    }
}

/// Block validation faults
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFault {
    #[error("header canary overwritten")]
    HeaderCanary,

    #[error("footer canary overwritten")]
    FooterCanary,

    #[error("stored size {stored} does not match layout size {actual}")]
    SizeMismatch { stored: Size, actual: Size },
}

/// Context statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextStats {
    /// Successful allocation count
    pub allocs: u64,
    /// Successful free count
    pub frees: u64,
    /// Successful in-place reallocation count
    pub reallocs: u64,
    /// Blocks currently live
    pub live_blocks: usize,
    /// Bytes currently allocated, as requested by callers
    pub current_bytes: usize,
    /// Bytes currently allocated including guard regions
    pub real_bytes: usize,
    /// High-water mark of `current_bytes`
    pub peak_bytes: usize,
    /// Cumulative requested bytes over the context lifetime
    pub total_bytes: usize,
    /// Byte capacity, if the context is limited
    pub limit: Option<usize>,
}

impl ContextStats {
    /// Usage as a percentage of capacity; `None` for unlimited contexts
    pub fn usage_percentage(&self) -> Option<f64> {
        self.limit
            .map(|limit| (self.current_bytes as f64 / limit as f64) * 100.0)
    }

    pub fn pressure(&self) -> MemoryPressure {
        match self.usage_percentage() {
            Some(pct) if pct >= 95.0 => MemoryPressure::Critical,
            Some(pct) if pct >= 80.0 => MemoryPressure::High,
            Some(pct) if pct >= 60.0 => MemoryPressure::Medium,
            _ => MemoryPressure::Low,
        }
    }
}

/// Memory pressure levels for capacity-limited contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryPressure {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for MemoryPressure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MemoryPressure::Low => write!(f, "LOW"),
            MemoryPressure::Medium => write!(f, "MEDIUM"),
            MemoryPressure::High => write!(f, "HIGH"),
            MemoryPressure::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Snapshot of a live block
#[derive(Debug, Clone, Serialize)]
pub struct BlockInfo {
    pub id: BlockId,
    pub size: Size,
    pub origin: Provenance,
}

/// A block still live at context teardown, with a bounded payload prefix for
/// the report's hex dump
#[derive(Debug, Clone, Serialize)]
pub struct LeakRecord {
    pub id: BlockId,
    pub size: Size,
    pub origin: Provenance,
    pub data: Vec<u8>,
}
