/*!
 * Default Context
 * Process-wide context plus call-site capture macros
 */

use crate::context::MemContext;
use std::sync::OnceLock;

static GLOBAL: OnceLock<MemContext> = OnceLock::new();

/// The process-wide default context.
///
/// Initialized on first use: unlimited capacity, strict violations, no
/// leak-log file. Code that wants separate accounting (network, gui, ...)
/// creates its own contexts and passes them to the `track_*!` macros
/// explicitly.
pub fn global() -> &'static MemContext {
    GLOBAL.get_or_init(|| MemContext::builder().label("global").build())
}

/// Tracked allocation with automatic call-site capture.
///
/// `track_alloc!(size)` uses the default context; `track_alloc!(ctx, size)`
/// uses an explicit one.
#[macro_export]
macro_rules! track_alloc {
    ($size:expr) => {
        $crate::global().alloc($size, $crate::origin!())
    };
    ($ctx:expr, $size:expr) => {
        $ctx.alloc($size, $crate::origin!())
    };
}

/// Tracked reallocation with automatic call-site capture.
///
/// `track_realloc!(block, size)` uses the default context;
/// `track_realloc!(ctx, block, size)` uses an explicit one.
#[macro_export]
macro_rules! track_realloc {
    ($block:expr, $size:expr) => {
        $crate::global().realloc($block, $size, $crate::origin!())
    };
    ($ctx:expr, $block:expr, $size:expr) => {
        $ctx.realloc($block, $size, $crate::origin!())
    };
}

/// Tracked free. `track_free!(block)` uses the default context;
/// `track_free!(ctx, block)` uses an explicit one.
#[macro_export]
macro_rules! track_free {
    ($block:expr) => {
        $crate::global().free($block)
    };
    ($ctx:expr, $block:expr) => {
        $ctx.free($block)
    };
}
