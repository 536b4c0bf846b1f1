/*!
 * Context Tests
 * Allocation, accounting, payload access, and OOM handling
 */

use memtrack::{origin, MemContext, MemoryPressure, TrackError};
use pretty_assertions::assert_eq;

#[test]
fn test_context_initialization() {
    let ctx = MemContext::new();
    let stats = ctx.stats();

    assert_eq!(ctx.total(), 0);
    assert_eq!(stats.allocs, 0);
    assert_eq!(stats.frees, 0);
    assert_eq!(stats.live_blocks, 0);
    assert_eq!(stats.limit, None);
    assert_eq!(ctx.pressure(), MemoryPressure::Low);
    assert!(ctx.leaks().is_empty());
}

#[test]
fn test_basic_allocation() {
    let ctx = MemContext::new();
    let size = 1024;

    let block = ctx.alloc(size, origin!()).expect("Failed to allocate");

    assert_eq!(ctx.total(), size);
    assert!(ctx.is_live(block));
    assert_eq!(ctx.block_size(block), Some(size));

    let stats = ctx.stats();
    assert_eq!(stats.allocs, 1);
    assert_eq!(stats.live_blocks, 1);
    assert_eq!(stats.peak_bytes, size);
}

#[test]
fn test_multiple_allocations() {
    let ctx = MemContext::new();

    let b1 = ctx.alloc(1024, origin!()).unwrap();
    let b2 = ctx.alloc(2048, origin!()).unwrap();
    let b3 = ctx.alloc(4096, origin!()).unwrap();

    assert_ne!(b1, b2);
    assert_ne!(b2, b3);
    assert_ne!(b1, b3);

    assert_eq!(ctx.total(), 1024 + 2048 + 4096);

    // Snapshot comes back in allocation order
    let live = ctx.live_blocks();
    assert_eq!(live.len(), 3);
    assert_eq!(live[0].id, b1);
    assert_eq!(live[1].id, b2);
    assert_eq!(live[2].id, b3);
}

#[test]
fn test_allocation_and_free() {
    let ctx = MemContext::new();
    let size = 1024 * 1024;

    let block = ctx.alloc(size, origin!()).unwrap();
    assert_eq!(ctx.total(), size);

    ctx.free(block).expect("Failed to free");
    assert_eq!(ctx.total(), 0);
    assert!(!ctx.is_live(block));
    assert_eq!(ctx.block_size(block), None);

    let stats = ctx.stats();
    assert_eq!(stats.frees, 1);
    assert_eq!(stats.live_blocks, 0);
    // Peak survives the free
    assert_eq!(stats.peak_bytes, size);
}

#[test]
fn test_zero_byte_allocation() {
    let ctx = MemContext::new();

    let block = ctx.alloc(0, origin!()).expect("zero-size alloc is valid");

    assert!(ctx.is_live(block));
    assert_eq!(ctx.block_size(block), Some(0));
    assert_eq!(ctx.total(), 0);
    assert_eq!(ctx.stats().live_blocks, 1);

    ctx.free(block).unwrap();
    assert_eq!(ctx.stats().live_blocks, 0);
}

#[test]
fn test_out_of_memory() {
    let ctx = MemContext::with_capacity(1024);

    let result = ctx.alloc(2048, origin!());

    match result {
        Err(TrackError::OutOfMemory {
            requested,
            available,
            used,
            limit,
        }) => {
            assert_eq!(requested, 2048);
            assert_eq!(available, 1024);
            assert_eq!(used, 0);
            assert_eq!(limit, 1024);
        }
        other => panic!("Expected OutOfMemory error, got {:?}", other),
    }

    // Failed allocation mutates nothing
    assert_eq!(ctx.total(), 0);
    assert_eq!(ctx.stats().allocs, 0);
    assert_eq!(ctx.stats().live_blocks, 0);
}

#[test]
fn test_oom_after_partial_allocation() {
    let ctx = MemContext::with_capacity(1024);

    ctx.alloc(512, origin!()).unwrap();
    let result = ctx.alloc(1024, origin!());

    match result {
        Err(TrackError::OutOfMemory { available, .. }) => assert_eq!(available, 512),
        other => panic!("Expected OutOfMemory error, got {:?}", other),
    }
    assert_eq!(ctx.total(), 512);
}

#[test]
fn test_pressure_levels() {
    let ctx = MemContext::with_capacity(1000);
    assert_eq!(ctx.pressure(), MemoryPressure::Low);

    let block = ctx.alloc(700, origin!()).unwrap();
    assert_eq!(ctx.pressure(), MemoryPressure::Medium);

    ctx.realloc(Some(block), 850, origin!()).unwrap();
    assert_eq!(ctx.pressure(), MemoryPressure::High);

    ctx.realloc(Some(block), 960, origin!()).unwrap();
    assert_eq!(ctx.pressure(), MemoryPressure::Critical);
}

#[test]
fn test_write_and_read() {
    let ctx = MemContext::new();
    let block = ctx.alloc(32, origin!()).unwrap();

    ctx.write(block, 4, b"hello").expect("Failed to write");

    let data = ctx.read(block, 4, 5).expect("Failed to read");
    assert_eq!(&data, b"hello");

    // Never-written bytes carry the init fill pattern
    let untouched = ctx.read(block, 0, 4).unwrap();
    assert_eq!(untouched, vec![0x0F; 4]);
}

#[test]
fn test_out_of_bounds_access() {
    let ctx = MemContext::new();
    let block = ctx.alloc(16, origin!()).unwrap();
    ctx.write(block, 0, b"0123456789abcdef").unwrap();

    let write_err = ctx.write(block, 12, b"too long").unwrap_err();
    assert_eq!(
        write_err,
        TrackError::OutOfBounds {
            block,
            offset: 12,
            len: 8,
            size: 16,
        }
    );

    let read_err = ctx.read(block, 16, 1).unwrap_err();
    assert!(matches!(read_err, TrackError::OutOfBounds { .. }));

    // Failed accesses mutate nothing
    let data = ctx.read(block, 0, 16).unwrap();
    assert_eq!(&data, b"0123456789abcdef");
}

#[test]
fn test_check_all_on_live_blocks() {
    let ctx = MemContext::new();
    let b1 = ctx.alloc(64, origin!()).unwrap();
    ctx.alloc(128, origin!()).unwrap();

    ctx.write(b1, 0, &[0xAA; 64]).unwrap();

    ctx.check(b1).expect("block should validate");
    ctx.check_all().expect("all blocks should validate");
}

#[test]
fn test_provenance_recorded() {
    let ctx = MemContext::new();
    ctx.alloc(64, origin!()).unwrap();

    let live = ctx.live_blocks();
    assert!(live[0].origin.function.contains("test_provenance_recorded"));
    assert_eq!(live[0].origin.short_file(), "context_test.rs");
    assert!(live[0].origin.line > 0);
}

#[test]
fn test_stats_serialize_to_json() {
    let ctx = MemContext::with_capacity(4096);
    ctx.alloc(100, origin!()).unwrap();

    let value = serde_json::to_value(ctx.stats()).expect("stats should serialize");
    assert_eq!(value["current_bytes"], 100);
    assert_eq!(value["allocs"], 1);
    assert_eq!(value["limit"], 4096);
}

#[test]
fn test_trait_surface() {
    use memtrack::{ContextInfo, LeakCheck, TrackedAlloc, Validate};

    fn exercise<T: TrackedAlloc + ContextInfo + Validate + LeakCheck>(tracker: &T) {
        let block = tracker.alloc(64, origin!()).unwrap();
        assert_eq!(tracker.total(), 64);
        tracker.check(block).unwrap();
        assert_eq!(tracker.leaks().len(), 1);
        tracker.free(block).unwrap();
        assert!(tracker.leak_report().is_clean());
    }

    exercise(&MemContext::new());
}

// The worked example from the accounting contract: 64, then 36, free the
// first, grow the second to 100
#[test]
fn test_accounting_walkthrough() {
    let ctx = MemContext::new();

    let first = ctx.alloc(64, origin!()).unwrap();
    assert_eq!(ctx.total(), 64);

    let second = ctx.alloc(36, origin!()).unwrap();
    assert_eq!(ctx.total(), 100);

    ctx.free(first).unwrap();
    assert_eq!(ctx.total(), 36);

    ctx.realloc(Some(second), 100, origin!()).unwrap();
    assert_eq!(ctx.total(), 100);

    ctx.free(second).unwrap();
    let report = ctx.destroy();
    assert!(report.is_clean());
}
