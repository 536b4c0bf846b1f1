/*!
 * Leak Report Tests
 * Teardown reporting, provenance, file emission, and dump limits
 */

use memtrack::{origin, MemContext};
use pretty_assertions::assert_eq;

#[test]
fn test_clean_destroy_reports_no_leaks() {
    let ctx = MemContext::new();
    let block = ctx.alloc(64, origin!()).unwrap();
    ctx.free(block).unwrap();

    let report = ctx.destroy();

    assert!(report.is_clean());
    assert_eq!(report.leaks.len(), 0);
    assert_eq!(report.stats.allocs, 1);
    assert_eq!(report.stats.frees, 1);
}

#[test]
fn test_leaked_blocks_reported_in_allocation_order() {
    let ctx = MemContext::builder().label("leaky").build();

    let b1 = ctx.alloc(256, origin!()).unwrap();
    let b2 = ctx.alloc(128, origin!()).unwrap();
    let freed = ctx.alloc(24, origin!()).unwrap();
    ctx.free(freed).unwrap();

    let report = ctx.destroy();

    assert_eq!(report.leaks.len(), 2);
    assert_eq!(report.context, format!("leaky (#{})", b1.context()));
    assert_eq!(report.leaks[0].id, b1);
    assert_eq!(report.leaks[0].size, 256);
    assert_eq!(report.leaks[1].id, b2);
    assert_eq!(report.leaks[1].size, 128);
    assert_eq!(report.stats.current_bytes, 256 + 128);

    for leak in &report.leaks {
        assert!(leak
            .origin
            .function
            .contains("test_leaked_blocks_reported_in_allocation_order"));
    }
}

#[test]
fn test_leak_provenance_follows_realloc() {
    let ctx = MemContext::new();
    let block = ctx.alloc(64, origin!()).unwrap();
    let alloc_line = ctx.live_blocks()[0].origin.line;

    ctx.realloc(Some(block), 96, origin!()).unwrap();

    let report = ctx.destroy();
    assert_eq!(report.leaks.len(), 1);
    assert_eq!(report.leaks[0].size, 96);
    assert_ne!(report.leaks[0].origin.line, alloc_line);
}

#[test]
fn test_hex_dump_capped() {
    let ctx = MemContext::new();
    ctx.alloc(2048, origin!()).unwrap();

    let report = ctx.destroy();

    assert_eq!(report.leaks[0].size, 2048);
    assert_eq!(report.leaks[0].data.len(), 1024);
}

#[test]
fn test_report_rendering() {
    let ctx = MemContext::builder().label("render").build();
    let block = ctx.alloc(16, origin!()).unwrap();
    ctx.write(block, 0, b"leak").unwrap();

    let report = ctx.destroy();

    let mut rendered = Vec::new();
    report.write_to(&mut rendered).unwrap();
    let text = String::from_utf8(rendered).unwrap();

    assert!(text.contains("# Code Stats"));
    assert!(text.contains("Pending Frees...........: 1"));
    assert!(text.contains("Unfreed Blocks"));
    assert!(text.contains("Size....: 16"));
    assert!(text.contains("File....: leak_report_test.rs"));
    // "leak" then the init fill pattern
    assert!(text.contains("6c 65 61 6b 0f"));
}

#[test]
fn test_leak_log_written_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("leaks.log");

    let ctx = MemContext::builder()
        .label("filesink")
        .leak_log(&path)
        .build();
    let block = ctx.alloc(32, origin!()).unwrap();
    ctx.write(block, 0, b"spill").unwrap();
    drop(ctx);

    let text = std::fs::read_to_string(&path).expect("leak log should exist");
    assert!(text.contains("filesink"));
    assert!(text.contains("Unfreed Blocks"));
    assert!(text.contains("Size....: 32"));
    assert!(text.contains("73 70 69 6c 6c"));
}

#[test]
fn test_clean_teardown_still_writes_configured_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clean.log");

    let ctx = MemContext::builder().leak_log(&path).build();
    let block = ctx.alloc(64, origin!()).unwrap();
    ctx.free(block).unwrap();
    drop(ctx);

    let text = std::fs::read_to_string(&path).expect("stats log should exist");
    assert!(text.contains("Allocations.............: 1"));
    assert!(text.contains("Pending Frees...........: 0"));
}

#[test]
fn test_destroy_reports_once() {
    let ctx = MemContext::new();
    ctx.alloc(64, origin!()).unwrap();

    let clone = ctx.clone();
    let report = ctx.destroy();
    assert_eq!(report.leaks.len(), 1);

    // The surviving clone still works but will not re-report on drop
    assert_eq!(clone.total(), 64);
    drop(clone);
}
