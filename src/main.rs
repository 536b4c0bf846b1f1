/*!
 * Leak Demo
 *
 * Allocates three tracked buffers, frees one, and tears the context down so
 * the leak report fires for the other two.
 */

use log::info;
use memtrack::{track_alloc, track_free, MemContext};

fn main() {
    env_logger::init();

    let ctx = MemContext::builder()
        .label("demo")
        .leak_log("memtrack-leaks.log")
        .build();

    let leaked_1 = track_alloc!(ctx, 256).expect("allocation failed");
    let leaked_2 = track_alloc!(ctx, 128).expect("allocation failed");
    let freed = track_alloc!(ctx, 24).expect("allocation failed");

    info!("allocated 256 + 128 + 24 bytes, {} tracked", ctx.total());

    ctx.write(
        leaked_1,
        0,
        b"This is allocated memory that will not be freed",
    )
    .expect("write failed");
    ctx.write(leaked_2, 0, b"Neither will this buffer")
        .expect("write failed");
    ctx.write(freed, 0, b"This buffer is freed")
        .expect("write failed");

    info!("freeing one buffer...");
    track_free!(ctx, freed).expect("free failed");

    info!("shutting down with the remaining buffers still allocated...");
    let report = ctx.destroy();

    println!(
        "leaked {} blocks ({} bytes) - see memtrack-leaks.log",
        report.leaks.len(),
        report.stats.current_bytes
    );
}
