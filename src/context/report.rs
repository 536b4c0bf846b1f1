/*!
 * Leak Reporting
 * Teardown reports: stats summary plus one entry per unfreed block
 */

use super::stats::{snapshot_leaks, snapshot_stats, DATA_DUMP_LIMIT};
use super::{ContextCore, GUARD_SIZE};
use crate::types::{ContextStats, LeakRecord};
use log::{debug, error, warn};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::atomic::Ordering;

/// Leak report for one context
#[derive(Debug, Clone, Serialize)]
pub struct LeakReport {
    /// Context label, falling back to the numeric id
    pub context: String,
    pub stats: ContextStats,
    /// Unfreed blocks in allocation order, each with the provenance of its
    /// most recent alloc/realloc
    pub leaks: Vec<LeakRecord>,
}

impl LeakReport {
    pub fn is_clean(&self) -> bool {
        self.leaks.is_empty()
    }

    /// Render the human-readable report
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "# Details")?;
        writeln!(out, "Context.................: {}", self.context)?;
        writeln!(out, "Guard Size..............: {}", 2 * GUARD_SIZE)?;
        writeln!(out)?;
        writeln!(out, "# Code Stats")?;
        writeln!(out, "Allocations.............: {}", self.stats.allocs)?;
        writeln!(out, "Reallocations...........: {}", self.stats.reallocs)?;
        writeln!(out, "Frees...................: {}", self.stats.frees)?;
        writeln!(out, "Pending Frees...........: {}", self.stats.live_blocks)?;
        writeln!(out)?;
        writeln!(out, "# Totals, Requested")?;
        writeln!(out, "Bytes Allocated.........: {}", self.stats.total_bytes)?;
        writeln!(out, "Unfreed Bytes...........: {}", self.stats.current_bytes)?;
        writeln!(out, "Peak Bytes..............: {}", self.stats.peak_bytes)?;
        writeln!(out)?;
        writeln!(out, "# Totals, Real")?;
        writeln!(out, "Unfreed Bytes...........: {}", self.stats.real_bytes)?;
        writeln!(out)?;
        writeln!(out, "##################")?;
        writeln!(out, "  Unfreed Blocks  ")?;

        for (i, leak) in self.leaks.iter().enumerate() {
            writeln!(out, "##################")?;
            writeln!(out, "{})", i + 1)?;
            writeln!(out, "Block...: {}", leak.id)?;
            writeln!(out, "Size....: {}", leak.size)?;
            writeln!(out, "Function: {}", leak.origin.function)?;
            writeln!(out, "File....: {}", leak.origin.short_file())?;
            writeln!(out, "Line....: {}", leak.origin.line)?;
            write!(out, "Data....: ")?;
            for byte in leak.data.iter().take(DATA_DUMP_LIMIT) {
                write!(out, "{:02x} ", byte)?;
            }
            writeln!(out)?;
        }

        Ok(())
    }
}

pub(crate) fn snapshot_report(core: &ContextCore) -> LeakReport {
    LeakReport {
        context: core.describe(),
        stats: snapshot_stats(core),
        leaks: snapshot_leaks(core),
    }
}

/// Finalize a context: build the report, emit it through the configured
/// sink, and mark the context as reported. Returns `None` if the context
/// was already finalized.
pub(crate) fn teardown(core: &ContextCore) -> Option<LeakReport> {
    if core.reported.swap(true, Ordering::SeqCst) {
        return None;
    }

    let report = snapshot_report(core);

    if report.is_clean() {
        debug!(
            "Context {} shut down clean: {} allocs, {} frees",
            report.context, report.stats.allocs, report.stats.frees
        );
        // The stats summary is still written when a log file is configured
        if core.leak_log.is_some() {
            emit(core, &report);
        }
        return Some(report);
    }

    error!(
        "Memory leak detected: context {} leaked {} blocks ({} bytes)",
        report.context,
        report.leaks.len(),
        report.stats.current_bytes
    );
    emit(core, &report);

    Some(report)
}

/// Write the report to the configured log file, falling back to stderr if
/// the file cannot be created
fn emit(core: &ContextCore, report: &LeakReport) {
    if let Some(path) = &core.leak_log {
        match File::create(path) {
            Ok(file) => {
                let mut out = BufWriter::new(file);
                if report.write_to(&mut out).and_then(|_| out.flush()).is_ok() {
                    if !report.is_clean() {
                        warn!(
                            "Leak report for context {} written to {}",
                            report.context,
                            path.display()
                        );
                    }
                    return;
                }
                warn!(
                    "Failed writing leak report to {}, falling back to stderr",
                    path.display()
                );
            }
            Err(err) => {
                warn!(
                    "Could not create leak log {}: {}, falling back to stderr",
                    path.display(),
                    err
                );
            }
        }
    }

    let stderr = io::stderr();
    let mut out = stderr.lock();
    let _ = report.write_to(&mut out);
}
