use once_cell::sync::Lazy;
use prometheus::{register_int_counter, IntCounter};

/// Scan cycles completed.
pub static CYCLES_RUN: Lazy<IntCounter> =
    Lazy::new(|| register_int_counter!("scan_cycles_total", "Scan cycles completed").unwrap());

/// Cycle starts refused because a cycle was already running.
pub static CYCLES_OVERLAP_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "scan_cycles_overlap_skipped_total",
        "Cycle starts refused while a cycle was already running"
    )
    .unwrap()
});

/// Symbols scanned across all cycles.
pub static SYMBOLS_SCANNED: Lazy<IntCounter> =
    Lazy::new(|| register_int_counter!("symbols_scanned_total", "Symbols scanned").unwrap());

/// Symbols skipped (liquidity floor or fetch failure).
pub static SYMBOLS_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "symbols_skipped_total",
        "Symbols skipped by liquidity floor or fetch failure"
    )
    .unwrap()
});

/// Signals accepted by policy and handed to delivery.
pub static SIGNALS_EMITTED: Lazy<IntCounter> =
    Lazy::new(|| register_int_counter!("signals_emitted_total", "Signals emitted").unwrap());

/// Candidates rejected by the alert policy.
pub static SIGNALS_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("signals_rejected_total", "Candidates rejected by policy").unwrap()
});
