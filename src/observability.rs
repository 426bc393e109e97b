use std::net::SocketAddr;

// ── Booking lifecycle counters ──────────────────────────────────

/// Counter: bookings created (holds placed).
pub const BOOKINGS_CREATED_TOTAL: &str = "roomledger_bookings_created_total";

/// Counter: bookings confirmed (payment completed).
pub const BOOKINGS_CONFIRMED_TOTAL: &str = "roomledger_bookings_confirmed_total";

/// Counter: bookings cancelled. Labels: by (GUEST/HOST/SYSTEM).
pub const BOOKINGS_CANCELLED_TOTAL: &str = "roomledger_bookings_cancelled_total";

/// Counter: booking attempts rejected because a date was unavailable.
pub const HOLD_CONFLICTS_TOTAL: &str = "roomledger_hold_conflicts_total";

// ── Sweeper ─────────────────────────────────────────────────────

/// Counter: expired holds cancelled by the sweeper.
pub const HOLDS_SWEPT_TOTAL: &str = "roomledger_holds_swept_total";

/// Histogram: one sweep pass duration in seconds.
pub const SWEEP_DURATION_SECONDS: &str = "roomledger_sweep_duration_seconds";

// ── Journal ─────────────────────────────────────────────────────

/// Histogram: journal group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "roomledger_journal_flush_duration_seconds";

/// Histogram: journal group-commit batch size (events per flush).
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "roomledger_journal_flush_batch_size";

/// Install the fmt subscriber, filtered by `RUST_LOG`. Embedders that
/// bring their own subscriber skip this.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

/// Install the Prometheus metrics exporter on the given port. No-op if
/// `port` is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
