//! Telemetry helpers for applications embedding `chart-sync`.
//!
//! Tracing setup stays explicit and opt-in: call `init_default_tracing` or
//! install your own `tracing` subscriber. Sync state transitions and dropped
//! echoes are logged at `debug`, per-edit detail at `trace`.

/// Initializes a default `tracing` subscriber when the `telemetry` feature is enabled.
///
/// Returns `true` when initialization succeeds.
/// Returns `false` when no initialization is performed (feature disabled) or if a
/// global subscriber was already set by the host application.
#[must_use]
pub fn init_default_tracing() -> bool {
    init_tracing_with_filter("warn")
}

/// Like [`init_default_tracing`], with `fallback_filter` used when `RUST_LOG`
/// is unset (for example `"chart_sync=debug"`).
#[must_use]
pub fn init_tracing_with_filter(fallback_filter: &str) -> bool {
    #[cfg(feature = "telemetry")]
    {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback_filter)),
            )
            .with_target(true)
            .compact();

        return builder.try_init().is_ok();
    }

    #[cfg(not(feature = "telemetry"))]
    {
        let _ = fallback_filter;
        false
    }
}

#[cfg(all(test, not(feature = "telemetry")))]
mod tests {
    #[test]
    fn initialization_is_a_no_op_without_the_feature() {
        assert!(!super::init_default_tracing());
        assert!(!super::init_tracing_with_filter("chart_sync=trace"));
    }
}
