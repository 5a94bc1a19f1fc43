//! Metrics collection for the notification relay.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static RELAY_NOTIFICATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static RELAY_PROVIDER_CALLS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize metrics collection. Calling it again is a no-op.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if PROMETHEUS_REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let notifications_counter = IntCounterVec::new(
        Opts::new("relay_notifications_total", "Relay requests by outcome"),
        &["outcome"],
    )?;

    let provider_calls_counter = IntCounterVec::new(
        Opts::new("relay_provider_calls_total", "Outbound provider calls by provider and status"),
        &["provider", "status"],
    )?;

    registry.register(Box::new(notifications_counter.clone()))?;
    registry.register(Box::new(provider_calls_counter.clone()))?;

    // Lost races leave the first registration in place.
    let _ = PROMETHEUS_REGISTRY.set(registry);
    let _ = RELAY_NOTIFICATIONS_TOTAL.set(notifications_counter);
    let _ = RELAY_PROVIDER_CALLS_TOTAL.set(provider_calls_counter);

    Ok(())
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    let Some(registry) = PROMETHEUS_REGISTRY.get() else {
        return "# Metrics recorder not initialized\n".to_string();
    };

    let mut buffer = Vec::new();
    if TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .is_err()
    {
        return "# Failed to encode metrics\n".to_string();
    }

    String::from_utf8(buffer).unwrap_or_default()
}

/// Record the outcome of one relay request.
pub fn record_notification(outcome: &str) {
    if let Some(counter) = RELAY_NOTIFICATIONS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Record an outbound provider call. `status` is the HTTP status code, or
/// `error` when no response arrived.
pub fn record_provider_call(provider: &str, status: &str) {
    if let Some(counter) = RELAY_PROVIDER_CALLS_TOTAL.get() {
        counter.with_label_values(&[provider, status]).inc();
    }
}
