use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "sharenote_cache_hit_total",
            Unit::Count,
            "Memoized calls answered from the cache."
        );
        describe_counter!(
            "sharenote_cache_miss_total",
            Unit::Count,
            "Memoized calls that ran the underlying computation."
        );
        describe_counter!(
            "sharenote_cache_expired_total",
            Unit::Count,
            "Entries dropped because their TTL elapsed."
        );
        describe_counter!(
            "sharenote_cache_bypass_total",
            Unit::Count,
            "Results returned without being cached."
        );
        describe_counter!(
            "sharenote_cache_invalidated_total",
            Unit::Count,
            "Entries removed by explicit invalidation."
        );
        describe_counter!(
            "sharenote_asset_relocation_failed_total",
            Unit::Count,
            "Assets that could not be placed into a note directory."
        );
        describe_counter!(
            "sharenote_asset_gc_removed_total",
            Unit::Count,
            "Unreferenced note assets removed after an update."
        );
    });
}
