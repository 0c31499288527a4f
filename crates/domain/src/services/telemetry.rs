use std::{env, net::SocketAddr, sync::Arc};

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::hydrate_env_file;

static SUBSCRIBER_INSTALLED: OnceCell<()> = OnceCell::new();
static METRICS_HANDLE: OnceCell<Arc<PrometheusHandle>> = OnceCell::new();

/// Observability options read from `<PREFIX>_LOG_FILTER`,
/// `<PREFIX>_LOG_ANSI` and `<PREFIX>_METRICS_ADDRESS`.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    log_filter: String,
    log_ansi: bool,
    metrics_address: Option<String>,
}

impl TelemetryConfig {
    /// Missing entries fall back to defaults so the binary boots without
    /// extra configuration.
    pub fn from_env(prefix: &str) -> Self {
        let _ = hydrate_env_file();
        let upper = prefix.trim().to_ascii_uppercase();

        let log_filter = env::var(format!("{upper}_LOG_FILTER"))
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "info".to_string());
        let log_ansi = env::var(format!("{upper}_LOG_ANSI"))
            .map(|value| !matches!(value.trim(), "0" | "false" | "off"))
            .unwrap_or(true);
        let metrics_address = env::var(format!("{upper}_METRICS_ADDRESS"))
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Self {
            log_filter,
            log_ansi,
            metrics_address,
        }
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    pub fn log_ansi(&self) -> bool {
        self.log_ansi
    }

    pub fn metrics_address(&self) -> Option<&str> {
        self.metrics_address.as_deref()
    }
}

/// Handle returned after telemetry initialization; renders the Prometheus
/// exposition for the `/metrics` endpoint.
#[derive(Clone)]
pub struct TelemetryGuard {
    metrics: Arc<PrometheusHandle>,
}

impl TelemetryGuard {
    pub fn render_metrics(&self) -> String {
        self.metrics.render()
    }
}

/// Installs tracing and the metrics recorder once per process. Later calls
/// reuse the first installation.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    install_tracing(config)?;
    let metrics = install_metrics(config)?;
    Ok(TelemetryGuard { metrics })
}

fn install_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    if SUBSCRIBER_INSTALLED.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_new(config.log_filter())
        .map_err(|err| TelemetryError::InvalidLogFilter(err.to_string()))?;

    if SUBSCRIBER_INSTALLED.set(()).is_ok() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_ansi(config.log_ansi()),
            )
            .try_init()
            .map_err(|err| TelemetryError::Tracing(err.to_string()))?;
    }

    Ok(())
}

fn install_metrics(config: &TelemetryConfig) -> Result<Arc<PrometheusHandle>, TelemetryError> {
    METRICS_HANDLE
        .get_or_try_init(|| {
            let mut builder = PrometheusBuilder::new();
            if let Some(addr) = config.metrics_address() {
                let socket: SocketAddr =
                    addr.parse().map_err(|err: std::net::AddrParseError| {
                        TelemetryError::InvalidMetricsAddress(addr.to_string(), err.to_string())
                    })?;
                builder = builder.with_http_listener(socket);
            }

            let handle = builder
                .install_recorder()
                .map(Arc::new)
                .map_err(|err| TelemetryError::Metrics(err.to_string()))?;
            describe_metrics();
            Ok(handle)
        })
        .cloned()
}

fn describe_metrics() {
    describe_counter!(
        "ledger_settlements_total",
        Unit::Count,
        "Metered settlement attempts by outcome"
    );
    describe_counter!(
        "api_reveal_requests_total",
        Unit::Count,
        "Contact reveal requests by HTTP outcome"
    );
    describe_counter!(
        "api_redirects_total",
        Unit::Count,
        "Affiliate redirects by link origin"
    );
    describe_counter!(
        "config_cache_refresh_total",
        Unit::Count,
        "Config table refreshes by result"
    );
    describe_counter!(
        "config_cache_invalidations_total",
        Unit::Count,
        "Explicit config cache invalidations"
    );
    describe_counter!(
        "sink_events_total",
        Unit::Count,
        "Side-effect writes drained by the sink worker"
    );
    describe_counter!(
        "sink_events_dropped_total",
        Unit::Count,
        "Side effects dropped before reaching the store"
    );
    describe_histogram!(
        "api_reveal_duration_seconds",
        Unit::Seconds,
        "Wall time of contact reveal requests"
    );
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    InvalidLogFilter(String),
    #[error("failed to install tracing subscriber: {0}")]
    Tracing(String),
    #[error("invalid metrics address `{0}`: {1}")]
    InvalidMetricsAddress(String, String),
    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
}
