//! Subscriber setup for resolver logs and API call spans

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::TracerProvider;
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Filter used when neither the config nor `RUST_LOG` sets one.
pub const DEFAULT_DIRECTIVES: &str = "warn,apiforge_openapi=info,apiforge_telemetry=info";

/// How logs are filtered and printed.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Explicit filter directives. `None` reads `RUST_LOG`, falling back to
    /// [`DEFAULT_DIRECTIVES`].
    pub directives: Option<String>,
    /// Print one JSON object per log line instead of plain text
    pub json: bool,
}

impl TelemetryConfig {
    pub fn with_directives(mut self, directives: impl Into<String>) -> Self {
        self.directives = Some(directives.into());
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        match &self.directives {
            Some(directives) => EnvFilter::new(directives),
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES)),
        }
    }
}

/// Build a subscriber that prints filtered logs and exports spans through
/// `provider`.
///
/// Use it with [`tracing::subscriber::with_default`] for scoped capture, or
/// install it globally with [`init_telemetry`].
pub fn subscriber(
    config: &TelemetryConfig,
    provider: &TracerProvider,
) -> impl Subscriber + Send + Sync + use<> {
    let tracer = provider.tracer(crate::attributes::SYSTEM_NAME);

    let json_layer = config.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_line_number(true)
    });
    let text_layer = (!config.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_line_number(true)
    });

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(json_layer)
        .with(text_layer)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
}

/// Install the telemetry subscriber as the global default.
///
/// The caller keeps `provider` to flush or shut it down. Fails if a global
/// subscriber is already installed.
///
/// # Example
///
/// ```rust,no_run
/// use apiforge_telemetry::{TelemetryConfig, init_telemetry};
/// use opentelemetry_sdk::trace::TracerProvider;
///
/// let provider = TracerProvider::default();
/// init_telemetry(&TelemetryConfig::default().with_json(true), &provider)
///     .expect("no subscriber installed yet");
/// ```
pub fn init_telemetry(
    config: &TelemetryConfig,
    provider: &TracerProvider,
) -> Result<(), TryInitError> {
    subscriber(config, provider).try_init()
}
