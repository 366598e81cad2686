//! Log output and optional OTLP trace export.

use anyhow::{anyhow, Result};
use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace::SdkTracerProvider, Resource};
use std::{env::var, fmt, str::FromStr, sync::OnceLock, time::Duration};
use tracing::{debug, Level};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer, Registry};
use ulid::Ulid;
use url::Url;

static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

const EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human readable.
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other} (expected pretty or json)")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Config {
    /// `None` means errors only.
    pub level: Option<Level>,
    pub format: LogFormat,
    /// OTLP/gRPC collector; traces are exported only when set.
    pub otlp_endpoint: Option<String>,
}

impl Config {
    // RUST_LOG overrides the -v level
    fn filter(&self) -> Result<EnvFilter> {
        Ok(EnvFilter::builder()
            .with_default_directive(self.level.unwrap_or(Level::ERROR).into())
            .from_env_lossy()
            .add_directive("hyper=error".parse()?)
            .add_directive("h2=error".parse()?)
            .add_directive("tower=warn".parse()?)
            .add_directive("opentelemetry_sdk=warn".parse()?))
    }
}

/// Collectors are usually addressed as `host:port`; plain http is assumed
/// when no scheme is given.
fn otlp_url(endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.is_empty() {
        return Err(anyhow!("empty OTLP endpoint"));
    }

    let candidate = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    };

    let url = Url::parse(&candidate).map_err(|e| anyhow!("invalid OTLP endpoint {endpoint}: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(candidate),
        scheme => Err(anyhow!("unsupported OTLP endpoint scheme: {scheme}")),
    }
}

fn tracer_provider(endpoint: &str) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(otlp_url(endpoint)?)
        .with_timeout(EXPORT_TIMEOUT)
        .build()?;

    let instance_id = var("OTEL_SERVICE_INSTANCE_ID").unwrap_or_else(|_| Ulid::new().to_string());

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder_empty()
                .with_attributes(vec![
                    KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    KeyValue::new("service.instance.id", instance_id),
                    KeyValue::new("vcs.revision", crate::GIT_COMMIT_HASH),
                ])
                .build(),
        )
        .build())
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the OTLP endpoint is unusable or a subscriber is
/// already installed.
pub fn init(config: &Config) -> Result<()> {
    let fmt_layer = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_target(false)
            .pretty()
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
    };

    let otel_layer = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let provider = tracer_provider(endpoint)?;
            let tracer = provider.tracer(env!("CARGO_PKG_NAME"));

            global::set_tracer_provider(provider.clone());
            global::set_text_map_propagator(TraceContextPropagator::new());
            let _ = TRACER_PROVIDER.set(provider);

            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    let subscriber = Registry::default()
        .with(fmt_layer)
        .with(otel_layer)
        .with(config.filter()?);
    tracing::subscriber::set_global_default(subscriber)?;

    debug!(format = %config.format, otlp = config.otlp_endpoint.is_some(), "logging ready");

    Ok(())
}

/// Flush pending spans. Noop when tracing export was never enabled.
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        debug!("shutting down tracer provider");
        if let Err(err) = provider.shutdown() {
            eprintln!("failed to flush traces: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otlp_url_defaults_to_http() -> Result<()> {
        assert_eq!(otlp_url("collector:4317")?, "http://collector:4317");
        assert_eq!(otlp_url(" collector:4317/ ")?, "http://collector:4317");
        Ok(())
    }

    #[test]
    fn otlp_url_keeps_scheme() -> Result<()> {
        assert_eq!(
            otlp_url("https://otel.example.com:4317")?,
            "https://otel.example.com:4317"
        );
        Ok(())
    }

    #[test]
    fn otlp_url_rejects_garbage() {
        assert!(otlp_url("").is_err());
        assert!(otlp_url("ftp://collector:21").is_err());
    }

    #[test]
    fn log_format_parses() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("Pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }

    #[test]
    fn filter_builds_for_every_level() -> Result<()> {
        for level in [None, Some(Level::INFO), Some(Level::TRACE)] {
            let config = Config {
                level,
                ..Config::default()
            };
            config.filter()?;
        }
        Ok(())
    }

    #[test]
    fn shutdown_without_provider_is_a_noop() {
        shutdown_tracer();
    }
}
