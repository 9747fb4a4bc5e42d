use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{self as sdk, Resource};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_FILTER: &str = "info,sqlx=warn,sea_orm_migration=warn";

#[derive(Clone, Debug)]
pub struct ObsConfig {
    pub service_name: String,
    pub env_filter: Option<String>,
    pub otlp_endpoint: Option<String>,
    pub with_target: bool,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            service_name: "taskboard".to_string(),
            env_filter: None,
            otlp_endpoint: None,
            with_target: false,
        }
    }
}

impl ObsConfig {
    /// `RUST_LOG` for the filter, `OTLP_ENDPOINT` for the exporter.
    pub fn from_env() -> Self {
        Self {
            env_filter: std::env::var("RUST_LOG").ok(),
            otlp_endpoint: std::env::var("OTLP_ENDPOINT").ok(),
            ..Self::default()
        }
    }

    fn filter(&self) -> &str {
        self.env_filter.as_deref().unwrap_or(DEFAULT_FILTER)
    }
}

/// Keeps the span exporter alive; dropping it flushes pending spans.
#[derive(Default)]
pub struct ObsGuard {
    provider: Option<sdk::trace::SdkTracerProvider>,
}

impl Drop for ObsGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(err) = provider.shutdown() {
                eprintln!("failed to flush spans: {err}");
            }
        }
    }
}

/// Install the global subscriber. Calling it twice is a no-op.
pub fn init_tracing(config: ObsConfig) -> Result<ObsGuard> {
    if INIT.get().is_some() {
        return Ok(ObsGuard::default());
    }

    let env_filter = EnvFilter::try_new(config.filter())?;
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(config.with_target);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    let guard = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let exporter = SpanExporter::builder()
                .with_http()
                .with_protocol(Protocol::HttpBinary)
                .with_endpoint(endpoint)
                .build()?;

            let resource = Resource::builder()
                .with_service_name(config.service_name.clone())
                .build();

            let provider = sdk::trace::SdkTracerProvider::builder()
                .with_resource(resource)
                .with_batch_exporter(exporter)
                .build();
            let tracer = provider.tracer(config.service_name.clone());

            registry
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init()?;
            ObsGuard {
                provider: Some(provider),
            }
        }
        None => {
            registry.try_init()?;
            ObsGuard::default()
        }
    };

    INIT.set(())
        .map_err(|_| anyhow!("tracing already initialized"))?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_quiets_sql_noise() {
        let config = ObsConfig::default();
        assert_eq!(config.filter(), DEFAULT_FILTER);
        assert!(EnvFilter::try_new(config.filter()).is_ok());
    }

    #[test]
    fn explicit_filter_wins() {
        let config = ObsConfig {
            env_filter: Some("debug".into()),
            ..ObsConfig::default()
        };
        assert_eq!(config.filter(), "debug");
    }
}
