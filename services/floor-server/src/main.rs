use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use clap::Parser;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use slotfloor_server::{router, spawn_floor, DEFAULT_OUTBOUND_BUFFER};
use slotfloor_session::FloorConfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing_subscriber::{EnvFilter, Layer};

/// Floor crates log at info, everything else only warns. `RUST_LOG` overrides.
const DEFAULT_LOG_FILTER: &str = "warn,slotfloor_server=info,slotfloor_session=info";

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Batch span exporter for the floor, sampled by `OTEL_SAMPLING_RATE`.
fn otlp_provider(endpoint: String) -> Result<opentelemetry_sdk::trace::SdkTracerProvider> {
    let service_name =
        env_nonempty("OTEL_SERVICE_NAME").unwrap_or_else(|| "slotfloor-server".to_string());
    let rate = env_nonempty("OTEL_SAMPLING_RATE")
        .and_then(|value| value.parse::<f64>().ok())
        .map_or(1.0, |value| value.clamp(0.0, 1.0));
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .context("failed to build OTLP exporter")?;
    Ok(opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_sampler(opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(rate))
        .with_resource(
            opentelemetry_sdk::Resource::builder_empty()
                .with_attributes([opentelemetry::KeyValue::new("service.name", service_name)])
                .build(),
        )
        .with_batch_exporter(exporter)
        .build())
}

fn init_tracing() -> Result<()> {
    let registry = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(log_filter()));
    match env_nonempty("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Some(endpoint) => {
            let provider = otlp_provider(endpoint)?;
            let tracer = provider.tracer("slotfloor-server");
            opentelemetry::global::set_tracer_provider(provider);
            registry
                .with(tracing_opentelemetry::layer().with_tracer(tracer).with_filter(log_filter()))
                .init();
        }
        None => registry.init(),
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Multiplayer slot floor server")]
struct Args {
    /// Host interface to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    #[arg(short, long, default_value_t = 9124)]
    port: u16,

    /// Seed for tier assignment and spin outcomes (overrides FLOOR_SEED).
    #[arg(long)]
    seed: Option<u64>,

    /// Delay before a spin's result is revealed (overrides FLOOR_REVEAL_DELAY_MS).
    #[arg(long)]
    reveal_delay_ms: Option<u64>,

    /// Events queued per connection before further events to it are dropped.
    #[arg(long, default_value_t = DEFAULT_OUTBOUND_BUFFER)]
    outbound_buffer: usize,
}

fn build_config(args: &Args) -> Result<FloorConfig> {
    let mut config = FloorConfig::from_env();
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(reveal_delay_ms) = args.reveal_delay_ms {
        config.reveal_delay_ms = reveal_delay_ms;
    }
    config.validate().context("invalid floor configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;

    let config = build_config(&args)?;
    info!(
        reveal_delay_ms = config.reveal_delay_ms,
        starting_balance = config.starting_balance,
        seed = ?config.seed,
        "floor configuration loaded"
    );
    let (state, actor) = spawn_floor(config, args.outbound_buffer);
    let app = router(state);

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "floor server listening");
    axum::serve(listener, app).await.context("server error")?;

    actor.abort();
    Ok(())
}
