mod args;
mod handlers;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use clap::Parser;

use chakwrite_ai::backends::{OpenAiCapabilityHost, StubCapabilityHost};
use chakwrite_ai::{CapabilityHost, FallbackOrder};
use chakwrite_broker::{Broker, BrokerSettings};
use chakwrite_store::{install_defaults, FileConfigStore};

use crate::args::{Args, Backend};
use crate::handlers::{
    healthz, metrics_handler, page_events, post_command, post_message, track_requests,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let otel = chakwrite_common::telemetry::init_tracing(
        "chakwrite-broker",
        &args.log_format,
        args.otlp_url.as_deref(),
        args.otlp_token.as_deref(),
    );

    let fallback_order: FallbackOrder = args.fallback_order.parse().unwrap_or_else(|e| {
        tracing::error!(error=%e, "invalid fallback order");
        std::process::exit(1);
    });

    let store = Arc::new(FileConfigStore::new(&args.config_path));
    let seeded = install_defaults(store.as_ref()).await?;
    if !seeded.is_empty() {
        tracing::info!(path=%args.config_path, keys=?seeded, "seeded configuration");
    }

    let capabilities: Arc<dyn CapabilityHost> = match args.backend {
        Backend::Stub => Arc::new(StubCapabilityHost::all()),
        Backend::Openai => Arc::new(OpenAiCapabilityHost::new(
            &args.backend_url,
            &args.backend_model,
        )?),
    };

    let settings = BrokerSettings {
        request_timeout: Duration::from_millis(args.request_timeout_ms),
        fallback_order,
        ..BrokerSettings::default()
    };
    let broker = Broker::new(settings, store, capabilities);
    broker.spawn_background();

    let st = AppState {
        dispatcher: broker.dispatcher.clone(),
        context: broker.context.clone(),
        correlator: broker.correlator.clone(),
        page: broker.page.clone(),
        metrics: broker.metrics.clone(),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/v1/messages", post(post_message))
        .route("/v1/commands/:name", post(post_command))
        .route("/v1/page/events", get(page_events))
        .layer(middleware::from_fn_with_state(st.clone(), track_requests))
        .with_state(st);

    tracing::info!(
        addr=%args.listen_addr,
        backend=?args.backend,
        fallback_order=fallback_order.name(),
        timeout_ms=args.request_timeout_ms,
        "chakwrite broker listening"
    );
    let listener = tokio::net::TcpListener::bind(&args.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    if let Err(e) = broker.context.close().await {
        tracing::warn!(error=%e, "failed to close hidden context");
    }
    if let Some(provider) = otel {
        if let Err(e) = provider.shutdown() {
            eprintln!("failed to shut down tracer provider: {e}");
        }
    }
    Ok(())
}
