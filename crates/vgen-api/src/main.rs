//! Trigger service binary.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tokio::sync::oneshot;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vgen_api::shutdown::{ctrl_c, drain_on_signal};
use vgen_api::{create_router, metrics, ApiConfig, AppState, InsertListener};
use vgen_pipeline::PipelineConfig;

/// How long open requests may take to finish once the queue has stopped.
const RESPONSE_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    init_tracing()?;

    info!("Starting vgen-api");

    let config = ApiConfig::from_env();
    let pipeline = PipelineConfig::from_env();
    info!(
        host = %config.host,
        port = config.port,
        max_concurrent_jobs = pipeline.max_concurrent_jobs,
        work_dir = %pipeline.work_dir.display(),
        "Loaded configuration"
    );

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("failed to install Prometheus recorder")?)
    } else {
        None
    };

    let state = AppState::new(config.clone(), pipeline.clone())
        .await
        .context("failed to create application state")?;

    if config.listen_for_inserts {
        let listener = InsertListener::new(
            state.records.clone(),
            state.scheduler.clone(),
            pipeline.record_table.clone(),
        );
        tokio::spawn(listener.run());
    }

    let scheduler = state.scheduler.clone();
    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    let (stopped_tx, stopped_rx) = oneshot::channel();
    let shutdown = async move {
        let finished = drain_on_signal(ctrl_c(), scheduler, pipeline.shutdown_timeout).await;
        let _ = stopped_tx.send(finished);
    };
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .into_future();

    // Requests tied to jobs that outlived the shutdown timeout are abandoned.
    let abandon = async {
        match stopped_rx.await {
            Ok(_) => tokio::time::sleep(RESPONSE_GRACE).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = server => result.context("server error")?,
        _ = abandon => warn!("Exiting with requests still open"),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Pretty output for development, JSON when `LOG_FORMAT=json`.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vgen=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}
