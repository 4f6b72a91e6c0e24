//! Eventday server.
//!
//! ```bash
//! VENDOR_TOKENS="dev-token=8f14e45f-ceea-467a-9af1-3d8c8e7a0b11" \
//! APP_ENV=development \
//! cargo run --bin eventday-server
//! ```

use axum::{Router, extract::State, routing::get};
use eventday_runtime::metrics::MetricsExporter;
use eventday_web::{Config, bootstrap};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventday=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        environment = %config.server.environment,
        storage = if config.storage.database_url.is_some() { "postgres" } else { "memory" },
        vendors = config.vendors.len(),
        "Configuration loaded"
    );

    let state = bootstrap::build_state(&config).await?;
    if let Err(e) = state.engine.verify_collaborators().await {
        // OTP sends will fail until the transport is fixed; the rest of the
        // API still works.
        warn!(error = %e, remediation = ?e.remediation(), "Notifier check failed");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut metrics_task = None;
    if let Some(port) = config.server.metrics_port {
        let mut exporter = MetricsExporter::new();
        exporter.install()?;
        if let Some(handle) = exporter.handle().cloned() {
            let addr = format!("{}:{port}", config.server.host);
            let listener = TcpListener::bind(&addr).await?;
            info!(address = %addr, "Metrics listening");
            metrics_task = Some(tokio::spawn(serve_metrics(
                listener,
                handle,
                shutdown_rx.clone(),
            )));
        }
    }

    let app = eventday_web::app(state, &config.server.cors_origins);
    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!(address = %addr, "Eventday API listening");

    let mut server_rx = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_rx.wait_for(|stop| *stop).await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(config.server.shutdown_timeout, server).await {
        Ok(Ok(Ok(()))) => info!("HTTP server stopped"),
        Ok(Ok(Err(e))) => error!(error = %e, "HTTP server failed"),
        Ok(Err(e)) => error!(error = %e, "HTTP server task panicked"),
        Err(_) => warn!("Graceful shutdown timed out, dropping open connections"),
    }
    if let Some(task) = metrics_task {
        let _ = tokio::time::timeout(config.server.shutdown_timeout, task).await;
    }

    info!("Shutdown complete");
    Ok(())
}

async fn serve_metrics(
    listener: TcpListener,
    handle: PrometheusHandle,
    mut shutdown: watch::Receiver<bool>,
) {
    let app = Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(handle);
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
    {
        error!(error = %e, "Metrics server failed");
    }
}

#[allow(clippy::unused_async)]
async fn render_metrics(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

/// Returns on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}
