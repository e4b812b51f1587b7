use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use icstrack::analytics::{AnalyticsSink, BackgroundTasks, GeoIpService, HttpSink};
use icstrack::config::Config;
use icstrack::interceptor::RequestInterceptor;
use icstrack::routes::create_router;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    let sink: Option<Arc<dyn AnalyticsSink>> = match HttpSink::from_config(&config.analytics)? {
        Some(sink) => {
            info!("📈 Feed analytics enabled (collector: {})", sink.endpoint());
            Some(Arc::new(sink))
        }
        None => {
            info!("Feed analytics disabled - ANALYTICS_ENDPOINT is not set");
            None
        }
    };

    let geoip = GeoIpService::from_path(config.analytics.geoip_db_path.as_deref())?;
    if let Some(path) = config.analytics.geoip_db_path.as_deref() {
        info!("🌍 GeoIP country fallback loaded from {}", path);
    }

    let background_tasks = BackgroundTasks::new();
    let interceptor = RequestInterceptor::new(
        Arc::new(config.tracked_paths.clone()),
        config.analytics.clone(),
    )
    .with_sink(sink)
    .with_geoip(geoip)
    .with_background_tasks(background_tasks.clone());

    if config.tracked_paths.is_empty() {
        tracing::warn!("TRACKED_PATHS is empty - no feed fetch will be recorded");
    }
    info!(
        "Tracking {} feed path(s), trusted proxy mode: {:?}",
        config.tracked_paths.len(),
        config.analytics.trusted_proxy_mode
    );

    let router = create_router(&config.feeds.dir, Arc::new(interceptor));
    info!("🎨 Serving feeds from directory: {}", config.feeds.dir);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("🚀 Feed server listening on http://{}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!(
        "Waiting for {} in-flight analytics write(s)",
        background_tasks.in_flight()
    );
    background_tasks
        .drain(Duration::from_secs(config.analytics.drain_timeout_secs))
        .await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
