use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::{signal, sync::mpsc};
use tracing::{error, info, warn};

use app::services::{refunds::ManualRefundGateway, tracking::HttpTrackingProvider};
use mall_fulfillment as app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = app::config::load_config().context("failed to load configuration")?;
    app::config::init_tracing(&cfg.log_level, cfg.log_json);
    app::handlers::health::init_start_time();

    // Init DB
    let db_pool = app::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        app::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = Arc::new(app::events::EventSender::new(event_tx));
    tokio::spawn(app::events::process_events(event_rx));

    let recon = &cfg.reconciliation;
    let provider = Arc::new(
        HttpTrackingProvider::new(
            &recon.provider_base_url,
            recon.provider_api_key.clone(),
            recon.call_timeout(),
        )
        .context("failed to build tracking provider client")?,
    );

    let state = app::AppState::new(
        cfg.clone(),
        db_arc,
        event_sender,
        provider,
        Arc::new(ManualRefundGateway),
    );

    let worker = if recon.enabled {
        Some(state.reconciler().spawn_worker(recon.interval()))
    } else {
        warn!("Delivery reconciliation worker disabled; use reconcile-once or the admin endpoint");
        None
    };

    let router = app::api_router(state);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;
    info!("mall-fulfillment listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(worker) = worker {
        worker.abort();
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
