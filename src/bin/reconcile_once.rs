//! Runs a single delivery reconciliation pass and prints its report.
//! Meant for cron-style deployments that keep the in-process worker off.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use app::services::{
    notifications::NotificationEmitter, reconciliation::DeliveryReconciler,
    tracking::HttpTrackingProvider,
};
use mall_fulfillment as app;

#[derive(Debug, Parser)]
#[command(name = "reconcile-once", about = "Run one delivery reconciliation pass")]
struct Cli {
    /// Directory holding default.toml and the per-environment overrides
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Apply pending migrations before running
    #[arg(long)]
    migrate: bool,

    /// Override the per-call provider timeout, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print the report as pretty JSON instead of one line
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = app::config::load_config_from(&cli.config_dir).with_context(|| {
        format!(
            "failed to load configuration from {}",
            cli.config_dir.display()
        )
    })?;
    if let Some(secs) = cli.timeout_secs {
        cfg.reconciliation.call_timeout_secs = secs.max(1);
    }
    app::config::init_tracing(&cfg.log_level, cfg.log_json);

    let db_pool = app::db::establish_connection_from_app_config(&cfg).await?;
    if cli.migrate || cfg.auto_migrate {
        app::db::run_migrations(&db_pool).await?;
    }
    let db = Arc::new(db_pool);

    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = Arc::new(app::events::EventSender::new(event_tx));
    let events = tokio::spawn(app::events::process_events(event_rx));

    let recon = &cfg.reconciliation;
    let provider = Arc::new(HttpTrackingProvider::new(
        &recon.provider_base_url,
        recon.provider_api_key.clone(),
        recon.call_timeout(),
    )?);
    let emitter = NotificationEmitter::from_config(db.clone(), recon);
    let reconciler = DeliveryReconciler::new(db, provider, emitter, event_sender.clone(), recon);

    let report = reconciler.run_once().await?;

    // The event logger exits once the last sender is gone.
    drop(reconciler);
    drop(event_sender);
    events.await.context("event logger task failed")?;

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", rendered);
    info!(run_id = %report.run_id, "reconcile-once finished");
    Ok(())
}
