//! One-shot subscription sweep, meant to run from cron once a day.

use anyhow::Context;
use chrono::Utc;

use jobboard_api::app::services::build_services;
use jobboard_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    jobboard_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = build_services(&config).await?;
    if config.database_url.is_none() {
        tracing::warn!("sweeping in-memory stores; nothing persistent will change");
    }

    let report = services.sweeper.run(Utc::now()).await?;
    tracing::info!(
        scanned = report.scanned,
        downgraded = report.downgraded,
        failures = report.failures,
        "check-subscriptions finished"
    );
    Ok(())
}
