use std::sync::Arc;
use std::time::Duration;

use log::info;
use miette::IntoDiagnostic;
use proclubs::ProclubsClient;
use rinkdb_scheduler::config::SchedulerSettings;
use rinkdb_scheduler::manager::SchedulerManager;

#[tokio::main]
async fn main() -> miette::Result<()> {
    env_logger::init();

    let settings = SchedulerSettings::config().into_diagnostic()?;

    rinkdb_db::migrations::run_migrations().into_diagnostic()?;

    let pool = rinkdb_db::pool::get_pool(settings.db_pool_size).into_diagnostic()?;
    let client = Arc::new(
        ProclubsClient::with_base_url(
            &settings.api_base_url,
            Duration::from_secs(settings.http_timeout_secs),
        )
        .into_diagnostic()?,
    );

    let manager = SchedulerManager::new(pool, client, settings);
    let restored = manager.restore().into_diagnostic()?;
    info!("Restored {restored} scheduler jobs");

    tokio::signal::ctrl_c().await.into_diagnostic()?;
    info!("Received shutdown signal");

    manager.shutdown().await;

    Ok(())
}
