mod api;

use std::sync::Arc;
use std::time::Duration;

use log::info;
use proclubs::ProclubsClient;
use rinkdb_scheduler::config::SchedulerSettings;
use rinkdb_scheduler::manager::SchedulerManager;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket, launch};

async fn run_migrations(rocket: Rocket<Build>) -> Rocket<Build> {
    tokio::task::spawn_blocking(|| {
        rinkdb_db::migrations::run_migrations().expect("Failed to apply migrations")
    })
    .await
    .expect("Error joining migrations task");

    rocket
}

fn build_manager() -> Arc<SchedulerManager> {
    let settings = SchedulerSettings::config().expect("Scheduler settings should be valid");

    let pool = rinkdb_db::pool::get_pool(settings.db_pool_size)
        .expect("Failed to build the database connection pool");
    let client = Arc::new(
        ProclubsClient::with_base_url(
            &settings.api_base_url,
            Duration::from_secs(settings.http_timeout_secs),
        )
        .expect("Failed to build the upstream HTTP client"),
    );

    Arc::new(SchedulerManager::new(pool, client, settings))
}

#[launch]
fn rocket() -> _ {
    rocket::build()
        .manage(build_manager())
        .mount("/api", api::routes())
        .attach(AdHoc::on_ignite("Migrations", run_migrations))
        .attach(AdHoc::on_liftoff("Scheduler restore", |rocket| {
            Box::pin(async move {
                let manager = rocket
                    .state::<Arc<SchedulerManager>>()
                    .expect("Scheduler manager should be managed state");
                match manager.restore() {
                    Ok(restored) => info!("Restored {restored} scheduler jobs"),
                    Err(err) => log::error!("Failed to restore scheduler jobs: {err}"),
                }
            })
        }))
        .attach(AdHoc::on_shutdown("Scheduler shutdown", |rocket| {
            Box::pin(async move {
                if let Some(manager) = rocket.state::<Arc<SchedulerManager>>() {
                    manager.shutdown().await;
                }
            })
        }))
}
