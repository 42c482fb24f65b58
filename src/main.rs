use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use chrono::Utc;

use jobkeeper::api::{self, AppState};
use jobkeeper::database;
use jobkeeper::executions;
use jobkeeper::logger::init_logger;
use jobkeeper::settings::Settings;
use jobkeeper::{DatabaseJobStore, JobSerializer, RunNowCoordinator, TaskRegistry};

/// Alias served by this process. Other processes can share the same schema
/// under their own alias.
const STORE_ALIAS: &str = "default";

#[tokio::main]
async fn main() {
    init_logger().unwrap();

    let settings = Settings::from_env();

    let mut connection = database::establish_connection(&settings.database_url);

    if let Err(e) = database::run_migrations(&mut connection) {
        log::error!("Failed to apply database schema. {}", e);
        return;
    }

    let mut registry = TaskRegistry::new();
    register_maintenance_tasks(&mut registry, &settings);
    let registry = Arc::new(registry);

    let serializer = JobSerializer::new(Arc::clone(&registry));
    let store = Arc::new(DatabaseJobStore::new(connection, STORE_ALIAS, serializer));
    let coordinator = Arc::new(RunNowCoordinator::new(Duration::from_secs(
        settings.run_now_timeout_secs,
    )));

    let state = AppState {
        store,
        registry,
        coordinator,
        settings,
    };

    let app = Router::new()
        .route(
            "/jobs",
            post(api::create_job_handler).get(api::list_jobs_handler),
        )
        .route("/jobs/:id", delete(api::delete_job_handler))
        .route("/jobs/:id/executions", get(api::list_executions_handler))
        .route("/jobs/:id/run", post(api::run_job_handler))
        .route("/maintenance/cleanup", post(api::cleanup_handler))
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 7878));

    log::info!("🚀 Server running on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    axum::serve(listener, app).await.unwrap();
}

/// Registers built-in tasks. The retention sweep is a task of its own so
/// operators can schedule it like any other recurring job; its payload may
/// carry a `max_age_seconds` override.
fn register_maintenance_tasks(registry: &mut TaskRegistry, settings: &Settings) {
    let database_url = settings.database_url.clone();
    let default_max_age = settings.retention_max_age_secs;

    registry.register("cleanup_job_executions", move |args| {
        let max_age = args
            .get("max_age_seconds")
            .and_then(|v| v.as_u64())
            .unwrap_or(default_max_age);

        let connection = &mut database::establish_connection(&database_url);
        let deleted = executions::delete_older_than(connection, max_age, Utc::now().naive_utc())?;

        log::info!(
            "Removed {} execution records older than {} seconds.",
            deleted,
            max_age
        );

        Ok(())
    });
}
