use dotenvy::dotenv;
use ffmpeg_api::config::settings::AppConfig;
use ffmpeg_api::infrastructure::db::pool::connect_to_db;
use ffmpeg_api::infrastructure::storage::S3Storage;
use ffmpeg_api::modules::auth::repository::PgUserAccounting;
use ffmpeg_api::modules::jobs::executor::JobExecutor;
use ffmpeg_api::modules::jobs::store::PgJobStore;
use ffmpeg_api::app;
use ffmpeg_api::state::AppState;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting server...");

    let config = AppConfig::new().expect("missing required configuration");

    let db = connect_to_db(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let storage = Arc::new(
        S3Storage::new(
            &config.storage_endpoint,
            &config.storage_bucket,
            &config.storage_region,
            &config.storage_access_key,
            &config.storage_secret_key,
            &config.storage_public_url,
        )
        .await,
    );

    let jobs = Arc::new(PgJobStore::new(db.clone()));
    let accounting = Arc::new(PgUserAccounting::new(db.clone()));

    let executor = Arc::new(JobExecutor::new(
        jobs.clone(),
        accounting,
        storage,
        config.transcoder_path.clone(),
        config.work_dir.clone(),
        config.max_concurrent_jobs,
    ));

    let state = AppState::new(config.clone(), db, jobs, executor);

    let app = app::create_app(state).await;

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind server port");
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await.expect("Server error");
}
