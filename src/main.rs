mod appointment;
mod auth;
mod config;
mod middleware;

mod db;
mod error;
mod models;
mod routes;
mod store;

use std::sync::Arc;

use crate::{
    appointment::clock::SystemClock, config::Config, models::AppState,
    store::postgres::PgPatientStore,
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url, cfg.db_max_connections).await?;

    let state = AppState {
        db: pool.clone(),
        session_ttl_hours: cfg.session_ttl_hours,
        patients: Arc::new(PgPatientStore::new(pool)),
        clock: Arc::new(SystemClock),
        clinic_offset: cfg.clinic_offset,
    };

    // Browser dashboards call the API cross-origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!(
        "Listening on http://{} (clinic offset {})",
        cfg.bind_addr,
        cfg.clinic_offset
    );
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
