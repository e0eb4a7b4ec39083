use nepse_today::{api, config::AppConfig, db, state::AppState};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = AppConfig::load()?;

    let default_filter = if app_config.is_development() {
        "nepse_today=debug,tower_http=debug"
    } else {
        "nepse_today=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_target(false)
        .init();

    tracing::info!("Starting nepse-today");
    tracing::info!(
        environment = %app_config.environment,
        port = app_config.port,
        source_url = %app_config.source_url,
        "Loaded configuration"
    );

    db::migrate::run(&app_config.database_url)?;
    let pool = db::connection::build_pool(&app_config.database_url)?;

    let port = app_config.port;
    let app = api::router(AppState::new(app_config, pool)?);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!(%addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
