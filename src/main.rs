use catalog_db::config::AppConfig;
use catalog_db::run_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging with explicit filter to suppress sqlx debug logs
    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(config.log_filter())
        .filter_module("sqlx", LevelFilter::Warn)
        .init();

    log::info!(
        "Configuration loaded: server={}:{}, store={:?}",
        config.server.host,
        config.server.port,
        config.store.backend
    );

    run_server(config).await
}
