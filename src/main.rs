use anyhow::Context;
use equitysync::backup::{BackupSink, HttpBackupSink};
use equitysync::{api, config::Config, db::init_db, HttpMarketDataSource, PortfolioService, Repository};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("configuration error")?;

    let pool = init_db(&config.database_path)
        .await
        .with_context(|| format!("failed to open database at {}", config.database_path))?;
    let repo = Arc::new(Repository::new(pool));

    let provider = Arc::new(HttpMarketDataSource::new(
        config.market_data_api_url.clone(),
        config.market_data_api_key.clone(),
        config.sync_timeout,
    ));
    let backup: Option<Arc<dyn BackupSink>> = config.backup_url.clone().map(|url| {
        Arc::new(HttpBackupSink::new(url, config.backup_token.clone())) as Arc<dyn BackupSink>
    });
    if backup.is_none() {
        tracing::info!("BACKUP_URL not set; backups disabled");
    }

    let service = PortfolioService::load(repo, provider.clone(), provider, backup)
        .await
        .context("failed to load ledger")?;
    let app = api::create_router(api::AppState::new(Arc::new(service)));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
