use std::sync::Arc;

use engine::LedgerConfig;
use migration::{Migrator, MigratorTrait};
use providers::{PaystackGateway, VtpassBiller};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "voltpay={level},server={level},engine={level},providers={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.server.database).await?;
    let biller = VtpassBiller::new(&settings.biller)?;
    let gateway = PaystackGateway::new(&settings.gateway)?;
    let engine = engine::Engine::builder()
        .database(db.clone())
        .biller(Arc::new(biller))
        .gateway(Arc::new(gateway))
        .webhook_secret(settings.gateway.secret_key.clone())
        .config(LedgerConfig {
            conflict_retries: settings.ledger.conflict_retries,
            min_topup_minor: settings.ledger.min_topup_minor,
            ..LedgerConfig::default()
        })
        .build()
        .await?;

    let bind = settings
        .server
        .bind
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, settings.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    server::run_with_listener(engine, db, listener).await?;

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    tracing::info!("database ready");
    Ok(database)
}
