use anyhow::Context;
use std::sync::Arc;
use truefolio::{config::Config, db::init_db, Journal, JournalStore, Repository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;

    let pool = init_db(&config.database_path)
        .await
        .with_context(|| format!("Failed to initialize database at {}", config.database_path))?;
    let store: Arc<dyn JournalStore> = Arc::new(Repository::new(pool));

    let journal = Journal::open(store, config).await;
    let trades = journal.settle().await;
    let series = journal.monthly_portfolios().await?;

    tracing::info!(
        trades = trades.trades.len(),
        months = series.len(),
        "Recalculated journal"
    );
    println!("{}", serde_json::to_string_pretty(&series)?);

    journal.shutdown().await;
    Ok(())
}
