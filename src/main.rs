use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use fir_assist::analyzer::Analyzer;
use fir_assist::db::Database;
use fir_assist::seed::Seeder;
use fir_assist::text::EnglishNormalizer;
use fir_assist::{run_server, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    let db = Database::new(&config).await?;

    if let Some(seeded) = Seeder::new(db.clone()).ensure_seeded().await? {
        tracing::info!(
            "empty catalog; installed built-in sections={} judgments={}",
            seeded.section_count,
            seeded.judgment_count
        );
    }

    let analyzer = Analyzer::new(
        Arc::new(db.clone()),
        Arc::new(EnglishNormalizer::new()),
        config.matching.clone(),
    );

    run_server(config, db, analyzer).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
