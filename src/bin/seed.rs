use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fir_assist::config::AppConfig;
use fir_assist::db::Database;
use fir_assist::seed::{builtin_catalog, load_catalog_file, Seeder};

#[derive(Parser, Debug)]
#[command(name = "seed")]
#[command(about = "Install a section/judgment catalog into the local store")]
struct Cli {
    /// JSON catalog to install. Falls back to FIR_ASSIST_SEED_FILE, then the built-in catalog.
    #[arg(long)]
    file: Option<PathBuf>,
    /// Reinstall even when the catalog is unchanged.
    #[arg(long, default_value_t = false)]
    rebuild: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::from_env();
    let catalog = match cli.file.or_else(|| config.seed_file.clone()) {
        Some(path) => load_catalog_file(&path).await?,
        None => builtin_catalog()?,
    };

    let db = Database::new(&config).await?;
    let result = Seeder::new(db).seed(&catalog, cli.rebuild).await?;

    println!(
        "Seed complete. skipped={} sections={} judgments={}",
        result.skipped, result.section_count, result.judgment_count
    );

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
