use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use fir_assist::analyzer::Analyzer;
use fir_assist::catalog::{CatalogStore, MemoryCatalog};
use fir_assist::config::AppConfig;
use fir_assist::db::Database;
use fir_assist::seed::load_catalog_file;
use fir_assist::text::EnglishNormalizer;

#[derive(Parser, Debug)]
#[command(name = "eval")]
#[command(about = "Run a narrative/expected-section evaluation set")]
struct Cli {
    #[arg(long, default_value = "eval/narratives.jsonl")]
    file: String,
    /// Evaluate against a JSON seed catalog held in memory instead of the store.
    #[arg(long)]
    catalog: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct EvalCase {
    id: String,
    narrative: String,
    #[serde(default)]
    expect_sections: Vec<String>,
    #[serde(default)]
    expect_top: Option<String>,
    #[serde(default)]
    expect_empty: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let catalog: Arc<dyn CatalogStore> = match &cli.catalog {
        Some(path) => {
            let seed = load_catalog_file(path).await?;
            Arc::new(MemoryCatalog::new(seed.sections, seed.judgments))
        }
        None => Arc::new(Database::new(&config).await?),
    };
    let analyzer = Analyzer::new(
        catalog,
        Arc::new(EnglishNormalizer::new()),
        config.matching.clone(),
    );

    let cases = load_cases(&cli.file)?;
    if cases.is_empty() {
        anyhow::bail!("no eval cases found in {}", cli.file);
    }

    let mut total = 0usize;
    let mut passed = 0usize;
    let mut top_expectations = 0usize;
    let mut top_hits = 0usize;
    let mut empty_count = 0usize;

    for case in cases {
        total += 1;
        let recommendations = analyzer
            .analyze(&case.narrative)
            .await
            .with_context(|| format!("failed eval case {}", case.id))?;

        let codes: Vec<&str> = recommendations.iter().map(|r| r.code.as_str()).collect();
        if codes.is_empty() {
            empty_count += 1;
        }

        let mut pass = case
            .expect_sections
            .iter()
            .all(|expected| codes.contains(&expected.as_str()));
        if case.expect_empty.unwrap_or(false) != codes.is_empty() {
            pass = false;
        }
        if pass {
            passed += 1;
        }

        if let Some(expected_top) = &case.expect_top {
            top_expectations += 1;
            if codes.first() == Some(&expected_top.as_str()) {
                top_hits += 1;
            }
        }

        if cli.verbose {
            println!("--- {} [{}] ---", case.id, if pass { "pass" } else { "FAIL" });
            println!("N: {}", case.narrative);
            for rec in &recommendations {
                println!(
                    "  {} {} ({:.0}%) judgments={}",
                    rec.code,
                    rec.title,
                    rec.score * 100.0,
                    rec.judgments.len()
                );
            }
            println!();
        }
    }

    println!("Eval cases: {}", total);
    println!("Expected-section accuracy: {:.1}%", ratio(passed, total) * 100.0);
    println!("No-match rate: {:.1}%", ratio(empty_count, total) * 100.0);
    if top_expectations > 0 {
        println!(
            "Top-1 hit-rate: {:.1}% ({}/{})",
            ratio(top_hits, top_expectations) * 100.0,
            top_hits,
            top_expectations
        );
    }

    Ok(())
}

fn load_cases(path: &str) -> Result<Vec<EvalCase>> {
    let file = File::open(path).with_context(|| format!("failed opening {}", path))?;
    let reader = BufReader::new(file);
    let mut cases = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let parsed: EvalCase = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON at {} line {}", path, idx + 1))?;
        cases.push(parsed);
    }

    Ok(cases)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn ratio(n: usize, d: usize) -> f32 {
    if d == 0 {
        return 0.0;
    }
    n as f32 / d as f32
}
