//! CLI for building a training table from a CSV of URLs
//!
//! Reads a CSV with a URL column (and optionally a label column) and writes
//! one row of F1..F22 per input row.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url_features::{
    extract_rows, pacer_for, read_url_rows, write_feature_rows, BatchConfig, BatchScheduler,
    ExtractorConfig, FeatureExtractor, PacingConfig,
};

#[derive(Parser)]
#[command(name = "extract-features")]
#[command(about = "Extract URL risk features from a CSV file")]
struct Cli {
    /// Input CSV with a header row
    input: PathBuf,

    /// Output CSV (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Column holding the URLs
    #[arg(long, default_value = "url")]
    url_column: String,

    /// Column holding the labels, copied to the output
    #[arg(long)]
    label_column: Option<String>,

    /// URLs per chunk
    #[arg(long, default_value_t = 25)]
    chunk_size: usize,

    /// URLs extracted concurrently
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Skip politeness pauses
    #[arg(long)]
    no_pacing: bool,

    /// Cap outbound requests per second (0 for no cap)
    #[arg(long, default_value_t = 0)]
    rate_limit: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout can carry the table
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,url_features=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    let input = File::open(&cli.input)
        .with_context(|| format!("Failed to open {}", cli.input.display()))?;
    let rows = read_url_rows(
        BufReader::new(input),
        &cli.url_column,
        cli.label_column.as_deref(),
    )
    .context("Failed to read input CSV")?;

    let pacing = if cli.no_pacing {
        PacingConfig::none()
    } else {
        PacingConfig::default()
    }
    .with_rate_limit(cli.rate_limit);
    let mut config = ExtractorConfig::new().with_pacing(pacing.clone());
    if let Ok(key) = std::env::var("TAVILY_API_KEY") {
        config = config.with_tavily_api_key(key);
    }

    let pacer = pacer_for(&pacing);
    let extractor = FeatureExtractor::builder(config)
        .pacer(pacer.clone())
        .build()
        .context("Failed to build feature extractor")?;
    let scheduler = BatchScheduler::new(
        Arc::new(extractor),
        pacer,
        BatchConfig::new()
            .with_chunk_size(cli.chunk_size)
            .with_concurrency(cli.concurrency),
    );

    let (features, batch) = extract_rows(&scheduler, &rows).await;
    tracing::info!(
        rows = features.len(),
        failed = batch.failed.len(),
        "Extraction complete"
    );
    for &index in &batch.failed {
        let url = rows[index].url.as_deref().unwrap_or_default();
        tracing::warn!(row = index + 1, url = %url, "Row written with zero features");
    }

    let with_label = cli.label_column.is_some();
    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_feature_rows(&mut writer, &features, with_label).context("Failed to write output CSV")?;
            writer.flush()?;
            tracing::info!(path = %path.display(), "Features written");
        }
        None => {
            let stdout = io::stdout();
            write_feature_rows(stdout.lock(), &features, with_label).context("Failed to write output CSV")?;
        }
    }

    Ok(())
}
