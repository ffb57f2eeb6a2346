use anyhow::{Context, Result};
use taste_ranking::jobs::{ReplayFixture, ReplayJob};
use taste_ranking::Config;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the report
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: taste-ranking <fixture.json>")?;

    let config = Config::from_env().context("Failed to load config")?;

    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read fixture {}", path))?;
    let fixture = ReplayFixture::from_json(&raw).context("Failed to parse fixture")?;

    info!(fixture = %path, "Replaying fixture");

    let job = ReplayJob::new(config)?;
    let report = job.run(&fixture).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
