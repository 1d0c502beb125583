use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aegis_coach::config::CoachConfig;
use aegis_coach::inference::Engine;
use aegis_coach::roster::{MatchSnapshot, predict_roster};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aegis_coach=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/match_snapshot.json"));

    let config = CoachConfig::from_env();
    let engine = Engine::load(&config)?;
    if engine.is_degraded() {
        tracing::warn!("no model loaded; every probability is the neutral fallback");
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("read match snapshot {}", path.display()))?;
    let snapshot: MatchSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("parse match snapshot {}", path.display()))?;

    for report in predict_roster(&engine, &snapshot, config.support_threshold) {
        match &report.outcome {
            Ok((p, rec)) => println!(
                "{:<16} {:<16} p={:.2} {:?} conf={:>3} {:?} | {}",
                report.name, report.team, p.probability, p.label, p.confidence, p.quality, rec
            ),
            Err(err) => println!("{:<16} {:<16} error: {err}", report.name, report.team),
        }
    }

    Ok(())
}
