use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aegis_coach::config::CoachConfig;
use aegis_coach::features::{FeatureVector, transform};
use aegis_coach::scaler::RobustScaler;
use aegis_coach::stats::RawStatRecord;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aegis_coach=info,fit_scaler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("usage: fit_scaler <records.json> [out.json]"))?;
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("scaler.json"));

    let config = CoachConfig::from_env();
    let raw = fs::read_to_string(&input)
        .with_context(|| format!("read stat records {}", input.display()))?;
    let records: Vec<RawStatRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("parse stat records {}", input.display()))?;

    let rows = records
        .iter()
        .enumerate()
        .map(|(idx, rec)| transform(config.game, rec).with_context(|| format!("record {idx}")))
        .collect::<Result<Vec<FeatureVector>>>()?;

    let scaler = RobustScaler::fit(config.game, &rows)?;
    scaler.save(&output)?;

    tracing::info!(
        game = %config.game,
        samples = scaler.samples,
        out = %output.display(),
        "fitted robust scaler"
    );
    for ((name, center), scale) in scaler
        .feature_names
        .iter()
        .zip(&scaler.center)
        .zip(&scaler.scale)
    {
        println!("{name:<24} median={center:>10.4} iqr={scale:>10.4}");
    }

    Ok(())
}
