//! Fanfolio binary entry point
//!
//! Reads `{"entity": "...", "data": {...}}` from a file path argument or
//! stdin, hydrates the entity's default with `data`, and prints the
//! result (or the rejected fields) as JSON.

use std::process::ExitCode;

use fanfolio::{config::ModelConfig, data, error::AppError, metrics, telemetry};
use serde::Deserialize;
use tokio::io::AsyncReadExt;

#[derive(Debug, Deserialize)]
struct Envelope {
    entity: String,
    #[serde(default = "empty_object")]
    data: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging
/// 3. Initialize metrics
/// 4. Read the input envelope
/// 5. Hydrate and print
#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = ModelConfig::load()?;

    // 2. Initialize tracing/logging
    telemetry::init_tracing(&config.logging)?;
    tracing::info!(
        level = %config.logging.level,
        format = %config.logging.format,
        "Configuration loaded"
    );

    // 3. Initialize metrics
    metrics::init_metrics();

    // 4. Read input
    let raw = match std::env::args().nth(1) {
        Some(path) => tokio::fs::read_to_string(&path).await?,
        None => {
            let mut buffer = String::new();
            tokio::io::stdin().read_to_string(&mut buffer).await?;
            buffer
        }
    };
    let envelope: Envelope = serde_json::from_str(&raw)?;
    tracing::info!(entity = %envelope.entity, "Hydrating input");

    // 5. Hydrate
    match data::hydrate_named(&envelope.entity, envelope.data, &config.content) {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(AppError::Validation(errors)) => {
            let report = serde_json::json!({ "errors": errors });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::from(2))
        }
        Err(error) => Err(error.into()),
    }
}
