use std::{process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context, Error};
use clap::Parser;
use env_logger::Env;
use log::{debug, error, warn};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use hue_randomizer::prelude::*;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = "Blue/yellow desynchronized effect for Hue lights")]
pub struct Cli {
    /// Room or zone to run the effect on, by name or id. Without it the
    /// available groups are listed.
    pub group: Option<String>,

    /// Effect duration in seconds
    #[arg(long, short)]
    pub duration: Option<u64>,

    /// Brightness percentage while the effect runs
    #[arg(long, short, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub brightness: Option<u8>,

    /// Seed for reproducible offsets and periods
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long = "config", default_value_t = String::from(DEFAULT_CONFIG_PATH))]
    pub config_path: String,

    /// List rooms and zones, run nothing
    #[arg(long)]
    pub list: bool,

    #[arg(long = "loglevel", default_value_t = String::from("info"))]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Error> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level))
        .filter_module("reqwest", log::LevelFilter::Warn)
        .filter_module("hyper", log::LevelFilter::Warn)
        .init();

    debug!("Started with settings: {:?}", cli);

    let config = Config::load_from(&cli.config_path)
        .with_context(|| format!("could not load configuration from {}", cli.config_path))?;
    let bridge = Arc::new(HueBridge::from_config(&config.bridge)?);

    let group = match (cli.group.clone(), cli.list) {
        (Some(group), false) => group,
        (group, list) => {
            if group.is_none() && !list {
                println!("Usage: hue-randomizer <group> [--duration S] [--brightness PCT]");
            }
            println!("\nAvailable groups:");
            for group in bridge.list_groups().await? {
                println!(
                    "  {}: {} ({}, {} lights)",
                    group.id, group.name, group.kind, group.light_count
                );
            }
            return Ok(if list {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
    };

    let effect = EffectConfig {
        duration: Duration::from_secs(cli.duration.unwrap_or(config.effect.duration_secs)),
        brightness: Some(cli.brightness.unwrap_or(config.effect.brightness) as f32),
        request_timeout: config.bridge.request_timeout(),
        transition: config.effect.transition_ms.map(Duration::from_millis),
        seed: cli.seed,
        ..Default::default()
    };

    // Ctrl+C cuts the effect short, the lights are still restored
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted! Stopping all lights and restoring state...");
            interrupt.cancel();
        }
    });

    let orchestrator = Orchestrator::new(bridge.clone(), effect);
    match orchestrator.run(&group, cancel).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if report.success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Err(e) => {
            error!("{}", e);

            let mut result = json!({ "success": false, "error": e.to_string() });
            if let EffectError::Discovery { .. } = e {
                if let Ok(groups) = bridge.list_groups().await {
                    result["available_groups"] = serde_json::to_value(groups)?;
                }
            }
            println!("{}", serde_json::to_string_pretty(&result)?);

            Ok(ExitCode::FAILURE)
        }
    }
}
