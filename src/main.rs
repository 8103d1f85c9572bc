//! Runs one viewport pass against a live spots service and prints what would be drawn.
//!
//! Usage: `spotgrid-probe [south west north east]`

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use spotgrid::headless::{FixedLocator, HeadlessMap, HeadlessPanel};
use spotgrid::{
    init_tracing, AppConfig, Bounds, HttpSpotBackend, MapWidget, SettleOutcome, ViewportController,
};
use tracing::{debug, info};

fn parse_viewport(args: &[String], config: &AppConfig) -> Result<Bounds> {
    match args {
        [] => {
            // roughly one screen around the default center at street zoom
            let center = config.default_center;
            Ok(Bounds::new(
                center.lat + 0.02,
                center.lat - 0.02,
                center.lng + 0.03,
                center.lng - 0.03,
            ))
        }
        [south, west, north, east] => {
            let parse = |name: &str, raw: &String| -> Result<f64> {
                raw.parse::<f64>()
                    .with_context(|| format!("{name} must be a number, got {raw:?}"))
            };
            Ok(Bounds::new(
                parse("north", north)?,
                parse("south", south)?,
                parse("east", east)?,
                parse("west", west)?,
            ))
        }
        _ => bail!("expected no arguments or exactly four: south west north east"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = AppConfig::from_env();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let viewport = parse_viewport(&args, &config)?;
    info!(profile = ?config.public_profile(), "starting probe");

    let backend = Arc::new(HttpSpotBackend::new(&config)?);
    let panel = Arc::new(HeadlessPanel::default());
    let map = Arc::new(HeadlessMap::default());
    let handle = Arc::clone(&map);

    let controller = ViewportController::start(
        config,
        backend,
        Arc::new(FixedLocator::unavailable()),
        panel.clone(),
        move |_, key| {
            if key.is_none() {
                debug!("MAPS_API_KEY not set; a browser map would load without a key");
            }
            Ok(handle as Arc<dyn MapWidget>)
        },
    )
    .await?;
    println!(
        "{}",
        serde_json::to_string_pretty(controller.startup_plan())?
    );

    map.set_viewport(viewport);
    match controller.on_settle().await {
        SettleOutcome::Rendered(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            for card in panel.entries() {
                println!(
                    "{}\t{}\t{}",
                    card.place_id,
                    card.name,
                    card.rating
                        .map(|rating| format!("{rating:.1}"))
                        .unwrap_or_else(|| "-".into())
                );
            }
        }
        other => bail!("viewport pass did not run: {other:?}"),
    }
    Ok(())
}
