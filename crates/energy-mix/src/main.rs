mod bootstrap;

use std::time::Duration;

use anyhow::{Context, Result};
use energy_core::settings::Settings;
use energy_data::analysis::EnergyQuery;
use energy_runtime::service::{run_with_grace, EnergyService};

/// How long shutdown waits for reads that already missed their deadline.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> Result<()> {
    let settings = Settings::parse_args();

    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("energy-mix v{} starting", env!("CARGO_PKG_VERSION"));

    run_with_grace(run(settings), SHUTDOWN_GRACE)?
}

async fn run(settings: Settings) -> Result<()> {
    let service = EnergyService::from_settings(&settings)?;
    let query = EnergyQuery::from_settings(&settings)?;

    tracing::info!(
        "Received parameters: start={:?}, end={:?}, region={:?}, aggregation={}, data_dir={}",
        query.start,
        query.end,
        query.region,
        query.aggregation,
        service.data_dir().display()
    );

    let outcome = service
        .query(&query)
        .await
        .context("energy query failed")?;

    for warning in &outcome.warnings {
        tracing::warn!("{}", warning);
    }
    if outcome.is_empty() {
        tracing::info!("No records matched the requested window");
    }

    let response = outcome.into_response();
    let json = if settings.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{}", json);

    Ok(())
}
