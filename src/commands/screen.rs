use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::catalog::LayerCatalog;
use crate::cli::{Cli, OutputFormat, ScreenArgs};
use crate::config::PortalConfig;
use crate::geom::ProjectionSet;
use crate::screening::{RunStatus, Screening, ScreeningOptions};
use crate::table::{results_frame, write_table, TableFormat};
use crate::wfs::WfsClient;

/// Runs one scenario end to end and writes the result table.
pub async fn run(_cli: &Cli, args: &ScreenArgs) -> Result<()> {
    let config = PortalConfig::load(&args.config)?;
    let body = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("failed to read scenario {}", args.scenario.display()))?;
    let mut options: ScreeningOptions = serde_json::from_str(&body)
        .with_context(|| format!("failed to parse scenario {}", args.scenario.display()))?;
    if args.refresh {
        options.refresh = true;
    }

    let projections = ProjectionSet::new(&config.named_projections)?;
    let client = WfsClient::with_defaults(projections)?;
    let services_url = args.services.as_deref().unwrap_or(&config.services_url);
    let catalog = LayerCatalog::fetch(client.http(), services_url).await?;
    info!(layers = catalog.len(), url = %services_url, "service registry loaded");

    let mut screening = Screening::new(&config, options, Arc::new(client), catalog)?;
    match screening.run().await? {
        RunStatus::Completed => {}
        RunStatus::Aborted { reason } => bail!("screening aborted: {reason}"),
    }
    let log = screening.log();
    info!(
        fetch_ms = log.fetch.as_millis() as u64,
        total_ms = log.total.as_millis() as u64,
        intersection_errors = log.intersection_errors,
        "timings"
    );

    let mut df = results_frame(screening.districts())?;
    let format = match args.format {
        OutputFormat::Csv => TableFormat::Csv,
        OutputFormat::Json => TableFormat::Json,
    };
    write_table(&mut df, &args.out, format)?;
    println!(
        "Screened {} districts -> {}",
        screening.districts().len(),
        args.out.display()
    );
    Ok(())
}
