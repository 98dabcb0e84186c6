use anyhow::anyhow;
use obhistory::{
    get_config_info, setup_logger, Cli, HttpSource, LocalSource, ObservationService,
    ObservationSource,
};
use obhistory_core::is_directory;
use slog::{info, warn, Logger};
use std::{sync::Arc, time::Duration};
use time::{Date, OffsetDateTime, UtcOffset};
use tokio::time::interval;

fn main() -> Result<(), anyhow::Error> {
    // Only readable while the process is still single threaded
    let local_offset = UtcOffset::current_local_offset().ok();

    let (cli, config_source) = get_config_info()?;
    let logger = setup_logger(&cli);

    info!(logger, "obhistory starting...");
    info!(logger, "  Config: {}", config_source);
    info!(logger, "  Data dir: {}", cli.data_dir().display());
    match cli.offline_dir() {
        Some(dir) => info!(logger, "  Offline pages: {}", dir.display()),
        None => info!(logger, "  Source URL: {}", cli.base_url()),
    }
    if local_offset.is_none() {
        warn!(logger, "local UTC offset unavailable, dating retrievals in UTC");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(cli, logger, local_offset))
}

fn retrieval_date(cli: &Cli, local_offset: Option<UtcOffset>) -> Result<Date, anyhow::Error> {
    if let Some(date) = cli.retrieval_date()? {
        return Ok(date);
    }
    let now = OffsetDateTime::now_utc();
    Ok(match local_offset {
        Some(offset) => now.to_offset(offset).date(),
        None => now.date(),
    })
}

async fn run(
    cli: Cli,
    logger: Logger,
    local_offset: Option<UtcOffset>,
) -> Result<(), anyhow::Error> {
    let stations = cli.stations()?;
    let source: Arc<dyn ObservationSource> = match cli.offline_dir() {
        Some(dir) => {
            if !is_directory(&dir) {
                return Err(anyhow!("offline page directory {} not found", dir.display()));
            }
            Arc::new(LocalSource::new(dir))
        }
        None => Arc::new(HttpSource::new(
            logger.clone(),
            cli.base_url(),
            &cli.user_agent(),
            cli.timeout(),
            cli.max_retries(),
        )?),
    };
    let service = ObservationService::new(logger.clone(), source, cli.data_dir());

    if !cli.watch {
        let report = service
            .ingest_stations(&stations, retrieval_date(&cli, local_offset)?)
            .await;
        if !report.is_success() {
            return Err(anyhow!(
                "{} of {} station(s) failed",
                report.failed.len(),
                stations.len()
            ));
        }
        return Ok(());
    }

    let sleep_between_runs = cli.sleep_interval().max(1);
    info!(
        logger,
        "Wait time between data pulls: {} seconds", sleep_between_runs
    );
    let mut run_interval = interval(Duration::from_secs(sleep_between_runs));
    loop {
        tokio::select! {
            _ = run_interval.tick() => {
                let report = service
                    .ingest_stations(&stations, retrieval_date(&cli, local_offset)?)
                    .await;
                if !report.is_success() {
                    warn!(logger, "{} station(s) failed this run, retrying next interval", report.failed.len());
                }
                info!(logger, "waiting {} seconds for next run", sleep_between_runs);
            }
            _ = tokio::signal::ctrl_c() => {
                info!(logger, "received ctrl-c, shutting down");
                break;
            }
        }
    }
    Ok(())
}
