use obhistory_core::ensure_dir_exists;
use slog::{debug, error, info, o, warn, Logger};
use std::{path::PathBuf, sync::Arc};
use time::Date;

use crate::{
    derive_hourly, find_gaps, merge_observations, parse_observation_table, read_raw_observations,
    write_hourly_observations, write_raw_observations, HourGap, IngestError, ObservationSource,
    StationCode, StationFiles,
};

/// What one station's pass did to its files.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSummary {
    pub station: StationCode,
    pub fetched_rows: usize,
    pub historical_before: usize,
    pub historical_after: usize,
    pub gaps: Vec<HourGap>,
}

/// Outcome of a pass over several stations.
#[derive(Debug, Default)]
pub struct RunReport {
    pub succeeded: Vec<IngestSummary>,
    pub failed: Vec<(StationCode, IngestError)>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ObservationService {
    pub logger: Logger,
    pub source: Arc<dyn ObservationSource>,
    pub data_dir: PathBuf,
}

impl ObservationService {
    pub fn new(logger: Logger, source: Arc<dyn ObservationSource>, data_dir: PathBuf) -> Self {
        ObservationService {
            logger,
            source,
            data_dir,
        }
    }

    /// Fetch, merge and derive one station, rewriting its three CSV files.
    pub async fn ingest_station(
        &self,
        station: &StationCode,
        retrieval_date: Date,
    ) -> Result<IngestSummary, IngestError> {
        let logger = self.logger.new(o!("station" => station.to_string()));

        if ensure_dir_exists(&self.data_dir).map_err(|source| IngestError::DataDir {
            path: self.data_dir.clone(),
            source,
        })? {
            info!(logger, "created data directory {}", self.data_dir.display());
        }
        let files = StationFiles::new(&self.data_dir, station);

        info!(logger, "fetching observations (retrieval date {})", retrieval_date);
        let page = self.source.fetch_page(station).await?;
        let fresh = parse_observation_table(&page)?.into_observations(station, retrieval_date)?;
        debug!(logger, "parsed {} rows", fresh.len());
        write_raw_observations(&files.recent, &fresh).map_err(|source| IngestError::Write {
            path: files.recent.clone(),
            source,
        })?;

        let historical = match read_raw_observations(&files.historical)? {
            Some(rows) => rows,
            None => {
                info!(
                    logger,
                    "no history at {}, seeding from this fetch",
                    files.historical.display()
                );
                Vec::new()
            }
        };
        let historical_before = historical.len();
        let fetched_rows = fresh.len();

        let merged = merge_observations(historical, fresh);
        info!(
            logger,
            "historical rows: {} before merge, {} after",
            historical_before,
            merged.len()
        );
        write_raw_observations(&files.historical, &merged).map_err(|source| {
            IngestError::Write {
                path: files.historical.clone(),
                source,
            }
        })?;

        let gaps = find_gaps(&merged);
        if !gaps.is_empty() {
            warn!(
                logger,
                "{} gap(s) in hourly record, rolling sums span them",
                gaps.len()
            );
            for gap in &gaps {
                debug!(logger, "{}", gap);
            }
        }

        let hourly = derive_hourly(&logger, &merged)?;
        write_hourly_observations(&files.updated, &hourly).map_err(|source| {
            IngestError::Write {
                path: files.updated.clone(),
                source,
            }
        })?;
        info!(logger, "wrote {}", files.updated.display());

        Ok(IngestSummary {
            station: station.clone(),
            fetched_rows,
            historical_before,
            historical_after: merged.len(),
            gaps,
        })
    }

    /// Ingest each station in turn. A failing station is logged and skipped.
    pub async fn ingest_stations(&self, stations: &[StationCode], retrieval_date: Date) -> RunReport {
        let mut report = RunReport::default();
        for station in stations {
            match self.ingest_station(station, retrieval_date).await {
                Ok(summary) => report.succeeded.push(summary),
                Err(e) => {
                    error!(
                        self.logger,
                        "station {} failed ({}): {}",
                        station,
                        e.kind(),
                        e;
                        "transient" => e.is_transient()
                    );
                    report.failed.push((station.clone(), e));
                }
            }
        }
        info!(
            self.logger,
            "run finished: {} succeeded, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }
}
