use obhistory_core::{path_exists, replace_file};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::{
    HourlyObservation, RawObservation, SchemaError, StationCode, HOURLY_COLUMNS, RAW_COLUMNS,
};

/// The three CSV files kept per station in the data directory.
#[derive(Debug, Clone)]
pub struct StationFiles {
    /// Raw rows from the latest fetch only
    pub recent: PathBuf,
    /// Accumulated raw rows, one per (date, hour)
    pub historical: PathBuf,
    /// Typed and derived view of `historical`
    pub updated: PathBuf,
}

impl StationFiles {
    pub fn new(data_dir: &Path, station: &StationCode) -> Self {
        Self {
            recent: data_dir.join(format!("{}_most_recent_3_day_data.csv", station)),
            historical: data_dir.join(format!("{}_historical_hourly_data.csv", station)),
            updated: data_dir.join(format!("{}_historical_hourly_data_updated.csv", station)),
        }
    }
}

/// Load a raw observation file, or `None` when it does not exist yet.
///
/// The header row must contain every raw column. Extra columns are ignored.
pub fn read_raw_observations(path: &Path) -> Result<Option<Vec<RawObservation>>, SchemaError> {
    if !path_exists(path) {
        return Ok(None);
    }

    let read_error = |source| SchemaError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(read_error)?;
    let headers = reader.headers().map_err(read_error)?.clone();
    if let Some(column) = RAW_COLUMNS
        .into_iter()
        .find(|column| !headers.iter().any(|h| h.trim() == *column))
    {
        return Err(SchemaError::MissingColumn {
            path: path.to_path_buf(),
            column,
        });
    }

    let mut rows = Vec::new();
    for record in reader.deserialize::<RawObservation>() {
        let mut row = record.map_err(|e| SchemaError::Record {
            path: path.to_path_buf(),
            line: e.position().map(|p| p.line()).unwrap_or_default(),
            message: e.to_string(),
        })?;
        // Hour is derived from Time; a hand-edited file may disagree
        row.hour = row.time.hour();
        rows.push(row);
    }
    Ok(Some(rows))
}

pub fn write_raw_observations(path: &Path, rows: &[RawObservation]) -> Result<(), csv::Error> {
    write_records(path, &RAW_COLUMNS, rows)
}

pub fn write_hourly_observations(
    path: &Path,
    rows: &[HourlyObservation],
) -> Result<(), csv::Error> {
    write_records(path, &HOURLY_COLUMNS, rows)
}

fn write_records<T: Serialize>(
    path: &Path,
    columns: &[&str],
    rows: &[T],
) -> Result<(), csv::Error> {
    replace_file(path, |file| -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(file);
        // serde only emits a header alongside the first record
        if rows.is_empty() {
            writer.write_record(columns)?;
        }
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    })
}
