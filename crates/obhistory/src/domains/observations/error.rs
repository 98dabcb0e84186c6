use std::path::PathBuf;

/// Errors that can arise while retrieving a station's observation page.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("error reading body of {url}: {message}")]
    Body { url: String, message: String },
    #[error("error reading saved page {}: {source}", .path.display())]
    Local {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The published table no longer looks the way the parser expects.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SourceFormatError {
    #[error("no observation table with a 'Time (zone)' header found")]
    TableNotFound,
    #[error("observation table has {found} rows, fewer than its {expected} header and footer rows")]
    TooFewRows { found: usize, expected: usize },
    #[error("observation table is missing the '{0}' column")]
    MissingColumn(&'static str),
    #[error("time column header '{0}' does not name a time zone")]
    MissingTimeZone(String),
    #[error("table row {row} has {found} cells, header has {expected}")]
    RowWidth {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("invalid day of month '{0}'")]
    BadDay(String),
    #[error("invalid time of day '{0}', expected HH:MM")]
    BadTime(String),
    #[error("day {day} does not exist in {year}-{month:02}")]
    ImpossibleDate { year: i32, month: u8, day: u8 },
    #[error("column '{column}' holds non-numeric value '{value}'")]
    BadNumber { column: &'static str, value: String },
    #[error("unrecognised wind descriptor '{0}'")]
    BadWind(String),
}

/// A persisted CSV file does not match the expected schema.
#[derive(thiserror::Error, Debug)]
pub enum SchemaError {
    #[error("{}: missing column '{column}'", .path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("{}: line {line}: {message}", .path.display())]
    Record {
        path: PathBuf,
        line: u64,
        message: String,
    },
    #[error("{}: {source}", .path.display())]
    Read { path: PathBuf, source: csv::Error },
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("invalid station code '{0}': expected 3-5 letters or digits")]
pub struct InvalidStationCode(pub String);

/// Everything that can fail a single station's ingestion pass.
#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    SourceFormat(#[from] SourceFormatError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: csv::Error },
    #[error("failed to create data directory {}: {source}", .path.display())]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl IngestError {
    /// Short label used when logging a station failure.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Fetch(FetchError::Timeout { .. }) => "timeout",
            IngestError::Fetch(_) => "fetch",
            IngestError::SourceFormat(_) => "source-format",
            IngestError::Schema(_) => "schema",
            IngestError::Write { .. } | IngestError::DataDir { .. } => "io",
        }
    }

    /// Network trouble is usually gone by the next scheduled run.
    pub fn is_transient(&self) -> bool {
        matches!(self, IngestError::Fetch(_))
    }
}
