use async_trait::async_trait;
use std::path::PathBuf;

use crate::{FetchError, StationCode};

/// Somewhere a station's 3-day observation page can be read from.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    async fn fetch_page(&self, station: &StationCode) -> Result<String, FetchError>;
}

/// Reads previously saved pages named `{STATION}.html` from a directory.
pub struct LocalSource {
    dir: PathBuf,
}

impl LocalSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn page_path(&self, station: &StationCode) -> PathBuf {
        self.dir.join(format!("{}.html", station))
    }
}

#[async_trait]
impl ObservationSource for LocalSource {
    async fn fetch_page(&self, station: &StationCode) -> Result<String, FetchError> {
        let path = self.page_path(station);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| FetchError::Local { path, source })
    }
}
