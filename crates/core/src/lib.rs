//! obhistory Core Library
//!
//! Shared utilities for the ingester:
//! - Configuration loading (XDG-compliant)
//! - File system utilities
//! - Common defaults

mod config;
pub mod fs;

pub use config::{find_config_file, load_config, ConfigError, ConfigSource};
pub use fs::{ensure_dir_exists, is_directory, path_exists, replace_file};

/// Application name used for XDG paths
pub const APP_NAME: &str = "obhistory";

/// Config filename searched for in the standard locations
pub const CONFIG_FILENAME: &str = "obhistory.toml";

/// Environment variable holding an explicit config path
pub const CONFIG_ENV_VAR: &str = "OBHISTORY_CONFIG";

/// Where the NWS publishes the 3-day observation tables
pub const DEFAULT_BASE_URL: &str = "https://forecast.weather.gov/data/obhistory";

/// Default folder for the per-station CSV files
pub const DEFAULT_DATA_DIR: &str = "./weather_data";

/// Default watch-mode interval (1 hour, the NWS publish cadence)
pub const DEFAULT_FETCH_INTERVAL: u64 = 3600;

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 20;

/// Default number of retries for transient HTTP failures
pub const DEFAULT_MAX_RETRIES: u32 = 3;
