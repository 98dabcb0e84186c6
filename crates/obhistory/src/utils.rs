use anyhow::{anyhow, Context};
use async_trait::async_trait;
use clap::Parser;
use obhistory_core::{
    find_config_file, load_config, ConfigSource, CONFIG_ENV_VAR, CONFIG_FILENAME,
    DEFAULT_BASE_URL, DEFAULT_DATA_DIR, DEFAULT_FETCH_INTERVAL, DEFAULT_MAX_RETRIES,
    DEFAULT_REQUEST_TIMEOUT,
};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use slog::{debug, o, Drain, Level, Logger};
use std::{env, path::PathBuf, time::Duration};
use time::{macros::format_description, Date};

use crate::{FetchError, InvalidStationCode, ObservationSource, StationCode};

const DEFAULT_STATIONS: [&str; 3] = ["KCHO", "KIAD", "KOKV"];

#[derive(Parser, Clone, Debug, serde::Deserialize, Default)]
#[command(
    author,
    version,
    about = "obhistory - Keeps an hourly CSV history of NWS station observations"
)]
pub struct Cli {
    /// Path to config file (TOML format)
    /// Searched in order: this flag, $OBHISTORY_CONFIG, ./obhistory.toml,
    /// $XDG_CONFIG_HOME/obhistory/obhistory.toml, /etc/obhistory/obhistory.toml
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "OBHISTORY_LEVEL")]
    pub level: Option<String>,

    /// Station codes to ingest, comma separated (e.g. KCHO,KIAD)
    #[arg(short, long, env = "OBHISTORY_STATIONS", value_delimiter = ',')]
    pub stations: Option<Vec<String>>,

    /// Directory holding the per-station CSV files
    #[arg(short, long, env = "OBHISTORY_DATA_DIR")]
    pub data_dir: Option<String>,

    /// Read saved `{STATION}.html` pages from this directory instead of the network
    #[arg(short, long, env = "OBHISTORY_OFFLINE_DIR")]
    pub offline_dir: Option<String>,

    /// Base URL of the NWS observation history pages
    #[arg(short, long, env = "OBHISTORY_BASE_URL")]
    pub base_url: Option<String>,

    /// HTTP User-Agent header for NWS requests
    #[arg(short, long, env = "OBHISTORY_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Per-request timeout in seconds
    #[arg(short, long, env = "OBHISTORY_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Retries for transient HTTP failures
    #[arg(short = 'r', long, env = "OBHISTORY_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Date the pages were retrieved (YYYY-MM-DD), for replaying saved pages
    #[arg(long, env = "OBHISTORY_RETRIEVAL_DATE")]
    pub retrieval_date: Option<String>,

    /// Keep running and repeat the pass every sleep interval
    #[arg(short, long, env = "OBHISTORY_WATCH")]
    #[serde(default)]
    pub watch: bool,

    /// Seconds between passes in watch mode (NWS publishes hourly)
    #[arg(short = 'i', long, env = "OBHISTORY_SLEEP_INTERVAL")]
    pub sleep_interval: Option<u64>,
}

impl Cli {
    /// CLI values (flags and env vars, resolved by clap) take priority over the file.
    pub fn merge(self, file_config: Cli) -> Cli {
        Cli {
            config: self.config,
            level: self.level.or(file_config.level),
            stations: self.stations.or(file_config.stations),
            data_dir: self.data_dir.or(file_config.data_dir),
            offline_dir: self.offline_dir.or(file_config.offline_dir),
            base_url: self.base_url.or(file_config.base_url),
            user_agent: self.user_agent.or(file_config.user_agent),
            timeout: self.timeout.or(file_config.timeout),
            max_retries: self.max_retries.or(file_config.max_retries),
            retrieval_date: self.retrieval_date.or(file_config.retrieval_date),
            watch: self.watch || file_config.watch,
            sleep_interval: self.sleep_interval.or(file_config.sleep_interval),
        }
    }

    pub fn stations(&self) -> Result<Vec<StationCode>, InvalidStationCode> {
        match &self.stations {
            Some(stations) => stations
                .iter()
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse())
                .collect(),
            None => DEFAULT_STATIONS.iter().map(|s| s.parse()).collect(),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(self.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR))
    }

    pub fn offline_dir(&self) -> Option<PathBuf> {
        self.offline_dir.as_ref().map(PathBuf::from)
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("obhistory/{}", env!("CARGO_PKG_VERSION")))
    }

    pub fn timeout(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn sleep_interval(&self) -> u64 {
        self.sleep_interval.unwrap_or(DEFAULT_FETCH_INTERVAL)
    }

    /// The `--retrieval-date` override, if one was given.
    pub fn retrieval_date(&self) -> Result<Option<Date>, anyhow::Error> {
        let Some(text) = self.retrieval_date.as_deref() else {
            return Ok(None);
        };
        Date::parse(text.trim(), format_description!("[year]-[month]-[day]"))
            .map(Some)
            .with_context(|| format!("invalid retrieval date '{}', expected YYYY-MM-DD", text))
    }
}

/// Load configuration from CLI args, config file, and environment
pub fn get_config_info() -> Result<(Cli, ConfigSource), anyhow::Error> {
    let cli_args = Cli::parse();

    let source = if let Some(ref path) = cli_args.config {
        ConfigSource::Explicit(path.into())
    } else {
        find_config_file(CONFIG_ENV_VAR, CONFIG_FILENAME)
    };

    let file_config: Cli = load_config(&source)?;
    Ok((cli_args.merge(file_config), source))
}

fn parse_level(level: &str) -> Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => Level::Trace,
        "debug" => Level::Debug,
        "warn" | "warning" => Level::Warning,
        "error" => Level::Error,
        _ => Level::Info,
    }
}

pub fn setup_logger(cli: &Cli) -> Logger {
    let log_level = match cli.level.as_ref() {
        Some(level) => parse_level(level),
        None => parse_level(&env::var("RUST_LOG").unwrap_or_default()),
    };

    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = drain.filter_level(log_level).fuse();
    slog::Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")))
}

/// Fetches `{base_url}/{STATION}.html` over HTTP with retries on transient failures.
pub struct HttpSource {
    logger: Logger,
    base_url: String,
    timeout_secs: u64,
    client: ClientWithMiddleware,
}

impl HttpSource {
    pub fn new(
        logger: Logger,
        base_url: String,
        user_agent: &str,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<HttpSource, anyhow::Error> {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let inner = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| anyhow!("error building http client: {}", e))?;
        let client = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            logger,
            base_url,
            timeout_secs,
            client,
        })
    }

    pub fn page_url(&self, station: &StationCode) -> String {
        format!("{}/{}.html", self.base_url.trim_end_matches('/'), station)
    }
}

fn is_timeout(err: &reqwest_middleware::Error) -> bool {
    match err {
        reqwest_middleware::Error::Reqwest(e) => e.is_timeout(),
        // Errors that exhausted their retries come back wrapped
        reqwest_middleware::Error::Middleware(e) => e.chain().any(|cause| {
            cause
                .downcast_ref::<reqwest::Error>()
                .is_some_and(reqwest::Error::is_timeout)
                || cause
                    .downcast_ref::<reqwest_middleware::Error>()
                    .is_some_and(is_timeout)
        }),
    }
}

#[async_trait]
impl ObservationSource for HttpSource {
    async fn fetch_page(&self, station: &StationCode) -> Result<String, FetchError> {
        let url = self.page_url(station);
        debug!(self.logger, "requesting: {}", url);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) if is_timeout(&e) => {
                return Err(FetchError::Timeout {
                    url,
                    timeout_secs: self.timeout_secs,
                })
            }
            Err(e) => {
                return Err(FetchError::Request {
                    url,
                    message: e.to_string(),
                })
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        match response.text().await {
            Ok(html) => Ok(html),
            Err(e) if e.is_timeout() => Err(FetchError::Timeout {
                url,
                timeout_secs: self.timeout_secs,
            }),
            Err(e) => Err(FetchError::Body {
                url,
                message: e.to_string(),
            }),
        }
    }
}
