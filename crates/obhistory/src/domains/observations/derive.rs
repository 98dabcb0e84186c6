use regex::Regex;
use slog::{warn, Logger};
use std::{str::FromStr, sync::OnceLock};

use crate::{HourlyObservation, RawObservation, SourceFormatError};

fn wind_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:(?P<calm>calm)|(?P<dir>[a-z]+)\s+(?P<speed>\d+)(?:\s+g\s+(?P<gust>\d+))?)$",
        )
        .expect("valid wind regex")
    })
}

/// The `Wind (mph)` descriptor: `Calm`, `W 8` or `W 28 G 40`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindReading {
    Missing,
    Calm,
    Steady {
        direction: String,
        speed: u32,
    },
    Gusting {
        direction: String,
        speed: u32,
        gust: u32,
    },
}

impl WindReading {
    /// Sustained speed in mph; gusts are ignored.
    pub fn speed(&self) -> Option<u32> {
        match self {
            WindReading::Missing => None,
            WindReading::Calm => Some(0),
            WindReading::Steady { speed, .. } | WindReading::Gusting { speed, .. } => Some(*speed),
        }
    }
}

impl FromStr for WindReading {
    type Err = SourceFormatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() || normalized.eq_ignore_ascii_case("na") {
            return Ok(WindReading::Missing);
        }

        let bad = || SourceFormatError::BadWind(value.to_string());
        let caps = wind_regex().captures(&normalized).ok_or_else(bad)?;
        if caps.name("calm").is_some() {
            return Ok(WindReading::Calm);
        }

        let direction = caps
            .name("dir")
            .map(|m| m.as_str().to_string())
            .ok_or_else(bad)?;
        let speed = caps
            .name("speed")
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(bad)?;
        match caps.name("gust") {
            Some(gust) => Ok(WindReading::Gusting {
                direction,
                speed,
                gust: gust.as_str().parse().map_err(|_| bad())?,
            }),
            None => Ok(WindReading::Steady { direction, speed }),
        }
    }
}

/// Numeric measurement; blank or `NA` is null.
pub fn parse_measure(column: &'static str, text: &str) -> Result<Option<f64>, SourceFormatError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("na") {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| SourceFormatError::BadNumber {
            column,
            value: text.to_string(),
        })
}

/// `"85%"` → `85.0`.
pub fn parse_humidity(text: &str) -> Result<Option<f64>, SourceFormatError> {
    parse_measure("Relative Humidity", text.trim().trim_end_matches('%'))
}

/// Precipitation is never null: a blank total means nothing fell.
pub fn parse_precip(column: &'static str, text: &str) -> Result<f64, SourceFormatError> {
    Ok(parse_measure(column, text)?.unwrap_or(0.0))
}

/// Trailing sum over `window` rows; rows before the first full window are `None`.
///
/// Sums run over row order, so a missing hour makes the window span more
/// than `window` hours.
pub fn rolling_sums(values: &[f64], window: usize) -> Vec<Option<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(idx, _)| {
            if window == 0 || idx + 1 < window {
                return None;
            }
            let sum: f64 = values[idx + 1 - window..=idx].iter().sum();
            // Hundredths of an inch, the published precision
            Some((sum * 100.0).round() / 100.0)
        })
        .collect()
}

/// Type the raw rows and add windspeed, rolling precipitation and labels.
///
/// `rows` must already be deduplicated and sorted.
pub fn derive_hourly(
    logger: &Logger,
    rows: &[RawObservation],
) -> Result<Vec<HourlyObservation>, SourceFormatError> {
    let precip_1h = rows
        .iter()
        .map(|row| parse_precip("1 hr", &row.precip_1h))
        .collect::<Result<Vec<_>, _>>()?;

    let rolling_3h = rolling_sums(&precip_1h, 3);
    let rolling_6h = rolling_sums(&precip_1h, 6);
    let rolling_12h = rolling_sums(&precip_1h, 12);
    let rolling_24h = rolling_sums(&precip_1h, 24);

    let mut derived = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let windspeed = match row.wind.parse::<WindReading>() {
            Ok(reading) => reading.speed(),
            Err(e) => {
                warn!(logger, "{} at {} {}, leaving windspeed empty", e, row.date, row.time);
                None
            }
        };

        derived.push(HourlyObservation {
            date: row.date,
            day: row.day,
            date_time: format!("{} {}", row.date, row.time),
            time: row.time,
            time_zone: row.time_zone.clone(),
            station: row.station.clone(),
            hour: row.time.hour(),
            wind: row.wind.clone(),
            windspeed,
            visibility: row.visibility.clone(),
            weather: row.weather.clone(),
            sky_condition: row.sky_condition.clone(),
            temp: parse_measure("Air", &row.air)?,
            dew_point: parse_measure("Dwpt", &row.dew_point)?,
            relative_humidity: parse_humidity(&row.relative_humidity)?,
            wind_chill: row.wind_chill.clone(),
            heat_index: row.heat_index.clone(),
            altimeter: parse_measure("altimeter (in)", &row.altimeter)?,
            sea_level_pressure: parse_measure("sea level (mb)", &row.sea_level_pressure)?,
            precip_1h: precip_1h[idx],
            precip_3h: parse_precip("3 hr", &row.precip_3h)?,
            precip_6h: parse_precip("6 hr", &row.precip_6h)?,
            rolling_3h: rolling_3h[idx],
            rolling_6h: rolling_6h[idx],
            rolling_12h: rolling_12h[idx],
            rolling_24h: rolling_24h[idx],
            retrieval_date: row.retrieval_date,
        });
    }
    Ok(derived)
}
