use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use time::{Date, Time};

use crate::InvalidStationCode;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// NWS station identifier, e.g. `KCHO`. Always upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StationCode(String);

impl StationCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for StationCode {
    type Err = InvalidStationCode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let valid = (3..=5).contains(&trimmed.len())
            && trimmed.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid {
            return Err(InvalidStationCode(value.to_string()));
        }
        Ok(StationCode(trimmed.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for StationCode {
    type Error = InvalidStationCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StationCode> for String {
    fn from(value: StationCode) -> Self {
        value.0
    }
}

impl fmt::Display for StationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local station clock time as published, `HH:MM` on a 24-hour clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(Time);

impl ClockTime {
    pub fn hour(&self) -> u8 {
        self.0.hour()
    }
}

impl FromStr for ClockTime {
    type Err = crate::SourceFormatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let bad = || crate::SourceFormatError::BadTime(value.to_string());
        let (hour, minute) = value.trim().split_once(':').ok_or_else(bad)?;
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(bad());
        }
        let hour: u8 = hour.parse().map_err(|_| bad())?;
        let minute: u8 = minute.parse().map_err(|_| bad())?;
        Time::from_hms(hour, minute, 0)
            .map(ClockTime)
            .map_err(|_| bad())
    }
}

impl TryFrom<String> for ClockTime {
    type Error = crate::SourceFormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

/// Column order of the 3-day file and the raw historical file.
pub const RAW_COLUMNS: [&str; 23] = [
    "Date",
    "Day",
    "Time",
    "Time Zone",
    "Wind (mph)",
    "Vis. (mi.)",
    "Weather",
    "Sky Cond.",
    "Air",
    "Dwpt",
    "Max.",
    "Min.",
    "Relative Humidity",
    "Wind Chill (°F)",
    "Heat Index (°F)",
    "altimeter (in)",
    "sea level (mb)",
    "1 hr",
    "3 hr",
    "6 hr",
    "Data Retrieval Date",
    "Station",
    "Hour",
];

/// One published observation row with its reconstructed date.
///
/// Measurements stay as the text the NWS published so that the raw files
/// can always be re-derived; [`HourlyObservation`] holds the typed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    #[serde(rename = "Date", with = "iso_date")]
    pub date: Date,
    #[serde(rename = "Day")]
    pub day: u8,
    #[serde(rename = "Time")]
    pub time: ClockTime,
    #[serde(rename = "Time Zone")]
    pub time_zone: String,
    #[serde(rename = "Wind (mph)")]
    pub wind: String,
    #[serde(rename = "Vis. (mi.)")]
    pub visibility: String,
    #[serde(rename = "Weather")]
    pub weather: String,
    #[serde(rename = "Sky Cond.")]
    pub sky_condition: String,
    #[serde(rename = "Air")]
    pub air: String,
    #[serde(rename = "Dwpt")]
    pub dew_point: String,
    #[serde(rename = "Max.")]
    pub max_temp: String,
    #[serde(rename = "Min.")]
    pub min_temp: String,
    #[serde(rename = "Relative Humidity")]
    pub relative_humidity: String,
    #[serde(rename = "Wind Chill (°F)")]
    pub wind_chill: String,
    #[serde(rename = "Heat Index (°F)")]
    pub heat_index: String,
    #[serde(rename = "altimeter (in)")]
    pub altimeter: String,
    #[serde(rename = "sea level (mb)")]
    pub sea_level_pressure: String,
    #[serde(rename = "1 hr")]
    pub precip_1h: String,
    #[serde(rename = "3 hr")]
    pub precip_3h: String,
    #[serde(rename = "6 hr")]
    pub precip_6h: String,
    #[serde(rename = "Data Retrieval Date", with = "iso_date")]
    pub retrieval_date: Date,
    #[serde(rename = "Station")]
    pub station: StationCode,
    #[serde(rename = "Hour")]
    pub hour: u8,
}

impl RawObservation {
    /// Deduplication key: one row per calendar date and clock hour.
    pub fn hour_key(&self) -> (Date, u8) {
        (self.date, self.time.hour())
    }

    /// Chronological sort key.
    pub fn sort_key(&self) -> (Date, ClockTime) {
        (self.date, self.time)
    }
}

/// Column order of the `_updated` file read by the charting layer.
pub const HOURLY_COLUMNS: [&str; 27] = [
    "Date",
    "Day",
    "Date/Time",
    "Time",
    "Time Zone",
    "Station",
    "Hour",
    "Wind (mph)",
    "Windspeed",
    "Vis. (mi.)",
    "Weather",
    "Sky Cond.",
    "Temp",
    "Dew Point",
    "Relative Humidity",
    "Wind Chill (°F)",
    "Heat Index (°F)",
    "Altimeter (in.)",
    "sea level (mb)",
    "1-Hour Precip",
    "3-Hour Precip",
    "6-Hour Precip",
    "Rolling 3-Hour Precip",
    "Rolling 6-Hour Precip",
    "Rolling 12-Hour Precip",
    "Rolling 24-Hour Precip",
    "Data Retrieval Date",
];

/// An analysis-ready row of the `_updated` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyObservation {
    #[serde(rename = "Date", with = "iso_date")]
    pub date: Date,
    #[serde(rename = "Day")]
    pub day: u8,
    #[serde(rename = "Date/Time")]
    pub date_time: String,
    #[serde(rename = "Time")]
    pub time: ClockTime,
    #[serde(rename = "Time Zone")]
    pub time_zone: String,
    #[serde(rename = "Station")]
    pub station: StationCode,
    #[serde(rename = "Hour")]
    pub hour: u8,
    #[serde(rename = "Wind (mph)")]
    pub wind: String,
    #[serde(rename = "Windspeed")]
    pub windspeed: Option<u32>,
    #[serde(rename = "Vis. (mi.)")]
    pub visibility: String,
    #[serde(rename = "Weather")]
    pub weather: String,
    #[serde(rename = "Sky Cond.")]
    pub sky_condition: String,
    #[serde(rename = "Temp")]
    pub temp: Option<f64>,
    #[serde(rename = "Dew Point")]
    pub dew_point: Option<f64>,
    #[serde(rename = "Relative Humidity")]
    pub relative_humidity: Option<f64>,
    #[serde(rename = "Wind Chill (°F)")]
    pub wind_chill: String,
    #[serde(rename = "Heat Index (°F)")]
    pub heat_index: String,
    #[serde(rename = "Altimeter (in.)")]
    pub altimeter: Option<f64>,
    #[serde(rename = "sea level (mb)")]
    pub sea_level_pressure: Option<f64>,
    #[serde(rename = "1-Hour Precip")]
    pub precip_1h: f64,
    #[serde(rename = "3-Hour Precip")]
    pub precip_3h: f64,
    #[serde(rename = "6-Hour Precip")]
    pub precip_6h: f64,
    #[serde(rename = "Rolling 3-Hour Precip")]
    pub rolling_3h: Option<f64>,
    #[serde(rename = "Rolling 6-Hour Precip")]
    pub rolling_6h: Option<f64>,
    #[serde(rename = "Rolling 12-Hour Precip")]
    pub rolling_12h: Option<f64>,
    #[serde(rename = "Rolling 24-Hour Precip")]
    pub rolling_24h: Option<f64>,
    #[serde(rename = "Data Retrieval Date", with = "iso_date")]
    pub retrieval_date: Date,
}
