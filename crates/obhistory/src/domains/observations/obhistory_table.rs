//! Parser for the NWS "3 day history" observation page.
//!
//! The page carries a single data table with three header rows. `rowspan`
//! and `colspan` are expanded into a rectangular grid and the third header
//! row supplies the column labels (`Air`, `Dwpt`, `1 hr`, ...). The last
//! three rows of the table repeat the header and are discarded.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use time::Date;

use crate::{infer_observation_date, ClockTime, RawObservation, SourceFormatError, StationCode};

const HEADER_ROWS: usize = 3;
const FOOTER_ROWS: usize = 3;

fn time_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^time\s*\(\s*(?P<zone>[a-z]{1,5})\s*\)$").expect("valid time header regex")
    })
}

/// One table row, cell text as published.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub day: u8,
    pub time: ClockTime,
    pub wind: String,
    pub visibility: String,
    pub weather: String,
    pub sky_condition: String,
    pub air: String,
    pub dew_point: String,
    pub max_temp: String,
    pub min_temp: String,
    pub relative_humidity: String,
    pub wind_chill: String,
    pub heat_index: String,
    pub altimeter: String,
    pub sea_level_pressure: String,
    pub precip_1h: String,
    pub precip_3h: String,
    pub precip_6h: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationTable {
    /// Upper-cased zone from the time column header, e.g. `EST`.
    pub time_zone: String,
    /// Rows in page order (newest first on the live site).
    pub rows: Vec<TableRow>,
}

impl ObservationTable {
    /// Attach station, time zone and reconstructed dates, sorted by (date, time).
    pub fn into_observations(
        self,
        station: &StationCode,
        retrieval_date: Date,
    ) -> Result<Vec<RawObservation>, SourceFormatError> {
        let mut observations = self
            .rows
            .into_iter()
            .map(|row| {
                Ok(RawObservation {
                    date: infer_observation_date(retrieval_date, row.day)?,
                    day: row.day,
                    hour: row.time.hour(),
                    time: row.time,
                    time_zone: self.time_zone.clone(),
                    wind: row.wind,
                    visibility: row.visibility,
                    weather: row.weather,
                    sky_condition: row.sky_condition,
                    air: row.air,
                    dew_point: row.dew_point,
                    max_temp: row.max_temp,
                    min_temp: row.min_temp,
                    relative_humidity: row.relative_humidity,
                    wind_chill: row.wind_chill,
                    heat_index: row.heat_index,
                    altimeter: row.altimeter,
                    sea_level_pressure: row.sea_level_pressure,
                    precip_1h: row.precip_1h,
                    precip_3h: row.precip_3h,
                    precip_6h: row.precip_6h,
                    retrieval_date,
                    station: station.clone(),
                })
            })
            .collect::<Result<Vec<_>, SourceFormatError>>()?;
        observations.sort_by_key(RawObservation::sort_key);
        Ok(observations)
    }
}

/// Lower-case alphanumerics only, so `Wind (mph)` and `Wind(mph)` match.
fn column_key(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_cell(element: &ElementRef<'_>) -> bool {
    matches!(element.value().name(), "td" | "th")
}

/// Rows whose nearest enclosing table is `table`, skipping nested tables.
fn own_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let row_selector = Selector::parse("tr").expect("valid row selector");
    table
        .select(&row_selector)
        .filter(|row| {
            row.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|a| a.value().name() == "table")
                .is_some_and(|owner| owner.id() == table.id())
        })
        .collect()
}

fn time_zone_of(label: &str) -> Option<String> {
    time_header_regex()
        .captures(label)
        .and_then(|caps| caps.name("zone"))
        .map(|zone| zone.as_str().to_uppercase())
}

fn cell_span(cell: &ElementRef<'_>, attr: &str) -> usize {
    cell.value()
        .attr(attr)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .max(1)
}

/// Expand `rowspan`/`colspan` into a rectangular grid of cell text.
fn expand_grid(table: ElementRef<'_>) -> Vec<Vec<String>> {
    let mut grid = Vec::new();
    // Per column: rows still covered by a rowspan above, and its text.
    let mut carried: Vec<Option<(usize, String)>> = Vec::new();

    for tr in own_rows(table) {
        let mut row: Vec<String> = Vec::new();
        let mut cells = own_cells(tr);

        loop {
            let col = row.len();
            if let Some(slot) = carried.get_mut(col) {
                if let Some((remaining, text)) = slot.take() {
                    row.push(text.clone());
                    if remaining > 1 {
                        *slot = Some((remaining - 1, text));
                    }
                    continue;
                }
            }

            let Some(cell) = cells.next() else { break };
            let text = cell_text(cell);
            let rowspan = cell_span(&cell, "rowspan");
            for _ in 0..cell_span(&cell, "colspan") {
                let col = row.len();
                if rowspan > 1 {
                    if carried.len() <= col {
                        carried.resize(col + 1, None);
                    }
                    carried[col] = Some((rowspan - 1, text.clone()));
                }
                row.push(text.clone());
            }
        }

        if !row.is_empty() {
            grid.push(row);
        }
    }
    grid
}

fn own_cells(row: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    row.children().filter_map(ElementRef::wrap).filter(is_cell)
}

/// The innermost table whose own cells carry a `Time (zone)` label.
///
/// Cells of nested tables are not counted, so layout tables wrapping the
/// observation table never match.
fn find_observation_table(document: &Html) -> Option<ElementRef<'_>> {
    let table_selector = Selector::parse("table").expect("valid table selector");
    document.select(&table_selector).find(|table| {
        own_rows(*table).into_iter().any(|row| {
            own_cells(row).any(|cell| time_zone_of(&cell_text(cell)).is_some())
        })
    })
}

struct ColumnIndex {
    labels: Vec<String>,
}

impl ColumnIndex {
    fn position(&self, key: &str) -> Option<usize> {
        self.labels.iter().position(|label| column_key(label) == key)
    }

    fn required(&self, key: &str, name: &'static str) -> Result<usize, SourceFormatError> {
        self.position(key)
            .ok_or(SourceFormatError::MissingColumn(name))
    }
}

/// Parse the observation table out of a full obhistory page.
pub fn parse_observation_table(html: &str) -> Result<ObservationTable, SourceFormatError> {
    let document = Html::parse_document(html);
    let table = find_observation_table(&document).ok_or(SourceFormatError::TableNotFound)?;
    let grid = expand_grid(table);

    let expected = HEADER_ROWS + FOOTER_ROWS;
    if grid.len() < expected {
        return Err(SourceFormatError::TooFewRows {
            found: grid.len(),
            expected,
        });
    }

    let columns = ColumnIndex {
        labels: grid[HEADER_ROWS - 1].clone(),
    };

    let time_col = columns
        .labels
        .iter()
        .position(|label| column_key(label).starts_with("time"))
        .ok_or(SourceFormatError::MissingColumn("Time"))?;
    let time_label = &columns.labels[time_col];
    let time_zone = time_zone_of(time_label)
        .ok_or_else(|| SourceFormatError::MissingTimeZone(time_label.clone()))?;

    let day_col = columns.required("date", "Date")?;
    let wind_col = columns.required("windmph", "Wind (mph)")?;
    let air_col = columns.required("air", "Air")?;
    let dwpt_col = columns.required("dwpt", "Dwpt")?;
    let humidity_col = columns.required("relativehumidity", "Relative Humidity")?;
    let altimeter_col = columns.required("altimeterin", "altimeter (in)")?;
    let sea_level_col = columns.required("sealevelmb", "sea level (mb)")?;
    let precip_1h_col = columns.required("1hr", "1 hr")?;
    let precip_3h_col = columns.required("3hr", "3 hr")?;
    let precip_6h_col = columns.required("6hr", "6 hr")?;

    let visibility_col = columns.position("vismi");
    let weather_col = columns.position("weather");
    let sky_col = columns.position("skycond");
    let max_col = columns.position("max");
    let min_col = columns.position("min");
    let wind_chill_col = columns.position("windchillf");
    let heat_index_col = columns.position("heatindexf");

    let width = columns.labels.len();
    let body = &grid[HEADER_ROWS..grid.len() - FOOTER_ROWS];

    let mut rows = Vec::with_capacity(body.len());
    for (idx, cells) in body.iter().enumerate() {
        if cells.len() != width {
            return Err(SourceFormatError::RowWidth {
                row: idx + HEADER_ROWS,
                found: cells.len(),
                expected: width,
            });
        }
        let take = |col: usize| cells[col].clone();
        let maybe = |col: Option<usize>| col.map(|c| cells[c].clone()).unwrap_or_default();

        let day_text = &cells[day_col];
        let day: u8 = day_text
            .trim()
            .parse()
            .map_err(|_| SourceFormatError::BadDay(day_text.clone()))?;
        let time: ClockTime = cells[time_col].parse()?;

        rows.push(TableRow {
            day,
            time,
            wind: take(wind_col),
            visibility: maybe(visibility_col),
            weather: maybe(weather_col),
            sky_condition: maybe(sky_col),
            air: take(air_col),
            dew_point: take(dwpt_col),
            max_temp: maybe(max_col),
            min_temp: maybe(min_col),
            relative_humidity: take(humidity_col),
            wind_chill: maybe(wind_chill_col),
            heat_index: maybe(heat_index_col),
            altimeter: take(altimeter_col),
            sea_level_pressure: take(sea_level_col),
            precip_1h: take(precip_1h_col),
            precip_3h: take(precip_3h_col),
            precip_6h: take(precip_6h_col),
        });
    }

    Ok(ObservationTable { time_zone, rows })
}
