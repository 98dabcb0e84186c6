//! Merging a fresh 3-day fetch into the accumulated record.
//!
//! Rows are keyed by (date, clock hour) and the last occurrence wins, with
//! historical rows placed before fresh ones. Stations reporting every 20
//! minutes therefore keep one report per hour, which is what lets the
//! rolling precipitation sums treat N rows as N hours.

use std::{collections::HashMap, fmt};
use time::{Date, PrimitiveDateTime, Time};

use crate::RawObservation;

/// Concatenate, deduplicate on (date, hour) keeping the last row, and sort.
pub fn merge_observations(
    historical: Vec<RawObservation>,
    fresh: Vec<RawObservation>,
) -> Vec<RawObservation> {
    let combined: Vec<RawObservation> = historical.into_iter().chain(fresh).collect();

    let mut last_seen: HashMap<(Date, u8), usize> = HashMap::with_capacity(combined.len());
    for (idx, row) in combined.iter().enumerate() {
        last_seen.insert(row.hour_key(), idx);
    }

    let mut merged: Vec<RawObservation> = combined
        .into_iter()
        .enumerate()
        .filter(|(idx, row)| last_seen.get(&row.hour_key()) == Some(idx))
        .map(|(_, mut row)| {
            row.hour = row.time.hour();
            row
        })
        .collect();
    merged.sort_by_key(RawObservation::sort_key);
    merged
}

/// A stretch of missing hours between two consecutive retained rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourGap {
    pub after: PrimitiveDateTime,
    pub before: PrimitiveDateTime,
    pub missing_hours: i64,
}

impl fmt::Display for HourGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hour(s) missing between {} {:02}:00 and {} {:02}:00",
            self.missing_hours,
            self.after.date(),
            self.after.hour(),
            self.before.date(),
            self.before.hour()
        )
    }
}

fn hour_slot(row: &RawObservation) -> PrimitiveDateTime {
    let time = Time::from_hms(row.time.hour(), 0, 0).unwrap_or(Time::MIDNIGHT);
    PrimitiveDateTime::new(row.date, time)
}

/// Gaps in the hourly sequence of sorted, deduplicated rows.
///
/// Rolling sums are left as they are; this only reports where they span more
/// than their nominal number of hours. Local clock times are used, so the
/// spring daylight-saving change shows up as a one-hour gap.
pub fn find_gaps(rows: &[RawObservation]) -> Vec<HourGap> {
    rows.windows(2)
        .filter_map(|pair| {
            let after = hour_slot(&pair[0]);
            let before = hour_slot(&pair[1]);
            let missing_hours = (before - after).whole_hours() - 1;
            (missing_hours > 0).then_some(HourGap {
                after,
                before,
                missing_hours,
            })
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::raw;
    use super::*;
    use std::collections::HashSet;
    use time::macros::{date, datetime};

    #[test]
    fn fresh_row_wins_over_stale_historical_row() {
        let mut stale = raw(date!(2024 - 03 - 15), "10:53", "");
        stale.air = "40".into();
        let mut fresh = raw(date!(2024 - 03 - 15), "10:53", "0.02");
        fresh.air = "41".into();

        let merged = merge_observations(vec![stale], vec![fresh]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].air, "41");
        assert_eq!(merged[0].precip_1h, "0.02");
    }

    #[test]
    fn sub_hourly_reports_collapse_to_the_latest() {
        let fresh = vec![
            raw(date!(2024 - 03 - 15), "10:15", ""),
            raw(date!(2024 - 03 - 15), "10:35", ""),
            raw(date!(2024 - 03 - 15), "10:55", ""),
            raw(date!(2024 - 03 - 15), "11:15", ""),
        ];
        let merged = merge_observations(Vec::new(), fresh);

        let times: Vec<String> = merged.iter().map(|r| r.time.to_string()).collect();
        assert_eq!(times, vec!["10:55", "11:15"]);
    }

    #[test]
    fn duplicated_history_leaves_no_duplicate_hours() {
        let day = date!(2024 - 03 - 15);
        let history: Vec<_> = ["08:53", "09:53", "09:53", "10:53", "08:53"]
            .iter()
            .map(|t| raw(day, t, ""))
            .collect();
        let fresh = vec![raw(day, "10:53", ""), raw(day, "11:53", "")];

        let merged = merge_observations(history, fresh);
        let keys: HashSet<_> = merged.iter().map(RawObservation::hour_key).collect();
        assert_eq!(keys.len(), merged.len());
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn output_is_sorted_by_date_then_time() {
        let merged = merge_observations(
            vec![raw(date!(2024 - 03 - 15), "09:53", "")],
            vec![
                raw(date!(2024 - 03 - 16), "00:53", ""),
                raw(date!(2024 - 03 - 15), "23:53", ""),
                raw(date!(2024 - 03 - 14), "23:53", ""),
            ],
        );
        let keys: Vec<_> = merged.iter().map(RawObservation::sort_key).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(merged[0].date, date!(2024 - 03 - 14));
    }

    #[test]
    fn merge_is_idempotent() {
        let day = date!(2024 - 03 - 15);
        let fresh = vec![
            raw(day, "10:53", "0.01"),
            raw(day, "11:53", ""),
            raw(day, "11:20", ""),
        ];
        let once = merge_observations(Vec::new(), fresh.clone());
        let twice = merge_observations(once.clone(), fresh);
        assert_eq!(once, twice);
    }

    #[test]
    fn contiguous_rows_have_no_gaps() {
        let day = date!(2024 - 03 - 15);
        let rows = vec![
            raw(day, "22:53", ""),
            raw(day, "23:53", ""),
            raw(date!(2024 - 03 - 16), "00:53", ""),
        ];
        assert!(find_gaps(&rows).is_empty());
    }

    #[test]
    fn missing_hours_are_reported() {
        let rows = vec![
            raw(date!(2024 - 03 - 15), "22:53", ""),
            raw(date!(2024 - 03 - 16), "02:53", ""),
        ];
        let gaps = find_gaps(&rows);
        assert_eq!(
            gaps,
            vec![HourGap {
                after: datetime!(2024 - 03 - 15 22:00),
                before: datetime!(2024 - 03 - 16 02:00),
                missing_hours: 3,
            }]
        );
        assert_eq!(
            gaps[0].to_string(),
            "3 hour(s) missing between 2024-03-15 22:00 and 2024-03-16 02:00"
        );
    }
}
