//! Reconstructs full calendar dates for rows that only publish a day of month.
//!
//! The NWS table covers the trailing ~72 hours, so a row's month and year
//! follow from the retrieval date: a day at or before the retrieval day is in
//! the retrieval month, a later day belongs to the previous month, and the
//! previous month of January is December of the prior year.

use time::{Date, Month};

use crate::SourceFormatError;

pub fn infer_observation_date(retrieval_date: Date, day: u8) -> Result<Date, SourceFormatError> {
    let (year, month) = if day <= retrieval_date.day() {
        (retrieval_date.year(), retrieval_date.month())
    } else if retrieval_date.month() == Month::January {
        (retrieval_date.year() - 1, Month::December)
    } else {
        (retrieval_date.year(), retrieval_date.month().previous())
    };

    Date::from_calendar_date(year, month, day).map_err(|_| SourceFormatError::ImpossibleDate {
        year,
        month: month as u8,
        day,
    })
}
