use crate::helpers::{obhistory_page, spawn_app, station, MockSource};
use obhistory::{
    read_raw_observations, FetchError, HourlyObservation, IngestError, LocalSource, SchemaError,
    HOURLY_COLUMNS,
};
use std::{fs, path::Path, sync::Arc};
use time::macros::date;

fn read_hourly(path: &Path) -> Vec<HourlyObservation> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader.deserialize().collect::<Result<_, _>>().unwrap()
}

fn mock_page(page: String) -> MockSource {
    let mut source = MockSource::new();
    source
        .expect_fetch_page()
        .returning(move |_| Ok(page.clone()));
    source
}

#[tokio::test]
async fn first_run_seeds_history_from_the_fetch() {
    let page = obhistory_page(
        "est",
        &[
            ("15", "12:53", "W 28 G 40", "47", "31", "54%", "0.02"),
            ("15", "11:53", "W 8", "46", "30", "55%", ""),
            ("15", "10:53", "Calm", "45", "30", "56%", "0.01"),
        ],
    );
    let test_app = spawn_app(Arc::new(mock_page(page)));
    let kcho = station("KCHO");

    let summary = test_app
        .service
        .ingest_station(&kcho, date!(2024 - 03 - 15))
        .await
        .unwrap();
    assert_eq!(summary.fetched_rows, 3);
    assert_eq!(summary.historical_before, 0);
    assert_eq!(summary.historical_after, 3);
    assert!(summary.gaps.is_empty());

    let files = test_app.files(&kcho);
    let recent = read_raw_observations(&files.recent).unwrap().unwrap();
    assert_eq!(recent.len(), 3);

    let history = read_raw_observations(&files.historical).unwrap().unwrap();
    assert!(history.iter().all(|row| row.date == date!(2024 - 03 - 15)));
    let hours: Vec<u8> = history.iter().map(|row| row.hour).collect();
    assert_eq!(hours, vec![10, 11, 12]);
    assert!(history.iter().all(|row| row.time_zone == "EST"));

    let hourly = read_hourly(&files.updated);
    let windspeeds: Vec<Option<u32>> = hourly.iter().map(|row| row.windspeed).collect();
    assert_eq!(windspeeds, vec![Some(0), Some(8), Some(28)]);
    assert_eq!(hourly[0].relative_humidity, Some(56.0));
    assert_eq!(hourly[1].precip_1h, 0.0);
    assert_eq!(hourly[1].rolling_3h, None);
    assert_eq!(hourly[2].rolling_3h, Some(0.03));
    assert_eq!(hourly[2].date_time, "2024-03-15 12:53");

    let mut reader = csv::Reader::from_path(&files.updated).unwrap();
    let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(header, HOURLY_COLUMNS);
}

#[tokio::test]
async fn repeating_a_fetch_changes_nothing() {
    let page = obhistory_page(
        "est",
        &[
            ("15", "11:53", "W 8", "46", "30", "55%", "0.04"),
            ("15", "10:53", "W 6", "45", "30", "56%", ""),
            ("14", "23:53", "Calm", "40", "29", "70%", ""),
        ],
    );
    let test_app = spawn_app(Arc::new(mock_page(page)));
    let kcho = station("KCHO");
    let files = test_app.files(&kcho);

    test_app
        .service
        .ingest_station(&kcho, date!(2024 - 03 - 15))
        .await
        .unwrap();
    let history_once = fs::read_to_string(&files.historical).unwrap();
    let updated_once = fs::read_to_string(&files.updated).unwrap();

    let summary = test_app
        .service
        .ingest_station(&kcho, date!(2024 - 03 - 15))
        .await
        .unwrap();
    assert_eq!(summary.historical_before, 3);
    assert_eq!(summary.historical_after, 3);
    assert_eq!(fs::read_to_string(&files.historical).unwrap(), history_once);
    assert_eq!(fs::read_to_string(&files.updated).unwrap(), updated_once);
}

#[tokio::test]
async fn newer_fetch_extends_history_and_wins_overlaps() {
    let first = obhistory_page(
        "est",
        &[
            ("15", "12:53", "W 8", "47", "31", "54%", ""),
            ("15", "11:53", "W 8", "46", "30", "55%", ""),
            ("15", "10:53", "W 8", "45", "30", "56%", ""),
        ],
    );
    let second = obhistory_page(
        "est",
        &[
            ("15", "13:53", "W 9", "49", "31", "50%", ""),
            ("15", "12:53", "W 9", "48", "31", "52%", "0.01"),
            ("15", "11:53", "W 8", "46", "30", "55%", ""),
        ],
    );
    let mut source = MockSource::new();
    let mut pages = vec![second, first];
    source
        .expect_fetch_page()
        .times(2)
        .returning(move |_| Ok(pages.pop().unwrap()));

    let test_app = spawn_app(Arc::new(source));
    let kcho = station("KCHO");
    for _ in 0..2 {
        test_app
            .service
            .ingest_station(&kcho, date!(2024 - 03 - 15))
            .await
            .unwrap();
    }

    let history = read_raw_observations(&test_app.files(&kcho).historical)
        .unwrap()
        .unwrap();
    let hours: Vec<u8> = history.iter().map(|row| row.hour).collect();
    assert_eq!(hours, vec![10, 11, 12, 13]);
    assert_eq!(history[2].air, "48");
    assert_eq!(history[2].precip_1h, "0.01");

    // The 3-day file holds only the latest fetch
    let recent = read_raw_observations(&test_app.files(&kcho).recent)
        .unwrap()
        .unwrap();
    assert_eq!(recent.len(), 3);
}

#[tokio::test]
async fn month_boundary_rows_are_dated_into_the_previous_month() {
    let page = obhistory_page(
        "est",
        &[
            ("1", "00:53", "W 8", "30", "20", "60%", ""),
            ("31", "23:53", "W 8", "31", "20", "58%", ""),
            ("31", "22:53", "W 8", "32", "20", "55%", ""),
        ],
    );
    let test_app = spawn_app(Arc::new(mock_page(page)));
    let kcho = station("KCHO");
    test_app
        .service
        .ingest_station(&kcho, date!(2025 - 01 - 01))
        .await
        .unwrap();

    let history = read_raw_observations(&test_app.files(&kcho).historical)
        .unwrap()
        .unwrap();
    let dates: Vec<_> = history.iter().map(|row| row.date).collect();
    assert_eq!(
        dates,
        vec![
            date!(2024 - 12 - 31),
            date!(2024 - 12 - 31),
            date!(2025 - 01 - 01)
        ]
    );
}

#[tokio::test]
async fn missing_hours_are_reported_as_gaps() {
    let page = obhistory_page(
        "edt",
        &[
            ("15", "14:53", "W 8", "47", "31", "54%", ""),
            ("15", "10:53", "W 8", "45", "30", "56%", ""),
        ],
    );
    let test_app = spawn_app(Arc::new(mock_page(page)));
    let summary = test_app
        .service
        .ingest_station(&station("KIAD"), date!(2024 - 06 - 15))
        .await
        .unwrap();

    assert_eq!(summary.gaps.len(), 1);
    assert_eq!(summary.gaps[0].missing_hours, 3);
}

#[tokio::test]
async fn failing_station_does_not_stop_the_others() {
    let page = obhistory_page("est", &[("15", "10:53", "W 8", "45", "30", "56%", "")]);
    let mut source = MockSource::new();
    source
        .expect_fetch_page()
        .withf(|station| station.as_str() == "KIAD")
        .times(1)
        .returning(|_| {
            Err(FetchError::Timeout {
                url: "https://forecast.weather.gov/data/obhistory/KIAD.html".into(),
                timeout_secs: 20,
            })
        });
    source
        .expect_fetch_page()
        .withf(|station| station.as_str() != "KIAD")
        .times(2)
        .returning(move |_| Ok(page.clone()));

    let test_app = spawn_app(Arc::new(source));
    let stations = vec![station("KCHO"), station("KIAD"), station("KOKV")];
    let report = test_app
        .service
        .ingest_stations(&stations, date!(2024 - 03 - 15))
        .await;

    assert!(!report.is_success());
    let succeeded: Vec<&str> = report
        .succeeded
        .iter()
        .map(|summary| summary.station.as_str())
        .collect();
    assert_eq!(succeeded, vec!["KCHO", "KOKV"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0.as_str(), "KIAD");
    assert_eq!(report.failed[0].1.kind(), "timeout");

    assert!(test_app.files(&station("KOKV")).updated.exists());
    assert!(!test_app.files(&station("KIAD")).historical.exists());
}

#[tokio::test]
async fn corrupt_history_fails_without_touching_it() {
    let page = obhistory_page("est", &[("15", "10:53", "W 8", "45", "30", "56%", "")]);
    let test_app = spawn_app(Arc::new(mock_page(page)));
    let kcho = station("KCHO");
    let files = test_app.files(&kcho);

    fs::create_dir_all(files.historical.parent().unwrap()).unwrap();
    let corrupt = "Date,Day,Time\n2024-03-14,14,09:53\n";
    fs::write(&files.historical, corrupt).unwrap();

    let err = test_app
        .service
        .ingest_station(&kcho, date!(2024 - 03 - 15))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "schema");
    assert!(matches!(
        err,
        IngestError::Schema(SchemaError::MissingColumn {
            column: "Time Zone",
            ..
        })
    ));
    assert_eq!(fs::read_to_string(&files.historical).unwrap(), corrupt);
    assert!(!files.updated.exists());
}

#[tokio::test]
async fn unrecognisable_page_is_a_source_format_error() {
    let test_app = spawn_app(Arc::new(mock_page(
        "<html><body>Service Unavailable</body></html>".into(),
    )));
    let err = test_app
        .service
        .ingest_station(&station("KCHO"), date!(2024 - 03 - 15))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "source-format");
    assert!(!err.is_transient());
}

#[tokio::test]
async fn saved_pages_ingest_one_row_per_hour() {
    let pages = tempfile::tempdir().unwrap();
    fs::write(
        pages.path().join("KOKV.html"),
        obhistory_page(
            "est",
            &[
                ("15", "11:15", "W 8", "46", "30", "55%", ""),
                ("15", "10:55", "W 8", "45", "30", "56%", "0.01"),
                ("15", "10:35", "W 7", "45", "30", "56%", ""),
                ("15", "10:15", "W 6", "44", "30", "57%", ""),
            ],
        ),
    )
    .unwrap();

    let test_app = spawn_app(Arc::new(LocalSource::new(pages.path())));
    let kokv = station("KOKV");
    let summary = test_app
        .service
        .ingest_station(&kokv, date!(2024 - 03 - 15))
        .await
        .unwrap();
    assert_eq!(summary.fetched_rows, 4);
    assert_eq!(summary.historical_after, 2);

    let hourly = read_hourly(&test_app.files(&kokv).updated);
    let times: Vec<String> = hourly.iter().map(|row| row.time.to_string()).collect();
    assert_eq!(times, vec!["10:55", "11:15"]);
    assert_eq!(hourly[0].precip_1h, 0.01);
}
