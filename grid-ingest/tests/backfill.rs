//! Backfill Runs
//!
//! End-to-end chunked runs against a scripted fetcher and the in-memory
//! store: partial failures, replays, auto-mode resume and timeouts.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use grid_ingest::config::SchedulerSettings;
use grid_ingest::parser::{CepsDataset, SourceVariant};
use grid_ingest::provider::{DocumentRequest, FetchError, FetchResult};
use grid_ingest::reference::AreaTable;
use grid_ingest::scheduler::{RunMode, RunWindow};
use grid_ingest::storage::Cell;
use grid_ingest::{BackfillExecutor, Dataset, MemoryStore, MockFetcher, PeriodCalendar, RunStatus};

const IMBALANCE: Dataset = Dataset::Ceps(CepsDataset::Imbalance);
const QUARTERS: &str = "ceps_imbalance_15min";
const MINUTES: &str = "ceps_imbalance_1min";

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// CEPS imbalance document with one item every five minutes of the request.
///
/// Items at :00, :05 and :10 of a quarter carry `base`, `base + 1` and
/// `base + 2`.
fn imbalance_document(request: &DocumentRequest, base: Decimal) -> Vec<u8> {
    let mut items = String::new();
    let mut instant = request.start;
    while instant < request.end {
        let step = Decimal::from((instant.minute() % 15) / 5);
        items.push_str(&format!(
            r#"<item date="{}" value1="{}"/>"#,
            instant.format("%Y-%m-%dT%H:%M:%S+00:00"),
            base + step
        ));
        instant += Duration::minutes(5);
    }

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <AktualniSystemovaOdchylkaCRResponse xmlns="https://www.ceps.cz/CepsData/">
      <AktualniSystemovaOdchylkaCRResult>
        <root xmlns="https://www.ceps.cz/CepsData/StructuredData/1.0"><data>{}</data></root>
      </AktualniSystemovaOdchylkaCRResult>
    </AktualniSystemovaOdchylkaCRResponse>
  </soap:Body>
</soap:Envelope>"#,
        items
    )
    .into_bytes()
}

fn imbalance_fetcher(base: Decimal) -> MockFetcher {
    MockFetcher::new().with_responder(move |request: &DocumentRequest| -> FetchResult<Vec<u8>> {
        Ok(imbalance_document(request, base))
    })
}

fn daily_chunks() -> SchedulerSettings {
    let mut settings = SchedulerSettings::default();
    settings.chunk_days.ceps = 1;
    settings
}

fn provisioned_store(years: std::ops::RangeInclusive<i32>) -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    for target in IMBALANCE.targets(&AreaTable::standard()) {
        store.provision(&target, years.clone());
    }
    Arc::new(store)
}

fn executor(
    fetcher: Arc<MockFetcher>,
    store: Arc<MemoryStore>,
    settings: SchedulerSettings,
) -> BackfillExecutor<Arc<MockFetcher>, Arc<MemoryStore>> {
    BackfillExecutor::new(
        fetcher,
        store,
        PeriodCalendar::prague(),
        AreaTable::standard(),
        settings,
    )
}

fn explicit(start: NaiveDate, end: NaiveDate) -> RunMode {
    RunMode::Explicit { start, end }
}

fn quarter_key(trade_date: NaiveDate, period: i32) -> Vec<Cell> {
    vec![Cell::Date(trade_date), Cell::Int(period), Cell::Int(1)]
}

#[tokio::test]
async fn test_one_failed_chunk_does_not_stop_the_backfill() {
    let fetcher = Arc::new(
        imbalance_fetcher(dec!(10)).fail_covering(utc(2025, 1, 4, 12, 0), FetchError::transient("HTTP 503")),
    );
    let store = provisioned_store(2024..=2028);
    let executor = executor(fetcher.clone(), store.clone(), daily_chunks());

    let summary = executor
        .run(IMBALANCE, explicit(date(2025, 1, 1), date(2025, 1, 11)))
        .await;

    assert_eq!(summary.attempted(), 10);
    assert_eq!(summary.succeeded(), 9);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.status, RunStatus::PartialBackfillFailure);
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(fetcher.request_count(), 10);

    let failed = &summary.chunks[3];
    assert_eq!(failed.chunk.index, 4);
    assert!(failed.error.as_deref().unwrap_or("").contains("HTTP 503"));

    // January has no DST transition: 96 quarters and 288 five-minute items a day.
    assert_eq!(store.row_count(QUARTERS), 9 * 96);
    assert_eq!(store.row_count(MINUTES), 9 * 288);
    assert!(store.row(QUARTERS, &quarter_key(date(2025, 1, 4), 1)).is_none());
    assert!(store.row(QUARTERS, &quarter_key(date(2025, 1, 5), 1)).is_some());

    let text = summary.to_string();
    assert!(text.contains("10 attempted, 9 succeeded, 1 failed"));
    assert!(text.contains("FAILED chunk 4"));
}

#[tokio::test]
async fn test_quarter_statistics_from_minutes() {
    let fetcher = Arc::new(imbalance_fetcher(dec!(10)));
    let store = provisioned_store(2024..=2028);
    let executor = executor(fetcher, store.clone(), daily_chunks());

    let summary = executor
        .run(IMBALANCE, explicit(date(2025, 1, 2), date(2025, 1, 3)))
        .await;
    assert_eq!(summary.status, RunStatus::Completed);

    let key = quarter_key(date(2025, 1, 2), 1);
    assert_eq!(store.value(QUARTERS, &key, "load_mw_mean"), Some(Cell::Number(Some(dec!(11)))));
    assert_eq!(store.value(QUARTERS, &key, "load_mw_median"), Some(Cell::Number(Some(dec!(11)))));
    assert_eq!(
        store.value(QUARTERS, &key, "load_mw_last_at_interval"),
        Some(Cell::Number(Some(dec!(12))))
    );

    // Local midnight of 2 January is 23:00 UTC the day before.
    let minute = vec![Cell::Date(date(2025, 1, 2)), Cell::Timestamp(utc(2025, 1, 1, 23, 5))];
    assert_eq!(store.value(MINUTES, &minute, "load_mw"), Some(Cell::Number(Some(dec!(11)))));
}

#[tokio::test]
async fn test_replay_is_idempotent_and_last_write_wins() {
    let store = provisioned_store(2024..=2028);
    let mode = explicit(date(2025, 1, 2), date(2025, 1, 4));
    let key = quarter_key(date(2025, 1, 3), 10);

    let first = executor(Arc::new(imbalance_fetcher(dec!(10))), store.clone(), daily_chunks())
        .run(IMBALANCE, mode)
        .await;
    assert_eq!(first.rows_written().get(QUARTERS), Some(&(2 * 96)));
    let stored = store.row(QUARTERS, &key).unwrap();

    // Identical replay: same rows, nothing changed, timestamps untouched.
    let replay = executor(Arc::new(imbalance_fetcher(dec!(10))), store.clone(), daily_chunks())
        .run(IMBALANCE, mode)
        .await;
    assert_eq!(replay.status, RunStatus::Completed);
    assert!(replay.chunks.iter().all(|c| c.changed.values().all(|&n| n == 0)));
    assert_eq!(store.row_count(QUARTERS), 2 * 96);
    assert_eq!(store.row(QUARTERS, &key), Some(stored.clone()));

    // A revised publication overwrites values but keeps created_at.
    let revised = executor(Arc::new(imbalance_fetcher(dec!(20))), store.clone(), daily_chunks())
        .run(IMBALANCE, mode)
        .await;
    assert_eq!(revised.chunks[0].changed.get(QUARTERS), Some(&96));
    assert_eq!(store.row_count(QUARTERS), 2 * 96);
    assert_eq!(store.value(QUARTERS, &key, "load_mw_mean"), Some(Cell::Number(Some(dec!(21)))));
    let updated = store.row(QUARTERS, &key).unwrap();
    assert_eq!(updated.created_at, stored.created_at);
    assert!(updated.updated_at >= stored.updated_at);
}

#[tokio::test]
async fn test_every_chunk_failing_fails_the_run() {
    let fetcher = Arc::new(MockFetcher::new());
    let store = provisioned_store(2024..=2028);
    let summary = executor(fetcher, store.clone(), daily_chunks())
        .run(IMBALANCE, explicit(date(2025, 1, 1), date(2025, 1, 4)))
        .await;

    assert_eq!(summary.attempted(), 3);
    assert_eq!(summary.succeeded(), 0);
    assert_eq!(summary.status, RunStatus::Failed);
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(store.row_count(QUARTERS), 0);
}

#[tokio::test]
async fn test_malformed_timestamp_aborts_the_run() {
    let body = br#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>
      <AktualniSystemovaOdchylkaCRResponse xmlns="https://www.ceps.cz/CepsData/">
        <AktualniSystemovaOdchylkaCRResult><root><data><item date="yesterday" value1="1"/></data></root></AktualniSystemovaOdchylkaCRResult>
      </AktualniSystemovaOdchylkaCRResponse></soap:Body></soap:Envelope>"#;
    let fetcher = Arc::new(
        MockFetcher::new().with_document(SourceVariant::Ceps(CepsDataset::Imbalance), body.to_vec()),
    );
    let summary = executor(fetcher.clone(), provisioned_store(2024..=2028), daily_chunks())
        .run(IMBALANCE, explicit(date(2025, 1, 1), date(2025, 1, 4)))
        .await;

    // The first chunk hits the defect and no further chunk is attempted.
    assert_eq!(summary.status, RunStatus::Aborted);
    assert_eq!(summary.exit_code(), 2);
    assert_eq!(summary.attempted(), 1);
    assert_eq!(fetcher.request_count(), 1);
    assert!(summary.error.as_deref().unwrap_or("").contains("yesterday"));
}

#[tokio::test]
async fn test_unroutable_partition_fails_only_its_chunk() {
    // Partitions exist for 2025 only; the chunk for 1 January 2026 cannot route.
    let store = provisioned_store(2025..=2025);
    let summary = executor(Arc::new(imbalance_fetcher(dec!(5))), store.clone(), daily_chunks())
        .run(IMBALANCE, explicit(date(2025, 12, 30), date(2026, 1, 2)))
        .await;

    assert_eq!(summary.attempted(), 3);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.status, RunStatus::PartialBackfillFailure);
    assert!(summary.chunks[2].error.as_deref().unwrap_or("").contains("year 2026"));
    assert_eq!(store.row_count(QUARTERS), 2 * 96);
}

#[tokio::test]
async fn test_auto_mode_resumes_after_latest_period() {
    let store = provisioned_store(2024..=2028);
    executor(Arc::new(imbalance_fetcher(dec!(1))), store.clone(), daily_chunks())
        .run(IMBALANCE, explicit(date(2025, 1, 1), date(2025, 1, 3)))
        .await;

    let fetcher = Arc::new(imbalance_fetcher(dec!(1)));
    let summary = executor(fetcher.clone(), store.clone(), daily_chunks())
        .run_at(IMBALANCE, RunMode::Auto, utc(2025, 1, 5, 10, 0))
        .await;

    assert_eq!(
        summary.window,
        Some(RunWindow::new(utc(2025, 1, 2, 23, 0), utc(2025, 1, 4, 23, 0)))
    );
    assert_eq!(summary.status, RunStatus::Completed);
    let starts: Vec<DateTime<Utc>> = fetcher.requests().iter().map(|r| r.start).collect();
    assert_eq!(starts, vec![utc(2025, 1, 2, 23, 0), utc(2025, 1, 3, 23, 0)]);
    assert_eq!(store.row_count(QUARTERS), 4 * 96);

    // Caught up: nothing left before today's local midnight.
    let idle = executor(Arc::new(imbalance_fetcher(dec!(1))), store.clone(), daily_chunks())
        .run_at(IMBALANCE, RunMode::Auto, utc(2025, 1, 5, 10, 0))
        .await;
    assert_eq!(idle.attempted(), 0);
    assert_eq!(idle.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_auto_mode_starts_at_earliest_date_on_empty_table() {
    let mut settings = daily_chunks();
    settings.earliest_date = date(2025, 3, 1);
    let fetcher = Arc::new(imbalance_fetcher(dec!(1)));
    let summary = executor(fetcher.clone(), provisioned_store(2024..=2028), settings)
        .run_at(IMBALANCE, RunMode::Auto, utc(2025, 3, 3, 8, 0))
        .await;

    assert_eq!(summary.attempted(), 2);
    assert_eq!(fetcher.requests()[0].start, utc(2025, 2, 28, 23, 0));
}

#[tokio::test(start_paused = true)]
async fn test_slow_chunks_time_out() {
    let mut settings = daily_chunks();
    settings.chunk_timeout_secs = 5;
    let fetcher = Arc::new(imbalance_fetcher(dec!(1)).with_delay(StdDuration::from_secs(600)));

    let summary = executor(fetcher, provisioned_store(2024..=2028), settings)
        .run(IMBALANCE, explicit(date(2025, 1, 1), date(2025, 1, 3)))
        .await;

    assert_eq!(summary.attempted(), 2);
    assert_eq!(summary.status, RunStatus::Failed);
    assert!(summary.chunks[0].error.as_deref().unwrap_or("").contains("timed out"));
}

#[test]
fn test_unknown_dataset_is_a_usage_error() {
    let err = "ceps-frequency".parse::<Dataset>().unwrap_err();
    assert!(err.to_string().contains("ceps-frequency"));
}
