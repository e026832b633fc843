//! Backfill executor implementation
//!
//! Chunks run strictly in order and each chunk's stages run in sequence.
//! A chunk error never escapes the chunk unless it is a configuration
//! defect.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{ChunkReport, RunSummary};
use crate::calendar::PeriodCalendar;
use crate::config::SchedulerSettings;
use crate::dataset::{Dataset, ParsedPart};
use crate::error::{IngestError, IngestResult};
use crate::parser::ParseContext;
use crate::provider::Fetcher;
use crate::reference::AreaTable;
use crate::scheduler::{auto_window, explicit_window, normal_window, plan_chunks, Chunk, RunMode, RunWindow};
use crate::storage::Store;

/// Drives fetch, parse, prepare and write over the chunks of a run
pub struct BackfillExecutor<F: Fetcher, S: Store> {
    fetcher: F,
    store: S,
    calendar: PeriodCalendar,
    areas: AreaTable,
    settings: SchedulerSettings,
}

impl<F: Fetcher, S: Store> BackfillExecutor<F, S> {
    pub fn new(
        fetcher: F,
        store: S,
        calendar: PeriodCalendar,
        areas: AreaTable,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            fetcher,
            store,
            calendar,
            areas,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.chunk_timeout_secs)
    }

    /// Window a run covers at `now`
    pub async fn resolve_window(
        &self,
        dataset: Dataset,
        mode: RunMode,
        now: DateTime<Utc>,
    ) -> IngestResult<RunWindow> {
        match mode {
            RunMode::Normal => Ok(normal_window(
                dataset,
                &self.calendar,
                now,
                self.settings.lookback_hours,
            )),
            RunMode::Explicit { start, end } => Ok(explicit_window(&self.calendar, start, end)),
            RunMode::Auto => {
                let target = dataset.primary_target(&self.areas);
                let latest = self.store.latest_period(&target).await?;
                debug!("Latest stored period in {}: {:?}", target.table, latest);
                Ok(auto_window(
                    &self.calendar,
                    latest,
                    self.settings.earliest_date,
                    now,
                )?)
            }
        }
    }

    /// Run a dataset now
    pub async fn run(&self, dataset: Dataset, mode: RunMode) -> RunSummary {
        self.run_at(dataset, mode, Utc::now()).await
    }

    /// Run a dataset as if the clock read `now`
    pub async fn run_at(&self, dataset: Dataset, mode: RunMode, now: DateTime<Utc>) -> RunSummary {
        let mut summary = RunSummary::new(dataset, mode);

        let window = match self.resolve_window(dataset, mode, now).await {
            Ok(window) => window,
            Err(err) => {
                error!("Cannot resolve {} window for {}: {}", mode, dataset, err);
                if err.is_fatal() {
                    summary.abort(err);
                } else {
                    summary.fail(err);
                }
                return summary;
            }
        };
        summary.window = Some(window);

        let days = self.settings.chunk_days.for_provider(dataset.provider());
        let chunks = plan_chunks(&self.calendar, &window, days);
        info!(
            "Run {}: {} ({} mode) over {} in {} chunks of up to {} days",
            summary.run_id,
            dataset,
            mode,
            window,
            chunks.len(),
            days
        );

        for chunk in chunks {
            info!("Starting {}", chunk);
            let mut report = ChunkReport::new(chunk);

            let outcome = tokio::time::timeout(
                self.chunk_timeout(),
                self.run_chunk(dataset, &chunk, &mut report),
            )
            .await;

            match outcome {
                Ok(Ok(())) => {
                    info!(
                        "Finished {}: {} documents, {} samples, {} rows",
                        chunk,
                        report.documents,
                        report.samples,
                        report.rows.values().sum::<usize>()
                    );
                }
                Ok(Err(err)) if err.is_fatal() => {
                    error!("{} hit a configuration defect, stopping run: {}", chunk, err);
                    report.fail(&err);
                    summary.push(report);
                    summary.abort(err);
                    return summary;
                }
                Ok(Err(err)) => {
                    error!("{} failed: {}", chunk, err);
                    report.fail(err);
                }
                Err(_) => {
                    let err = IngestError::ChunkTimeout(self.chunk_timeout());
                    error!("{} failed: {}", chunk, err);
                    report.fail(err);
                }
            }
            summary.push(report);
        }

        summary.finish();
        if summary.failed() > 0 {
            warn!(
                "Run {}: {} of {} chunks failed",
                summary.run_id,
                summary.failed(),
                summary.attempted()
            );
        }
        summary
    }

    async fn run_chunk(&self, dataset: Dataset, chunk: &Chunk, report: &mut ChunkReport) -> IngestResult<()> {
        let requests = dataset.requests(&self.calendar, &self.areas, chunk.start, chunk.end);
        let mut parts = Vec::with_capacity(requests.len());

        for request in requests {
            let document = self.fetcher.request(&request).await?;

            let mut ctx = ParseContext::new(&self.calendar);
            if let Some(date) = request.trade_date {
                ctx = ctx.with_trade_date(date);
            }
            let parsed = request.source.parse(&document.body, &ctx)?;
            debug!(
                "{}: {} samples, {} rejected from {} bytes",
                request,
                parsed.samples.len(),
                parsed.rejected.len(),
                document.len()
            );

            report.documents += 1;
            report.samples += parsed.samples.len();
            report.rejected += parsed.rejected.len();
            parts.push(ParsedPart { request, parsed });
        }

        let batches = dataset.prepare(&self.calendar, &self.areas, &parts, chunk.start, chunk.end)?;
        for batch in batches {
            if batch.is_empty() {
                continue;
            }
            let changed = self.store.upsert(&batch).await?;
            debug!("{}: upserted {} rows, {} changed", batch.table(), batch.len(), changed);
            report.record_write(batch.table(), batch.len(), changed);
        }

        Ok(())
    }
}
