//! Scheduled retrieval: harvest the archive into the task queue.
//!
//! The harvester is blocking, so the page iterator lives on the async side
//! and is moved onto the blocking pool for each `next()` call. The next page
//! is only requested after the previous one was committed to the `tasks`
//! table. The checkpoint in `params` is only written once the harvest ended
//! cleanly.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;

use pfr_harvester::{HarvestConfig, HttpTransport, PageIterator, RecordFetcher, RetrievalReport};

use crate::config::RetrieverConfig;
use crate::db;
use crate::error::{PipelineError, Result};
use crate::params;
use crate::task_queue;

type Pages = PageIterator<HttpTransport>;

/// Connect, migrate and run one retrieval.
pub async fn run_retriever(config: RetrieverConfig) -> Result<RetrievalReport> {
    let pool = db::create_pool(&config.pipeline_config()).await?;
    db::run_migrations(&pool).await?;

    tracing::info!(
        host = %config.harvest.host,
        set = %config.harvest.set,
        check_interval = ?config.harvest.check_interval,
        "starting retrieval"
    );

    let report = retrieve(&pool, config.harvest).await;
    pool.close().await;
    report
}

/// Harvest every record modified since the last retrieval into the queue.
pub async fn retrieve(pool: &PgPool, config: HarvestConfig) -> Result<RetrievalReport> {
    let started_at = Utc::now();

    let last_retrieval = params::get_retrieval_time(pool).await?;
    match last_retrieval {
        Some(at) => tracing::info!(last_retrieval = %at.to_rfc3339(), "resuming retrieval"),
        None => tracing::info!("no previous retrieval found"),
    }
    match config.record_limit() {
        Some(limit) => tracing::info!(limit, "record limit in effect"),
        None => tracing::info!(limit = "No limit", "record limit in effect"),
    }

    let from = last_retrieval.map_or(config.start_date, |at| at.date_naive());
    tracing::info!(from = %from, "fetching records");

    let check_interval = config.check_interval;

    // The blocking client must be created and dropped off the async runtime.
    let pages = tokio::task::spawn_blocking(move || {
        RecordFetcher::from_config(config).map(|fetcher| fetcher.pages(Some(from)))
    })
    .await??;

    let mut slot = Some(pages);
    let outcome = consume_pages(pool, &mut slot, check_interval).await;
    if let Some(pages) = slot.take() {
        tokio::task::spawn_blocking(move || drop(pages)).await?;
    }

    let (page_count, total) = match outcome {
        Ok(counts) => counts,
        Err(e) => {
            tracing::error!(error = %e, "retrieval aborted, retrieval time left unchanged");
            return Err(e);
        }
    };

    let finished_at = Utc::now();
    params::set_retrieval_time(pool, finished_at).await?;
    tracing::info!(pages = page_count, records = total, "retrieval done");

    Ok(RetrievalReport {
        from,
        pages: page_count,
        records: total,
        started_at,
        finished_at,
    })
}

/// Fetch, push and commit one page at a time. Returns `(pages, records)`.
///
/// The iterator is handed back through `slot` after every fetch so the
/// caller can release it on the blocking pool. It is missing from `slot`
/// only when the run was interrupted mid-request.
async fn consume_pages(
    pool: &PgPool,
    slot: &mut Option<Pages>,
    check_interval: Duration,
) -> Result<(usize, usize)> {
    let mut page_count = 0;
    let mut total = 0;

    while let Some(mut pages) = slot.take() {
        let fetch = tokio::task::spawn_blocking(move || {
            let next = pages.next();
            (pages, next)
        });

        let (pages, next) = tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => return Err(interrupted()),
            joined = fetch => joined?,
        };
        *slot = Some(pages);

        let page = match next {
            None => break,
            Some(Ok(page)) => page,
            Some(Err(e)) if page_count == 0 && e.is_no_records_match() => {
                tracing::info!("archive has no records for this window");
                break;
            }
            Some(Err(e)) => return Err(e.into()),
        };

        let mut txn = pool.begin().await?;
        for record in &page.records {
            task_queue::push_task_update_article(&mut *txn, record).await?;
        }
        txn.commit().await?;

        page_count += 1;
        total += page.len();
        tracing::info!(
            page = page_count,
            total,
            of = page.complete_list_size.as_deref().unwrap_or("?"),
            "records queued"
        );

        if !page.is_last() && !check_interval.is_zero() {
            tokio::select! {
                biased;

                _ = tokio::signal::ctrl_c() => return Err(interrupted()),
                () = tokio::time::sleep(check_interval) => {}
            }
        }
    }

    Ok((page_count, total))
}

fn interrupted() -> PipelineError {
    PipelineError::Interrupted("received SIGINT".into())
}
