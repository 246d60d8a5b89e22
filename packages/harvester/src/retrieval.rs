//! One retrieval run: resume from the checkpoint, harvest, push, record.
//!
//! The run reads the time of the last successful retrieval, harvests every
//! record modified since that date, hands each record to the sink and, when
//! the harvest finished cleanly, stores the current time as the new
//! checkpoint. A run that aborts leaves the checkpoint untouched so the next
//! run covers the same window again.

use std::thread;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::fetcher::{FetchMetrics, RecordFetcher};
use crate::http::Transport;
use crate::sink::{CheckpointStore, RecordSink};
use crate::types::Page;

/// Progress after one page was pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// 1-based page number.
    pub page: usize,

    /// Records pushed from this page.
    pub records: usize,

    /// Records pushed since the run started.
    pub total: usize,

    /// Size of the complete list as announced by the archive.
    pub complete_list_size: Option<String>,

    /// Timing of the cycle that produced the page.
    pub metrics: FetchMetrics,
}

/// Summary of a finished retrieval run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalReport {
    /// Date the harvest started from.
    pub from: NaiveDate,

    /// Pages received.
    pub pages: usize,

    /// Records pushed to the sink.
    pub records: usize,

    pub started_at: DateTime<Utc>,

    /// Also the value written to the checkpoint.
    pub finished_at: DateTime<Utc>,
}

/// Run a full retrieval.
///
/// `on_page` is called after each page was pushed; the CLI uses it to drive
/// a progress bar.
pub fn run_retrieval<T, S, C, F>(
    fetcher: RecordFetcher<T>,
    sink: &mut S,
    checkpoint: &mut C,
    mut on_page: F,
) -> Result<RetrievalReport>
where
    T: Transport,
    S: RecordSink + ?Sized,
    C: CheckpointStore + ?Sized,
    F: FnMut(&Progress),
{
    let started_at = Utc::now();
    let config = fetcher.config().clone();

    let last_retrieval = checkpoint.get()?;
    match last_retrieval {
        Some(at) => tracing::info!(last_retrieval = %at.to_rfc3339(), "resuming retrieval"),
        None => tracing::info!("no previous retrieval found"),
    }
    match config.record_limit() {
        Some(limit) => tracing::info!(limit, "record limit in effect"),
        None => tracing::info!(limit = "No limit", "record limit in effect"),
    }

    let from = last_retrieval.map_or(config.start_date, |at| at.date_naive());
    tracing::info!(from = %from, set = %config.set, "fetching records");

    let mut pages = fetcher.pages(Some(from));
    let mut page_count = 0;
    let mut total = 0;

    while let Some(result) = pages.next() {
        let page: Page = match result {
            Ok(page) => page,
            Err(e) if page_count == 0 && e.is_no_records_match() => {
                tracing::info!("archive has no records for this window");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, pages = page_count, records = total, "retrieval aborted");
                return Err(e);
            }
        };

        for record in &page.records {
            sink.push(record)?;
        }
        page_count += 1;
        total += page.len();

        let progress = Progress {
            page: page_count,
            records: page.len(),
            total,
            complete_list_size: page.complete_list_size.clone(),
            metrics: pages.metrics(),
        };
        tracing::info!(
            page = progress.page,
            total = progress.total,
            of = progress.complete_list_size.as_deref().unwrap_or("?"),
            fetch_time = ?progress.metrics.fetch_time,
            convert_time = ?progress.metrics.convert_time,
            "records pushed"
        );
        on_page(&progress);

        if !page.is_last() && !config.check_interval.is_zero() {
            thread::sleep(config.check_interval);
        }
    }

    let finished_at = Utc::now();
    checkpoint.set(finished_at)?;
    tracing::info!(pages = page_count, records = total, "retrieval done");

    Ok(RetrievalReport {
        from,
        pages: page_count,
        records: total,
        started_at,
        finished_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::time::Duration;

    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use reqwest::Url;

    use crate::config::HarvestConfig;
    use crate::error::HarvesterError;
    use crate::sink::{MemoryCheckpoint, MemoryQueue};

    struct Canned {
        bodies: RefCell<Vec<String>>,
        requests: RefCell<Vec<Vec<(&'static str, String)>>>,
    }

    impl Canned {
        fn new(bodies: &[&str]) -> Self {
            let mut bodies: Vec<String> = bodies.iter().map(|b| b.to_string()).collect();
            bodies.reverse();
            Self {
                bodies: RefCell::new(bodies),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for Canned {
        fn get(&self, _endpoint: &Url, params: &[(&'static str, String)]) -> Result<String> {
            self.requests.borrow_mut().push(params.to_vec());
            self.bodies.borrow_mut().pop().ok_or_else(|| HarvesterError::Fetch {
                url: "http://archive.test/oai2".to_string(),
                status: Some(503),
                message: "Service Unavailable".to_string(),
            })
        }
    }

    const PAGE_ONE: &str = r#"<OAI-PMH><ListRecords>
        <record><header><identifier>oai:arXiv.org:1</identifier><datestamp>2024-02-01</datestamp></header>
        <metadata><dc:title>One</dc:title><dc:description>First</dc:description></metadata></record>
        <record><header><identifier>oai:arXiv.org:2</identifier><datestamp>2024-02-01</datestamp></header>
        <metadata><dc:title>Two</dc:title><dc:description>Second</dc:description></metadata></record>
        <resumptionToken cursor="0" completeListSize="3">NEXT</resumptionToken>
        </ListRecords></OAI-PMH>"#;

    const PAGE_TWO: &str = r#"<OAI-PMH><ListRecords>
        <record><header><identifier>oai:arXiv.org:3</identifier><datestamp>2024-02-02</datestamp></header>
        <metadata><dc:title>Three</dc:title><dc:description>Third</dc:description></metadata></record>
        <resumptionToken cursor="2" completeListSize="3"/>
        </ListRecords></OAI-PMH>"#;

    fn fetcher(transport: &Canned) -> RecordFetcher<&Canned> {
        let config = HarvestConfig::new("cs", NaiveDate::from_ymd_opt(2023, 1, 1).unwrap())
            .unwrap()
            .with_check_interval(Duration::ZERO);
        RecordFetcher::new(config, transport).unwrap()
    }

    #[test]
    fn test_run_pushes_records_and_writes_checkpoint() {
        let transport = Canned::new(&[PAGE_ONE, PAGE_TWO]);
        let mut queue = MemoryQueue::new();
        let mut checkpoint = MemoryCheckpoint::default();
        let mut seen = Vec::new();

        let report = run_retrieval(fetcher(&transport), &mut queue, &mut checkpoint, |p| {
            seen.push((p.page, p.total));
        })
        .unwrap();

        assert_eq!(report.pages, 2);
        assert_eq!(report.records, 3);
        assert_eq!(report.from, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(seen, vec![(1, 2), (2, 3)]);
        assert_eq!(queue.pop().unwrap().id, "oai:arXiv.org:1");
        assert_eq!(queue.len(), 2);
        assert_eq!(checkpoint.get().unwrap(), Some(report.finished_at));
    }

    #[test]
    fn test_run_resumes_from_checkpoint_date() {
        let transport = Canned::new(&[PAGE_TWO]);
        let last = Utc.with_ymd_and_hms(2024, 3, 4, 22, 15, 0).unwrap();
        let mut checkpoint = MemoryCheckpoint::new(Some(last));

        let report = run_retrieval(fetcher(&transport), &mut MemoryQueue::new(), &mut checkpoint, |_| {})
            .unwrap();

        assert_eq!(report.from, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(transport.requests.borrow()[0][3], ("from", "2024-03-04".to_string()));
    }

    #[test]
    fn test_failed_run_keeps_checkpoint() {
        let transport = Canned::new(&[PAGE_ONE]);
        let last = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut checkpoint = MemoryCheckpoint::new(Some(last));
        let mut queue = MemoryQueue::new();

        let err = run_retrieval(fetcher(&transport), &mut queue, &mut checkpoint, |_| {}).unwrap_err();

        assert!(matches!(err, HarvesterError::Fetch { status: Some(503), .. }));
        assert_eq!(queue.len(), 2);
        assert_eq!(checkpoint.get().unwrap(), Some(last));
    }

    #[test]
    fn test_no_records_match_is_an_empty_run() {
        let transport = Canned::new(&[
            r#"<OAI-PMH><error code="noRecordsMatch">Nothing here</error></OAI-PMH>"#,
        ]);
        let mut checkpoint = MemoryCheckpoint::default();

        let report = run_retrieval(fetcher(&transport), &mut MemoryQueue::new(), &mut checkpoint, |_| {})
            .unwrap();

        assert_eq!(report.pages, 0);
        assert_eq!(report.records, 0);
        assert!(checkpoint.get().unwrap().is_some());
    }

    struct Slow(Canned, Duration);

    impl Transport for Slow {
        fn get(&self, endpoint: &Url, params: &[(&'static str, String)]) -> Result<String> {
            thread::sleep(self.1);
            self.0.get(endpoint, params)
        }
    }

    #[test]
    fn test_progress_reports_page_timing() {
        let transport = Slow(Canned::new(&[PAGE_TWO]), Duration::from_millis(20));
        let config = HarvestConfig::new("cs", NaiveDate::from_ymd_opt(2023, 1, 1).unwrap())
            .unwrap()
            .with_check_interval(Duration::ZERO);
        let fetcher = RecordFetcher::new(config, &transport).unwrap();
        let mut timings = Vec::new();

        run_retrieval(fetcher, &mut MemoryQueue::new(), &mut MemoryCheckpoint::default(), |p| {
            timings.push(p.metrics);
        })
        .unwrap();

        assert_eq!(timings.len(), 1);
        assert!(timings[0].fetch_time >= Duration::from_millis(20));
        assert!(timings[0].convert_time < timings[0].fetch_time);
    }
}
