//! Paginated harvesting: fetch, convert, apply the record limit, repeat.
//!
//! [`RecordFetcher::pages`] returns a lazy [`PageIterator`]. Each call to
//! `next` performs exactly one round trip and one conversion, so callers see
//! pages as they arrive and decide themselves how long to wait between them.
//! The next request depends on the token of the page just parsed, which is
//! why fetching and parsing are strictly sequential.

use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::config::HarvestConfig;
use crate::converter::OaiDcConverter;
use crate::error::Result;
use crate::http::{HttpTransport, Transport};
use crate::query::{build_list_records_query, request_pairs, QueryParameters};
use crate::types::Page;

/// Timing of the last fetch/convert cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchMetrics {
    /// Duration of the network round trip.
    pub fetch_time: Duration,

    /// Duration of the conversion.
    pub convert_time: Duration,
}

/// Harvests records from an OAI-PMH endpoint.
#[derive(Debug)]
pub struct RecordFetcher<T> {
    config: HarvestConfig,
    transport: T,
}

impl RecordFetcher<HttpTransport> {
    /// Create a fetcher talking HTTP with the configured timeout.
    pub fn from_config(config: HarvestConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout)?;
        Self::new(config, transport)
    }
}

impl<T: Transport> RecordFetcher<T> {
    /// Create a fetcher over an arbitrary transport.
    pub fn new(config: HarvestConfig, transport: T) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, transport })
    }

    /// The validated configuration.
    #[must_use]
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Perform one round trip and return the raw response body.
    ///
    /// With a resumption token only the verb and the token are sent.
    pub fn fetch(&self, query: &QueryParameters, resumption_token: Option<&str>) -> Result<String> {
        let params = request_pairs(query, resumption_token)?;
        self.transport.get(&self.config.host, &params)
    }

    /// Iterate over the pages of a harvest starting at `from`.
    ///
    /// Without a date, the configured start date is used.
    #[must_use]
    pub fn pages(self, from: Option<NaiveDate>) -> PageIterator<T> {
        PageIterator {
            fetcher: self,
            converter: OaiDcConverter::new(),
            from,
            state: State::BuildQuery,
            metrics: FetchMetrics::default(),
            documents_retrieved: 0,
        }
    }
}

#[derive(Debug)]
enum State {
    BuildQuery,
    Fetch {
        query: QueryParameters,
        resumption_token: Option<String>,
    },
    Done,
}

/// Lazy sequence of harvested pages.
///
/// Yields `Err` at most once; the sequence ends after the first error, after
/// a page without resumption token, or when the record limit is reached.
#[derive(Debug)]
pub struct PageIterator<T> {
    fetcher: RecordFetcher<T>,
    converter: OaiDcConverter,
    from: Option<NaiveDate>,
    state: State,
    metrics: FetchMetrics,
    documents_retrieved: usize,
}

impl<T: Transport> PageIterator<T> {
    /// Timing of the last cycle.
    #[must_use]
    pub fn metrics(&self) -> FetchMetrics {
        self.metrics
    }

    /// Records yielded so far, after limit truncation.
    #[must_use]
    pub fn documents_retrieved(&self) -> usize {
        self.documents_retrieved
    }

    /// The configuration of the underlying fetcher.
    #[must_use]
    pub fn config(&self) -> &HarvestConfig {
        self.fetcher.config()
    }

    fn cycle(&mut self, query: QueryParameters, resumption_token: Option<String>) -> Result<Page> {
        self.converter.clear();
        self.metrics = FetchMetrics::default();

        let started = Instant::now();
        let body = self
            .fetcher
            .fetch(&query, resumption_token.as_deref())
            .inspect_err(|e| tracing::error!(error = %e, "request to the archive failed"))?;
        self.metrics.fetch_time = started.elapsed();

        let started = Instant::now();
        let mut page = self.converter.convert(&body)?;
        self.metrics.convert_time = started.elapsed();

        let mut next_token = page.next_token().map(str::to_string);

        if let Some(limit) = self.fetcher.config.record_limit() {
            if self.documents_retrieved + page.len() >= limit {
                page.truncate(limit.saturating_sub(self.documents_retrieved));
                next_token = None;
            }
        }
        self.documents_retrieved += page.len();

        tracing::debug!(
            records = page.len(),
            total = self.documents_retrieved,
            cursor = page.resumption_cursor.as_deref().unwrap_or("-"),
            fetch_time = ?self.metrics.fetch_time,
            convert_time = ?self.metrics.convert_time,
            "page harvested"
        );

        if let Some(token) = next_token {
            self.state = State::Fetch {
                query,
                resumption_token: Some(token),
            };
        }
        Ok(page)
    }
}

impl<T: Transport> Iterator for PageIterator<T> {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::Done => return None,
                State::BuildQuery => {
                    match build_list_records_query(&self.fetcher.config, self.from) {
                        Ok(query) => {
                            self.documents_retrieved = 0;
                            self.state = State::Fetch {
                                query,
                                resumption_token: None,
                            };
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "could not build query parameters");
                            return Some(Err(e));
                        }
                    }
                }
                State::Fetch {
                    query,
                    resumption_token,
                } => return Some(self.cycle(query, resumption_token)),
            }
        }
    }
}

impl<T: Transport> std::iter::FusedIterator for PageIterator<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use pretty_assertions::assert_eq;
    use reqwest::Url;

    use crate::error::HarvesterError;

    /// Transport replaying canned responses and recording requests.
    #[derive(Default)]
    struct ScriptedTransport {
        responses: RefCell<VecDeque<Result<String>>>,
        requests: RefCell<Vec<Vec<(&'static str, String)>>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&self, _endpoint: &Url, params: &[(&'static str, String)]) -> Result<String> {
            self.requests.borrow_mut().push(params.to_vec());
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(HarvesterError::Conversion("no scripted response".into())))
        }
    }

    fn page_xml(first_id: usize, count: usize, token: Option<&str>) -> String {
        let records: String = (first_id..first_id + count)
            .map(|i| {
                format!(
                    "<record><header><identifier>oai:arXiv.org:{i}</identifier>\
                     <datestamp>2024-01-05</datestamp></header><metadata>\
                     <dc:title>Paper {i}</dc:title><dc:description>About {i}</dc:description>\
                     </metadata></record>"
                )
            })
            .collect();
        let token = token
            .map(|t| format!("<resumptionToken cursor=\"{first_id}\" completeListSize=\"100\">{t}</resumptionToken>"))
            .unwrap_or_default();
        format!("<OAI-PMH><ListRecords>{records}{token}</ListRecords></OAI-PMH>")
    }

    fn config(limit: i64) -> HarvestConfig {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        HarvestConfig::new("cs", date).unwrap().with_limit(limit)
    }

    #[test]
    fn test_pages_until_token_exhausted() {
        let transport = ScriptedTransport::new(vec![
            Ok(page_xml(0, 3, Some("T1"))),
            Ok(page_xml(3, 3, Some("T2"))),
            Ok(page_xml(6, 2, None)),
        ]);
        let fetcher = RecordFetcher::new(config(0), &transport).unwrap();
        let pages: Vec<Page> = fetcher.pages(None).collect::<Result<_>>().unwrap();

        let sizes: Vec<usize> = pages.iter().map(Page::len).collect();
        assert_eq!(sizes, vec![3, 3, 2]);

        let requests = transport.requests.borrow();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0][3], ("from", "2024-01-01".to_string()));
        assert_eq!(
            requests[1],
            vec![
                ("resumptionToken", "T1".to_string()),
                ("verb", "ListRecords".to_string())
            ]
        );
        assert_eq!(requests[2][0], ("resumptionToken", "T2".to_string()));
    }

    #[test]
    fn test_limit_truncates_last_page() {
        let transport = ScriptedTransport::new(vec![
            Ok(page_xml(0, 7, Some("T1"))),
            Ok(page_xml(7, 7, Some("T2"))),
            Ok(page_xml(14, 7, None)),
        ]);
        let fetcher = RecordFetcher::new(config(10), &transport).unwrap();
        let mut pages = fetcher.pages(None);

        let first = pages.next().unwrap().unwrap();
        assert_eq!(first.len(), 7);
        assert_eq!(first.next_token(), Some("T1"));

        let second = pages.next().unwrap().unwrap();
        assert_eq!(second.len(), 3);
        assert!(second.is_last());
        assert_eq!(second.records[2].id, "oai:arXiv.org:9");
        assert_eq!(pages.documents_retrieved(), 10);

        assert!(pages.next().is_none());
        assert_eq!(transport.requests.borrow().len(), 2);
    }

    #[test]
    fn test_limit_reached_exactly_stops() {
        let transport = ScriptedTransport::new(vec![Ok(page_xml(0, 5, Some("T1")))]);
        let fetcher = RecordFetcher::new(config(5), &transport).unwrap();
        let pages: Vec<Page> = fetcher.pages(None).collect::<Result<_>>().unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].len(), 5);
        assert!(pages[0].is_last());
    }

    #[test]
    fn test_given_date_overrides_start_date() {
        let transport = ScriptedTransport::new(vec![Ok(page_xml(0, 1, None))]);
        let fetcher = RecordFetcher::new(config(0), &transport).unwrap();
        let from = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let _ = fetcher.pages(Some(from)).count();

        assert_eq!(transport.requests.borrow()[0][3], ("from", "2024-06-30".to_string()));
    }

    #[test]
    fn test_fetch_error_ends_sequence() {
        let transport = ScriptedTransport::new(vec![
            Ok(page_xml(0, 2, Some("T1"))),
            Err(HarvesterError::Fetch {
                url: "https://export.arxiv.org/oai2".into(),
                status: Some(503),
                message: "Service Unavailable".into(),
            }),
        ]);
        let fetcher = RecordFetcher::new(config(0), &transport).unwrap();
        let mut pages = fetcher.pages(None);

        assert!(pages.next().unwrap().is_ok());
        let err = pages.next().unwrap().unwrap_err();
        assert!(matches!(err, HarvesterError::Fetch { status: Some(503), .. }));
        assert!(pages.next().is_none());
    }

    #[test]
    fn test_remote_error_ends_sequence() {
        let transport = ScriptedTransport::new(vec![Ok(
            "<OAI-PMH><error code=\"badResumptionToken\">expired</error></OAI-PMH>".to_string(),
        )]);
        let fetcher = RecordFetcher::new(config(0), &transport).unwrap();
        let mut pages = fetcher.pages(None);

        assert!(matches!(
            pages.next(),
            Some(Err(HarvesterError::RemoteError { .. }))
        ));
        assert!(pages.next().is_none());
    }

    #[test]
    fn test_invalid_query_is_reported_before_any_request() {
        let mut bad = config(0);
        bad.set = "x".repeat(40);
        let transport = ScriptedTransport::new(vec![]);
        let fetcher = RecordFetcher::new(bad, &transport).unwrap();
        let mut pages = fetcher.pages(None);

        assert!(pages.next().unwrap().unwrap_err().is_config());
        assert!(pages.next().is_none());
        assert!(transport.requests.borrow().is_empty());
    }

    #[test]
    fn test_metrics_are_recorded() {
        let transport = ScriptedTransport::new(vec![Ok(page_xml(0, 1, None))]);
        let fetcher = RecordFetcher::new(config(0), &transport).unwrap();
        let mut pages = fetcher.pages(None);

        assert_eq!(pages.metrics(), FetchMetrics::default());
        pages.next().unwrap().unwrap();
        assert_eq!(pages.documents_retrieved(), 1);
        assert!(pages.next().is_none());
    }
}
