//! PFR Harvester - Retrieve paper metadata from an OAI-PMH archive.
//!
//! This crate harvests `ListRecords` responses in the `oai_dc` format (arXiv
//! by default), converts them into validated [`Record`]s and follows
//! resumption tokens until the archive has nothing more to send or the
//! configured record limit is reached.
//!
//! # Example
//!
//! ```
//! use pfr_harvester::OaiDcConverter;
//!
//! let xml = r#"<OAI-PMH><ListRecords>
//!   <record>
//!     <header><identifier>oai:arXiv.org:2401.00001</identifier><datestamp>2024-01-02</datestamp></header>
//!     <metadata><dc:title>Sparse attention</dc:title><dc:description>Abstract</dc:description></metadata>
//!   </record>
//!   <resumptionToken cursor="0" completeListSize="2">TOKEN|1</resumptionToken>
//! </ListRecords></OAI-PMH>"#;
//!
//! let page = OaiDcConverter::new().convert(xml).unwrap();
//! assert_eq!(page.records[0].title, "Sparse attention");
//! assert_eq!(page.next_token(), Some("TOKEN|1"));
//! ```
//!
//! # Architecture
//!
//! The harvester is organized into several modules:
//!
//! - [`config`]: Settings, defaults and validation
//! - [`types`]: Core data types (Record, Page, RecordDraft)
//! - [`error`]: Error types and Result alias
//! - [`text`]: Transliteration and character filtering
//! - [`converter`]: Streaming `oai_dc` to [`Page`] conversion
//! - [`query`]: Request parameters for fresh and continuation requests
//! - [`http`]: HTTP transport
//! - [`fetcher`]: Paginated harvesting with record limit
//! - [`sink`]: Record sinks and checkpoint stores
//! - [`retrieval`]: Checkpointed retrieval run
//! - [`cli`]: Command-line interface

pub mod cli;
pub mod config;
pub mod converter;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod query;
pub mod retrieval;
pub mod sink;
pub mod text;
pub mod types;

// Re-export the main entry points
pub use converter::OaiDcConverter;
pub use fetcher::{FetchMetrics, PageIterator, RecordFetcher};
pub use retrieval::{run_retrieval, Progress, RetrievalReport};

// Re-export commonly used items
pub use config::{parse_date, validate_date, HarvestConfig};
pub use error::{HarvesterError, Result};
pub use http::{HttpTransport, Transport};
pub use query::QueryParameters;
pub use sink::{CheckpointStore, RecordSink};
pub use types::{Page, Record, RecordDraft};
