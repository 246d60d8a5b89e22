//! OAI-PMH `ListRecords` request parameters.

use chrono::NaiveDate;

use crate::config::{HarvestConfig, LIST_RECORDS_VERB};
use crate::error::{HarvesterError, Result};

/// Maximum length of a single query field.
pub const MAX_QUERY_FIELD_LENGTH: usize = 32;

/// Parameters of a fresh `ListRecords` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameters {
    verb: String,
    metadata_prefix: String,
    set: String,
    from: NaiveDate,
}

impl QueryParameters {
    /// Build and validate query parameters.
    pub fn new(
        verb: impl Into<String>,
        metadata_prefix: impl Into<String>,
        set: impl Into<String>,
        from: NaiveDate,
    ) -> Result<Self> {
        let query = Self {
            verb: verb.into(),
            metadata_prefix: metadata_prefix.into(),
            set: set.into(),
            from,
        };
        check_field("verb", &query.verb)?;
        check_field("metadataPrefix", &query.metadata_prefix)?;
        check_field("set", &query.set)?;
        Ok(query)
    }

    #[must_use]
    pub fn verb(&self) -> &str {
        &self.verb
    }

    #[must_use]
    pub fn metadata_prefix(&self) -> &str {
        &self.metadata_prefix
    }

    #[must_use]
    pub fn set(&self) -> &str {
        &self.set
    }

    #[must_use]
    pub fn from_date(&self) -> NaiveDate {
        self.from
    }

    /// Query string pairs of the fresh request shape.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("verb", self.verb.clone()),
            ("metadataPrefix", self.metadata_prefix.clone()),
            ("set", self.set.clone()),
            ("from", self.from.format("%Y-%m-%d").to_string()),
        ]
    }
}

/// Build the "list all records" query from configuration.
///
/// Falls back to the configured start date when `from` is `None`.
pub fn build_list_records_query(
    config: &HarvestConfig,
    from: Option<NaiveDate>,
) -> Result<QueryParameters> {
    QueryParameters::new(
        LIST_RECORDS_VERB,
        config.metadata_prefix.as_str(),
        config.set.as_str(),
        from.unwrap_or(config.start_date),
    )
}

/// Query string pairs for one request.
///
/// A continuation request carries only the verb and the resumption token:
/// the protocol forbids repeating the original query fields.
pub fn request_pairs(
    query: &QueryParameters,
    resumption_token: Option<&str>,
) -> Result<Vec<(&'static str, String)>> {
    match resumption_token {
        None => Ok(query.to_pairs()),
        Some("") => Err(HarvesterError::InvalidCursor(
            "resumption token is empty".to_string(),
        )),
        Some(token) => Ok(vec![
            ("resumptionToken", token.to_string()),
            ("verb", LIST_RECORDS_VERB.to_string()),
        ]),
    }
}

fn check_field(field: &'static str, value: &str) -> Result<()> {
    let len = value.chars().count();
    if len == 0 {
        return Err(HarvesterError::InvalidQuery {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if len > MAX_QUERY_FIELD_LENGTH {
        return Err(HarvesterError::InvalidQuery {
            field,
            reason: format!("longer than {MAX_QUERY_FIELD_LENGTH} characters"),
        });
    }
    Ok(())
}
