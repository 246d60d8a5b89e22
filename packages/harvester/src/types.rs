//! Core data types for the harvester.
//!
//! A [`Record`] is one validated catalog entry; a [`RecordDraft`] is the
//! accumulator the converter fills while it walks a `<record>` element; a
//! [`Page`] is everything one response yielded.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Maximum length of a record identifier.
pub const MAX_ID_LENGTH: usize = 32;

/// Time-of-day marker appended to bare dates to form a timestamp.
pub const MIDNIGHT_SUFFIX: &str = " 00:00:00";

/// Timestamp format of `modified_at` once the midnight marker is appended.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A harvested catalog entry (scientific-paper metadata).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier, unique within the source catalog.
    pub id: String,

    /// Recording dates, each suffixed with the midnight marker.
    #[serde(default)]
    pub dates: Vec<String>,

    /// Last modification timestamp.
    pub modified_at: NaiveDateTime,

    /// Normalized title.
    pub title: String,

    /// Creator names in document order.
    #[serde(default)]
    pub creators: Vec<String>,

    /// Normalized subject tags.
    #[serde(default)]
    pub subjects: Vec<String>,

    /// Concatenated description fragments.
    pub description: String,
}

/// A required field that was missing or malformed when a record closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Id,
    ModifiedAt,
    Title,
    Description,
}

impl RecordField {
    /// Field name as used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::ModifiedAt => "modified_at",
            Self::Title => "title",
            Self::Description => "description",
        }
    }
}

/// Why a draft could not become a [`Record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRejection {
    /// Identifier of the rejected draft, if it had one.
    pub id: Option<String>,

    /// Every violated field with the reason.
    pub violations: Vec<(RecordField, String)>,
}

impl fmt::Display for RecordRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reasons: Vec<String> = self
            .violations
            .iter()
            .map(|(field, reason)| format!("{}: {reason}", field.as_str()))
            .collect();
        write!(f, "{}", reasons.join("; "))
    }
}

/// In-progress record accumulated from XML events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDraft {
    pub id: Option<String>,
    pub dates: Vec<String>,
    pub modified_at: Option<String>,
    pub title: Option<String>,
    pub creators: Vec<String>,
    pub subjects: Vec<String>,
    pub description: Option<String>,
}

impl RecordDraft {
    /// Validate the draft against the [`Record`] shape.
    pub fn validate(self) -> Result<Record, RecordRejection> {
        let mut violations = Vec::new();

        match self.id.as_deref() {
            None => violations.push((RecordField::Id, "missing".to_string())),
            Some("") => violations.push((RecordField::Id, "empty".to_string())),
            Some(id) if id.chars().count() > MAX_ID_LENGTH => violations.push((
                RecordField::Id,
                format!("longer than {MAX_ID_LENGTH} characters"),
            )),
            Some(_) => {}
        }

        let modified_at = match self.modified_at.as_deref() {
            None => {
                violations.push((RecordField::ModifiedAt, "missing".to_string()));
                None
            }
            Some(raw) => match NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT) {
                Ok(ts) => Some(ts),
                Err(e) => {
                    violations.push((RecordField::ModifiedAt, format!("'{raw}': {e}")));
                    None
                }
            },
        };

        if self.title.as_deref().map_or(true, str::is_empty) {
            violations.push((RecordField::Title, "missing or empty".to_string()));
        }
        if self.description.as_deref().map_or(true, str::is_empty) {
            violations.push((RecordField::Description, "missing or empty".to_string()));
        }

        match (self.id, modified_at, self.title, self.description) {
            (Some(id), Some(modified_at), Some(title), Some(description))
                if violations.is_empty() =>
            {
                Ok(Record {
                    id,
                    dates: self.dates,
                    modified_at,
                    title,
                    creators: self.creators,
                    subjects: self.subjects,
                    description,
                })
            }
            (id, ..) => Err(RecordRejection { id, violations }),
        }
    }
}

/// One response's worth of records plus pagination state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Validated records in document order.
    pub records: Vec<Record>,

    /// Continuation token; absent or empty means the harvest is exhausted.
    pub resumption_token: Option<String>,

    /// Position of the cursor in the complete list, as sent by the archive.
    pub resumption_cursor: Option<String>,

    /// Estimated size of the complete list, as sent by the archive.
    pub complete_list_size: Option<String>,
}

impl Page {
    /// The continuation token, if another page can be requested.
    #[must_use]
    pub fn next_token(&self) -> Option<&str> {
        self.resumption_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Whether this page ends the harvest.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.next_token().is_none()
    }

    /// Keep only the first `len` records and drop the continuation token.
    pub fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
        self.resumption_token = None;
    }

    /// Number of records on the page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the page holds no record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
