//! Streaming conversion of OAI-PMH `ListRecords` responses in `oai_dc` format.
//!
//! The converter walks the document once, forward only, reacting to
//! start / text / end events. It keeps three pieces of state:
//!
//! - the draft of the record currently open (only between `<record>` and
//!   `</record>`),
//! - a text buffer, reset at every element boundary and consumed by the
//!   field save step when the matching element closes,
//! - the page being built.
//!
//! A record that fails validation at `</record>` is logged and dropped; the
//! rest of the page is unaffected. An `<error>` element aborts the conversion
//! with [`HarvesterError::RemoteError`]; malformed XML aborts it with
//! [`HarvesterError::Conversion`].
//!
//! See <http://www.openarchives.org/OAI/openarchivesprotocol.html#ListRecords>.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{HarvesterError, Result};
use crate::text::{normalize_label, transliterate, unescape_newlines};
use crate::types::{Page, RecordDraft, MIDNIGHT_SUFFIX};

/// Record fields fed by a child element of `<record>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFieldElement {
    Identifier,
    Datestamp,
    Title,
    Creator,
    Subject,
    Description,
    Date,
}

/// Elements the converter reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Record,
    Field(RecordFieldElement),
    ResumptionToken,
    Error,
}

/// Map a qualified element name to the element it stands for.
///
/// Names are matched without namespace resolution, so `<dc:identifier>` is
/// not the header `<identifier>`.
#[must_use]
pub fn element_kind(name: &[u8]) -> Option<Element> {
    use RecordFieldElement::*;

    let element = match name {
        b"record" => Element::Record,
        b"identifier" => Element::Field(Identifier),
        b"datestamp" => Element::Field(Datestamp),
        b"dc:title" => Element::Field(Title),
        b"dc:creator" => Element::Field(Creator),
        b"dc:subject" => Element::Field(Subject),
        b"dc:description" => Element::Field(Description),
        b"dc:date" => Element::Field(Date),
        b"resumptionToken" => Element::ResumptionToken,
        b"error" => Element::Error,
        _ => return None,
    };
    Some(element)
}

/// Store the accumulated text of a closed field element into the draft.
pub fn save_field(draft: &mut RecordDraft, field: RecordFieldElement, text: &str) {
    match field {
        RecordFieldElement::Identifier => draft.id = Some(text.to_string()),
        RecordFieldElement::Datestamp => {
            draft.modified_at = Some(format!("{text}{MIDNIGHT_SUFFIX}"));
        }
        RecordFieldElement::Title => draft.title = Some(normalize_label(text)),
        RecordFieldElement::Creator => draft.creators.push(transliterate(text)),
        RecordFieldElement::Subject => draft.subjects.push(normalize_label(text)),
        RecordFieldElement::Description => draft
            .description
            .get_or_insert_with(String::new)
            .push_str(&unescape_newlines(text)),
        RecordFieldElement::Date => draft.dates.push(format!("{text}{MIDNIGHT_SUFFIX}")),
    }
}

/// Event-driven converter from `oai_dc` XML to a [`Page`].
///
/// One instance can be reused across responses; [`clear`](Self::clear) is
/// called at the start of every conversion.
#[derive(Debug, Default)]
pub struct OaiDcConverter {
    page: Page,
    current: Option<RecordDraft>,
    text: String,
    error_code: Option<String>,
}

impl OaiDcConverter {
    /// Create a converter with empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all per-conversion state.
    pub fn clear(&mut self) {
        self.page = Page::default();
        self.current = None;
        self.text.clear();
        self.error_code = None;
    }

    /// Convert a raw response body.
    ///
    /// Bodies that are not valid UTF-8 are rejected with
    /// [`HarvesterError::InvalidInput`].
    pub fn convert_bytes(&mut self, data: &[u8]) -> Result<Page> {
        let text = std::str::from_utf8(data).map_err(|e| {
            HarvesterError::InvalidInput(format!("record data to parse is not UTF-8 text: {e}"))
        })?;
        self.convert(text)
    }

    /// Convert one response body into a page.
    ///
    /// The returned page holds every record that validated, in document
    /// order, and whatever pagination metadata was present.
    pub fn convert(&mut self, data: &str) -> Result<Page> {
        self.clear();

        match self.scan(data) {
            Ok(()) => Ok(std::mem::take(&mut self.page)),
            Err(e @ HarvesterError::RemoteError { .. }) => {
                tracing::warn!(error = %e, "archive response carried an error element");
                Err(e)
            }
            Err(e) => {
                tracing::error!(error = %e, "aborting conversion of the response");
                Err(e)
            }
        }
    }

    fn scan(&mut self, data: &str) -> Result<()> {
        let mut reader = Reader::from_str(data);

        loop {
            let event = reader.read_event().map_err(|e| {
                HarvesterError::Conversion(format!(
                    "malformed XML at position {}: {e}",
                    reader.buffer_position()
                ))
            })?;

            match event {
                Event::Start(e) => self.start_element(&e)?,
                Event::Empty(e) => {
                    self.start_element(&e)?;
                    self.end_element(e.name().as_ref())?;
                }
                Event::End(e) => self.end_element(e.name().as_ref())?,
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| {
                        HarvesterError::Conversion(format!("invalid character data: {e}"))
                    })?;
                    self.text.push_str(&text);
                }
                Event::CData(c) => {
                    let raw = c.into_inner();
                    let text = std::str::from_utf8(&raw).map_err(|e| {
                        HarvesterError::Conversion(format!("invalid CDATA section: {e}"))
                    })?;
                    self.text.push_str(text);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if self.current.take().is_some() {
            tracing::debug!("response ended inside an unclosed record");
        }
        Ok(())
    }

    fn start_element(&mut self, e: &BytesStart<'_>) -> Result<()> {
        self.text.clear();

        match element_kind(e.name().as_ref()) {
            Some(Element::Record) => self.current = Some(RecordDraft::default()),
            Some(Element::ResumptionToken) => {
                if let Some(cursor) = attribute(e, b"cursor")? {
                    self.page.resumption_cursor = Some(cursor);
                }
                if let Some(size) = attribute(e, b"completeListSize")? {
                    self.page.complete_list_size = Some(size);
                }
            }
            Some(Element::Error) => self.error_code = attribute(e, b"code")?,
            _ => {}
        }
        Ok(())
    }

    fn end_element(&mut self, name: &[u8]) -> Result<()> {
        let text = std::mem::take(&mut self.text);

        match element_kind(name) {
            Some(Element::Record) => self.save_record(),
            Some(Element::Field(field)) => match self.current.as_mut() {
                Some(draft) => save_field(draft, field, &text),
                None => tracing::debug!(?field, "ignoring field outside of a record"),
            },
            Some(Element::ResumptionToken) => self.page.resumption_token = Some(text),
            Some(Element::Error) => {
                return Err(HarvesterError::RemoteError {
                    code: self.error_code.take(),
                    message: text,
                });
            }
            None => {}
        }
        Ok(())
    }

    fn save_record(&mut self) {
        let Some(draft) = self.current.take() else {
            return;
        };

        match draft.validate() {
            Ok(record) => self.page.records.push(record),
            Err(rejection) => {
                tracing::warn!(
                    id = rejection.id.as_deref().unwrap_or("<none>"),
                    reasons = %rejection,
                    "dropping invalid record"
                );
            }
        }
    }
}

/// Read and unescape an attribute of a start tag.
fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr
            .map_err(|err| HarvesterError::Conversion(format!("malformed attribute: {err}")))?;
        if attr.key.as_ref() == key {
            let value = attr.unescape_value().map_err(|err| {
                HarvesterError::Conversion(format!("invalid attribute value: {err}"))
            })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
