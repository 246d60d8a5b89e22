//! Text normalization for harvested fields.
//!
//! Titles and subjects are stored in a restricted ASCII form so downstream
//! consumers (embedding, graph labels) never see markup residue or exotic
//! code points. Creator names are only transliterated.

use std::sync::LazyLock;

use deunicode::deunicode_with_tofu;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Everything outside letters, digits, comma and space.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static RESTRICTED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9, ]+").expect("valid regex"));

/// Transliterate text to its closest ASCII form.
///
/// Input is composed (NFC) first so a letter followed by combining marks
/// maps like its precomposed form. Every script is romanized; code points
/// without any ASCII rendering are dropped.
///
/// # Examples
/// ```
/// use pfr_harvester::text::transliterate;
///
/// assert_eq!(transliterate("Erdős"), "Erdos");
/// assert_eq!(transliterate("Straße"), "Strasse");
/// assert_eq!(transliterate("Иванов"), "Ivanov");
/// ```
#[must_use]
pub fn transliterate(text: &str) -> String {
    let composed: String = text.nfc().collect();
    deunicode_with_tofu(&composed, "")
}

/// Strip every character outside `[A-Za-z0-9, ]`.
///
/// # Examples
/// ```
/// use pfr_harvester::text::restrict_charset;
///
/// assert_eq!(restrict_charset("Quantum (field) theory!"), "Quantum field theory");
/// ```
#[must_use]
pub fn restrict_charset(text: &str) -> String {
    RESTRICTED_CHARS.replace_all(text, "").into_owned()
}

/// Transliterate and restrict a label such as a title or a subject.
///
/// The result is a fixed point: normalizing it again yields the same string.
#[must_use]
pub fn normalize_label(text: &str) -> String {
    restrict_charset(&transliterate(text))
}

/// Replace literal `\n` escape sequences with a single space.
#[must_use]
pub fn unescape_newlines(text: &str) -> String {
    text.replace("\\n", " ")
}
