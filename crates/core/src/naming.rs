//! Output file naming for generated certificates.
//!
//! Every entry is named `Certificado_<name>.<ext>`, where whitespace in the
//! name becomes underscores. Characters that would break out of a single
//! path component are replaced the same way.

use crate::types::OutputFormat;
use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Prefix of every generated entry name.
pub const FILENAME_PREFIX: &str = "Certificado_";

/// Each whitespace character maps to one underscore.
static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s").unwrap());

/// Path separators, reserved Windows characters and control characters.
static UNSAFE_CHARS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[/\\:*?"<>|\p{Cc}]"#).unwrap());

/// Turn a participant name into a string usable inside a file name.
///
/// The name is NFC-normalized first so that a decomposed "José" and a
/// precomposed one give the same file name.
pub fn filesystem_safe(name: &str) -> String {
    let composed: String = name.nfc().collect();
    let underscored = WHITESPACE_REGEX.replace_all(&composed, "_");
    UNSAFE_CHARS_REGEX.replace_all(&underscored, "_").into_owned()
}

/// Archive entry name for one participant.
pub fn certificate_filename(name: &str, format: OutputFormat) -> String {
    format!("{}{}.{}", FILENAME_PREFIX, filesystem_safe(name), format.extension())
}
