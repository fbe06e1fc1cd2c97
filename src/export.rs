//! Export encoders: contact records and transcriptions as downloadable files.
//!
//! Three pure encoders turn a [`ContactRecord`] into vCard 3.0, CSV or
//! pretty JSON. [`Artifact`] wraps the encoded text with a file name and MIME
//! type so a caller (web handler, CLI) can hand it straight to the user.

use crate::contact::{ContactRecord, FIELD_ORDER};
use crate::error::OcrError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Country written into the vCard address.
const VCARD_COUNTRY: &str = "日本";

/// Byte-order mark so spreadsheet apps detect UTF-8 CSV.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Every download format the crate can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Text,
    Markdown,
    VCard,
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Markdown => "md",
            ExportFormat::VCard => "vcf",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Text => "text/plain",
            ExportFormat::Markdown => "text/markdown",
            ExportFormat::VCard => "text/vcard",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }
}

/// An encoded file ready for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Artifact {
    fn new(stem: &str, format: ExportFormat, bytes: Vec<u8>) -> Self {
        Self {
            file_name: format!("{stem}.{}", format.extension()),
            mime_type: format.mime_type(),
            bytes,
        }
    }

    /// A transcription saved as `.txt` or, for Markdown output, `.md`.
    pub fn text(stem: &str, text: &str, markdown: bool) -> Self {
        let format = if markdown {
            ExportFormat::Markdown
        } else {
            ExportFormat::Text
        };
        Self::new(stem, format, text.as_bytes().to_vec())
    }

    pub fn vcard(stem: &str, record: &ContactRecord) -> Self {
        Self::new(stem, ExportFormat::VCard, to_vcard(record).into_bytes())
    }

    /// CSV for one or more cards, BOM-prefixed.
    pub fn csv(stem: &str, records: &[ContactRecord]) -> Result<Self, OcrError> {
        let text = to_csv(records)?;
        let mut bytes = Vec::with_capacity(UTF8_BOM.len() + text.len());
        bytes.extend_from_slice(UTF8_BOM);
        bytes.extend_from_slice(text.as_bytes());
        Ok(Self::new(stem, ExportFormat::Csv, bytes))
    }

    pub fn json(stem: &str, record: &ContactRecord) -> Result<Self, OcrError> {
        Ok(Self::new(stem, ExportFormat::Json, to_json(record)?.into_bytes()))
    }

    /// Write into `dir` as `file_name`, returning the final path.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub async fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, OcrError> {
        let dir = dir.as_ref();
        let path = dir.join(&self.file_name);
        let failed = |source: std::io::Error| OcrError::OutputWriteFailed {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(dir).await.map_err(failed)?;
        let tmp_path = dir.join(format!(".{}.tmp", self.file_name));
        tokio::fs::write(&tmp_path, &self.bytes)
            .await
            .map_err(failed)?;
        tokio::fs::rename(&tmp_path, &path).await.map_err(failed)?;
        Ok(path)
    }
}

// ── vCard ────────────────────────────────────────────────────────────────

/// Encode a record as a vCard 3.0 card.
///
/// Absent fields produce no line. Every line, `END:VCARD` included, ends in
/// CRLF.
///
/// The `N` property is filled by splitting the full name on whitespace: the
/// first token goes into the first component and the remainder into the
/// second. This matches how Japanese cards are usually printed (family name
/// first) but is lossy for other orderings and single-token names. `FN`
/// always carries the name as read.
pub fn to_vcard(record: &ContactRecord) -> String {
    let mut lines: Vec<String> = vec!["BEGIN:VCARD".into(), "VERSION:3.0".into()];

    if let Some(name) = present(&record.name) {
        let mut tokens = name.split_whitespace();
        let first = tokens.next().unwrap_or(name);
        let rest = tokens.collect::<Vec<_>>().join(" ");
        if rest.is_empty() {
            lines.push(format!("N:{};;;;", escape(name)));
        } else {
            lines.push(format!("N:{};{};;;", escape(first), escape(&rest)));
        }
        lines.push(format!("FN:{}", escape(name)));
    }

    let company = present(&record.company);
    let department = present(&record.department);
    if company.is_some() || department.is_some() {
        let company = escape(company.unwrap_or_default());
        match department {
            Some(dept) => lines.push(format!("ORG:{company};{}", escape(dept))),
            None => lines.push(format!("ORG:{company}")),
        }
    }

    if let Some(title) = present(&record.title) {
        lines.push(format!("TITLE:{}", escape(title)));
    }
    for phone in record.phone.iter().filter(|p| !p.trim().is_empty()) {
        lines.push(format!("TEL;TYPE=WORK:{}", escape(phone)));
    }
    if let Some(mobile) = present(&record.mobile) {
        lines.push(format!("TEL;TYPE=CELL:{}", escape(mobile)));
    }
    if let Some(fax) = present(&record.fax) {
        lines.push(format!("TEL;TYPE=FAX:{}", escape(fax)));
    }
    for email in record.email.iter().filter(|e| !e.trim().is_empty()) {
        lines.push(format!("EMAIL:{}", escape(email)));
    }
    if let Some(url) = present(&record.website) {
        lines.push(format!("URL:{}", escape(url)));
    }
    if let Some(address) = present(&record.address) {
        lines.push(format!(
            "ADR;TYPE=WORK:;;{};;;;{VCARD_COUNTRY}",
            escape(address)
        ));
    }

    lines.push("END:VCARD".into());

    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    out
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Escape a vCard text value (RFC 2426 §4).
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

// ── CSV ──────────────────────────────────────────────────────────────────

/// Encode records as CSV with a localized header row.
///
/// Columns follow [`FIELD_ORDER`]. List fields are joined with `", "` into one
/// cell; absent values are empty cells. An empty slice yields `""`.
pub fn to_csv(records: &[ContactRecord]) -> Result<String, OcrError> {
    if records.is_empty() {
        return Ok(String::new());
    }

    let failed = |detail: String| OcrError::ExportFailed {
        format: "csv".into(),
        detail,
    };

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer
        .write_record(FIELD_ORDER.iter().map(|f| f.label()))
        .map_err(|e| failed(e.to_string()))?;
    for record in records {
        writer
            .write_record(FIELD_ORDER.iter().map(|&f| record.display_value(f)))
            .map_err(|e| failed(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| failed(e.error().to_string()))?;
    String::from_utf8(bytes).map_err(|e| failed(e.to_string()))
}

// ── JSON ─────────────────────────────────────────────────────────────────

/// Pretty-printed JSON in schema order, `null` for absent scalars.
pub fn to_json(record: &ContactRecord) -> Result<String, OcrError> {
    serde_json::to_string_pretty(record).map_err(|e| OcrError::ExportFailed {
        format: "json".into(),
        detail: e.to_string(),
    })
}
