//! File export of chart records: CSV, spreadsheet (xlsx) and JSON.
//!
//! Column headers come from the first record's keys. Records are assumed to
//! share one shape: keys missing from a later record export as empty cells
//! and keys the first record lacks are dropped.

use crate::result::{ChartDatum, ChartValue};
use chrono::{DateTime, Utc};
use std::fmt;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Comma-separated text
    Csv,
    /// Single-sheet Office Open XML workbook
    Spreadsheet,
    /// Pretty-printed JSON array
    Json,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Csv, ExportFormat::Spreadsheet, ExportFormat::Json];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Spreadsheet => "xlsx",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Json => "application/json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// Nothing to export; no file is produced
    NoDataToExport,
    Encoding(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::NoDataToExport => write!(f, "No data to export"),
            ExportError::Encoding(msg) => write!(f, "Export encoding failed: {}", msg),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::Encoding(err.to_string())
    }
}

impl From<zip::result::ZipError> for ExportError {
    fn from(err: zip::result::ZipError) -> Self {
        ExportError::Encoding(err.to_string())
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Encoding(err.to_string())
    }
}

/// An encoded export ready to be written or downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub format: ExportFormat,
    pub content: Vec<u8>,
}

impl ExportFile {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Suggested file name, `analysis_<YYYYmmdd_HHMMSS>.<ext>`.
    pub fn file_name(&self, at: DateTime<Utc>) -> String {
        format!(
            "analysis_{}.{}",
            at.format("%Y%m%d_%H%M%S"),
            self.format.extension()
        )
    }
}

/// Encodes chart records into export files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEncoder {
    /// Worksheet name used for spreadsheet exports
    pub sheet_name: String,
}

impl Default for ExportEncoder {
    fn default() -> Self {
        ExportEncoder {
            sheet_name: "Analysis".to_string(),
        }
    }
}

impl ExportEncoder {
    pub fn new(sheet_name: impl Into<String>) -> Self {
        ExportEncoder {
            sheet_name: sheet_name.into(),
        }
    }

    /// Encodes `rows` in the given format.
    ///
    /// # Errors
    /// `NoDataToExport` when `rows` is empty, `Encoding` if a writer fails.
    pub fn encode(&self, rows: &[ChartDatum], format: ExportFormat) -> Result<ExportFile, ExportError> {
        let first = rows.first().ok_or(ExportError::NoDataToExport)?;
        let headers: Vec<&str> = first.keys().collect();

        let content = match format {
            ExportFormat::Csv => write_csv(&headers, rows)?,
            ExportFormat::Spreadsheet => write_xlsx(&self.sheet_name, &headers, rows)?,
            ExportFormat::Json => write_json(&headers, rows)?,
        };
        Ok(ExportFile { format, content })
    }
}

/// Encodes with the default encoder settings.
pub fn encode(rows: &[ChartDatum], format: ExportFormat) -> Result<ExportFile, ExportError> {
    ExportEncoder::default().encode(rows, format)
}

fn cell_text(value: Option<&ChartValue>) -> String {
    match value {
        None | Some(ChartValue::Null) => String::new(),
        Some(value) => value.to_string(),
    }
}

fn write_csv(headers: &[&str], rows: &[ChartDatum]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(headers.iter().map(|header| cell_text(row.get(header))))?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Encoding(e.to_string()))
}

fn write_json(headers: &[&str], rows: &[ChartDatum]) -> Result<Vec<u8>, ExportError> {
    let projected: Vec<ChartDatum> = rows
        .iter()
        .map(|row| {
            headers.iter().fold(ChartDatum::new(), |datum, header| {
                datum.with(*header, row.get(header).cloned().unwrap_or(ChartValue::Null))
            })
        })
        .collect();
    serde_json::to_vec_pretty(&projected).map_err(|e| ExportError::Encoding(e.to_string()))
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

fn workbook_xml(sheet_name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        escape_xml(sheet_name)
    )
}

fn write_xlsx(sheet_name: &str, headers: &[&str], rows: &[ChartDatum]) -> Result<Vec<u8>, ExportError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", ROOT_RELS_XML.to_string()),
        ("xl/workbook.xml", workbook_xml(sheet_name)),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(headers, rows)),
    ];
    for (name, xml) in parts {
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        zip.start_file(name, options)?;
        zip.write_all(xml.as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}

fn sheet_xml(headers: &[&str], rows: &[ChartDatum]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    xml.push_str(r#"<row r="1">"#);
    for (column, header) in headers.iter().enumerate() {
        xml.push_str(&inline_string_cell(&cell_ref(column, 1), header));
    }
    xml.push_str("</row>");

    for (index, row) in rows.iter().enumerate() {
        let line = index + 2;
        xml.push_str(&format!(r#"<row r="{}">"#, line));
        for (column, header) in headers.iter().enumerate() {
            let reference = cell_ref(column, line);
            let cell = match row.get(header) {
                None | Some(ChartValue::Null) => continue,
                Some(ChartValue::Integer(value)) => numeric_cell(&reference, &value.to_string()),
                Some(ChartValue::Number(value)) if value.is_finite() => {
                    numeric_cell(&reference, &value.to_string())
                }
                Some(ChartValue::Bool(value)) => format!(
                    r#"<c r="{}" t="b"><v>{}</v></c>"#,
                    reference,
                    u8::from(*value)
                ),
                Some(other) => inline_string_cell(&reference, &other.to_string()),
            };
            xml.push_str(&cell);
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn numeric_cell(reference: &str, value: &str) -> String {
    format!(r#"<c r="{}"><v>{}</v></c>"#, reference, value)
}

fn inline_string_cell(reference: &str, text: &str) -> String {
    format!(
        r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
        reference,
        escape_xml(text)
    )
}

/// A1-style reference for a zero-based column and one-based row.
fn cell_ref(column: usize, row: usize) -> String {
    format!("{}{}", column_name(column), row)
}

/// Zero-based column index to spreadsheet letters: 0 -> A, 26 -> AA.
fn column_name(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().map(|letter| *letter as char).collect()
}

/// Escapes markup characters and drops code points XML 1.0 cannot carry
/// (C0 controls other than tab, newline and carriage return, U+FFFE, U+FFFF).
fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\t' | '\n' | '\r' => escaped.push(ch),
            '\u{0}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}' => {}
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
