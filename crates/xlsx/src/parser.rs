//! XLSX participant list parser implementation.

use certgen_core::{Error, ParticipantList, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::ZipArchive;

const WORKBOOK_PATH: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PATH: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";
const DEFAULT_SHEET_PATH: &str = "xl/worksheets/sheet1.xml";
/// Columns A through XFD.
const MAX_COLUMNS: usize = 16_384;

/// Parser for XLSX (Office Open XML) participant spreadsheets.
///
/// The first row of the sheet is the header; every later row is one
/// participant.
#[derive(Debug, Clone, Default)]
pub struct ParticipantReader {
    /// Sheet to read; the first sheet when unset.
    sheet: Option<String>,
}

impl ParticipantReader {
    /// Create a reader for the workbook's first sheet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the sheet with the given name instead of the first one.
    pub fn with_sheet(mut self, name: impl Into<String>) -> Self {
        self.sheet = Some(name.into());
        self
    }

    /// Parse an XLSX workbook from a reader.
    pub fn parse<R: Read + Seek>(&self, reader: R) -> Result<ParticipantList> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::InvalidSpreadsheet(format!("Failed to open ZIP: {}", e)))?;

        let has_shared_strings = archive.file_names().any(|name| name == SHARED_STRINGS_PATH);
        let shared_strings = if has_shared_strings {
            parse_shared_strings(&read_file_from_archive(&mut archive, SHARED_STRINGS_PATH)?)?
        } else {
            Vec::new()
        };

        let sheet_path = self.resolve_sheet_path(&mut archive)?;
        log::debug!("Reading participants from {}", sheet_path);

        let content = read_file_from_archive(&mut archive, &sheet_path)?;
        let mut rows = parse_sheet_rows(&content, &shared_strings)?.into_iter();

        let header = rows.next().unwrap_or_default();
        let rows: Vec<Vec<Option<String>>> = rows.collect();

        let width = rows.iter().map(Vec::len).chain([header.len()]).max().unwrap_or(0);
        let columns = (0..width)
            .map(|i| match header.get(i).cloned().flatten() {
                Some(name) => name,
                None => format!("Unnamed: {}", i),
            })
            .collect();

        Ok(ParticipantList::new(columns, rows))
    }

    /// Find the worksheet part for the requested (or first) sheet.
    fn resolve_sheet_path<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<String> {
        let workbook = match read_file_from_archive(archive, WORKBOOK_PATH) {
            Ok(content) => content,
            Err(_) if self.sheet.is_none() => return Ok(DEFAULT_SHEET_PATH.to_string()),
            Err(e) => return Err(e),
        };
        let sheets = parse_workbook_sheets(&workbook)?;

        let (name, rel_id) = match &self.sheet {
            Some(wanted) => sheets.iter().find(|(name, _)| name == wanted).ok_or_else(|| {
                let available: Vec<&str> = sheets.iter().map(|(name, _)| name.as_str()).collect();
                Error::InvalidSpreadsheet(format!(
                    "Sheet '{}' not found (available: {})",
                    wanted,
                    available.join(", ")
                ))
            })?,
            None => match sheets.first() {
                Some(first) => first,
                None => return Err(Error::InvalidSpreadsheet("Workbook has no sheets".to_string())),
            },
        };

        let targets = match read_file_from_archive(archive, WORKBOOK_RELS_PATH) {
            Ok(content) => parse_relationship_targets(&content)?,
            Err(_) => HashMap::new(),
        };

        match targets.get(rel_id) {
            Some(target) => Ok(match target.strip_prefix('/') {
                Some(absolute) => absolute.to_string(),
                None => format!("xl/{}", target),
            }),
            None if self.sheet.is_none() => {
                log::warn!("No relationship for sheet '{}', assuming {}", name, DEFAULT_SHEET_PATH);
                Ok(DEFAULT_SHEET_PATH.to_string())
            }
            None => Err(Error::InvalidSpreadsheet(format!(
                "Sheet '{}' has no worksheet part",
                name
            ))),
        }
    }
}

/// `(name, relationship id)` of each sheet in workbook order.
fn parse_workbook_sheets(content: &str) -> Result<Vec<(String, String)>> {
    let mut sheets = Vec::new();
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sheet" =>
            {
                let mut name = String::new();
                let mut rel_id = String::new();
                for attr in e.attributes().flatten() {
                    let key = attr.key.as_ref();
                    if key == b"name" {
                        name = attr.unescape_value().map(|v| v.to_string()).unwrap_or_default();
                    } else if key != b"id" && local_name(key) == b"id" {
                        rel_id = String::from_utf8_lossy(&attr.value).to_string();
                    }
                }
                sheets.push((name, rel_id));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::InvalidSpreadsheet(format!(
                    "Error parsing workbook: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(sheets)
}

/// Relationship id to target.
fn parse_relationship_targets(content: &str) -> Result<HashMap<String, String>> {
    let mut targets = HashMap::new();
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let mut id = String::new();
                let mut target = String::new();
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Target" => target = String::from_utf8_lossy(&attr.value).to_string(),
                        _ => {}
                    }
                }
                targets.insert(id, target);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::InvalidSpreadsheet(format!(
                    "Error parsing workbook relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(targets)
}

/// Parse the shared strings table.
///
/// Rich text runs of one item are concatenated; phonetic hints (`rPh`) are
/// not part of the visible value.
fn parse_shared_strings(content: &str) -> Result<Vec<String>> {
    let mut strings = Vec::new();
    let mut reader = Reader::from_str(content);

    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"si" => current = Some(String::new()),
                b"rPh" => in_phonetic = true,
                b"t" if !in_phonetic => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if local_name(e.name().as_ref()) == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::Text(ref e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|e| Error::InvalidSpreadsheet(format!("Bad shared string: {}", e)))?;
                if let Some(ref mut s) = current {
                    s.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"si" => strings.extend(current.take()),
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::InvalidSpreadsheet(format!(
                    "Error parsing shared strings: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(strings)
}

/// A cell being read.
#[derive(Debug)]
struct CellState {
    column: usize,
    cell_type: Option<String>,
    value: Option<String>,
}

/// Parse worksheet rows into sparse cell values, in document order.
fn parse_sheet_rows(content: &str, shared_strings: &[String]) -> Result<Vec<Vec<Option<String>>>> {
    let mut rows = Vec::new();
    let mut reader = Reader::from_str(content);

    let mut row: Option<Vec<Option<String>>> = None;
    let mut next_column = 0;
    let mut cell: Option<CellState> = None;
    let mut in_value = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"row" => {
                    row = Some(Vec::new());
                    next_column = 0;
                }
                b"c" => {
                    let state = start_cell(e, next_column)?;
                    next_column = state.column + 1;
                    cell = Some(state);
                }
                b"rPh" => in_phonetic = true,
                b"v" | b"t" if cell.is_some() && !in_phonetic => {
                    in_value = true;
                    if let Some(ref mut c) = cell {
                        c.value.get_or_insert_with(String::new);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match local_name(e.name().as_ref()) {
                b"row" => rows.push(Vec::new()),
                b"c" => next_column = start_cell(e, next_column)?.column + 1,
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_value => {
                let text = e
                    .unescape()
                    .map_err(|e| Error::InvalidSpreadsheet(format!("Bad cell value: {}", e)))?;
                if let Some(value) = cell.as_mut().and_then(|c| c.value.as_mut()) {
                    value.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"v" | b"t" => in_value = false,
                b"rPh" => in_phonetic = false,
                b"c" => {
                    if let (Some(state), Some(cells)) = (cell.take(), row.as_mut()) {
                        if let Some(value) = resolve_cell_value(&state, shared_strings)? {
                            if cells.len() <= state.column {
                                cells.resize(state.column + 1, None);
                            }
                            cells[state.column] = Some(value);
                        }
                    }
                }
                b"row" => rows.extend(row.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::InvalidSpreadsheet(format!(
                    "Error parsing worksheet at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(rows)
}

/// Read the position and type of a `c` element.
fn start_cell(e: &BytesStart<'_>, next_column: usize) -> Result<CellState> {
    let mut column = next_column;
    let mut cell_type = None;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"r" => {
                if let Some(index) = column_index(&String::from_utf8_lossy(&attr.value))? {
                    column = index;
                }
            }
            b"t" => cell_type = Some(String::from_utf8_lossy(&attr.value).to_string()),
            _ => {}
        }
    }
    if column >= MAX_COLUMNS {
        return Err(Error::InvalidSpreadsheet(format!(
            "Cell in column {} is past the last column (XFD)",
            column + 1
        )));
    }
    Ok(CellState {
        column,
        cell_type,
        value: None,
    })
}

/// Turn a raw cell into its display value.
fn resolve_cell_value(cell: &CellState, shared_strings: &[String]) -> Result<Option<String>> {
    let Some(raw) = cell.value.as_deref() else {
        return Ok(None);
    };

    let value = match cell.cell_type.as_deref() {
        Some("s") => {
            let index: usize = raw.trim().parse().map_err(|_| {
                Error::InvalidSpreadsheet(format!("Bad shared string index '{}'", raw))
            })?;
            shared_strings
                .get(index)
                .cloned()
                .ok_or_else(|| {
                    Error::InvalidSpreadsheet(format!("Shared string {} out of range", index))
                })?
        }
        Some("b") => (if raw.trim() == "1" { "TRUE" } else { "FALSE" }).to_string(),
        _ => raw.to_string(),
    };

    Ok(Some(value))
}

/// Zero-based column index of a cell reference like "B7" or "AA12".
///
/// `None` when the reference has no column letters.
fn column_index(reference: &str) -> Result<Option<usize>> {
    let letters = reference
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .map(|b| b.to_ascii_uppercase());

    let mut number = 0usize;
    let mut seen = false;
    for b in letters {
        seen = true;
        number = number
            .checked_mul(26)
            .and_then(|n| n.checked_add((b - b'A' + 1) as usize))
            .filter(|&n| n <= MAX_COLUMNS)
            .ok_or_else(|| {
                Error::InvalidSpreadsheet(format!("Cell reference '{}' is out of range", reference))
            })?;
    }

    Ok(seen.then(|| number - 1))
}

/// Read a file from the ZIP archive.
fn read_file_from_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<String> {
    let mut file = archive.by_name(path).map_err(|e| {
        Error::InvalidSpreadsheet(format!("File not found in archive '{}': {}", path, e))
    })?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| Error::InvalidSpreadsheet(format!("Failed to read '{}': {}", path, e)))?;

    Ok(content)
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}
