//! Excel workbook (`.xlsx`) reader.
//!
//! An `.xlsx` file is a zip archive of XML parts. Sheet order comes from
//! `xl/workbook.xml` and its relationships; cell text from the shared string
//! table or the cell itself; date detection from the number format of each
//! cell's style in `xl/styles.xml`. The first row of the used range is the
//! header.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::fs::File;
use std::io::Read;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, info, instrument};
use zip::ZipArchive;

use super::{ensure_file, table_name, unique_headers, DataReader, SheetInfo};
use crate::inference::{parse_timestamp, reconcile, InferredCell, Reconciliation};
use crate::prelude::*;

const KIND: &str = "xlsx";
/// Worksheet limits of the file format.
const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;

/// Reads one worksheet of an Excel workbook.
///
/// Numbers become integers or floats, and integer and float cells in one
/// column widen to float. Any other mix of kinds turns the column into text.
#[derive(Debug, Clone, Default)]
pub struct XlsxReader;

impl XlsxReader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DataReader for XlsxReader {
    #[instrument(skip(self), fields(source.type = "xlsx"))]
    async fn read_data(&self, source: &str, sheet_index: usize) -> Result<Table> {
        info!(source, sheet_index, "Reading workbook");
        let mut workbook = Workbook::open(source)?;
        let (title, cells) = workbook.read_sheet(sheet_index)?;
        debug!(sheet = %title, cells = cells.len(), "Loaded worksheet cells");
        build_table(&format!("{}/{title}", table_name(source)), cells)
    }

    async fn list_sheets(&self, source: &str) -> Result<Vec<SheetInfo>> {
        let workbook = Workbook::open(source)?;
        Ok(workbook
            .sheets
            .iter()
            .enumerate()
            .map(|(index, (title, _))| SheetInfo {
                index,
                title: title.clone(),
            })
            .collect())
    }

    fn description(&self) -> String {
        "Excel workbook".to_string()
    }
}

/// How a numeric cell should be presented, from its style's number format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberStyle {
    General,
    Date,
    Time,
}

impl NumberStyle {
    fn from_builtin_id(id: &str) -> Option<Self> {
        match id {
            "14" | "15" | "16" | "17" | "22" => Some(Self::Date),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(Self::Time),
            _ => None,
        }
    }

    /// Scans a format code for date or time tokens, skipping quoted
    /// literals, escapes and bracketed sections such as colors.
    fn from_format_code(code: &str) -> Self {
        let mut escaped = false;
        let mut literal = false;
        let mut bracket = false;
        let mut date = false;
        let mut time = false;
        for ch in code.chars() {
            match ch {
                _ if escaped => escaped = false,
                '_' | '\\' => escaped = true,
                '"' if literal => literal = false,
                '"' if !bracket => literal = true,
                ']' if bracket => bracket = false,
                '[' if !literal => bracket = true,
                _ if literal || bracket => {}
                'y' | 'Y' | 'd' | 'D' => date = true,
                'h' | 'H' | 's' | 'S' => time = true,
                _ => {}
            }
        }
        if date {
            Self::Date
        } else if time {
            Self::Time
        } else {
            Self::General
        }
    }
}

/// A worksheet cell with its zero-based position.
#[derive(Debug, Clone, PartialEq)]
struct SheetCell {
    row: usize,
    col: usize,
    value: CellValue,
}

struct Workbook {
    archive: ZipArchive<File>,
    /// (title, part path) in workbook order
    sheets: Vec<(String, String)>,
    date_1904: bool,
}

impl Workbook {
    fn open(path: &str) -> Result<Self> {
        ensure_file(KIND, path)?;
        let file = File::open(path).with_read_context(KIND, || format!("cannot open {path}"))?;
        let mut archive = ZipArchive::new(file)
            .with_read_context(KIND, || format!("{path} is not an xlsx archive"))?;

        let relationships = match read_part(&mut archive, "xl/_rels/workbook.xml.rels")? {
            Some(bytes) => parse_relationships(&bytes)?,
            None => HashMap::new(),
        };
        let workbook = read_part(&mut archive, "xl/workbook.xml")?
            .ok_or_else(|| corrupt("missing xl/workbook.xml"))?;
        let (sheets, date_1904) = parse_workbook(&workbook, &relationships)?;

        Ok(Self {
            archive,
            sheets,
            date_1904,
        })
    }

    fn read_sheet(&mut self, index: usize) -> Result<(String, Vec<SheetCell>)> {
        let (title, part) = self
            .sheets
            .get(index)
            .cloned()
            .ok_or(EdaError::SheetIndexOutOfRange {
                index,
                count: self.sheets.len(),
            })?;

        let shared = match read_part(&mut self.archive, "xl/sharedStrings.xml")? {
            Some(bytes) => parse_shared_strings(&bytes)?,
            None => Vec::new(),
        };
        let styles = match read_part(&mut self.archive, "xl/styles.xml")? {
            Some(bytes) => parse_styles(&bytes)?,
            None => Vec::new(),
        };
        let sheet = read_part(&mut self.archive, &part)?
            .ok_or_else(|| corrupt(format!("missing worksheet part {part}")))?;

        let cells = parse_sheet(&sheet, &shared, &styles, self.date_1904)?;
        Ok((title, cells))
    }
}

fn corrupt(err: impl Display) -> EdaError {
    EdaError::source_read(KIND, format!("malformed workbook: {err}"))
}

/// Reads a whole archive member, matching the name case-insensitively.
fn read_part(archive: &mut ZipArchive<File>, name: &str) -> Result<Option<Vec<u8>>> {
    let wanted = name.replace('\\', "/");
    let Some(actual) = archive
        .file_names()
        .find(|candidate| wanted.eq_ignore_ascii_case(candidate))
        .map(str::to_owned)
    else {
        return Ok(None);
    };

    let mut entry = archive.by_name(&actual).map_err(corrupt)?;
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .with_read_context(KIND, || format!("malformed workbook: cannot read {actual}"))?;
    Ok(Some(bytes))
}

fn xml_reader(bytes: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(bytes);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.expand_empty_elements = true;
    config.trim_text(false);
    reader
}

fn attribute(event: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    match event.try_get_attribute(name).map_err(corrupt)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(corrupt)?.into_owned())),
        None => Ok(None),
    }
}

/// Appends an entity or character reference.
fn push_reference(target: &mut String, reference: &BytesRef<'_>) -> Result<()> {
    let raw = reference.xml_content().map_err(corrupt)?;
    if let Some(number) = raw.strip_prefix('#') {
        let code = match number.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => number.parse::<u32>(),
        }
        .map_err(corrupt)?;
        if let Some(ch) = char::from_u32(code) {
            target.push(ch);
        }
    } else if let Some(entity) = resolve_xml_entity(&raw) {
        target.push_str(entity);
    } else {
        return Err(corrupt(format!("unknown entity '&{raw};'")));
    }
    Ok(())
}

/// Relationship targets are relative to `xl/` unless absolute.
fn to_zip_path(target: &str) -> String {
    if let Some(stripped) = target.strip_prefix('/') {
        stripped.to_string()
    } else if target.starts_with("xl/") {
        target.to_string()
    } else {
        format!("xl/{target}")
    }
}

fn parse_relationships(bytes: &[u8]) -> Result<HashMap<String, String>> {
    let mut reader = xml_reader(bytes);
    let mut relationships = HashMap::new();
    loop {
        match reader.read_event().map_err(corrupt)? {
            Event::Eof => break,
            Event::Start(event) if event.local_name().as_ref() == b"Relationship" => {
                let kind = attribute(&event, "Type")?;
                if !kind.map(|k| k.ends_with("/worksheet")).unwrap_or(true) {
                    continue;
                }
                if let (Some(id), Some(target)) =
                    (attribute(&event, "Id")?, attribute(&event, "Target")?)
                {
                    relationships.insert(id, to_zip_path(&target));
                }
            }
            _ => {}
        }
    }
    Ok(relationships)
}

fn parse_workbook(
    bytes: &[u8],
    relationships: &HashMap<String, String>,
) -> Result<(Vec<(String, String)>, bool)> {
    let mut reader = xml_reader(bytes);
    let mut sheets = Vec::new();
    let mut date_1904 = false;
    loop {
        match reader.read_event().map_err(corrupt)? {
            Event::Eof => break,
            Event::Start(event) => match event.local_name().as_ref() {
                b"sheet" => {
                    let mut name = None;
                    let mut id = None;
                    for attr in event.attributes() {
                        let attr = attr.map_err(corrupt)?;
                        match attr.key.local_name().as_ref() {
                            b"name" => name = Some(attr.unescape_value().map_err(corrupt)?.into_owned()),
                            b"id" => id = Some(attr.unescape_value().map_err(corrupt)?.into_owned()),
                            _ => {}
                        }
                    }
                    if let (Some(name), Some(id)) = (name, id) {
                        if let Some(path) = relationships.get(&id) {
                            sheets.push((name, path.clone()));
                        }
                    }
                }
                b"workbookPr" => {
                    date_1904 = attribute(&event, "date1904")?
                        .map(|v| v == "1" || v == "true")
                        .unwrap_or(false);
                }
                _ => {}
            },
            _ => {}
        }
    }
    Ok((sheets, date_1904))
}

fn parse_shared_strings(bytes: &[u8]) -> Result<Vec<String>> {
    let mut reader = xml_reader(bytes);
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event().map_err(corrupt)? {
            Event::Eof => break,
            Event::Start(event) => match event.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => in_phonetic = true,
                b"t" if !in_phonetic => in_text = true,
                _ => {}
            },
            Event::End(event) => match event.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(text) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&text.xml_content().map_err(corrupt)?);
                }
            }
            Event::CData(text) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&text.xml_content().map_err(corrupt)?);
                }
            }
            Event::GeneralRef(reference) if in_text => {
                if let Some(s) = current.as_mut() {
                    push_reference(s, &reference)?;
                }
            }
            _ => {}
        }
    }
    Ok(strings)
}

/// Number style per cell format index (`cellXfs`).
fn parse_styles(bytes: &[u8]) -> Result<Vec<NumberStyle>> {
    let mut reader = xml_reader(bytes);
    let mut custom: HashMap<String, NumberStyle> = HashMap::new();
    let mut format_ids: Vec<String> = Vec::new();
    let mut in_cell_xfs = false;
    loop {
        match reader.read_event().map_err(corrupt)? {
            Event::Eof => break,
            Event::Start(event) => match event.local_name().as_ref() {
                b"numFmt" => {
                    if let (Some(id), Some(code)) =
                        (attribute(&event, "numFmtId")?, attribute(&event, "formatCode")?)
                    {
                        custom.insert(id, NumberStyle::from_format_code(&code));
                    }
                }
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => {
                    format_ids.push(attribute(&event, "numFmtId")?.unwrap_or_default());
                }
                _ => {}
            },
            Event::End(event) if event.local_name().as_ref() == b"cellXfs" => {
                in_cell_xfs = false;
            }
            _ => {}
        }
    }

    Ok(format_ids
        .iter()
        .map(|id| {
            custom
                .get(id)
                .copied()
                .or_else(|| NumberStyle::from_builtin_id(id))
                .unwrap_or(NumberStyle::General)
        })
        .collect())
}

/// Zero-based (row, col) of an `A1` reference.
fn parse_reference(reference: &str) -> Result<(usize, usize)> {
    let invalid = || corrupt(format!("invalid cell reference '{reference}'"));
    let split = reference
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() {
        return Err(invalid());
    }
    let mut col = 0usize;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(invalid());
        }
        let digit = ch.to_ascii_uppercase() as usize - 'A' as usize + 1;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(digit))
            .filter(|c| *c <= MAX_COLUMNS)
            .ok_or_else(invalid)?;
    }
    let row = parse_row(digits).ok_or_else(invalid)?;
    Ok((row, col - 1))
}

/// Zero-based index of a one-based row number within the sheet limits.
fn parse_row(digits: &str) -> Option<usize> {
    digits
        .parse::<usize>()
        .ok()
        .filter(|r| *r <= MAX_ROWS)?
        .checked_sub(1)
}

/// Converts an Excel serial date. The 1900 system counts the phantom
/// 1900-02-29 as day 60.
fn serial_to_datetime(serial: f64, date_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let base = if date_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else if serial < 61.0 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    let millis = (serial * 86_400_000.0).round() as i64;
    base.and_hms_opt(0, 0, 0)?
        .checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

struct PendingCell {
    row: usize,
    col: usize,
    cell_type: String,
    style: NumberStyle,
    text: String,
}

impl PendingCell {
    fn into_value(self, shared: &[String], date_1904: bool) -> Result<Option<CellValue>> {
        if self.text.is_empty() {
            return Ok(None);
        }
        let text = self.text;
        let value = match self.cell_type.as_str() {
            "s" => {
                let index: usize = text.trim().parse().map_err(corrupt)?;
                let s = shared
                    .get(index)
                    .ok_or_else(|| corrupt(format!("shared string {index} out of range")))?;
                CellValue::Text(s.clone())
            }
            "inlineStr" | "str" | "e" => CellValue::Text(text),
            "b" => CellValue::Boolean(matches!(text.trim(), "1" | "true" | "TRUE")),
            "d" => parse_timestamp(text.trim())
                .map(CellValue::Timestamp)
                .unwrap_or(CellValue::Text(text)),
            _ => {
                let trimmed = text.trim();
                let number: f64 = trimmed.parse().map_err(corrupt)?;
                match self.style {
                    NumberStyle::Date => serial_to_datetime(number, date_1904)
                        .map(CellValue::Timestamp)
                        .unwrap_or(CellValue::Float(number)),
                    NumberStyle::Time => serial_to_datetime(number.fract(), date_1904)
                        .map(|ts| CellValue::Text(ts.format("%H:%M:%S").to_string()))
                        .unwrap_or(CellValue::Float(number)),
                    NumberStyle::General => {
                        if trimmed.contains(['.', 'e', 'E']) {
                            CellValue::Float(number)
                        } else {
                            trimmed
                                .parse::<i64>()
                                .map(CellValue::Integer)
                                .unwrap_or(CellValue::Float(number))
                        }
                    }
                }
            }
        };
        Ok(Some(value))
    }
}

fn parse_sheet(
    bytes: &[u8],
    shared: &[String],
    styles: &[NumberStyle],
    date_1904: bool,
) -> Result<Vec<SheetCell>> {
    let mut reader = xml_reader(bytes);
    let mut cells = Vec::new();
    let mut row = 0usize;
    let mut next_row = 0usize;
    let mut next_col = 0usize;
    let mut pending: Option<PendingCell> = None;
    let mut capture = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event().map_err(corrupt)? {
            Event::Eof => break,
            Event::Start(event) => match event.local_name().as_ref() {
                b"row" => {
                    row = match attribute(&event, "r")? {
                        Some(r) => parse_row(&r)
                            .ok_or_else(|| corrupt(format!("invalid row number '{r}'")))?,
                        None => next_row,
                    };
                    if row >= MAX_ROWS {
                        return Err(corrupt("worksheet exceeds the row limit"));
                    }
                    next_row = row + 1;
                    next_col = 0;
                }
                b"c" => {
                    let (r, c) = match attribute(&event, "r")? {
                        Some(reference) => parse_reference(&reference)?,
                        None => (row, next_col),
                    };
                    if c >= MAX_COLUMNS {
                        return Err(corrupt("worksheet exceeds the column limit"));
                    }
                    next_col = c + 1;
                    let style = attribute(&event, "s")?
                        .and_then(|s| s.parse::<usize>().ok())
                        .and_then(|i| styles.get(i).copied())
                        .unwrap_or(NumberStyle::General);
                    pending = Some(PendingCell {
                        row: r,
                        col: c,
                        cell_type: attribute(&event, "t")?.unwrap_or_default(),
                        style,
                        text: String::new(),
                    });
                }
                b"v" => capture = pending.is_some(),
                b"t" if !in_phonetic => capture = pending.is_some(),
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::End(event) => match event.local_name().as_ref() {
                b"v" | b"t" => capture = false,
                b"rPh" => in_phonetic = false,
                b"c" => {
                    if let Some(cell) = pending.take() {
                        let (r, c) = (cell.row, cell.col);
                        if let Some(value) = cell.into_value(shared, date_1904)? {
                            cells.push(SheetCell { row: r, col: c, value });
                        }
                    }
                }
                _ => {}
            },
            Event::Text(text) if capture => {
                if let Some(cell) = pending.as_mut() {
                    cell.text.push_str(&text.xml_content().map_err(corrupt)?);
                }
            }
            Event::CData(text) if capture => {
                if let Some(cell) = pending.as_mut() {
                    cell.text.push_str(&text.xml_content().map_err(corrupt)?);
                }
            }
            Event::GeneralRef(reference) if capture => {
                if let Some(cell) = pending.as_mut() {
                    push_reference(&mut cell.text, &reference)?;
                }
            }
            _ => {}
        }
    }
    Ok(cells)
}

/// Takes the first populated row as the header and reconciles each column
/// of the remaining populated rows. Columns span the used range; rows with no
/// cells are skipped.
fn build_table(name: &str, cells: Vec<SheetCell>) -> Result<Table> {
    let (Some(min_col), Some(max_col)) = (
        cells.iter().map(|c| c.col).min(),
        cells.iter().map(|c| c.col).max(),
    ) else {
        return Ok(Table::empty(name));
    };
    let width = max_col - min_col + 1;

    let mut by_row: BTreeMap<usize, Vec<(usize, CellValue)>> = BTreeMap::new();
    for cell in cells {
        by_row
            .entry(cell.row)
            .or_default()
            .push((cell.col - min_col, cell.value));
    }

    let spread = |row: Vec<(usize, CellValue)>| {
        let mut values = vec![CellValue::Null; width];
        for (col, value) in row {
            values[col] = value;
        }
        values
    };

    let mut rows = by_row.into_values();
    let header = spread(rows.next().unwrap_or_default());
    let headers = unique_headers(header.iter().map(ToString::to_string).collect());

    let height = rows.len();
    let mut columns: Vec<Vec<InferredCell>> =
        (0..width).map(|_| Vec::with_capacity(height)).collect();
    for row in rows {
        for (index, value) in spread(row).into_iter().enumerate() {
            columns[index].push(InferredCell::typed(value));
        }
    }

    let columns = headers
        .into_iter()
        .zip(columns)
        .map(|(header, cells)| reconcile(header, cells, Reconciliation::NumericWidening))
        .collect();
    Table::new(name, columns)
}
