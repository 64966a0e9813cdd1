//! Read-back of XLSX exports
//!
//! A small reader for the workbooks this crate writes (and other simple
//! XLSX files): sheet names, shared and inline strings, and typed cell text.
//! It loads one worksheet's XML at a time and keeps the shared string table
//! in memory.

use crate::error::{ExportError, Result};
use crate::sink::{MAX_COLUMNS, MAX_ROWS};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use zip::ZipArchive;

/// How a cell's value was stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// Shared, inline, or formula string
    Text,
    /// Numeric value
    Number,
    /// Boolean stored as `0`/`1`
    Bool,
    /// No value
    Empty,
}

/// One cell read back from a sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellData {
    /// Cell text exactly as stored
    pub value: String,
    /// Storage type
    pub kind: CellKind,
}

impl CellData {
    fn empty() -> Self {
        CellData {
            value: String::new(),
            kind: CellKind::Empty,
        }
    }
}

/// Reader over an XLSX workbook
///
/// # Examples
///
/// ```no_run
/// use gridexport::reader::SheetReader;
///
/// let mut reader = SheetReader::open("users.xlsx")?;
/// for row in reader.text_rows(0)? {
///     println!("{}", row.join(" | "));
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SheetReader {
    archive: ZipArchive<BufReader<File>>,
    sst: Vec<String>,
    sheet_names: Vec<String>,
    sheet_paths: Vec<String>,
}

impl SheetReader {
    /// Open a workbook and load its sheet list and shared strings
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| ExportError::ReadError(format!("Failed to open ZIP: {}", e)))?;

        let sst = match read_entry(&mut archive, "xl/sharedStrings.xml")? {
            Some(xml) => parse_shared_strings(&xml),
            None => Vec::new(),
        };

        let workbook = read_entry(&mut archive, "xl/workbook.xml")?
            .ok_or_else(|| ExportError::ReadError("Missing xl/workbook.xml".to_string()))?;
        let rels = read_entry(&mut archive, "xl/_rels/workbook.xml.rels")?.ok_or_else(|| {
            ExportError::ReadError("Missing xl/_rels/workbook.xml.rels".to_string())
        })?;
        let (sheet_names, sheet_paths) = parse_sheet_info(&workbook, &rels)?;

        Ok(SheetReader {
            archive,
            sst,
            sheet_names,
            sheet_paths,
        })
    }

    /// Sheet names in workbook order
    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    /// All rows of the sheet at `sheet_index` (zero-based)
    pub fn rows(&mut self, sheet_index: usize) -> Result<Vec<Vec<CellData>>> {
        let sheet_path = self.sheet_paths.get(sheet_index).cloned().ok_or_else(|| {
            ExportError::ReadError(format!(
                "Sheet index {} out of bounds. Available: {} sheets",
                sheet_index,
                self.sheet_paths.len()
            ))
        })?;

        let xml = read_entry(&mut self.archive, &sheet_path)?.ok_or_else(|| {
            ExportError::ReadError(format!("Missing worksheet {}", sheet_path))
        })?;
        parse_rows(&xml, &self.sst)
    }

    /// All rows of the sheet called `name`
    pub fn rows_by_name(&mut self, name: &str) -> Result<Vec<Vec<CellData>>> {
        let index = self
            .sheet_names
            .iter()
            .position(|sheet| sheet == name)
            .ok_or_else(|| {
                ExportError::ReadError(format!(
                    "Sheet '{}' not found. Available sheets: {:?}",
                    name, self.sheet_names
                ))
            })?;
        self.rows(index)
    }

    /// Rows of the sheet at `sheet_index` as plain strings
    pub fn text_rows(&mut self, sheet_index: usize) -> Result<Vec<Vec<String>>> {
        Ok(self
            .rows(sheet_index)?
            .into_iter()
            .map(|row| row.into_iter().map(|cell| cell.value).collect())
            .collect())
    }
}

fn read_entry(archive: &mut ZipArchive<BufReader<File>>, name: &str) -> Result<Option<String>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(ExportError::ReadError(format!(
                "Failed to open {}: {}",
                name, e
            )))
        }
    };

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| ExportError::ReadError(format!("Failed to read {}: {}", name, e)))?;
    Ok(Some(xml))
}

// Decode XML entities (&lt; &gt; &quot; &apos; &amp;)
fn decode_xml_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Value of `name="..."` inside an opening tag
fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!(" {}=\"", name);
    let start = tag.find(&needle)? + needle.len();
    let len = tag[start..].find('"')?;
    Some(&tag[start..start + len])
}

/// Concatenated, decoded text of every `<t>` element in `xml`
fn text_content(xml: &str) -> String {
    let mut text = String::new();
    let mut pos = 0;
    while let Some(found) = find_element(xml, pos, "t") {
        let open_end = match xml[found..].find('>') {
            Some(offset) => found + offset,
            None => break,
        };
        if xml[..open_end].ends_with('/') {
            pos = open_end + 1;
            continue;
        }
        let Some(close) = xml[open_end..].find("</t>") else {
            break;
        };
        text.push_str(&xml[open_end + 1..open_end + close]);
        pos = open_end + close + 4;
    }
    decode_xml_entities(&text)
}

/// Position of the next `<name>` or `<name ...>` at or after `from`
fn find_element(xml: &str, from: usize, name: &str) -> Option<usize> {
    let open = format!("<{}", name);
    let mut pos = from;
    while let Some(offset) = xml[pos..].find(&open) {
        let start = pos + offset;
        match xml[start + open.len()..].chars().next() {
            Some('>') | Some(' ') | Some('/') => return Some(start),
            _ => pos = start + open.len(),
        }
    }
    None
}

fn parse_shared_strings(xml: &str) -> Vec<String> {
    let mut sst = Vec::new();
    let mut pos = 0;
    while let Some(si_start) = find_element(xml, pos, "si") {
        let Some(si_len) = xml[si_start..].find("</si>") else {
            break;
        };
        let si_end = si_start + si_len + 5;
        sst.push(text_content(&xml[si_start..si_end]));
        pos = si_end;
    }
    sst
}

fn parse_sheet_info(workbook: &str, rels: &str) -> Result<(Vec<String>, Vec<String>)> {
    let mut sheet_names = Vec::new();
    let mut sheet_paths = Vec::new();

    let mut pos = 0;
    while let Some(sheet_start) = find_element(workbook, pos, "sheet") {
        let Some(tag_len) = workbook[sheet_start..].find('>') else {
            break;
        };
        let tag = &workbook[sheet_start..sheet_start + tag_len];
        pos = sheet_start + tag_len;

        let (Some(name), Some(rid)) = (attribute(tag, "name"), attribute(tag, "r:id")) else {
            continue;
        };
        let target = relationship_target(rels, rid).ok_or_else(|| {
            ExportError::ReadError(format!("No relationship target for sheet '{}'", name))
        })?;

        sheet_names.push(decode_xml_entities(name));
        sheet_paths.push(match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("xl/{}", target),
        });
    }

    Ok((sheet_names, sheet_paths))
}

fn relationship_target<'a>(rels: &'a str, rid: &str) -> Option<&'a str> {
    let mut pos = 0;
    while let Some(start) = find_element(rels, pos, "Relationship") {
        let tag_len = rels[start..].find('>')?;
        let tag = &rels[start..start + tag_len];
        if attribute(tag, "Id") == Some(rid) {
            return attribute(tag, "Target");
        }
        pos = start + tag_len;
    }
    None
}

fn parse_rows(xml: &str, sst: &[String]) -> Result<Vec<Vec<CellData>>> {
    let mut rows: Vec<Vec<CellData>> = Vec::new();
    let mut pos = 0;

    while let Some(row_start) = find_element(xml, pos, "row") {
        let Some(open_len) = xml[row_start..].find('>') else {
            break;
        };
        let open_end = row_start + open_len;
        let open_tag = &xml[row_start..open_end];

        // Rows are 1-based; fill skipped rows
        if let Some(number) = attribute(open_tag, "r").and_then(|r| r.parse::<usize>().ok()) {
            if number > MAX_ROWS {
                return Err(ExportError::ReadError(format!(
                    "Row {} exceeds the worksheet limit of {}",
                    number, MAX_ROWS
                )));
            }
            while rows.len() + 1 < number {
                rows.push(Vec::new());
            }
        }

        if open_tag.ends_with('/') {
            rows.push(Vec::new());
            pos = open_end + 1;
            continue;
        }

        let Some(close_len) = xml[open_end..].find("</row>") else {
            break;
        };
        let row_end = open_end + close_len;
        rows.push(parse_cells(&xml[open_end + 1..row_end], sst)?);
        pos = row_end + 6;
    }

    Ok(rows)
}

fn parse_cells(row_xml: &str, sst: &[String]) -> Result<Vec<CellData>> {
    let mut cells = Vec::new();
    let mut pos = 0;

    while let Some(cell_start) = find_element(row_xml, pos, "c") {
        let Some(open_len) = row_xml[cell_start..].find('>') else {
            break;
        };
        let open_end = cell_start + open_len;
        let open_tag = &row_xml[cell_start..open_end];

        let (body, cell_end) = if open_tag.ends_with('/') {
            ("", open_end + 1)
        } else {
            match row_xml[open_end..].find("</c>") {
                Some(close) => (&row_xml[open_end + 1..open_end + close], open_end + close + 4),
                None => break,
            }
        };

        let column = match attribute(open_tag, "r") {
            Some(cell_ref) => parse_column_index(cell_ref)?,
            None => cells.len(),
        };
        while cells.len() < column {
            cells.push(CellData::empty());
        }

        cells.push(parse_cell(attribute(open_tag, "t"), body, sst));
        pos = cell_end;
    }

    Ok(cells)
}

fn parse_cell(cell_type: Option<&str>, body: &str, sst: &[String]) -> CellData {
    let raw_value = || -> Option<String> {
        let start = body.find("<v>")? + 3;
        let len = body[start..].find("</v>")?;
        Some(decode_xml_entities(&body[start..start + len]))
    };

    let (value, kind) = match cell_type {
        Some("inlineStr") => (text_content(body), CellKind::Text),
        Some("s") => {
            let text = raw_value()
                .and_then(|v| v.parse::<usize>().ok())
                .and_then(|idx| sst.get(idx).cloned());
            match text {
                Some(text) => (text, CellKind::Text),
                None => return CellData::empty(),
            }
        }
        Some("b") => match raw_value() {
            Some(v) => (v, CellKind::Bool),
            None => return CellData::empty(),
        },
        Some("str") | Some("e") => match raw_value() {
            Some(v) => (v, CellKind::Text),
            None => return CellData::empty(),
        },
        _ => match raw_value() {
            Some(v) => (v, CellKind::Number),
            None => return CellData::empty(),
        },
    };

    CellData { value, kind }
}

// Parse column index from cell reference (e.g., "A1" -> 0, "B1" -> 1, "AA1" -> 26)
fn parse_column_index(cell_ref: &str) -> Result<usize> {
    let invalid = || {
        ExportError::ReadError(format!(
            "Invalid cell reference '{}' (at most {} columns)",
            cell_ref, MAX_COLUMNS
        ))
    };

    let mut col_idx = 0usize;
    for ch in cell_ref.chars().take_while(char::is_ascii_alphabetic) {
        let digit = ch.to_ascii_uppercase() as usize - 'A' as usize + 1;
        col_idx = col_idx * 26 + digit;
        if col_idx > MAX_COLUMNS {
            return Err(invalid());
        }
    }

    col_idx.checked_sub(1).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_column_index() {
        assert_eq!(parse_column_index("A1").unwrap(), 0);
        assert_eq!(parse_column_index("b7").unwrap(), 1);
        assert_eq!(parse_column_index("AA10").unwrap(), 26);
        assert_eq!(parse_column_index("XFD1").unwrap(), MAX_COLUMNS - 1);
    }

    #[test]
    fn test_column_index_out_of_range() {
        assert!(matches!(parse_column_index("XFE1"), Err(ExportError::ReadError(_))));
        assert!(matches!(
            parse_column_index("AAAAAAAAAAAAAAAAAAAA1"),
            Err(ExportError::ReadError(_))
        ));
        assert!(matches!(parse_column_index("12"), Err(ExportError::ReadError(_))));
    }

    #[test]
    fn test_row_number_beyond_limit_rejected() {
        let xml = r#"<sheetData><row r="50000000"><c r="A50000000" t="n"><v>1</v></c></row></sheetData>"#;
        assert!(matches!(parse_rows(xml, &[]), Err(ExportError::ReadError(_))));

        let last = r#"<sheetData><row r="3"><c r="B3" t="n"><v>1</v></c></row></sheetData>"#;
        let rows = parse_rows(last, &[]).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].len(), 2);
    }

    #[test]
    fn test_huge_cell_reference_rejected() {
        let xml = r#"<sheetData><row r="1"><c r="AAAAAAAAAAAAAAAAAAAA1" t="n"><v>1</v></c></row></sheetData>"#;
        assert!(matches!(parse_rows(xml, &[]), Err(ExportError::ReadError(_))));
    }

    #[test]
    fn test_decode_entities_amp_last() {
        assert_eq!(decode_xml_entities("a &amp;lt; b &lt; c"), "a &lt; b < c");
        assert_eq!(decode_xml_entities("&amp;quot;"), "&quot;");
    }

    #[test]
    fn test_shared_strings_with_runs() {
        let xml = r#"<sst count="3"><si><t>plain</t></si><si><r><t>rich</t></r><r><rPr/><t xml:space="preserve"> text</t></r></si><si><t/></si></sst>"#;
        assert_eq!(parse_shared_strings(xml), vec!["plain", "rich text", ""]);
    }

    #[test]
    fn test_sheet_info() {
        let workbook = r#"<workbook><sheets><sheet name="A &amp; B" sheetId="1" r:id="rId2"/><sheet name="Two" sheetId="2" r:id="rId1"/></sheets></workbook>"#;
        let rels = r#"<Relationships><Relationship Id="rId1" Type="x" Target="/xl/worksheets/sheet2.xml"/><Relationship Id="rId2" Type="x" Target="worksheets/sheet1.xml"/></Relationships>"#;

        let (names, paths) = parse_sheet_info(workbook, rels).unwrap();
        assert_eq!(names, vec!["A & B", "Two"]);
        assert_eq!(paths, vec!["xl/worksheets/sheet1.xml", "xl/worksheets/sheet2.xml"]);
    }

    #[test]
    fn test_parse_rows_typed_cells() {
        let xml = concat!(
            r#"<worksheet><sheetData>"#,
            r#"<row r="1"><c r="A1" s="1" t="inlineStr"><is><t>00123</t></is></c><c r="C1" t="s"><v>0</v></c></row>"#,
            r#"<row r="3"><c r="A3" t="n"><v>42</v></c><c r="B3" t="b"><v>1</v></c><c r="C3" s="1"/></row>"#,
            r#"</sheetData></worksheet>"#
        );
        let sst = vec!["shared".to_string()];
        let rows = parse_rows(xml, &sst).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], CellData { value: "00123".into(), kind: CellKind::Text });
        assert_eq!(rows[0][1].kind, CellKind::Empty);
        assert_eq!(rows[0][2].value, "shared");
        assert!(rows[1].is_empty());
        assert_eq!(rows[2][0], CellData { value: "42".into(), kind: CellKind::Number });
        assert_eq!(rows[2][1].kind, CellKind::Bool);
        assert_eq!(rows[2][2].kind, CellKind::Empty);
    }
}
