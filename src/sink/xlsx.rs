//! XLSX sink
//!
//! Streams worksheet XML row by row into the deflate stream. Cells are
//! written as inline strings, so no shared string table is built and memory
//! stays flat regardless of row count.

use super::{
    column_count, write_atomically, CellTypePolicy, ExportArtifact, SpreadsheetFormat,
    SpreadsheetSink, WriteRequest,
};
use crate::config::{DEFAULT_COMPRESSION_LEVEL, DEFAULT_SHEET_TITLE};
use crate::error::{ExportError, Result};
use crate::events::{ExportEvent, RegisteredEvents, SheetOptions};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Worksheet row limit, heading row included
pub const MAX_ROWS: usize = 1_048_576;
/// Worksheet column limit
pub const MAX_COLUMNS: usize = 16_384;

const MAX_COLUMN_WIDTH: f64 = 255.0;
const MAX_SHEET_TITLE_LEN: usize = 31;
/// Longest digit run written as a number; longer ones lose precision
const MAX_NUMERIC_DIGITS: usize = 15;

// cellXfs indices in styles.xml
const STYLE_DEFAULT: u32 = 0;
const STYLE_TEXT: u32 = 1;
const STYLE_TEXT_BOLD: u32 = 2;

/// Writes a single-sheet workbook
#[derive(Debug, Clone)]
pub struct XlsxSink {
    compression_level: u32,
}

impl XlsxSink {
    /// Create a sink with a deflate level (0 stores entries uncompressed)
    pub fn new(compression_level: u32) -> Self {
        XlsxSink {
            compression_level: compression_level.min(9),
        }
    }
}

impl Default for XlsxSink {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl SpreadsheetSink for XlsxSink {
    fn write(
        &self,
        mut request: WriteRequest<'_>,
        events: &RegisteredEvents,
    ) -> Result<ExportArtifact> {
        let target = request.path;
        let columns = column_count(&request.headings, request.rows);
        check_limits(request.rows.len() + 1, columns)?;

        let bytes = write_atomically(target, |partial| {
            let mut book = XlsxWorkbook::create(partial, self.compression_level)?;

            request.fire(events, ExportEvent::BeforeSheet)?;
            let widths = column_widths(&request, columns);
            book.start_sheet(&request.sheet, &widths, columns, request.rows.len() + 1)?;

            let header_style = if request.sheet.bold_header {
                STYLE_TEXT_BOLD
            } else {
                STYLE_TEXT
            };
            book.write_row(
                request.headings.iter().map(String::as_str),
                header_style,
                CellTypePolicy::ForceText,
            )?;
            for row in request.rows {
                book.write_row(row.values(), STYLE_TEXT, request.cell_type)?;
            }

            request.fire(events, ExportEvent::AfterSheet)?;
            request.fire(events, ExportEvent::BeforeWriting)?;
            book.finish_sheet(&request.sheet)?;
            book.close(&sheet_title(&request.sheet.title))
        })?;

        debug!(
            file = request.file_name,
            rows = request.rows.len(),
            bytes,
            "Wrote XLSX export"
        );

        Ok(ExportArtifact {
            path: target.to_path_buf(),
            file_name: request.file_name.to_string(),
            format: SpreadsheetFormat::Xlsx,
            row_count: request.rows.len(),
            bytes,
        })
    }
}

fn check_limits(rows: usize, columns: usize) -> Result<()> {
    if rows > MAX_ROWS {
        return Err(ExportError::WriteError(format!(
            "{} rows exceed the worksheet limit of {}",
            rows, MAX_ROWS
        )));
    }
    if columns > MAX_COLUMNS {
        return Err(ExportError::WriteError(format!(
            "{} columns exceed the worksheet limit of {}",
            columns, MAX_COLUMNS
        )));
    }
    Ok(())
}

/// Content-fitted widths merged with handler overrides, by column index
fn column_widths(request: &WriteRequest<'_>, columns: usize) -> BTreeMap<usize, f64> {
    let mut widths = BTreeMap::new();

    if request.auto_size {
        let mut chars = vec![0usize; columns];
        let headings = request.headings.iter().map(String::as_str);
        for (i, value) in headings.enumerate() {
            chars[i] = chars[i].max(display_width(value));
        }
        for row in request.rows {
            for (i, value) in row.values().enumerate() {
                chars[i] = chars[i].max(display_width(value));
            }
        }
        for (i, len) in chars.into_iter().enumerate() {
            widths.insert(i, ((len + 2) as f64).min(MAX_COLUMN_WIDTH));
        }
    }

    for (&column, &width) in &request.sheet.column_widths {
        if column < columns {
            widths.insert(column, width.clamp(0.0, MAX_COLUMN_WIDTH));
        }
    }
    widths
}

fn display_width(value: &str) -> usize {
    value
        .lines()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0)
}

/// Make a title Excel accepts: no `[]:*?/\`, no surrounding quotes,
/// at most 31 characters, never empty.
pub fn sheet_title(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();

    let edge = |c: char| c.is_whitespace() || c == '\'';
    let title: String = cleaned
        .trim_matches(edge)
        .chars()
        .take(MAX_SHEET_TITLE_LEN)
        .collect();
    let title = title.trim_matches(edge);

    if title.is_empty() {
        DEFAULT_SHEET_TITLE.to_string()
    } else {
        title.to_string()
    }
}

/// Plain decimal that survives a round-trip through an Excel number
fn is_numeric(value: &str) -> bool {
    let unsigned = value.strip_prefix('-').unwrap_or(value);
    let (int, frac) = match unsigned.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (unsigned, None),
    };

    let int_ok = !int.is_empty()
        && int.bytes().all(|b| b.is_ascii_digit())
        && (int == "0" || !int.starts_with('0'));
    let frac_ok = frac.map_or(true, |f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()));
    let digits = int.len() + frac.map_or(0, str::len);

    int_ok && frac_ok && digits <= MAX_NUMERIC_DIGITS
}

/// Workbook that streams one worksheet straight into the ZIP compressor
struct XlsxWorkbook {
    zip: ZipWriter<BufWriter<File>>,
    options: SimpleFileOptions,
    current_row: u32,
    columns: usize,
    xml_buffer: Vec<u8>,
}

impl XlsxWorkbook {
    fn create(path: &Path, compression_level: u32) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::with_capacity(64 * 1024, file);

        let options = if compression_level == 0 {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(i64::from(compression_level)))
        };

        Ok(XlsxWorkbook {
            zip: ZipWriter::new(writer),
            options,
            current_row: 0,
            columns: 0,
            xml_buffer: Vec::with_capacity(4096),
        })
    }

    fn start_sheet(
        &mut self,
        sheet: &SheetOptions,
        widths: &BTreeMap<usize, f64>,
        columns: usize,
        rows: usize,
    ) -> Result<()> {
        self.columns = columns;
        self.zip.start_file("xl/worksheets/sheet1.xml", self.options)?;

        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
        );

        xml.push_str("<dimension ref=\"");
        xml.push_str(&range_ref(columns, rows));
        xml.push_str("\"/>");

        if sheet.freeze_header {
            xml.push_str(
                r#"<sheetViews><sheetView workbookViewId="0"><pane ySplit="1" topLeftCell="A2" activePane="bottomLeft" state="frozen"/><selection pane="bottomLeft"/></sheetView></sheetViews>"#,
            );
        }

        if !widths.is_empty() {
            xml.push_str("<cols>");
            for (&column, width) in widths {
                xml.push_str(&format!(
                    r#"<col min="{0}" max="{0}" width="{1}" customWidth="1"/>"#,
                    column + 1,
                    width
                ));
            }
            xml.push_str("</cols>");
        }

        xml.push_str("<sheetData>");
        self.zip.write_all(xml.as_bytes())?;
        Ok(())
    }

    fn write_row<'v, I>(&mut self, values: I, style: u32, policy: CellTypePolicy) -> Result<()>
    where
        I: IntoIterator<Item = &'v str>,
    {
        self.current_row += 1;

        self.xml_buffer.clear();
        self.xml_buffer.extend_from_slice(b"<row r=\"");

        let mut num_buffer = itoa::Buffer::new();
        self.xml_buffer
            .extend_from_slice(num_buffer.format(self.current_row).as_bytes());
        self.xml_buffer.extend_from_slice(b"\">");

        for (col_idx, value) in values.into_iter().enumerate() {
            self.xml_buffer.extend_from_slice(b"<c r=\"");
            push_column_letter(&mut self.xml_buffer, col_idx as u32 + 1);
            self.xml_buffer
                .extend_from_slice(num_buffer.format(self.current_row).as_bytes());
            self.xml_buffer.push(b'"');

            let cell_style = match policy {
                CellTypePolicy::ForceText => style,
                CellTypePolicy::Infer => STYLE_DEFAULT,
            };
            if cell_style != STYLE_DEFAULT {
                self.xml_buffer.extend_from_slice(b" s=\"");
                self.xml_buffer
                    .extend_from_slice(num_buffer.format(cell_style).as_bytes());
                self.xml_buffer.push(b'"');
            }

            if value.is_empty() {
                self.xml_buffer.extend_from_slice(b"/>");
            } else if policy == CellTypePolicy::Infer && is_numeric(value) {
                self.xml_buffer.extend_from_slice(b" t=\"n\"><v>");
                self.xml_buffer.extend_from_slice(value.as_bytes());
                self.xml_buffer.extend_from_slice(b"</v></c>");
            } else {
                self.xml_buffer.extend_from_slice(b" t=\"inlineStr\"><is>");
                if value.starts_with(char::is_whitespace) || value.ends_with(char::is_whitespace) {
                    self.xml_buffer
                        .extend_from_slice(b"<t xml:space=\"preserve\">");
                } else {
                    self.xml_buffer.extend_from_slice(b"<t>");
                }
                write_escaped(&mut self.xml_buffer, value);
                self.xml_buffer.extend_from_slice(b"</t></is></c>");
            }
        }

        self.xml_buffer.extend_from_slice(b"</row>");
        self.zip.write_all(&self.xml_buffer)?;
        Ok(())
    }

    fn finish_sheet(&mut self, sheet: &SheetOptions) -> Result<()> {
        let mut xml = String::from("</sheetData>");
        if sheet.auto_filter && self.columns > 0 {
            xml.push_str("<autoFilter ref=\"");
            xml.push_str(&range_ref(self.columns, self.current_row as usize));
            xml.push_str("\"/>");
        }
        xml.push_str("</worksheet>");
        self.zip.write_all(xml.as_bytes())?;
        Ok(())
    }

    fn close(mut self, title: &str) -> Result<()> {
        self.write_entry("[Content_Types].xml", CONTENT_TYPES)?;
        self.write_entry("_rels/.rels", ROOT_RELS)?;
        self.write_workbook(title)?;
        self.write_entry("xl/_rels/workbook.xml.rels", WORKBOOK_RELS)?;
        self.write_entry("xl/styles.xml", STYLES)?;
        self.write_entry("xl/sharedStrings.xml", SHARED_STRINGS)?;
        self.write_entry("docProps/app.xml", APP_PROPS)?;
        self.write_core_props()?;

        let mut file = self.zip.finish()?;
        file.flush()?;
        Ok(())
    }

    fn write_entry(&mut self, name: &str, xml: &str) -> Result<()> {
        self.zip.start_file(name, self.options)?;
        self.zip.write_all(xml.as_bytes())?;
        Ok(())
    }

    fn write_workbook(&mut self, title: &str) -> Result<()> {
        let mut escaped = Vec::with_capacity(title.len());
        write_escaped(&mut escaped, title);
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>
<sheet name="{}" sheetId="1" r:id="rId1"/>
</sheets>
</workbook>"#,
            String::from_utf8_lossy(&escaped)
        );
        self.write_entry("xl/workbook.xml", &xml)
    }

    fn write_core_props(&mut self) -> Result<()> {
        let now = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<dc:creator>gridexport</dc:creator>
<dcterms:created xsi:type="dcterms:W3CDTF">{now}</dcterms:created>
<dcterms:modified xsi:type="dcterms:W3CDTF">{now}</dcterms:modified>
</cp:coreProperties>"#
        );
        self.write_entry("docProps/core.xml", &xml)
    }
}

/// `A1:C10` style range, or `A1` for an empty sheet
fn range_ref(columns: usize, rows: usize) -> String {
    if columns == 0 {
        return "A1".to_string();
    }
    let mut buffer = b"A1:".to_vec();
    push_column_letter(&mut buffer, columns as u32);
    buffer.extend_from_slice(itoa::Buffer::new().format(rows.max(1)).as_bytes());
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Append the column letters for 1-based column `n` (1 = A, 27 = AA)
fn push_column_letter(buffer: &mut Vec<u8>, mut n: u32) {
    let mut tmp = [0u8; 10];
    let mut len = 0;
    while n > 0 {
        let rem = (n - 1) % 26;
        tmp[len] = b'A' + rem as u8;
        len += 1;
        n = (n - 1) / 26;
    }
    buffer.extend(tmp[..len].iter().rev());
}

/// XML-escape `s`, dropping characters XML 1.0 cannot carry
fn write_escaped(buffer: &mut Vec<u8>, s: &str) {
    for c in s.chars() {
        match c {
            '&' => buffer.extend_from_slice(b"&amp;"),
            '<' => buffer.extend_from_slice(b"&lt;"),
            '>' => buffer.extend_from_slice(b"&gt;"),
            '"' => buffer.extend_from_slice(b"&quot;"),
            '\'' => buffer.extend_from_slice(b"&apos;"),
            '\t' | '\n' | '\r' => buffer.push(c as u8),
            c if c < ' ' || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            _ => {
                let mut buf = [0; 4];
                buffer.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
<Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>
</Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>
</Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#;

// Style 1 is the builtin text format "@" (numFmtId 49); style 2 adds bold.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="2">
<font><sz val="11"/><name val="Calibri"/></font>
<font><b/><sz val="11"/><name val="Calibri"/></font>
</fonts>
<fills count="2">
<fill><patternFill patternType="none"/></fill>
<fill><patternFill patternType="gray125"/></fill>
</fills>
<borders count="1">
<border><left/><right/><top/><bottom/><diagonal/></border>
</borders>
<cellStyleXfs count="1">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
</cellStyleXfs>
<cellXfs count="3">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
<xf numFmtId="49" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
<xf numFmtId="49" fontId="1" fillId="0" borderId="0" xfId="0" applyNumberFormat="1" applyFont="1"/>
</cellXfs>
<cellStyles count="1">
<cellStyle name="Normal" xfId="0" builtinId="0"/>
</cellStyles>
</styleSheet>"#;

const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="0" uniqueCount="0"/>
"#;

const APP_PROPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">
<Application>gridexport</Application>
</Properties>"#;
