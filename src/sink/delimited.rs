//! CSV sink

use super::{write_atomically, ExportArtifact, SpreadsheetFormat, SpreadsheetSink, WriteRequest};
use crate::error::Result;
use crate::events::{ExportEvent, RegisteredEvents};
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Writes comma-separated (or custom-delimited) text.
///
/// Sheet layout options have no CSV counterpart and are ignored; the cell
/// type policy does not apply since every CSV field is text.
#[derive(Debug, Clone)]
pub struct CsvSink {
    delimiter: u8,
    utf8_bom: bool,
}

impl CsvSink {
    /// Comma-delimited sink without a byte order mark
    pub fn new() -> Self {
        CsvSink {
            delimiter: b',',
            utf8_bom: false,
        }
    }

    /// Use a different field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Start the file with a UTF-8 byte order mark, which Excel needs to
    /// detect the encoding
    pub fn with_utf8_bom(mut self, enabled: bool) -> Self {
        self.utf8_bom = enabled;
        self
    }
}

impl Default for CsvSink {
    fn default() -> Self {
        Self::new()
    }
}

impl SpreadsheetSink for CsvSink {
    fn write(
        &self,
        mut request: WriteRequest<'_>,
        events: &RegisteredEvents,
    ) -> Result<ExportArtifact> {
        let target = request.path;

        let bytes = write_atomically(target, |partial| {
            let mut file = BufWriter::new(File::create(partial)?);
            if self.utf8_bom {
                file.write_all(UTF8_BOM)?;
            }

            let mut writer = csv::WriterBuilder::new()
                .delimiter(self.delimiter)
                .flexible(true)
                .from_writer(file);

            request.fire(events, ExportEvent::BeforeSheet)?;
            writer.write_record(&request.headings)?;
            for row in request.rows {
                writer.write_record(row.values())?;
            }
            request.fire(events, ExportEvent::AfterSheet)?;
            request.fire(events, ExportEvent::BeforeWriting)?;

            writer.flush()?;
            Ok(())
        })?;

        debug!(
            file = request.file_name,
            rows = request.rows.len(),
            bytes,
            "Wrote CSV export"
        );

        Ok(ExportArtifact {
            path: target.to_path_buf(),
            file_name: request.file_name.to_string(),
            format: SpreadsheetFormat::Csv,
            row_count: request.rows.len(),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SheetOptions;
    use crate::sink::CellTypePolicy;
    use crate::types::OutputRow;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn request<'a>(path: &'a Path, rows: &'a [OutputRow]) -> WriteRequest<'a> {
        WriteRequest {
            path,
            file_name: "users.csv",
            headings: vec!["Name".to_string(), "Bio".to_string()],
            rows,
            auto_size: true,
            cell_type: CellTypePolicy::ForceText,
            sheet: SheetOptions::default(),
        }
    }

    #[test]
    fn test_writes_headings_and_quoted_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.csv");
        let rows: Vec<OutputRow> = vec![
            [("Name", "Ann"), ("Bio", "likes, commas")].into_iter().collect(),
            [("Name", "00123"), ("Bio", "")].into_iter().collect(),
        ];

        let artifact = CsvSink::new()
            .write(request(&path, &rows), &RegisteredEvents::new())
            .unwrap();

        assert_eq!(artifact.row_count, 2);
        assert_eq!(artifact.content_type(), "text/csv");
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Name,Bio\nAnn,\"likes, commas\"\n00123,\n"
        );
    }

    #[test]
    fn test_delimiter_and_bom() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.csv");
        let rows: Vec<OutputRow> = vec![[("Name", "Ann"), ("Bio", "x")].into_iter().collect()];

        CsvSink::new()
            .with_delimiter(b';')
            .with_utf8_bom(true)
            .write(request(&path, &rows), &RegisteredEvents::new())
            .unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        assert_eq!(&bytes[UTF8_BOM.len()..], b"Name;Bio\nAnn;x\n");
    }

    #[test]
    fn test_events_fire_in_order() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.csv");
        let seen = Rc::new(RefCell::new(Vec::new()));

        let mut events = RegisteredEvents::new();
        for event in [
            ExportEvent::BeforeWriting,
            ExportEvent::AfterSheet,
            ExportEvent::BeforeSheet,
        ] {
            let seen = Rc::clone(&seen);
            events.insert(event, move |ctx| {
                seen.borrow_mut().push(ctx.event);
                Ok(())
            });
        }

        CsvSink::new().write(request(&path, &[]), &events).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                ExportEvent::BeforeSheet,
                ExportEvent::AfterSheet,
                ExportEvent::BeforeWriting
            ]
        );
    }
}
