//! Spreadsheet sinks
//!
//! A sink turns the heading row and the materialized rows into a file. Every
//! sink writes to a hidden `.<name>.partial` file beside the target and only
//! renames it into place once the whole document is written, so a failed
//! export never leaves a truncated artifact behind.

mod delimited;
mod xlsx;

pub use delimited::CsvSink;
pub use xlsx::{sheet_title, XlsxSink, MAX_COLUMNS, MAX_ROWS};

use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::events::{EventContext, ExportEvent, RegisteredEvents, SheetOptions};
use crate::types::OutputRow;
use std::fs;
use std::path::{Path, PathBuf};

/// How cell values are typed in the written sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellTypePolicy {
    /// Every cell is text, so `00123` keeps its leading zeros
    #[default]
    ForceText,
    /// Numeric-looking values are written as numbers
    Infer,
}

/// Output file format, chosen from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpreadsheetFormat {
    /// Office Open XML workbook
    Xlsx,
    /// Comma-separated values
    Csv,
}

impl SpreadsheetFormat {
    /// Detect the format from a file name's extension, ignoring case
    pub fn from_file_name(name: &str) -> Result<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        match extension.to_ascii_lowercase().as_str() {
            "xlsx" => Ok(SpreadsheetFormat::Xlsx),
            "csv" => Ok(SpreadsheetFormat::Csv),
            _ => Err(ExportError::UnsupportedFormat(format!(
                "'{}' (supported: xlsx, csv)",
                name
            ))),
        }
    }

    /// Canonical file extension
    pub fn extension(self) -> &'static str {
        match self {
            SpreadsheetFormat::Xlsx => "xlsx",
            SpreadsheetFormat::Csv => "csv",
        }
    }

    /// MIME type for downloads
    pub fn content_type(self) -> &'static str {
        match self {
            SpreadsheetFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            SpreadsheetFormat::Csv => "text/csv",
        }
    }
}

/// Everything a sink needs to write one document
#[derive(Debug)]
pub struct WriteRequest<'a> {
    /// Final location of the file
    pub path: &'a Path,
    /// Download file name
    pub file_name: &'a str,
    /// Heading labels, one per column
    pub headings: Vec<String>,
    /// Data rows, each with one cell per heading
    pub rows: &'a [OutputRow],
    /// Size columns to their content
    pub auto_size: bool,
    /// How cell values are typed
    pub cell_type: CellTypePolicy,
    /// Sheet layout, adjustable by event handlers
    pub sheet: SheetOptions,
}

impl WriteRequest<'_> {
    /// Dispatch `event` with a context borrowing this request
    pub fn fire(&mut self, events: &RegisteredEvents, event: ExportEvent) -> Result<()> {
        let mut context = EventContext {
            event,
            file_name: self.file_name,
            headings: &self.headings,
            row_count: self.rows.len(),
            sheet: &mut self.sheet,
        };
        events.dispatch(&mut context)
    }
}

/// A committed export file
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    /// Where the file was written
    pub path: PathBuf,
    /// Download file name
    pub file_name: String,
    /// Format of the file
    pub format: SpreadsheetFormat,
    /// Number of data rows, excluding the heading row
    pub row_count: usize,
    /// File size in bytes
    pub bytes: u64,
}

impl ExportArtifact {
    /// MIME type of the file
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// `Content-Disposition` header value for serving the file as a download
    pub fn content_disposition(&self) -> String {
        let name = self.file_name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("attachment; filename=\"{}\"", name)
    }
}

/// Writes a complete document for one export
pub trait SpreadsheetSink {
    /// Write the document described by `request`, firing `BeforeSheet`,
    /// `AfterSheet` and `BeforeWriting` on the way.
    fn write(&self, request: WriteRequest<'_>, events: &RegisteredEvents)
        -> Result<ExportArtifact>;
}

/// Built-in sink for `format`
pub fn sink_for(format: SpreadsheetFormat, config: &ExportConfig) -> Box<dyn SpreadsheetSink> {
    match format {
        SpreadsheetFormat::Xlsx => Box::new(XlsxSink::new(config.compression_level)),
        SpreadsheetFormat::Csv => Box::new(CsvSink::new()),
    }
}

/// Hidden sibling path a document is written to before commit
pub fn partial_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.partial", name))
}

/// Run `write` against the partial path, then rename it onto `target`.
///
/// On failure the partial file is removed and `target` is left untouched.
/// Returns the committed file size.
pub(crate) fn write_atomically<F>(target: &Path, write: F) -> Result<u64>
where
    F: FnOnce(&Path) -> Result<()>,
{
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let partial = partial_path(target);
    let committed = write(&partial)
        .and_then(|()| Ok(fs::metadata(&partial)?.len()))
        .and_then(|bytes| {
            fs::rename(&partial, target)?;
            Ok(bytes)
        });

    if committed.is_err() {
        // Best effort
        let _ = fs::remove_file(&partial);
    }
    committed
}

/// Widest row, counting the heading row
pub(crate) fn column_count(headings: &[String], rows: &[OutputRow]) -> usize {
    rows.iter().map(OutputRow::len).fold(headings.len(), usize::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_from_file_name() {
        assert_eq!(SpreadsheetFormat::from_file_name("a.xlsx").unwrap(), SpreadsheetFormat::Xlsx);
        assert_eq!(SpreadsheetFormat::from_file_name("A.CSV").unwrap(), SpreadsheetFormat::Csv);
        assert!(matches!(
            SpreadsheetFormat::from_file_name("a.pdf"),
            Err(ExportError::UnsupportedFormat(_))
        ));
        assert!(SpreadsheetFormat::from_file_name("noext").is_err());
    }

    #[test]
    fn test_content_disposition_escapes_quotes() {
        let artifact = ExportArtifact {
            path: PathBuf::from("/tmp/x.xlsx"),
            file_name: "q\"uote.xlsx".to_string(),
            format: SpreadsheetFormat::Xlsx,
            row_count: 0,
            bytes: 0,
        };
        assert_eq!(
            artifact.content_disposition(),
            "attachment; filename=\"q\\\"uote.xlsx\""
        );
        assert_eq!(artifact.content_type(), SpreadsheetFormat::Xlsx.content_type());
    }

    #[test]
    fn test_partial_path_is_hidden_sibling() {
        let partial = partial_path(Path::new("/srv/out/users.xlsx"));
        assert_eq!(partial, PathBuf::from("/srv/out/.users.xlsx.partial"));
    }

    #[test]
    fn test_write_atomically_commits() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("out.csv");

        let bytes = write_atomically(&target, |partial| {
            fs::write(partial, b"a,b\n")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(bytes, 4);
        assert_eq!(fs::read(&target).unwrap(), b"a,b\n");
        assert!(!partial_path(&target).exists());
    }

    #[test]
    fn test_write_atomically_discards_on_error() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.csv");
        fs::write(&target, b"previous").unwrap();

        let result = write_atomically(&target, |partial| {
            fs::write(partial, b"half")?;
            Err(ExportError::WriteError("disk on fire".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(fs::read(&target).unwrap(), b"previous");
        assert!(!partial_path(&target).exists());
    }
}
