//! # gridexport
//!
//! Export the visible columns of a data grid to XLSX or CSV files.
//!
//! ## Features
//!
//! - **Column resolution**: Visible columns minus an exclusion list, matched by snake-cased key
//! - **Chunked reads**: Records are pulled from the grid in fixed-size chunks
//! - **Column transforms**: Display callbacks rewrite fields before export, with dotted-path support
//! - **Sanitized cells**: HTML tags stripped, entities decoded, `&nbsp;` removed
//! - **Text-safe XLSX**: Cells are written as text by default, so `00123` stays `00123`
//! - **Events**: Hooks before export, around the sheet and before the file is committed
//! - **Atomic commit**: Files are written to a partial path and renamed when complete
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridexport::{GridExporter, MemoryGrid};
//! use gridexport::types::record;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let grid = MemoryGrid::new()
//!     .column("name", "Name")
//!     .column("bio", "Bio")
//!     .column("zip", "Zip")
//!     .display("bio", |value, _record| {
//!         format!("<b>{}</b>", value).into()
//!     })
//!     .record(record([("name", "Ann"), ("bio", "Hi &amp; bye"), ("zip", "00123")]));
//!
//! let mut exporter = GridExporter::new();
//! exporter.set_file_name("people.xlsx").set_exclusion("bio");
//!
//! let artifact = exporter.export(&grid)?;
//! println!("Wrote {} rows to {}", artifact.row_count, artifact.path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ### Events
//!
//! ```rust,no_run
//! use gridexport::{ExportEvent, GridExporter, MemoryGrid, RegisteredEvents};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let events = RegisteredEvents::new()
//!     .on(ExportEvent::BeforeSheet, |ctx| {
//!         ctx.sheet.freeze_header = true;
//!         ctx.sheet.auto_filter = true;
//!         Ok(())
//!     });
//!
//! let mut exporter = GridExporter::new();
//! exporter.set_registered_events(events);
//! exporter.export(&MemoryGrid::new().column("name", "Name"))?;
//! # Ok(())
//! # }
//! ```

pub mod columns;
pub mod config;
pub mod error;
pub mod events;
pub mod exporter;
pub mod grid;
pub mod materialize;
pub mod path;
pub mod reader;
pub mod registry;
pub mod sanitize;
pub mod sink;
pub mod types;

pub use columns::{ColumnResolver, ExclusionSet};
pub use config::{ExportConfig, ExportConfigBuilder};
pub use error::{ExportError, Result};
pub use events::{EventContext, ExportEvent, RegisteredEvents, SheetOptions};
pub use exporter::{ExportState, GridExporter};
pub use grid::{ColumnTransform, DisplayColumn, GridId, GridSource, MemoryGrid};
pub use reader::SheetReader;
pub use registry::{Exporter, ExporterRegistry};
pub use sink::{CellTypePolicy, ExportArtifact, SpreadsheetFormat, SpreadsheetSink};
pub use types::{ColumnSpec, Headings, OutputRow, SourceRecord, Value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_imports() {
        // Test that all public types are accessible
        let _ = std::marker::PhantomData::<ExportError>;
        let _ = std::marker::PhantomData::<GridExporter>;
        let _ = std::marker::PhantomData::<SheetReader>;
        let _ = std::marker::PhantomData::<ExporterRegistry>;
    }
}
