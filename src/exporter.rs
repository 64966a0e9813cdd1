//! Grid export driver
//!
//! [`GridExporter`] runs one export as a small state machine:
//!
//! ```text
//! Idle -> ColumnsResolved -> Streaming -> Finalized
//! ```
//!
//! Columns are resolved once and cached. Records are pulled from the grid
//! in chunks; each chunk is materialized and appended before the next one
//! is requested. The finished rows are handed to a [`SpreadsheetSink`],
//! which commits the file.

use crate::columns::{ColumnResolver, ExclusionSet};
use crate::config::{with_default_extension, ExportConfig, DEFAULT_FILE_NAME};
use crate::error::{ExportError, Result};
use crate::events::{EventContext, ExportEvent, RegisteredEvents, SheetOptions};
use crate::grid::GridSource;
use crate::materialize::materialize;
use crate::registry::{Exporter, ExporterRegistry};
use crate::sink::{sink_for, ExportArtifact, SpreadsheetFormat, SpreadsheetSink, WriteRequest};
use crate::types::{Headings, OutputRow, SourceRecord};
use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where an exporter is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    /// Nothing resolved yet
    Idle,
    /// Columns resolved and frozen
    ColumnsResolved,
    /// Records are being materialized
    Streaming,
    /// The file was committed
    Finalized,
}

/// Exports a grid's visible columns to a spreadsheet file
///
/// # Examples
///
/// ```no_run
/// use gridexport::exporter::GridExporter;
/// use gridexport::grid::MemoryGrid;
/// use gridexport::types::record;
///
/// let grid = MemoryGrid::new()
///     .column("name", "Name")
///     .column("email", "Email")
///     .record(record([("name", "Ann"), ("email", "ann@example.com")]));
///
/// let mut exporter = GridExporter::new();
/// exporter.set_file_name("users").set_exclusion("email");
///
/// let artifact = exporter.export(&grid)?;
/// println!("{} ({} rows)", artifact.path.display(), artifact.row_count);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct GridExporter {
    config: ExportConfig,
    exclusions: ExclusionSet,
    events: RegisteredEvents,
    resolver: ColumnResolver,
    state: ExportState,
    sink: Option<Box<dyn SpreadsheetSink>>,
}

impl GridExporter {
    /// Create an exporter with the default configuration
    pub fn new() -> Self {
        Self::with_config(ExportConfig::default())
    }

    /// Create an exporter with `config`
    pub fn with_config(mut config: ExportConfig) -> Self {
        config.file_name = with_default_extension(&config.file_name);
        GridExporter {
            config,
            exclusions: ExclusionSet::new(),
            events: RegisteredEvents::new(),
            resolver: ColumnResolver::new(),
            state: ExportState::Idle,
            sink: None,
        }
    }

    /// Write through `sink` instead of picking one from the file extension
    pub fn with_sink<S: SpreadsheetSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Current configuration
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Set the download file name; `.xlsx` is appended when it has no
    /// extension
    pub fn set_file_name(&mut self, name: &str) -> &mut Self {
        self.config.file_name = with_default_extension(name);
        self
    }

    /// Download file name
    pub fn file_name(&self) -> &str {
        &self.config.file_name
    }

    /// Add excluded column keys. Ignored once columns are resolved.
    pub fn set_exclusions<I, S>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.columns_frozen() {
            return self;
        }
        self.exclusions.extend(keys);
        self
    }

    /// Add one excluded column key. Ignored once columns are resolved.
    pub fn set_exclusion(&mut self, key: impl Into<String>) -> &mut Self {
        if self.columns_frozen() {
            return self;
        }
        self.exclusions.insert(key);
        self
    }

    /// Excluded keys as given
    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    /// Replace the registered event handlers
    pub fn set_registered_events(&mut self, events: RegisteredEvents) -> &mut Self {
        self.events = events;
        self
    }

    /// Registered event handlers
    pub fn registered_events(&self) -> &RegisteredEvents {
        &self.events
    }

    /// Current state
    pub fn state(&self) -> ExportState {
        self.state
    }

    /// Resolved headings, resolving them on first call
    pub fn headings(&mut self, grid: &dyn GridSource) -> &Headings {
        let headings = resolve(&mut self.resolver, &self.exclusions, grid);
        if self.state == ExportState::Idle {
            self.state = ExportState::ColumnsResolved;
        }
        headings
    }

    /// Materialize every record of `grid` into output rows
    pub fn collection(&mut self, grid: &dyn GridSource) -> Result<Vec<OutputRow>> {
        self.ensure_active("collect rows")?;

        let headings = resolve(&mut self.resolver, &self.exclusions, grid);
        self.state = ExportState::Streaming;

        let transforms = grid.column_transforms();
        let mut rows = Vec::new();
        let mut chunks = 0usize;
        grid.for_each_chunk(self.config.chunk_size, &mut |batch: Vec<SourceRecord>| {
            chunks += 1;
            debug!(chunk = chunks, records = batch.len(), "Materializing chunk");
            rows.extend(materialize(batch, transforms, headings));
            Ok(())
        })?;

        Ok(rows)
    }

    /// Export every record of `grid` and commit the file.
    ///
    /// Fails with [`ExportError::UnsupportedFormat`] before any record is
    /// read when the file extension has no built-in sink.
    pub fn export(&mut self, grid: &dyn GridSource) -> Result<ExportArtifact> {
        self.ensure_active("export")?;

        let file_name = download_name(&self.config.file_name);
        if self.sink.is_none() {
            SpreadsheetFormat::from_file_name(&file_name)?;
        }

        let headings: Vec<String> = self.headings(grid).values().cloned().collect();
        let mut sheet = SheetOptions::new(self.config.sheet_title.clone());
        self.events.dispatch(&mut EventContext {
            event: ExportEvent::BeforeExport,
            file_name: &file_name,
            headings: &headings,
            row_count: 0,
            sheet: &mut sheet,
        })?;

        let rows = self.collection(grid)?;
        let path = target_path(&self.config.output_dir, &file_name);
        let request = WriteRequest {
            path: &path,
            file_name: &file_name,
            headings,
            rows: &rows,
            auto_size: self.config.auto_size,
            cell_type: self.config.cell_type,
            sheet,
        };

        let artifact = match &self.sink {
            Some(sink) => sink.write(request, &self.events)?,
            None => sink_for(SpreadsheetFormat::from_file_name(&file_name)?, &self.config)
                .write(request, &self.events)?,
        };

        self.state = ExportState::Finalized;
        info!(
            file = %artifact.file_name,
            path = %artifact.path.display(),
            rows = artifact.row_count,
            bytes = artifact.bytes,
            "Export committed"
        );
        Ok(artifact)
    }

    /// Return to `Idle`, keeping configuration, exclusions and events
    pub fn reset(&mut self) -> &mut Self {
        self.resolver.clear();
        self.state = ExportState::Idle;
        self
    }

    /// The `GridExporter` attached to `grid`, if the attached exporter is one
    pub fn get<'r>(
        registry: &'r mut ExporterRegistry,
        grid: &dyn GridSource,
    ) -> Option<&'r mut GridExporter> {
        registry
            .get_mut(grid.id())?
            .as_any_mut()
            .downcast_mut::<GridExporter>()
    }

    fn columns_frozen(&self) -> bool {
        if self.resolver.is_resolved() {
            warn!("Columns already resolved; exclusion ignored until reset");
            return true;
        }
        false
    }

    fn ensure_active(&self, operation: &str) -> Result<()> {
        if self.state == ExportState::Finalized {
            return Err(ExportError::InvalidState(format!(
                "cannot {} after the export was finalized; call reset() first",
                operation
            )));
        }
        Ok(())
    }
}

fn resolve<'r>(
    resolver: &'r mut ColumnResolver,
    exclusions: &ExclusionSet,
    grid: &dyn GridSource,
) -> &'r Headings {
    if resolver.is_resolved() {
        return resolver.resolve(&[], exclusions);
    }
    resolver.resolve(&grid.visible_columns(), exclusions)
}

/// Final path component of a configured file name
fn download_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
}

impl Default for GridExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter for GridExporter {
    fn export(&mut self, grid: &dyn GridSource) -> Result<ExportArtifact> {
        GridExporter::export(self, grid)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl fmt::Debug for GridExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridExporter")
            .field("config", &self.config)
            .field("exclusions", &self.exclusions)
            .field("events", &self.events)
            .field("state", &self.state)
            .field("custom_sink", &self.sink.is_some())
            .finish()
    }
}

/// Output location for `file_name` under `dir`
pub fn target_path(dir: &Path, file_name: &str) -> PathBuf {
    dir.join(download_name(file_name))
}
