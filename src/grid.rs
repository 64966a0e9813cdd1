//! Grid source abstraction
//!
//! The exporter never owns a grid. Hosts implement [`GridSource`] over their
//! own tables and models; [`MemoryGrid`] covers in-memory data.

use crate::error::Result;
use crate::path;
use crate::types::{ColumnSpec, SourceRecord, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a grid instance, used to find its attached exporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridId(u64);

impl GridId {
    /// Wrap a host-assigned identifier
    pub const fn new(raw: u64) -> Self {
        GridId(raw)
    }

    /// Allocate a process-unique identifier
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1 << 32);
        GridId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identifier
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Rewrites a batch of records before export.
///
/// Transforms receive the batch as rewritten by earlier transforms, plus the
/// untouched batch as it came from the source. Any
/// `Fn(Vec<SourceRecord>) -> Vec<SourceRecord>` closure is a transform.
pub trait ColumnTransform {
    /// Rewrite `records`; `originals[i]` is the source form of `records[i]`
    fn fill(&self, records: Vec<SourceRecord>, originals: &[SourceRecord]) -> Vec<SourceRecord>;
}

impl<F> ColumnTransform for F
where
    F: Fn(Vec<SourceRecord>) -> Vec<SourceRecord>,
{
    fn fill(&self, records: Vec<SourceRecord>, _originals: &[SourceRecord]) -> Vec<SourceRecord> {
        self(records)
    }
}

/// Display callback for a single column.
///
/// The callback gets the field's current value and the original record, and
/// its result replaces the field. Dotted keys write into nested maps.
pub struct DisplayColumn<F> {
    key: String,
    callback: F,
}

impl<F> DisplayColumn<F>
where
    F: Fn(&Value, &SourceRecord) -> Value,
{
    /// Create a display transform for `key`
    pub fn new(key: impl Into<String>, callback: F) -> Self {
        DisplayColumn {
            key: key.into(),
            callback,
        }
    }
}

impl<F> ColumnTransform for DisplayColumn<F>
where
    F: Fn(&Value, &SourceRecord) -> Value,
{
    fn fill(&self, mut records: Vec<SourceRecord>, originals: &[SourceRecord]) -> Vec<SourceRecord> {
        let segments = path::segments(&self.key);
        for (i, record) in records.iter_mut().enumerate() {
            let value = {
                let current = path::get(record, &segments).cloned().unwrap_or_default();
                let original = originals.get(i).unwrap_or(&*record);
                (self.callback)(&current, original)
            };
            path::set(record, &self.key, value);
        }
        records
    }
}

/// A tabular view the exporter reads from
pub trait GridSource {
    /// Identity used by the exporter registry
    fn id(&self) -> GridId;

    /// Currently visible columns in display order
    fn visible_columns(&self) -> Vec<ColumnSpec>;

    /// Column transforms, applied in order to every chunk
    fn column_transforms(&self) -> &[Box<dyn ColumnTransform>];

    /// Feed all records to `callback` in chunks of at most `chunk_size`.
    ///
    /// Stops at and returns the first callback error.
    fn for_each_chunk(
        &self,
        chunk_size: usize,
        callback: &mut dyn FnMut(Vec<SourceRecord>) -> Result<()>,
    ) -> Result<()>;
}

/// In-memory grid
///
/// # Examples
///
/// ```
/// use gridexport::grid::{GridSource, MemoryGrid};
/// use gridexport::types::record;
///
/// let grid = MemoryGrid::new()
///     .column("name", "Name")
///     .hidden_column("secret", "Secret")
///     .record(record([("name", "Ann"), ("secret", "x")]));
///
/// assert_eq!(grid.visible_columns().len(), 1);
/// ```
pub struct MemoryGrid {
    id: GridId,
    columns: Vec<(ColumnSpec, bool)>,
    transforms: Vec<Box<dyn ColumnTransform>>,
    records: Vec<SourceRecord>,
}

impl MemoryGrid {
    /// Create an empty grid with a fresh identity
    pub fn new() -> Self {
        Self::with_id(GridId::next())
    }

    /// Create an empty grid with a host-assigned identity
    pub fn with_id(id: GridId) -> Self {
        MemoryGrid {
            id,
            columns: Vec::new(),
            transforms: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Add a visible column
    pub fn column(mut self, key: impl Into<String>, label: impl Into<String>) -> Self {
        self.columns.push((ColumnSpec::new(key, label), true));
        self
    }

    /// Add a column that is configured but not shown
    pub fn hidden_column(mut self, key: impl Into<String>, label: impl Into<String>) -> Self {
        self.columns.push((ColumnSpec::new(key, label), false));
        self
    }

    /// Add a batch transform
    pub fn transform<T: ColumnTransform + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Add a display callback for one column
    pub fn display<F>(self, key: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&Value, &SourceRecord) -> Value + 'static,
    {
        self.transform(DisplayColumn::new(key, callback))
    }

    /// Append one record
    pub fn record(mut self, record: SourceRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Append many records
    pub fn records<I: IntoIterator<Item = SourceRecord>>(mut self, records: I) -> Self {
        self.records.extend(records);
        self
    }

    /// Get number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the grid has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for MemoryGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl GridSource for MemoryGrid {
    fn id(&self) -> GridId {
        self.id
    }

    fn visible_columns(&self) -> Vec<ColumnSpec> {
        self.columns
            .iter()
            .filter(|(_, visible)| *visible)
            .map(|(spec, _)| spec.clone())
            .collect()
    }

    fn column_transforms(&self) -> &[Box<dyn ColumnTransform>] {
        &self.transforms
    }

    fn for_each_chunk(
        &self,
        chunk_size: usize,
        callback: &mut dyn FnMut(Vec<SourceRecord>) -> Result<()>,
    ) -> Result<()> {
        for chunk in self.records.chunks(chunk_size.max(1)) {
            callback(chunk.to_vec())?;
        }
        Ok(())
    }
}
