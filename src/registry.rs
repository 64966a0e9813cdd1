//! Exporters attached to grids
//!
//! A host keeps one registry and attaches an exporter to each grid that can
//! be exported. Lookups go by [`GridId`], and [`GridExporter::get`]
//! downcasts the attached exporter back to its concrete type.
//!
//! [`GridExporter::get`]: crate::exporter::GridExporter::get

use crate::error::{ExportError, Result};
use crate::grid::{GridId, GridSource};
use crate::sink::ExportArtifact;
use std::any::Any;
use std::collections::HashMap;
use tracing::debug;

/// An exporter that can be attached to a grid
pub trait Exporter: Any {
    /// Export every record of `grid`
    fn export(&mut self, grid: &dyn GridSource) -> Result<ExportArtifact>;

    /// Upcast for downcasting to the concrete exporter
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete exporter
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Exporters keyed by the grid they belong to
#[derive(Default)]
pub struct ExporterRegistry {
    exporters: HashMap<GridId, Box<dyn Exporter>>,
}

impl ExporterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `exporter` to `grid`, returning the exporter it replaces
    pub fn attach<E: Exporter>(&mut self, grid: GridId, exporter: E) -> Option<Box<dyn Exporter>> {
        debug!(grid = grid.get(), "Attaching exporter");
        self.exporters.insert(grid, Box::new(exporter))
    }

    /// Exporter attached to `grid`
    pub fn get(&self, grid: GridId) -> Option<&dyn Exporter> {
        self.exporters.get(&grid).map(|exporter| &**exporter)
    }

    /// Mutable exporter attached to `grid`
    pub fn get_mut(&mut self, grid: GridId) -> Option<&mut (dyn Exporter + 'static)> {
        self.exporters.get_mut(&grid).map(|exporter| &mut **exporter)
    }

    /// Detach and return the exporter of `grid`
    pub fn detach(&mut self, grid: GridId) -> Option<Box<dyn Exporter>> {
        self.exporters.remove(&grid)
    }

    /// Check if `grid` has an exporter
    pub fn contains(&self, grid: GridId) -> bool {
        self.exporters.contains_key(&grid)
    }

    /// Export `grid` with its attached exporter
    pub fn export(&mut self, grid: &dyn GridSource) -> Result<ExportArtifact> {
        let id = grid.id();
        let exporter = self.get_mut(id).ok_or_else(|| {
            ExportError::InvalidState(format!("no exporter attached to grid {}", id.get()))
        })?;
        exporter.export(grid)
    }

    /// Get number of attached exporters
    pub fn len(&self) -> usize {
        self.exporters.len()
    }

    /// Check if no exporters are attached
    pub fn is_empty(&self) -> bool {
        self.exporters.is_empty()
    }
}

impl std::fmt::Debug for ExporterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExporterRegistry")
            .field("grids", &self.exporters.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::MemoryGrid;
    use crate::sink::SpreadsheetFormat;
    use std::path::PathBuf;

    struct CountingExporter {
        calls: usize,
    }

    impl Exporter for CountingExporter {
        fn export(&mut self, _grid: &dyn GridSource) -> Result<ExportArtifact> {
            self.calls += 1;
            Ok(ExportArtifact {
                path: PathBuf::from("counted.csv"),
                file_name: "counted.csv".to_string(),
                format: SpreadsheetFormat::Csv,
                row_count: self.calls,
                bytes: 0,
            })
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_attach_get_detach() {
        let grid = MemoryGrid::new();
        let mut registry = ExporterRegistry::new();

        assert!(registry.attach(grid.id(), CountingExporter { calls: 0 }).is_none());
        assert!(registry.contains(grid.id()));
        assert!(registry
            .get(grid.id())
            .and_then(|e| e.as_any().downcast_ref::<CountingExporter>())
            .is_some());

        assert!(registry.attach(grid.id(), CountingExporter { calls: 5 }).is_some());
        assert_eq!(registry.len(), 1);

        assert!(registry.detach(grid.id()).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_export_dispatches_to_attached_exporter() {
        let grid = MemoryGrid::new();
        let other = MemoryGrid::new();
        let mut registry = ExporterRegistry::new();
        registry.attach(grid.id(), CountingExporter { calls: 0 });

        assert_eq!(registry.export(&grid).unwrap().row_count, 1);
        assert_eq!(registry.export(&grid).unwrap().row_count, 2);
        assert!(matches!(registry.export(&other), Err(ExportError::InvalidState(_))));
    }
}
