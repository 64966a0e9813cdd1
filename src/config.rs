//! Export configuration
//!
//! Defaults mirror the admin exporter: `Exporter.xlsx`, chunks of 100
//! records, auto-sized columns, every cell forced to text.

use crate::error::{ExportError, Result};
use crate::sink::CellTypePolicy;
use std::path::PathBuf;

/// File name used when none is set
pub const DEFAULT_FILE_NAME: &str = "Exporter.xlsx";

/// Extension appended to file names that have none
pub const DEFAULT_EXTENSION: &str = "xlsx";

/// Records pulled from the grid per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Default sheet title
pub const DEFAULT_SHEET_TITLE: &str = "Worksheet";

/// Deflate level for XLSX output (0-9)
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Environment variable overriding the chunk size
pub const ENV_CHUNK_SIZE: &str = "GRID_EXPORT_CHUNK_SIZE";
/// Environment variable overriding the output directory
pub const ENV_OUTPUT_DIR: &str = "GRID_EXPORT_DIR";
/// Environment variable overriding the XLSX compression level
pub const ENV_COMPRESSION: &str = "GRID_EXPORT_COMPRESSION";

/// Settings for one exporter
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Download file name, always carrying an extension
    pub file_name: String,
    /// Records per chunk
    pub chunk_size: usize,
    /// Directory the artifact is written to
    pub output_dir: PathBuf,
    /// Size columns to their content
    pub auto_size: bool,
    /// How cell values are typed
    pub cell_type: CellTypePolicy,
    /// XLSX deflate level (0-9)
    pub compression_level: u32,
    /// Worksheet title
    pub sheet_title: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            file_name: DEFAULT_FILE_NAME.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            output_dir: std::env::temp_dir(),
            auto_size: true,
            cell_type: CellTypePolicy::ForceText,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            sheet_title: DEFAULT_SHEET_TITLE.to_string(),
        }
    }
}

impl ExportConfig {
    /// Start a builder from the defaults
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder::default()
    }

    /// Defaults overridden by `GRID_EXPORT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ExportConfig::default();

        if let Some(raw) = lookup(ENV_CHUNK_SIZE) {
            config.chunk_size = parse_number::<usize>(ENV_CHUNK_SIZE, &raw)?;
            if config.chunk_size == 0 {
                return Err(ExportError::Config(format!(
                    "{} must be greater than zero",
                    ENV_CHUNK_SIZE
                )));
            }
        }
        if let Some(raw) = lookup(ENV_OUTPUT_DIR) {
            config.output_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup(ENV_COMPRESSION) {
            config.compression_level = parse_number::<u32>(ENV_COMPRESSION, &raw)?.min(9);
        }

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| ExportError::Config(format!("{} is not a valid number: '{}'", key, raw)))
}

/// Append [`DEFAULT_EXTENSION`] when `name` has no extension.
///
/// The extension is whatever follows the last `.` of the final path
/// component; `report.` and `report` both become `report.xlsx`. A blank
/// name falls back to [`DEFAULT_FILE_NAME`].
pub fn with_default_extension(name: &str) -> String {
    if name.trim().is_empty() {
        return DEFAULT_FILE_NAME.to_string();
    }
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let has_extension = base
        .rsplit_once('.')
        .is_some_and(|(_, ext)| !ext.is_empty());

    if has_extension {
        name.to_string()
    } else if name.ends_with('.') {
        format!("{}{}", name, DEFAULT_EXTENSION)
    } else {
        format!("{}.{}", name, DEFAULT_EXTENSION)
    }
}

/// Builder for [`ExportConfig`]
#[derive(Debug, Default)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    /// Set the file name; an extension is added when missing
    pub fn with_file_name(mut self, name: &str) -> Self {
        self.config.file_name = with_default_extension(name);
        self
    }

    /// Set records per chunk (at least 1)
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size.max(1);
        self
    }

    /// Set the output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    /// Enable or disable column auto-sizing
    pub fn with_auto_size(mut self, enabled: bool) -> Self {
        self.config.auto_size = enabled;
        self
    }

    /// Set the cell type policy
    pub fn with_cell_type(mut self, policy: CellTypePolicy) -> Self {
        self.config.cell_type = policy;
        self
    }

    /// Set the XLSX compression level (clamped to 9)
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.config.compression_level = level.min(9);
        self
    }

    /// Set the worksheet title
    pub fn with_sheet_title(mut self, title: &str) -> Self {
        self.config.sheet_title = title.to_string();
        self
    }

    /// Build the configuration
    pub fn build(self) -> ExportConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_extension() {
        assert_eq!(with_default_extension("users"), "users.xlsx");
        assert_eq!(with_default_extension("users."), "users.xlsx");
        assert_eq!(with_default_extension("users.csv"), "users.csv");
        assert_eq!(with_default_extension("v1.2/users"), "v1.2/users.xlsx");
        assert_eq!(with_default_extension("report.XLSX"), "report.XLSX");
        assert_eq!(with_default_extension(" "), DEFAULT_FILE_NAME);
    }

    #[test]
    fn test_builder() {
        let config = ExportConfig::builder()
            .with_file_name("orders")
            .with_chunk_size(0)
            .with_compression_level(12)
            .with_auto_size(false)
            .build();

        assert_eq!(config.file_name, "orders.xlsx");
        assert_eq!(config.chunk_size, 1);
        assert_eq!(config.compression_level, 9);
        assert!(!config.auto_size);
        assert_eq!(config.cell_type, CellTypePolicy::ForceText);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_CHUNK_SIZE, "250"),
            (ENV_OUTPUT_DIR, "/srv/exports"),
            (ENV_COMPRESSION, "3"),
        ]);
        let config = ExportConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.chunk_size, 250);
        assert_eq!(config.output_dir, PathBuf::from("/srv/exports"));
        assert_eq!(config.compression_level, 3);
        assert_eq!(config.file_name, DEFAULT_FILE_NAME);
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers() {
        let bad = ExportConfig::from_lookup(|k| (k == ENV_CHUNK_SIZE).then(|| "many".to_string()));
        assert!(matches!(bad, Err(ExportError::Config(_))));

        let zero = ExportConfig::from_lookup(|k| (k == ENV_CHUNK_SIZE).then(|| "0".to_string()));
        assert!(matches!(zero, Err(ExportError::Config(_))));
    }
}
