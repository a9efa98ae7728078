//! Engine configuration
//!
//! All knobs that influence extraction and resolution live in [`EngineConfig`].
//! The value is immutable once built and is passed into every pipeline stage;
//! there is no process-wide configuration state.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ingest::parser::SourceDialect;

/// Default extension allowlist, in import resolution priority order.
///
/// Typed variants come before plain ones, module-style before legacy CommonJS.
pub const DEFAULT_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// Default comment association threshold (lines between comment end and declaration start)
pub const DEFAULT_DOC_COMMENT_MAX_DISTANCE: usize = 5;

/// Default upper bound on file size accepted for extraction (1 MiB)
pub const DEFAULT_MAX_FILE_BYTES: usize = 1024 * 1024;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config body is not valid JSON for [`EngineConfig`]
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    /// Extension allowlist is empty
    #[error("extension allowlist is empty")]
    EmptyAllowlist,

    /// Extension was written with a leading dot or contains a path separator
    #[error("malformed extension '{0}' (expected a bare extension such as \"ts\")")]
    MalformedExtension(String),

    /// Extension has no parser dialect
    #[error("extension '{0}' has no supported parser dialect")]
    UnknownDialect(String),

    /// Exclude pattern is not a valid glob
    #[error("invalid exclude pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },
}

/// Immutable configuration for parsing, extraction, resolution and indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Supported extensions without the leading dot.
    ///
    /// Doubles as the resolution priority list for extensionless specifiers.
    pub extensions: Vec<String>,
    /// Maximum line distance between a block comment and the declaration it documents
    pub doc_comment_max_distance: usize,
    /// Name given to anonymous default-exported functions and classes
    pub anonymous_name: String,
    /// Name given to default-exported values that are not function- or class-like
    pub default_export_name: String,
    /// Files larger than this are skipped before extraction (None = unlimited)
    pub max_file_bytes: Option<usize>,
    /// Reuse stored facts when the content hash of a file is unchanged
    pub skip_unchanged: bool,
    /// Glob patterns excluded by directory scanning
    pub exclude: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            doc_comment_max_distance: DEFAULT_DOC_COMMENT_MAX_DISTANCE,
            anonymous_name: "<anonymous>".to_string(),
            default_export_name: "default".to_string(),
            max_file_bytes: Some(DEFAULT_MAX_FILE_BYTES),
            skip_unchanged: false,
            exclude: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config body. Missing fields take defaults.
    pub fn from_json_str(body: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(body)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let body = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source,
        })?;
        Self::from_json_str(&body)
    }

    /// Check the allowlist and exclude patterns.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extensions.is_empty() {
            return Err(ConfigError::EmptyAllowlist);
        }
        for ext in &self.extensions {
            if ext.is_empty() || ext.contains('.') || ext.contains('/') || ext.contains('\\') {
                return Err(ConfigError::MalformedExtension(ext.clone()));
            }
            if SourceDialect::from_extension(ext).is_none() {
                return Err(ConfigError::UnknownDialect(ext.clone()));
            }
        }
        for pattern in &self.exclude {
            globset::Glob::new(pattern).map_err(|e| ConfigError::InvalidGlob {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Whether `ext` (without dot) is on the allowlist.
    pub fn allows_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e == ext)
    }

    /// Whether a file of `len` bytes exceeds the configured limit.
    pub fn exceeds_size_limit(&self, len: usize) -> bool {
        self.max_file_bytes.map(|max| len > max).unwrap_or(false)
    }
}
