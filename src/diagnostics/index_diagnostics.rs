//! Index diagnostics for structured skip reasons and error reporting.
//!
//! - Structured types for skipped files and per-file failures
//! - Deterministic ordering via sort_key()
//! - Pluggable sinks: log through tracing, or collect for inspection

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Mutex;

/// Reason why a file was skipped during indexing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Extension not on the allowlist
    UnsupportedLanguage,
    /// Content larger than the configured limit
    TooLarge,
    /// Content hash matches the stored record
    Unchanged,
}

impl SkipReason {
    /// Stable sort key for deterministic ordering.
    pub fn sort_key(&self) -> u8 {
        match self {
            SkipReason::UnsupportedLanguage => 0,
            SkipReason::TooLarge => 1,
            SkipReason::Unchanged => 2,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SkipReason::UnsupportedLanguage => "language not supported",
            SkipReason::TooLarge => "file exceeds size limit",
            SkipReason::Unchanged => "content unchanged",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Stage in the indexing pipeline where an error occurred.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticStage {
    /// Failed to read file from the snapshot directory
    Read,
    /// Failed to parse source code
    Parse,
    /// Storage adapter rejected a write
    Store,
}

impl DiagnosticStage {
    /// Stable sort key for deterministic ordering.
    pub fn sort_key(&self) -> u8 {
        match self {
            DiagnosticStage::Read => 0,
            DiagnosticStage::Parse => 1,
            DiagnosticStage::Store => 2,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DiagnosticStage::Read => "reading file",
            DiagnosticStage::Parse => "parsing source",
            DiagnosticStage::Store => "storing facts",
        }
    }
}

impl fmt::Display for DiagnosticStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A diagnostic event from the index pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexDiagnostic {
    /// File was not extracted
    Skipped { path: String, reason: SkipReason },
    /// Error occurred while processing a file
    Error {
        path: String,
        stage: DiagnosticStage,
        message: String,
    },
}

impl IndexDiagnostic {
    pub fn path(&self) -> &str {
        match self {
            IndexDiagnostic::Skipped { path, .. } => path,
            IndexDiagnostic::Error { path, .. } => path,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, IndexDiagnostic::Error { .. })
    }

    /// Primary: path. Secondary: errors before skips. Tertiary: stage/reason.
    pub fn sort_key(&self) -> (&str, u8, u8) {
        match self {
            IndexDiagnostic::Error { path, stage, .. } => (path, 0, stage.sort_key()),
            IndexDiagnostic::Skipped { path, reason } => (path, 1, reason.sort_key()),
        }
    }

    pub fn skipped(path: impl Into<String>, reason: SkipReason) -> Self {
        IndexDiagnostic::Skipped {
            path: path.into(),
            reason,
        }
    }

    pub fn error(path: impl Into<String>, stage: DiagnosticStage, message: impl Into<String>) -> Self {
        IndexDiagnostic::Error {
            path: path.into(),
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for IndexDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexDiagnostic::Skipped { path, reason } => write!(f, "SKIP {}: {}", path, reason),
            IndexDiagnostic::Error { path, stage, message } => {
                write!(f, "ERROR {}: {}: {}", path, stage, message)
            }
        }
    }
}

impl PartialOrd for IndexDiagnostic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexDiagnostic {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.to_string().cmp(&other.to_string()))
    }
}

/// Receiver for non-fatal per-file diagnostics
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: &IndexDiagnostic);
}

/// Logs diagnostics through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: &IndexDiagnostic) {
        match diagnostic {
            IndexDiagnostic::Skipped { path, reason } => {
                tracing::debug!(path = %path, reason = %reason, "skipped file");
            }
            IndexDiagnostic::Error { path, stage, message } => {
                tracing::warn!(path = %path, stage = %stage, "{}", message);
            }
        }
    }
}

/// Accumulates diagnostics in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    diagnostics: Mutex<Vec<IndexDiagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything reported so far, in sort order
    pub fn take_sorted(&self) -> Vec<IndexDiagnostic> {
        let mut taken = match self.diagnostics.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        taken.sort();
        taken
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: &IndexDiagnostic) {
        match self.diagnostics.lock() {
            Ok(mut guard) => guard.push(diagnostic.clone()),
            Err(poisoned) => poisoned.into_inner().push(diagnostic.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_sort_before_skips_for_same_path() {
        let mut diags = vec![
            IndexDiagnostic::skipped("b.ts", SkipReason::TooLarge),
            IndexDiagnostic::skipped("a.ts", SkipReason::Unchanged),
            IndexDiagnostic::error("b.ts", DiagnosticStage::Parse, "unexpected `}`"),
        ];
        diags.sort();
        let paths: Vec<_> = diags.iter().map(|d| (d.path(), d.is_error())).collect();
        assert_eq!(paths, vec![("a.ts", false), ("b.ts", true), ("b.ts", false)]);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            IndexDiagnostic::skipped("x.py", SkipReason::UnsupportedLanguage).to_string(),
            "SKIP x.py: language not supported"
        );
        assert_eq!(
            IndexDiagnostic::error("a.ts", DiagnosticStage::Parse, "a.ts:1:0: missing `}`").to_string(),
            "ERROR a.ts: parsing source: a.ts:1:0: missing `}`"
        );
    }

    #[test]
    fn test_collecting_sink_drains_sorted() {
        let sink = CollectingSink::new();
        sink.report(&IndexDiagnostic::skipped("z.ts", SkipReason::TooLarge));
        sink.report(&IndexDiagnostic::error("m.ts", DiagnosticStage::Store, "disk full"));
        let taken = sink.take_sorted();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].path(), "m.ts");
        assert!(sink.take_sorted().is_empty());
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_string(&IndexDiagnostic::skipped("a.ts", SkipReason::Unchanged)).unwrap();
        assert_eq!(json, r#"{"type":"skipped","path":"a.ts","reason":"unchanged"}"#);
    }
}
