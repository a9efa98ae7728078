//! Structured diagnostics for index operations.
//!
//! Deterministic, sortable diagnostic types for skip reasons and per-file
//! errors, plus the sink interface the pipeline reports through.

pub mod index_diagnostics;

pub use index_diagnostics::{
    CollectingSink, DiagnosticSink, DiagnosticStage, IndexDiagnostic, SkipReason, TracingSink,
};
