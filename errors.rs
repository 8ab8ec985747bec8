//! Error and warning types for the analysis pipeline.
//!
//! Plain enums/structs implementing `std::error::Error`, returned via
//! `Result` rather than panicking.

use std::fmt;

/// A fatal, programmer-facing error: the input IR violates an invariant the
/// analysis assumes. Always aborts the run, since unsound assumptions would
/// silently corrupt every downstream table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisError {
    pub kind: AnalysisErrorKind,
    /// Human-readable context naming the offending instruction/function.
    pub context: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalysisErrorKind {
    /// A return instruction, store, or load has an operand shape the
    /// analysis cannot interpret as a pointer expression (e.g. a return
    /// value that is neither an alloca nor a load of pointer type reaching
    /// pointer-typed analysis).
    MalformedIr,
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AnalysisErrorKind::MalformedIr => {
                write!(f, "malformed IR: {}", self.context)
            }
        }
    }
}

impl std::error::Error for AnalysisError {}

impl AnalysisError {
    pub fn malformed_ir(context: impl Into<String>) -> Self {
        AnalysisError {
            kind: AnalysisErrorKind::MalformedIr,
            context: context.into(),
        }
    }
}

/// A recoverable condition reported alongside an otherwise-usable result:
/// the configured entry function does not exist in the module. The pipeline
/// still runs over every function it does find; only entry-function-scoped
/// queries are affected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisWarning {
    pub message: String,
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl AnalysisWarning {
    pub fn missing_entry(name: &str) -> Self {
        AnalysisWarning {
            message: format!("no function named '{name}' found; entry-scoped queries will be empty"),
        }
    }
}
