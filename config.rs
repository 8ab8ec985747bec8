//! Recognized configuration options for the analysis pipeline.
//!
//! No environment variables and no persisted state; a plain struct with a
//! `Default` impl, mirrored by the `bin/analyze.rs` CLI via `clap::Parser`
//! so the same fields are reachable from the command line.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisConfig {
    pub entry_function_name: String,
    pub ignore_indirect_calls: bool,
    pub report_incomplete: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            entry_function_name: "main".to_string(),
            ignore_indirect_calls: true,
            report_incomplete: true,
        }
    }
}
