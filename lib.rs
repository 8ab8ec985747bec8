pub mod commons;
pub mod config;
pub mod errors;
pub mod middle_end;

pub use config::AnalysisConfig;
pub use errors::{AnalysisError, AnalysisWarning};
pub use middle_end::result::PointerAnalysisResult;

use middle_end::lir::Program;

/// Runs the whole pipeline (Andersen pre-pass, labeling, sparse def-use
/// construction, flow-sensitive propagation) over `program` and returns the
/// resulting points-to tables.
///
/// `MissingEntry` is recoverable: it is returned alongside an empty result
/// rather than as an `Err`, per the configuration's entry-function lookup
/// being advisory to callers that only care about a specific function.
pub fn run(
    program: &Program,
    config: &AnalysisConfig,
) -> Result<(PointerAnalysisResult, Option<AnalysisWarning>), AnalysisError> {
    middle_end::run_pipeline(program, config)
}
