//! Wires the whole-program points-to pipeline together: validate -> Andersen
//! pre-pass -> labeling -> sparse def-use construction -> flow-sensitive
//! propagation -> result.
//!
//! Every submodule is `pub` rather than `pub(crate)`: `bin/dump_andersen.rs`
//! and `bin/nullcheck.rs` need direct access to `andersen`/`result` (and, for
//! diagnostics, `labels`/`lir`) from outside this crate's own tree, so the
//! `bin/` tools reach into `middle_end::*` directly rather than going
//! through a narrower facade.

pub mod andersen;
pub mod defuse;
pub mod dominators;
pub mod labels;
pub mod lir;
pub mod objects;
pub mod propagate;
pub mod result;

use crate::config::AnalysisConfig;
use crate::errors::{AnalysisError, AnalysisWarning};
use lir::{func_id, Program};
use result::PointerAnalysisResult;

/// Runs the whole pipeline over `program`, in the stage order described
/// above.
///
/// `program` is cloned once so `Program::validate` (which consumes its
/// argument) can run without taking ownership away from the caller.
pub fn run_pipeline(
    program: &Program,
    config: &AnalysisConfig,
) -> Result<(PointerAnalysisResult, Option<AnalysisWarning>), AnalysisError> {
    let valid = program.clone().validate()?;

    let andersen_result = andersen::solve(&valid);
    let built_labels = labels::build(&valid, &andersen_result);
    let propagation = propagate::run(&valid, &andersen_result, &built_labels, config);

    let warning = if valid.functions.contains_key(&func_id(&config.entry_function_name)) {
        None
    } else {
        Some(AnalysisWarning::missing_entry(&config.entry_function_name))
    };

    Ok((PointerAnalysisResult::new(propagation), warning))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lir::parser::parse_program;

    /// A configured entry function that isn't present in the module is
    /// recoverable: the pipeline still runs over every function it does
    /// find and reports a warning rather than aborting.
    #[test]
    fn missing_entry_function_is_a_warning_not_an_error() {
        let program = parse_program(
            "fn f() -> int {\nentry:\n  a: &int = alloc\n  ret 0\n}\n",
        )
        .unwrap();
        let config = AnalysisConfig {
            entry_function_name: "main".to_string(),
            ..AnalysisConfig::default()
        };

        let (_, warning) = run_pipeline(&program, &config).unwrap();
        assert!(warning.is_some());
        assert!(warning.unwrap().to_string().contains("main"));
    }

    #[test]
    fn present_entry_function_has_no_warning() {
        let program = parse_program(
            "fn main() -> int {\nentry:\n  a: &int = alloc\n  ret 0\n}\n",
        )
        .unwrap();
        let config = AnalysisConfig::default();

        let (result, warning) = run_pipeline(&program, &config).unwrap();
        assert!(warning.is_none());
        assert!(!result.is_incomplete());
    }

    #[test]
    fn malformed_ir_aborts_the_pipeline() {
        let program = parse_program("fn f() -> int {\nentry:\n  jump missing\n}\n").unwrap();
        let config = AnalysisConfig::default();

        let err = run_pipeline(&program, &config).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
