//! The public query surface over a completed analysis run.
//!
//! Wraps the propagation engine's raw tables (`propagate::PropagationOutput`)
//! behind three query shapes: `points_to`, `alias`, and `function_pointers`.
//! A JSON dump is offered alongside, built by hand from `Display` strings
//! rather than `#[derive(Serialize)]` directly on `VarId`/`Object`/
//! `ProgramPoint`, since those carry a hash-consed `Type` that doesn't
//! implement `Serialize`.

use std::collections::BTreeSet as Set;

use super::labels::Location;
use super::lir::FuncId;
use super::lir::VarId;
use super::objects::Object;
use super::propagate::PropagationOutput;

#[derive(Clone, Debug, Default)]
pub struct PointerAnalysisResult {
    propagation: PropagationOutput,
}

impl PointerAnalysisResult {
    pub fn new(propagation: PropagationOutput) -> Self {
        PointerAnalysisResult { propagation }
    }

    /// `PTS_out[location][pointer]`: the objects `pointer` may hold after
    /// `location` executes.
    pub fn points_to(&self, location: &Location, pointer: &VarId) -> Set<Object> {
        self.propagation
            .pts_out
            .get(&(location.clone(), pointer.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// `Alias[location][pointer]`: the objects a load result `pointer` may
    /// denote at `location`. Empty for a pointer that was never the result
    /// of a `Load`; query [`points_to`](Self::points_to) instead for an
    /// alloca or parameter.
    pub fn alias(&self, location: &Location, pointer: &VarId) -> Set<Object> {
        self.propagation
            .alias
            .get(&(location.clone(), pointer.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// The full alias set backing a store's destination pointer, keyed by
    /// the store's own location. A bottom member means the store may write
    /// through an uninitialized pointer, what `bin/nullcheck.rs` flags.
    pub fn store_target(&self, location: &Location) -> Set<Object> {
        self.propagation.store_targets.get(location).cloned().unwrap_or_default()
    }

    /// Every `VarId` with at least one points-to or alias entry scoped to
    /// `function`: both object-identifying pointers (allocas, parameters)
    /// and load results.
    pub fn function_pointers(&self, function: &FuncId) -> Set<VarId> {
        self.propagation
            .pts_out
            .keys()
            .chain(self.propagation.alias.keys())
            .filter(|(loc, _)| &loc.0 == function)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Set when the propagation engine had to skip something it could not
    /// soundly resolve (currently: an indirect call with at least one
    /// pointer-typed argument).
    pub fn is_incomplete(&self) -> bool {
        self.propagation.incomplete
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut pts_out = serde_json::Map::new();
        for ((loc, v), objs) in &self.propagation.pts_out {
            let key = format!("{}@{}", v.with_funcid(), loc.1);
            pts_out.insert(key, objects_to_json(objs));
        }

        let mut alias = serde_json::Map::new();
        for ((loc, v), objs) in &self.propagation.alias {
            let key = format!("{}@{}", v.with_funcid(), loc.1);
            alias.insert(key, objects_to_json(objs));
        }

        serde_json::json!({
            "pts_out": pts_out,
            "alias": alias,
            "incomplete": self.propagation.incomplete,
        })
    }
}

fn objects_to_json(objs: &Set<Object>) -> serde_json::Value {
    serde_json::Value::from(objs.iter().map(|o| o.to_string()).collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middle_end::andersen;
    use crate::middle_end::labels;
    use crate::middle_end::lir::parser::parse_program;
    use crate::middle_end::lir::{bb_id, func_id};
    use crate::middle_end::propagate;
    use crate::AnalysisConfig;

    #[test]
    fn points_to_reports_alloc_after_its_own_site() {
        let program = parse_program(
            "fn f() -> int {\nentry:\n  a: &int = alloc\n  ret 0\n}\n",
        )
        .unwrap();
        let andersen_result = andersen::solve(&program);
        let built_labels = labels::build(&program, &andersen_result);
        let config = AnalysisConfig::default();
        let output = propagate::run(&program, &andersen_result, &built_labels, &config);
        let result = PointerAnalysisResult::new(output);

        let f = &program.functions[&func_id("f")];
        let a = f.body[&bb_id("entry")].insts[0].lhs().unwrap().clone();
        let alloc_loc = (f.id.clone(), super::super::labels::ProgramPoint::Instruction(bb_id("entry"), 0));
        assert_eq!(result.points_to(&alloc_loc, &a), Set::from([Object::Bottom]));
        assert!(!result.is_incomplete());
    }

    #[test]
    fn alias_and_function_pointers_expose_load_results_and_to_json_round_trips() {
        let program = parse_program(
            "fn f() -> int {\nentry:\n  a: &int = alloc\n  b: &&int = alloc\n  store a, b\n  x = load b\n  ret 0\n}\n",
        )
        .unwrap();
        let andersen_result = andersen::solve(&program);
        let built_labels = labels::build(&program, &andersen_result);
        let config = AnalysisConfig::default();
        let output = propagate::run(&program, &andersen_result, &built_labels, &config);
        let result = PointerAnalysisResult::new(output);

        let f = &program.functions[&func_id("f")];
        let entry = &f.body[&bb_id("entry")];
        let a = entry.insts[0].lhs().unwrap().clone();
        let x = entry.insts[3].lhs().unwrap().clone();
        let load_loc = (f.id.clone(), super::super::labels::ProgramPoint::Instruction(bb_id("entry"), 3));

        assert_eq!(result.alias(&load_loc, &x), Set::from([Object::Alloc(a)]));

        let pointers = result.function_pointers(&f.id);
        assert!(pointers.contains(&x));

        let json = result.to_json();
        assert!(json["pts_out"].is_object());
        assert!(json["alias"].is_object());
        assert_eq!(json["incomplete"], false);
    }
}
