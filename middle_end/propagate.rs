//! Flow-sensitive, interprocedural propagation engine.
//!
//! A worklist of def-use edges drives a monotone fixpoint, dispatching on
//! the instruction/terminal kind at each use location: `propagate`,
//! `updatePointsToSet`, `updateAliasInformation`, `updateAliasUsers`, and
//! `updateArgPointsToSetOfFunc` as separate concerns folded into `Engine`'s
//! methods below.
//!
//! The Store/Load rules recompute a pointer's *whole* alias set `A` on
//! every revisit rather than patching the single object named by whichever
//! edge triggered it: this engine reprocesses the owning location's full
//! transfer function on every incoming edge, which keeps the strong/weak
//! decision (depending on all of `A` at once) from ever going stale.

use std::collections::{BTreeMap as Map, BTreeSet as Set, VecDeque};

use super::andersen::AndersenResult;
use super::defuse::{self, DefUseGraph};
use super::labels::{build_def_sites, DefSite, Labels, Location, PointerRoot, ProgramPoint};
use super::lir::{FuncId, Function, Instruction, Operand, Program, Terminal, VarId};
use super::objects::Object;
use crate::config::AnalysisConfig;

/// Raw tables produced by a full propagation run, handed to
/// `middle_end::result` for wrapping into the public query surface.
#[derive(Clone, Debug, Default)]
pub struct PropagationOutput {
    pub pts_out: Map<(Location, VarId), Set<Object>>,
    pub alias: Map<(Location, VarId), Set<Object>>,
    /// The full alias set backing a store's destination pointer, keyed by
    /// the store's own location. What `bin/nullcheck.rs` inspects for a
    /// bottom member without re-deriving the store's target resolution
    /// itself.
    pub store_targets: Map<Location, Set<Object>>,
    pub incomplete: bool,
}

fn owner_object(func: &Function, owner: &VarId) -> Object {
    if func.params.iter().any(|p| p == owner) {
        Object::Param(owner.clone())
    } else {
        Object::Alloc(owner.clone())
    }
}

fn alloc_loc(func: &Function, owner: &VarId) -> Option<Location> {
    for (bbid, bb) in &func.body {
        for (idx, inst) in bb.insts.iter().enumerate() {
            if let Instruction::Alloc { lhs } = inst {
                if lhs == owner {
                    return Some((func.id.clone(), ProgramPoint::Instruction(bbid.clone(), idx)));
                }
            }
        }
    }
    None
}

enum At<'p> {
    Entry,
    Join,
    Inst(&'p Instruction),
    Term(&'p Terminal),
}

fn at<'p>(program: &'p Program, loc: &Location) -> At<'p> {
    let func = &program.functions[&loc.0];
    match &loc.1 {
        ProgramPoint::Entry => At::Entry,
        ProgramPoint::Join(_) => At::Join,
        ProgramPoint::Instruction(bb, idx) => At::Inst(&func.body[bb].insts[*idx]),
        ProgramPoint::Terminal(bb) => At::Term(&func.body[bb].term),
    }
}

struct Engine<'p> {
    program: &'p Program,
    andersen: &'p AndersenResult,
    labels: &'p Labels,
    config: &'p AnalysisConfig,
    def_sites: Map<FuncId, Map<VarId, DefSite>>,
    dug: DefUseGraph,
    pts_out: Map<(Location, VarId), Set<Object>>,
    pts_in: Map<(Location, VarId), Set<Object>>,
    alias: Map<(Location, VarId), Set<Object>>,
    store_targets: Map<Location, Set<Object>>,
    /// `call_bindings[formal] = {(call_loc, caller_owner), ...}`: every call
    /// site statically known to bind `formal` from `caller_owner`'s content,
    /// used by Return processing to propagate back to every recorded
    /// call site.
    call_bindings: Map<VarId, Set<(Location, VarId)>>,
    worklist: VecDeque<(Location, Location, VarId)>,
    incomplete: bool,
}

impl<'p> Engine<'p> {
    fn new(
        program: &'p Program,
        andersen: &'p AndersenResult,
        labels: &'p Labels,
        config: &'p AnalysisConfig,
    ) -> Self {
        let mut def_sites = Map::new();
        for func in program.functions.values() {
            def_sites.insert(func.id.clone(), build_def_sites(func));
        }

        let dug = defuse::build(program, andersen, labels);

        let mut call_bindings: Map<VarId, Set<(Location, VarId)>> = Map::new();
        for func in program.functions.values() {
            for (bbid, bb) in &func.body {
                if let Terminal::CallDirect { callee, args, .. } = &bb.term {
                    if let Some(callee_fn) = program.functions.get(callee) {
                        let call_loc = (func.id.clone(), ProgramPoint::Terminal(bbid.clone()));
                        let fsites = &def_sites[&func.id];
                        for (actual, formal) in args.iter().zip(callee_fn.params.iter()) {
                            if !formal.typ().is_ptr() {
                                continue;
                            }
                            if let Operand::Var(v) = actual {
                                for owner in resolved_owners(fsites, andersen, v) {
                                    call_bindings
                                        .entry(formal.clone())
                                        .or_default()
                                        .insert((call_loc.clone(), owner));
                                }
                            }
                        }
                    }
                }
            }
        }

        let mut engine = Engine {
            program,
            andersen,
            labels,
            config,
            def_sites,
            dug,
            pts_out: Map::new(),
            pts_in: Map::new(),
            alias: Map::new(),
            store_targets: Map::new(),
            call_bindings,
            worklist: VecDeque::new(),
            incomplete: false,
        };
        engine.seed();
        engine
    }

    /// Seeds every pointer's entry def and the two initial `PTS_out` facts:
    /// an alloca's cell starts at `{bottom}`, a parameter's cell starts
    /// empty.
    fn seed(&mut self) {
        for p in self.labels.labeled_pointers() {
            let Some(func_id) = p.scope().cloned() else { continue };
            let Some(func) = self.program.functions.get(&func_id) else { continue };

            let is_param = func.params.iter().any(|q| q == &p);
            let entry_loc = if is_param {
                (func_id.clone(), ProgramPoint::Entry)
            } else if let Some(loc) = alloc_loc(func, &p) {
                if self.pts_out.entry((loc.clone(), p.clone())).or_default().insert(Object::Bottom) {
                    // newly seeded
                }
                loc
            } else {
                continue;
            };

            for use_loc in self.dug.uses_of(&p, &entry_loc) {
                self.worklist.push_back((entry_loc.clone(), use_loc, p.clone()));
            }
        }
    }

    fn run(&mut self) {
        while let Some((d, u, p)) = self.worklist.pop_front() {
            let grown = {
                let cur = self.pts_in.entry((u.clone(), p.clone())).or_default();
                let add = self.pts_out.get(&(d.clone(), p.clone())).cloned().unwrap_or_default();
                let before = cur.len();
                cur.extend(add);
                cur.len() != before
            };
            if !grown {
                continue;
            }
            self.process_location(&u);
        }
    }

    fn func_of(&self, loc: &Location) -> &'p Function {
        &self.program.functions[&loc.0]
    }

    fn enqueue_outgoing(&mut self, loc: Location, owner: VarId) {
        for use_loc in self.dug.uses_of(&owner, &loc) {
            self.worklist.push_back((loc.clone(), use_loc, owner.clone()));
        }
    }

    fn set_pts_out_union(&mut self, loc: Location, owner: VarId, objs: Set<Object>) -> bool {
        let entry = self.pts_out.entry((loc.clone(), owner.clone())).or_default();
        let before = entry.len();
        entry.extend(objs);
        let grew = entry.len() != before;
        if grew {
            self.enqueue_outgoing(loc, owner);
        }
        grew
    }

    /// The points-to set of a pointer-typed operand at `loc`: its flow-
    /// sensitive alias set if one has been computed, otherwise the single
    /// object it directly identifies.
    fn value_points_to(&self, func: &Function, loc: &Location, operand: &Operand) -> Set<Object> {
        let Operand::Var(v) = operand else { return Set::new() };
        if let Some(alias) = self.alias.get(&(loc.clone(), v.clone())) {
            if !alias.is_empty() {
                return alias.clone();
            }
        }
        match resolve_root_for(&self.def_sites, func, v) {
            PointerRoot::Direct(owner) => Set::from([owner_object(func, &owner)]),
            PointerRoot::Indirect(pv) => self.andersen.content(&pv),
        }
    }

    fn process_location(&mut self, loc: &Location) {
        let func = self.func_of(loc);
        match at(self.program, loc) {
            At::Entry | At::Join => {}
            At::Inst(Instruction::Store { dst, op }) => {
                let dst = dst.clone();
                let op = op.clone();
                self.handle_store(loc.clone(), func, &dst, &op);
            }
            At::Inst(Instruction::Load { lhs, src }) => {
                let lhs = lhs.clone();
                let src = src.clone();
                self.handle_load(loc.clone(), func, &lhs, &src);
            }
            At::Inst(Instruction::CallExt { args, .. }) => {
                let args = args.clone();
                self.handle_callext(loc.clone(), func, &args);
            }
            At::Inst(_) => {}
            At::Term(Terminal::CallDirect { callee, args, .. }) => {
                let callee = callee.clone();
                let args = args.clone();
                self.handle_call(loc.clone(), func, &callee, &args);
            }
            At::Term(Terminal::CallIndirect { .. }) => {
                self.incomplete = true;
            }
            At::Term(Terminal::Ret(op)) => {
                let op = op.clone();
                self.handle_return(loc.clone(), func, op);
            }
            At::Term(_) => {}
        }
    }

    /// `store v into q`.
    fn handle_store(&mut self, loc: Location, func: &'p Function, dst: &VarId, op: &Operand) {
        let pts_value = self.value_points_to(func, &loc, op);

        let dst_alias = self.alias.get(&(loc.clone(), dst.clone())).cloned().unwrap_or_default();
        let a_set: Set<Object> = if !dst_alias.is_empty() {
            dst_alias
        } else {
            match resolve_root_for(&self.def_sites, func, dst) {
                PointerRoot::Direct(owner) => Set::from([owner_object(func, &owner)]),
                PointerRoot::Indirect(pv) => self.andersen.content(&pv),
            }
        };
        self.store_targets.insert(loc.clone(), a_set.clone());

        if a_set.len() <= 1 {
            // Strong update: `A` names exactly one object, so the old content
            // is killed and replaced by `pts_value`.
            if let Some(owner) = a_set.iter().next().and_then(Object::var).cloned() {
                self.set_pts_out_union(loc.clone(), owner, pts_value);
            }
        } else {
            for o in &a_set {
                if let Some(owner) = o.var().cloned() {
                    let prior = self.pts_in.get(&(loc.clone(), owner.clone())).cloned().unwrap_or_default();
                    let mut merged = prior;
                    merged.extend(pts_value.iter().cloned());
                    self.set_pts_out_union(loc.clone(), owner, merged);
                }
            }
        }
    }

    /// `w = load q`.
    fn handle_load(&mut self, loc: Location, func: &'p Function, lhs: &VarId, src: &VarId) {
        let src_alias = self.alias.get(&(loc.clone(), src.clone())).cloned().unwrap_or_default();
        let owners: Set<Object> = if !src_alias.is_empty() {
            src_alias
        } else {
            match resolve_root_for(&self.def_sites, func, src) {
                PointerRoot::Direct(owner) => Set::from([owner_object(func, &owner)]),
                PointerRoot::Indirect(pv) => self.andersen.content(&pv),
            }
        };

        // `p is an alloca: PTS_out[u][p] <- PTS_in[u][p]` for every owner this
        // load reads from; they're read-only, so content never changes here.
        for o in &owners {
            if let Some(owner) = o.var().cloned() {
                let cur = self.pts_in.get(&(loc.clone(), owner.clone())).cloned().unwrap_or_default();
                self.set_pts_out_union(loc.clone(), owner, cur);
            }
        }

        let mut new_alias = Set::new();
        for o in &owners {
            if let Some(owner) = o.var() {
                new_alias.extend(
                    self.pts_out
                        .get(&(loc.clone(), owner.clone()))
                        .cloned()
                        .unwrap_or_default(),
                );
            } else {
                new_alias.insert(Object::Bottom);
            }
        }

        let entry = self.alias.entry((loc.clone(), lhs.clone())).or_default();
        let before = entry.len();
        entry.extend(new_alias);
        if entry.len() != before {
            self.propagate_alias_users(func, lhs.clone(), loc);
        }
    }

    /// `call_ext name(...)`: an opaque external call. No callee body to bind
    /// formals against, so the conservative sound choice is to admit bottom
    /// into every object it touches.
    fn handle_callext(&mut self, loc: Location, func: &'p Function, args: &[Operand]) {
        for arg in args {
            let Operand::Var(v) = arg else { continue };
            if !v.typ().is_ptr() {
                continue;
            }
            for owner in resolved_owners(&self.def_sites[&func.id], self.andersen, v) {
                let cur = self.pts_in.get(&(loc.clone(), owner.clone())).cloned().unwrap_or_default();
                let mut merged = cur;
                merged.insert(Object::Bottom);
                self.set_pts_out_union(loc.clone(), owner, merged);
            }
        }
    }

    /// `call f(a1..an)`.
    fn handle_call(&mut self, loc: Location, func: &'p Function, callee: &FuncId, args: &[Operand]) {
        let Some(callee_fn) = self.program.functions.get(callee) else { return };
        let fsites = &self.def_sites[&func.id];

        for (actual, formal) in args.iter().zip(callee_fn.params.iter()) {
            if !formal.typ().is_ptr() {
                continue;
            }
            let Operand::Var(v) = actual else { continue };
            for owner in resolved_owners(fsites, self.andersen, v) {
                let incoming = self.pts_in.get(&(loc.clone(), owner.clone())).cloned().unwrap_or_default();
                if incoming.is_empty() {
                    continue;
                }
                let entry_loc = (callee_fn.id.clone(), ProgramPoint::Entry);
                self.set_pts_out_union(entry_loc, formal.clone(), incoming);
            }
        }
    }

    /// `return v`.
    fn handle_return(&mut self, loc: Location, func: &'p Function, _op: Option<Operand>) {
        for param in &func.params {
            if !param.typ().is_ptr() {
                continue;
            }
            let incoming = self.pts_in.get(&(loc.clone(), param.clone())).cloned().unwrap_or_default();
            if incoming.is_empty() {
                continue;
            }
            self.set_pts_out_union(loc.clone(), param.clone(), incoming.clone());

            let Some(bindings) = self.call_bindings.get(param).cloned() else { continue };
            for (call_loc, caller_owner) in bindings {
                self.set_pts_out_union(call_loc, caller_owner, incoming.clone());
            }
        }
    }

    /// When a load's alias set grows, re-examine every location that reads
    /// the load's result. Covers the two cases that matter here: a store
    /// whose pointer operand or value operand is the grown alias.
    fn propagate_alias_users(&mut self, func: &'p Function, v: VarId, grown_at: Location) {
        let new_alias = self.alias.get(&(grown_at.clone(), v.clone())).cloned().unwrap_or_default();
        for (bbid, bb) in &func.body {
            for (idx, inst) in bb.insts.iter().enumerate() {
                let user_loc = (func.id.clone(), ProgramPoint::Instruction(bbid.clone(), idx));
                match inst {
                    Instruction::Store { dst, .. } if dst == &v => {
                        for o in &new_alias {
                            if let Some(owner) = o.var().cloned() {
                                if !self.labels.defs(&owner).contains(&user_loc) {
                                    self.dug.add_edge(owner.clone(), grown_at.clone(), user_loc.clone());
                                    self.worklist.push_back((grown_at.clone(), user_loc.clone(), owner));
                                }
                            }
                        }
                    }
                    Instruction::Store { op: Operand::Var(val), dst } if val == &v => {
                        for owner in resolved_owners(&self.def_sites[&func.id], self.andersen, dst) {
                            let cur = self.pts_in.get(&(user_loc.clone(), owner.clone())).cloned().unwrap_or_default();
                            let mut merged = cur;
                            merged.extend(new_alias.iter().cloned());
                            self.set_pts_out_union(user_loc.clone(), owner, merged);
                        }
                    }
                    Instruction::Load { src, .. } if src == &v => {
                        self.worklist.push_back((grown_at.clone(), user_loc.clone(), v.clone()));
                    }
                    _ => {}
                }
            }
        }
    }
}

fn resolve_root_for(
    def_sites: &Map<FuncId, Map<VarId, DefSite>>,
    func: &Function,
    v: &VarId,
) -> PointerRoot {
    super::labels::resolve_root(&def_sites[&func.id], v)
}

/// Every owner object `v` may denote, resolving through one level of load
/// indirection via the Andersen oracle when `v` isn't itself an object.
fn resolved_owners(def_sites: &Map<VarId, DefSite>, andersen: &AndersenResult, v: &VarId) -> Set<VarId> {
    match super::labels::resolve_root(def_sites, v) {
        PointerRoot::Direct(owner) => Set::from([owner]),
        PointerRoot::Indirect(pv) => andersen
            .content(&pv)
            .iter()
            .filter_map(Object::var)
            .cloned()
            .collect(),
    }
}

/// Runs the propagation engine to completion. There is no host-level
/// wall-clock or iteration bound here, so `incomplete` is only ever set by
/// an ignored indirect call, never by early cancellation.
pub fn run(
    program: &Program,
    andersen: &AndersenResult,
    labels: &Labels,
    config: &AnalysisConfig,
) -> PropagationOutput {
    let mut engine = Engine::new(program, andersen, labels, config);
    engine.run();
    PropagationOutput {
        pts_out: engine.pts_out,
        alias: engine.alias,
        store_targets: engine.store_targets,
        incomplete: engine.incomplete && config.report_incomplete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middle_end::andersen;
    use crate::middle_end::labels as labels_mod;
    use crate::middle_end::lir::{bb_id, func_id, parser::parse_program};

    fn analyze(src: &str) -> (Program, PropagationOutput) {
        let program = parse_program(src).unwrap();
        let andersen_result = andersen::solve(&program);
        let built_labels = labels_mod::build(&program, &andersen_result);
        let config = AnalysisConfig::default();
        let output = run(&program, &andersen_result, &built_labels, &config);
        (program, output)
    }

    #[test]
    fn must_alias_straight_line() {
        let (program, output) = analyze(
            "fn f() -> int {\nentry:\n  a: &int = alloc\n  b: &&int = alloc\n  store a, b\n  x = load b\n  y = load x\n  ret 0\n}\n",
        );
        let f = &program.functions[&func_id("f")];
        let entry = &f.body[&bb_id("entry")];
        let a = entry.insts[0].lhs().unwrap().clone();
        let x = entry.insts[3].lhs().unwrap().clone();
        let y = entry.insts[4].lhs().unwrap().clone();
        let load_x_loc = (f.id.clone(), ProgramPoint::Instruction(bb_id("entry"), 3));
        let load_y_loc = (f.id.clone(), ProgramPoint::Instruction(bb_id("entry"), 4));
        assert_eq!(output.alias.get(&(load_x_loc, x)).cloned().unwrap_or_default(), Set::from([Object::Alloc(a)]));
        // `y = load x` resolves `x`'s own alias through the Andersen oracle's
        // *content* of `a` (not `a`'s own address set), since `x` wasn't
        // itself given a flow-sensitive alias entry at this second load's
        // location. `a`'s cell is never written, so `y` inherits bottom.
        assert_eq!(output.alias.get(&(load_y_loc, y)).cloned().unwrap_or_default(), Set::from([Object::Bottom]));
    }

    #[test]
    fn indirect_store_through_single_element_alias_is_a_strong_update() {
        let (program, output) = analyze(
            "fn f() -> int {\nentry:\n  a: &int = alloc\n  b: &&int = alloc\n  store a, b\n  q = load b\n  c: &int = alloc\n  store c, q\n  ret 0\n}\n",
        );
        let f = &program.functions[&func_id("f")];
        let entry = &f.body[&bb_id("entry")];
        let a = entry.insts[0].lhs().unwrap().clone();
        let c = entry.insts[4].lhs().unwrap().clone();
        let second_store_loc = (f.id.clone(), ProgramPoint::Instruction(bb_id("entry"), 5));
        assert_eq!(
            output.store_targets.get(&second_store_loc).cloned().unwrap_or_default(),
            Set::from([Object::Alloc(a.clone())])
        );
        assert_eq!(
            output.pts_out.get(&(second_store_loc, a)).cloned().unwrap_or_default(),
            Set::from([Object::Alloc(c)])
        );
    }

    #[test]
    fn interprocedural_parameter_binding_propagates_to_caller() {
        let (program, output) = analyze(
            "fn g(pi: &&int) -> int {\nentry:\n  aprime: &int = alloc\n  store aprime, pi\n  ret 0\n}\nfn f() -> int {\nentry:\n  b: &&int = alloc\n  call g(b) -> after\nafter:\n  x = load b\n  ret 0\n}\n",
        );
        let g = &program.functions[&func_id("g")];
        let aprime = g.body[&bb_id("entry")].insts[0].lhs().unwrap().clone();
        let f = &program.functions[&func_id("f")];
        let b = f.body[&bb_id("entry")].insts[0].lhs().unwrap().clone();
        let call_loc = (f.id.clone(), ProgramPoint::Terminal(bb_id("entry")));
        assert_eq!(
            output.pts_out.get(&(call_loc, b)).cloned().unwrap_or_default(),
            Set::from([Object::Alloc(aprime)])
        );
    }

    #[test]
    fn weak_update_at_merge_then_strong_update_kills_it() {
        let (program, output) = analyze(
            "fn f(c: int) -> int {\nentry:\n  a1: &int = alloc\n  a2: &int = alloc\n  a3: &int = alloc\n  p: &&int = alloc\n  branch c, left, right\nleft:\n  store a1, p\n  jump join\nright:\n  store a2, p\n  jump join\njoin:\n  store a3, p\n  q = load p\n  ret 0\n}\n",
        );
        let f = &program.functions[&func_id("f")];
        let a3 = f.body[&bb_id("join")].insts[0].lhs().unwrap().clone();
        let p = f.body[&bb_id("entry")].insts[3].lhs().unwrap().clone();
        let final_store_loc = (f.id.clone(), ProgramPoint::Instruction(bb_id("join"), 0));
        assert_eq!(
            output.pts_out.get(&(final_store_loc, p)).cloned().unwrap_or_default(),
            Set::from([Object::Alloc(a3)])
        );
    }

    /// Two branches each store a different alloca into `p`, joining directly
    /// at a use with no subsequent def: the join must see both, not
    /// whichever arm happened to be processed last.
    #[test]
    fn weak_update_at_merge_unions_both_branches() {
        let (program, output) = analyze(
            "fn f(c: int) -> int {\nentry:\n  a1: &int = alloc\n  a2: &int = alloc\n  p: &&int = alloc\n  branch c, left, right\nleft:\n  store a1, p\n  jump join\nright:\n  store a2, p\n  jump join\njoin:\n  q = load p\n  ret 0\n}\n",
        );
        let f = &program.functions[&func_id("f")];
        let a1 = f.body[&bb_id("entry")].insts[0].lhs().unwrap().clone();
        let a2 = f.body[&bb_id("entry")].insts[1].lhs().unwrap().clone();
        let p = f.body[&bb_id("entry")].insts[2].lhs().unwrap().clone();
        let load_loc = (f.id.clone(), ProgramPoint::Instruction(bb_id("join"), 0));
        assert_eq!(
            output.pts_out.get(&(load_loc, p)).cloned().unwrap_or_default(),
            Set::from([Object::Alloc(a1), Object::Alloc(a2)])
        );
    }

    /// Storing through a pointer whose only known content is bottom is a
    /// possible null-pointer write, the witness `bin/nullcheck.rs` looks for
    /// via `store_targets`.
    #[test]
    fn null_dereference_witness_store_target_contains_bottom() {
        let (program, output) = analyze(
            "fn f() -> int {\nentry:\n  a: &int = alloc\n  x = load a\n  store 0, x\n  ret 0\n}\n",
        );
        let f = &program.functions[&func_id("f")];
        let x = f.body[&bb_id("entry")].insts[1].lhs().unwrap().clone();
        let store_loc = (f.id.clone(), ProgramPoint::Instruction(bb_id("entry"), 2));
        assert!(output
            .store_targets
            .get(&store_loc)
            .cloned()
            .unwrap_or_default()
            .contains(&Object::Bottom));
        // `x` never resolved to a concrete owner at this point, so its own
        // points-to entry here is empty rather than `{bottom}`. Bottom lives
        // in `a`'s content, which is what `x` aliases.
        assert!(output.pts_out.get(&(store_loc, x)).is_none());
    }

    /// Soundness vs. Andersen: every flow-sensitive `PTS_out[l][p]` this
    /// engine produces is a subset of the flow-insensitive `And[p]` (here,
    /// the Andersen oracle's `content(p)`, since `pts_out` is keyed by the
    /// object a cell's *content* belongs to).
    #[test]
    fn points_to_is_sound_with_respect_to_andersen() {
        let program = parse_program(
            "fn f(c: int) -> int {\nentry:\n  a1: &int = alloc\n  a2: &int = alloc\n  a3: &int = alloc\n  p: &&int = alloc\n  branch c, left, right\nleft:\n  store a1, p\n  jump join\nright:\n  store a2, p\n  jump join\njoin:\n  store a3, p\n  q = load p\n  ret 0\n}\n",
        )
        .unwrap();
        let andersen_result = andersen::solve(&program);
        let built_labels = labels_mod::build(&program, &andersen_result);
        let config = AnalysisConfig::default();
        let output = run(&program, &andersen_result, &built_labels, &config);

        for ((_, owner), objs) in &output.pts_out {
            let flow_insensitive = andersen_result.content(owner);
            assert!(
                objs.is_subset(&flow_insensitive),
                "flow-sensitive set {objs:?} for {owner} is not a subset of Andersen's {flow_insensitive:?}"
            );
        }
    }
}
