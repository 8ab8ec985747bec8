//! Attaches `Def`/`Use` labels to instructions using the Andersen oracle.
//!
//! A formal parameter's def seeds `PointsToSetOut[entry][param]` as
//! *empty*, not `{⊥}`: an uninitialized parameter is the caller's problem,
//! not a local one, unlike an alloca, whose own content cell is seeded
//! `{⊥}`.
//!
//! The store/load/call/return rules are phrased in terms of "p is an
//! alloca" / "p is a load from `pv`", which assumes every pointer operand is
//! syntactically one of those two forms. This IR also allows pointers to
//! flow through `Copy`/`Gep`/`Gfp`, which are transparent aliases of their
//! source and contribute no constraints beyond a copy edge. This module
//! generalizes "is p an alloca / a load" into [`resolve_root`], which walks
//! a pointer back through any chain of `Copy`/`Gep`/`Gfp` to the `Alloc`,
//! parameter, or `Load` it ultimately derives from. For a direct
//! `Alloc`/parameter this is the same single-step case; the walk only does
//! real work for the copy-like instructions.

use std::collections::{BTreeMap as Map, BTreeSet as Set};
use std::fmt;

use super::andersen::AndersenResult;
use super::lir::{BbId, FuncId, Function, Instruction, Operand, Program, Terminal, VarId};
use super::objects::Object;

/// A location within the whole program: either the pseudo-point before a
/// function's first instruction (where formal parameters are defined), an
/// in-block instruction, or a block's terminator.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProgramPoint {
    Entry,
    /// A synthetic merge point at the top of `BbId`, inserted by the sparse
    /// def-use builder at a block in a pointer's iterated dominance
    /// frontier. Ranks before every real instruction in its block,
    /// including one at index 0.
    Join(BbId),
    Instruction(BbId, usize),
    Terminal(BbId),
}

impl ProgramPoint {
    /// The block this point lies within, given the function's entry block
    /// (needed for `Entry`, which doesn't carry one itself).
    pub fn block<'a>(&'a self, entry_bb: &'a BbId) -> &'a BbId {
        match self {
            ProgramPoint::Entry => entry_bb,
            ProgramPoint::Join(bb) | ProgramPoint::Instruction(bb, _) | ProgramPoint::Terminal(bb) => bb,
        }
    }

    /// Intra-block ordering key: `Entry` and `Join` both rank before any real
    /// instruction, `Entry` strictly before `Join` (a function entry has no
    /// predecessors to merge), and `Terminal` ranks after every instruction.
    fn rank(&self) -> i64 {
        match self {
            ProgramPoint::Entry => i64::MIN,
            ProgramPoint::Join(_) => i64::MIN + 1,
            ProgramPoint::Instruction(_, idx) => *idx as i64,
            ProgramPoint::Terminal(_) => i64::MAX,
        }
    }
}

impl fmt::Display for ProgramPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramPoint::Entry => write!(f, "entry"),
            ProgramPoint::Join(bb) => write!(f, "{bb}:join"),
            ProgramPoint::Instruction(bb, idx) => write!(f, "{bb}:{idx}"),
            ProgramPoint::Terminal(bb) => write!(f, "{bb}:term"),
        }
    }
}

pub type Location = (FuncId, ProgramPoint);

/// Whether `a` dominates `b` within one function, reflexively (`a` dominates
/// itself), given the function's block-level dominator tree and entry block.
/// Same-block points are ordered by [`ProgramPoint::rank`]; cross-block
/// points fall back to the block-level dominator tree.
pub fn point_dominates(
    dom: &super::dominators::DominatorTree,
    entry_bb: &BbId,
    a: &ProgramPoint,
    b: &ProgramPoint,
) -> bool {
    let (abb, arank) = (a.block(entry_bb), a.rank());
    let (bbb, brank) = (b.block(entry_bb), b.rank());
    if abb == bbb {
        arank <= brank
    } else {
        dom.dominates(abb, bbb)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelKind {
    Def,
    Use,
}

/// Where a pointer-typed SSA value ultimately comes from: either directly an
/// allocation/parameter (so it *is* an object), or a value loaded through
/// another pointer `pv` (so its referents must be looked up via `pv`'s
/// points-to/alias set).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PointerRoot {
    Direct(VarId),
    Indirect(VarId),
}

#[derive(Clone, Debug)]
pub(crate) enum DefSite {
    Alloc,
    Param,
    Load(VarId),
    Copy(VarId),
}

pub(crate) fn build_def_sites(func: &Function) -> Map<VarId, DefSite> {
    let mut sites = Map::new();
    for p in &func.params {
        sites.insert(p.clone(), DefSite::Param);
    }
    for bb in func.body.values() {
        for inst in &bb.insts {
            match inst {
                Instruction::Alloc { lhs } => {
                    sites.insert(lhs.clone(), DefSite::Alloc);
                }
                Instruction::Load { lhs, src } => {
                    sites.insert(lhs.clone(), DefSite::Load(src.clone()));
                }
                Instruction::Copy { lhs, op } => {
                    if let Operand::Var(src) = op {
                        sites.insert(lhs.clone(), DefSite::Copy(src.clone()));
                    }
                }
                Instruction::Gep { lhs, src, .. } | Instruction::Gfp { lhs, src, .. } => {
                    sites.insert(lhs.clone(), DefSite::Copy(src.clone()));
                }
                Instruction::Arith { .. } | Instruction::Cmp { .. } | Instruction::CallExt { .. } => {}
            }
        }
    }
    sites
}

/// Walks `v` back through any `Copy`/`Gep`/`Gfp` chain to the `Alloc`,
/// parameter, or `Load` it derives from.
pub fn resolve_root(def_sites: &Map<VarId, DefSite>, v: &VarId) -> PointerRoot {
    let mut cur = v.clone();
    loop {
        match def_sites.get(&cur) {
            Some(DefSite::Alloc) | Some(DefSite::Param) | None => return PointerRoot::Direct(cur),
            Some(DefSite::Load(pv)) => return PointerRoot::Indirect(pv.clone()),
            Some(DefSite::Copy(src)) => cur = src.clone(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Labels {
    defs: Map<VarId, Set<Location>>,
    uses: Map<VarId, Set<Location>>,
}

impl Labels {
    pub fn defs(&self, p: &VarId) -> Set<Location> {
        self.defs.get(p).cloned().unwrap_or_default()
    }

    pub fn uses(&self, p: &VarId) -> Set<Location> {
        self.uses.get(p).cloned().unwrap_or_default()
    }

    /// Every object-identifying pointer (`Alloc`/parameter `VarId`) that has
    /// at least one label, the set the sparse def-use builder iterates over.
    pub fn labeled_pointers(&self) -> Set<VarId> {
        self.defs.keys().chain(self.uses.keys()).cloned().collect()
    }

    fn def(&mut self, p: VarId, loc: Location) {
        self.defs.entry(p).or_default().insert(loc);
    }

    fn use_(&mut self, p: VarId, loc: Location) {
        self.uses.entry(p).or_default().insert(loc);
    }
}

/// Attaches labels across the whole program.
pub fn build(program: &Program, andersen: &AndersenResult) -> Labels {
    let mut labels = Labels::default();

    for func in program.functions.values() {
        let def_sites = build_def_sites(func);

        for p in &func.params {
            if p.typ().is_ptr() {
                labels.def(p.clone(), (func.id.clone(), ProgramPoint::Entry));
            }
        }

        for (bbid, bb) in &func.body {
            for (idx, inst) in bb.insts.iter().enumerate() {
                let loc = (func.id.clone(), ProgramPoint::Instruction(bbid.clone(), idx));
                label_instruction(&mut labels, &def_sites, andersen, inst, loc);
            }

            let term_loc = (func.id.clone(), ProgramPoint::Terminal(bbid.clone()));
            match &bb.term {
                Terminal::CallDirect { args, .. } | Terminal::CallIndirect { args, .. } => {
                    label_call_args(&mut labels, &def_sites, andersen, args, term_loc);
                }
                Terminal::Ret(Some(op)) => {
                    if op.typ().is_ptr() {
                        if let Operand::Var(v) = op {
                            label_use_through(&mut labels, &def_sites, andersen, v, term_loc);
                        }
                    }
                    for p in &func.params {
                        if p.typ().is_ptr() {
                            labels.use_(p.clone(), term_loc.clone());
                        }
                    }
                }
                Terminal::Ret(None) => {
                    for p in &func.params {
                        if p.typ().is_ptr() {
                            labels.use_(p.clone(), term_loc.clone());
                        }
                    }
                }
                Terminal::Branch { .. } | Terminal::Jump(_) => {}
            }
        }
    }

    labels
}

fn label_instruction(
    labels: &mut Labels,
    def_sites: &Map<VarId, DefSite>,
    andersen: &AndersenResult,
    inst: &Instruction,
    loc: Location,
) {
    match inst {
        Instruction::Alloc { lhs } => {
            labels.def(lhs.clone(), loc);
        }
        Instruction::Store { dst, op: _ } => {
            label_def_use_through(labels, def_sites, andersen, dst, loc.clone());
        }
        Instruction::Load { lhs: _, src } => {
            label_use_through(labels, def_sites, andersen, src, loc);
        }
        Instruction::CallExt { args, .. } => {
            label_call_args(labels, def_sites, andersen, args, loc);
        }
        Instruction::Arith { .. }
        | Instruction::Cmp { .. }
        | Instruction::Copy { .. }
        | Instruction::Gep { .. }
        | Instruction::Gfp { .. } => {}
    }
}

fn label_call_args(
    labels: &mut Labels,
    def_sites: &Map<VarId, DefSite>,
    andersen: &AndersenResult,
    args: &[Operand],
    loc: Location,
) {
    for arg in args {
        if arg.typ().is_ptr() {
            if let Operand::Var(v) = arg {
                label_def_use_through(labels, def_sites, andersen, v, loc.clone());
            }
        }
    }
}

fn label_def_use_through(
    labels: &mut Labels,
    def_sites: &Map<VarId, DefSite>,
    andersen: &AndersenResult,
    v: &VarId,
    loc: Location,
) {
    match resolve_root(def_sites, v) {
        PointerRoot::Direct(owner) => {
            labels.def(owner.clone(), loc.clone());
            labels.use_(owner, loc);
        }
        PointerRoot::Indirect(pv) => {
            for o in andersen.content(&pv) {
                if let Some(owner) = o.var() {
                    labels.def(owner.clone(), loc.clone());
                    labels.use_(owner.clone(), loc.clone());
                }
            }
        }
    }
}

fn label_use_through(
    labels: &mut Labels,
    def_sites: &Map<VarId, DefSite>,
    andersen: &AndersenResult,
    v: &VarId,
    loc: Location,
) {
    match resolve_root(def_sites, v) {
        PointerRoot::Direct(owner) => labels.use_(owner, loc),
        PointerRoot::Indirect(pv) => {
            for o in andersen.content(&pv) {
                if let Some(owner) = o.var() {
                    labels.use_(owner.clone(), loc.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middle_end::andersen;
    use crate::middle_end::lir::parser::parse_program;

    #[test]
    fn alloca_store_labels_def_and_use_at_same_site() {
        let program = parse_program(
            "fn f() -> int {\nentry:\n  a: &int = alloc\n  store 0, a\n  ret 0\n}\n",
        )
        .unwrap();
        let andersen_result = andersen::solve(&program);
        let labels = build(&program, &andersen_result);
        let f = &program.functions[&crate::middle_end::lir::func_id("f")];
        let entry = &f.body[&crate::middle_end::lir::bb_id("entry")];
        let a = entry.insts[0].lhs().unwrap().clone();
        let store_loc = (
            f.id.clone(),
            ProgramPoint::Instruction(crate::middle_end::lir::bb_id("entry"), 1),
        );
        assert!(labels.defs(&a).contains(&store_loc));
        assert!(labels.uses(&a).contains(&store_loc));
    }

    #[test]
    fn parameter_defined_at_entry_and_used_at_every_return() {
        let program = parse_program(
            "fn f(p: &int) -> int {\nentry:\n  ret 0\n}\n",
        )
        .unwrap();
        let andersen_result = andersen::solve(&program);
        let labels = build(&program, &andersen_result);
        let f = &program.functions[&crate::middle_end::lir::func_id("f")];
        let p = f.params[0].clone();
        assert!(labels.defs(&p).contains(&(f.id.clone(), ProgramPoint::Entry)));
        assert!(labels
            .uses(&p)
            .contains(&(f.id.clone(), ProgramPoint::Terminal(crate::middle_end::lir::bb_id("entry")))));
    }
}
