//! Flow-insensitive, inclusion-based (Andersen-style) pre-pass.
//!
//! Grounded in `constraints_gen.rs`'s constraint shapes
//! (`ConstraintExp::{Var, Ref, Proj}`) and `constraint_solve.rs`'s worklist
//! solver over `Var`/`Proj`/`Ref` edges, collapsed from a
//! generate-then-solve two-binary pipeline (`constraint_gen` +
//! `constraint_solve`, which round-trip through a textual constraint set)
//! into one in-process `solve`, since this crate never needs the textual
//! form as an interchange format.
//!
//! Every pointer SSA value `v` has an *address* set, the objects `v`'s
//! value may equal, written `And[v]`, and every alloca/param `VarId`
//! additionally has a *content* set, the objects that may be stored in the
//! cell it identifies. The two are kept in one map keyed by
//! `Node::Addr`/`Node::Content` so the standard Andersen subset/complex
//! constraint solver (simple constraints are static copy edges; `load`/
//! `store` are complex constraints that add copy edges dynamically as the
//! pointer being dereferenced grows) applies uniformly to both.

use std::collections::{BTreeMap as Map, BTreeSet as Set, VecDeque};

use super::lir::{Function, Instruction, Operand, Program, Terminal, VarId};
use super::objects::Object;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Node {
    Addr(VarId),
    Content(VarId),
}

/// The result of the Andersen pre-pass: `And[p]`, queryable per pointer.
#[derive(Clone, Debug, Default)]
pub struct AndersenResult {
    pts: Map<Node, Set<Object>>,
}

impl AndersenResult {
    /// `And[p]`: the flow-insensitive over-approximation of the objects `p`
    /// may point to.
    pub fn and(&self, p: &VarId) -> Set<Object> {
        self.pts
            .get(&Node::Addr(p.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// The flow-insensitive approximation of what may be stored in the cell
    /// an alloca or parameter `VarId` identifies. Used by the labeler and
    /// propagation engine when chasing through an indirect pointer.
    pub fn content(&self, owner: &VarId) -> Set<Object> {
        self.pts
            .get(&Node::Content(owner.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// Every pointer SSA value with a non-empty `And[v]`, for `bin/dump_andersen.rs`.
    pub fn pointers(&self) -> Vec<VarId> {
        self.pts
            .keys()
            .filter_map(|n| match n {
                Node::Addr(v) => Some(v.clone()),
                Node::Content(_) => None,
            })
            .collect()
    }
}

#[derive(Default)]
struct Solver {
    pts: Map<Node, Set<Object>>,
    succ: Map<Node, Set<Node>>,
    load_rules: Map<VarId, Vec<VarId>>,
    store_rules: Map<VarId, Vec<Operand>>,
}

impl Solver {
    fn add_object(&mut self, node: Node, obj: Object, worklist: &mut VecDeque<Node>) {
        if self.pts.entry(node.clone()).or_default().insert(obj) {
            worklist.push_back(node);
        }
    }

    fn add_edge(&mut self, src: Node, dst: Node, worklist: &mut VecDeque<Node>) {
        let is_new = self.succ.entry(src.clone()).or_default().insert(dst.clone());
        if is_new {
            let existing: Vec<Object> = self.pts.get(&src).cloned().unwrap_or_default().into_iter().collect();
            for o in existing {
                self.add_object(dst.clone(), o, worklist);
            }
        }
    }

    fn process(&mut self, node: Node, worklist: &mut VecDeque<Node>) {
        let objects: Vec<Object> = self.pts.get(&node).cloned().unwrap_or_default().into_iter().collect();

        if let Node::Addr(v) = &node {
            if let Some(lhs_list) = self.load_rules.get(v).cloned() {
                for o in &objects {
                    if let Some(owner) = o.var() {
                        for lhs in &lhs_list {
                            self.add_edge(Node::Content(owner.clone()), Node::Addr(lhs.clone()), worklist);
                        }
                    }
                }
            }
            if let Some(op_list) = self.store_rules.get(v).cloned() {
                for o in &objects {
                    if let Some(owner) = o.var() {
                        for op in &op_list {
                            if let Operand::Var(opv) = op {
                                self.add_edge(Node::Addr(opv.clone()), Node::Content(owner.clone()), worklist);
                            }
                        }
                    }
                }
            }
        }

        if let Some(succs) = self.succ.get(&node).cloned() {
            for dst in succs {
                for o in &objects {
                    self.add_object(dst.clone(), o.clone(), worklist);
                }
            }
        }
    }
}

/// Solves the whole-program Andersen pre-pass: `get_andersen(module)`.
pub fn solve(program: &Program) -> AndersenResult {
    let mut solver = Solver::default();
    let mut worklist: VecDeque<Node> = VecDeque::new();

    // Static edges and complex-constraint rules, registered before any
    // points-to set is seeded so that seeding (below) pushes through a
    // complete graph.
    for func in program.functions.values() {
        register_function(&mut solver, program, func);
    }

    // Seeds: each alloca is the address of its own object, and starts with
    // an uninitialized (bottom) content.
    for func in program.functions.values() {
        for bb in func.body.values() {
            for inst in &bb.insts {
                if let Instruction::Alloc { lhs } = inst {
                    solver.add_object(Node::Addr(lhs.clone()), Object::Alloc(lhs.clone()), &mut worklist);
                    solver.add_object(
                        Node::Content(lhs.clone()),
                        Object::Bottom,
                        &mut worklist,
                    );
                }
            }
        }
    }

    while let Some(node) = worklist.pop_front() {
        solver.process(node, &mut worklist);
    }

    AndersenResult { pts: solver.pts }
}

fn register_function(solver: &mut Solver, program: &Program, func: &Function) {
    for bb in func.body.values() {
        for inst in &bb.insts {
            match inst {
                Instruction::Alloc { .. } | Instruction::Arith { .. } | Instruction::Cmp { .. } => {}
                Instruction::Copy { lhs, op } => {
                    if lhs.typ().is_ptr() {
                        if let Operand::Var(v) = op {
                            let mut wl = VecDeque::new();
                            solver.add_edge(Node::Addr(v.clone()), Node::Addr(lhs.clone()), &mut wl);
                            drain_into(solver, wl);
                        }
                    }
                }
                Instruction::Gep { lhs, src, .. } => {
                    let mut wl = VecDeque::new();
                    solver.add_edge(Node::Addr(src.clone()), Node::Addr(lhs.clone()), &mut wl);
                    drain_into(solver, wl);
                }
                Instruction::Gfp { lhs, src, .. } => {
                    let mut wl = VecDeque::new();
                    solver.add_edge(Node::Addr(src.clone()), Node::Addr(lhs.clone()), &mut wl);
                    drain_into(solver, wl);
                }
                Instruction::Load { lhs, src } => {
                    solver.load_rules.entry(src.clone()).or_default().push(lhs.clone());
                }
                Instruction::Store { dst, op } => {
                    if let Operand::Var(v) = op {
                        if v.typ().is_ptr() {
                            solver
                                .store_rules
                                .entry(dst.clone())
                                .or_default()
                                .push(op.clone());
                        }
                    }
                }
                Instruction::CallExt { .. } => {
                    // Opaque external call: no body to bind formals against.
                }
            }
        }

        match &bb.term {
            Terminal::CallDirect { lhs, callee, args, .. } => {
                if let Some(callee_fn) = program.functions.get(callee) {
                    let mut wl = VecDeque::new();
                    for (actual, formal) in args.iter().zip(callee_fn.params.iter()) {
                        if formal.typ().is_ptr() {
                            if let Operand::Var(v) = actual {
                                solver.add_edge(Node::Addr(v.clone()), Node::Addr(formal.clone()), &mut wl);
                            }
                        }
                    }
                    if let Some(lhs) = lhs {
                        if lhs.typ().is_ptr() {
                            for callee_bb in callee_fn.body.values() {
                                if let Terminal::Ret(Some(Operand::Var(v))) = &callee_bb.term {
                                    if v.typ().is_ptr() {
                                        solver.add_edge(Node::Addr(v.clone()), Node::Addr(lhs.clone()), &mut wl);
                                    }
                                }
                            }
                        }
                    }
                    drain_into(solver, wl);
                }
            }
            // Indirect calls are never resolved.
            Terminal::CallIndirect { .. } | Terminal::Branch { .. } | Terminal::Jump(_) | Terminal::Ret(_) => {}
        }
    }
}

/// Edges added before any points-to sets are seeded never have anything to
/// propagate yet; `drain_into` flushes whatever `add_edge` did enqueue
/// (nothing, at registration time) so callers don't need a shared worklist
/// threaded through every call site.
fn drain_into(solver: &mut Solver, mut wl: VecDeque<Node>) {
    while let Some(node) = wl.pop_front() {
        solver.process(node, &mut wl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middle_end::lir::parser::parse_program;

    #[test]
    fn alloca_points_to_itself() {
        let program = parse_program(
            "fn f() -> int {\nentry:\n  a: &int = alloc\n  ret 0\n}\n",
        )
        .unwrap();
        let andersen = solve(&program);
        let a = program.functions[&crate::middle_end::lir::func_id("f")]
            .body[&crate::middle_end::lir::bb_id("entry")]
            .insts[0]
            .lhs()
            .unwrap()
            .clone();
        assert_eq!(andersen.and(&a), Set::from([Object::Alloc(a.clone())]));
    }

    #[test]
    fn store_then_load_connects_through_content() {
        let program = parse_program(
            "fn f() -> int {\nentry:\n  a: &int = alloc\n  b: &&int = alloc\n  store a, b\n  q = load b\n  ret 0\n}\n",
        )
        .unwrap();
        let andersen = solve(&program);
        let f = &program.functions[&crate::middle_end::lir::func_id("f")];
        let entry = &f.body[&crate::middle_end::lir::bb_id("entry")];
        let a = entry.insts[0].lhs().unwrap().clone();
        let q = entry.insts[3].lhs().unwrap().clone();
        assert_eq!(andersen.and(&q), Set::from([Object::Alloc(a)]));
    }
}
