//! Sparse per-pointer def-use graph construction.
//!
//! For each labeled pointer `p`, builds a small dominator graph (`DG`) over
//! `p`'s def locations plus synthetic join nodes at the iterated dominance
//! frontier of those defs, runs a one-pass reaching-defs fixpoint over `DG`,
//! then wires each of `p`'s use locations to whichever `DG` node most
//! closely dominates it. The strong/weak branch at each def node uses a
//! real alias-set size computed per node rather than a cached lookup; see
//! `alias_size_at` below.

use std::collections::{BTreeMap as Map, BTreeSet as Set, VecDeque};

use super::andersen::AndersenResult;
use super::dominators::{DominanceFrontier, DominatorTree};
use super::labels::{build_def_sites, point_dominates, Labels, Location, PointerRoot, ProgramPoint};
use super::lir::{BbId, Function, Instruction, Operand, Program, Terminal, VarId};

/// The sparse def-use graph for the whole program: for each labeled pointer
/// `p`, a map from one of `p`'s def locations to the set of use locations it
/// reaches without an intervening def.
#[derive(Clone, Debug, Default)]
pub struct DefUseGraph {
    edges: Map<VarId, Map<Location, Set<Location>>>,
}

impl DefUseGraph {
    /// Every use location reached by a def at `def_loc`, for pointer `p`.
    pub fn uses_of(&self, p: &VarId, def_loc: &Location) -> Set<Location> {
        self.edges
            .get(p)
            .and_then(|by_def| by_def.get(def_loc))
            .cloned()
            .unwrap_or_default()
    }

    /// Adds a def-use edge discovered dynamically, e.g. by alias-user
    /// maintenance revealing a new write target after the static graph was
    /// built. Returns whether the edge is new.
    pub fn add_edge(&mut self, p: VarId, def_loc: Location, use_loc: Location) -> bool {
        self.edges
            .entry(p)
            .or_default()
            .entry(def_loc)
            .or_default()
            .insert(use_loc)
    }

    /// Every def-use edge `(def, use)` for pointer `p`, for worklist seeding.
    pub fn edges_for(&self, p: &VarId) -> Vec<(Location, Location)> {
        self.edges
            .get(p)
            .map(|by_def| {
                by_def
                    .iter()
                    .flat_map(|(d, uses)| uses.iter().map(move |u| (d.clone(), u.clone())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Builds the sparse def-use graph for every labeled pointer in the program.
pub fn build(program: &Program, andersen: &AndersenResult, labels: &Labels) -> DefUseGraph {
    let mut graph = DefUseGraph::default();

    for p in labels.labeled_pointers() {
        let func_id = match p.scope() {
            Some(f) => f.clone(),
            None => continue,
        };
        let func = match program.functions.get(&func_id) {
            Some(f) => f,
            None => continue,
        };
        build_for_pointer(&mut graph, andersen, labels, func, &p);
    }

    graph
}

/// Builds (or rebuilds) the def-use edges for one pointer `p`, scoped to its
/// owning function. Safe to call again after new def/use labels for `p`
/// appear dynamically: it recomputes from scratch rather than patching
/// incrementally, trading a little redundant work for never getting the
/// dominator-graph fixpoint out of sync with the labels.
pub fn build_for_pointer(
    graph: &mut DefUseGraph,
    andersen: &AndersenResult,
    labels: &Labels,
    func: &Function,
    p: &VarId,
) {
    let def_locs = labels.defs(p);
    if def_locs.is_empty() {
        return;
    }
    let use_locs = labels.uses(p);

    let cfg = super::lir::cfg::Cfg::new(func);
    let dom = DominatorTree::compute(&cfg);
    let df = DominanceFrontier::compute(&cfg, &dom);
    let entry_bb = func.entry().clone();

    let def_blocks: Set<BbId> = def_locs
        .iter()
        .map(|(_, pp)| pp.block(&entry_bb).clone())
        .collect();
    let join_blocks = df.iterated_frontier(&def_blocks);

    // DG nodes: every def location, plus one synthetic join per block in the
    // iterated dominance frontier.
    let mut nodes: Set<ProgramPoint> = def_locs.iter().map(|(_, pp)| pp.clone()).collect();
    for bb in &join_blocks {
        nodes.insert(ProgramPoint::Join(bb.clone()));
    }
    let is_def: Set<ProgramPoint> = def_locs.iter().map(|(_, pp)| pp.clone()).collect();

    // DG edges: each node's parent is the tightest other node in `nodes`
    // that dominates it.
    let def_sites = build_def_sites(func);
    let nodes_vec: Vec<ProgramPoint> = nodes.iter().cloned().collect();
    let mut parent: Map<ProgramPoint, ProgramPoint> = Map::new();
    let mut children: Map<ProgramPoint, Vec<ProgramPoint>> = Map::new();
    let mut roots: Vec<ProgramPoint> = Vec::new();

    for node in &nodes_vec {
        let candidates: Vec<&ProgramPoint> = nodes_vec
            .iter()
            .filter(|n| *n != node && point_dominates(&dom, &entry_bb, n, node))
            .collect();
        let mut idom: Option<ProgramPoint> = None;
        for cand in candidates {
            idom = Some(match idom {
                None => cand.clone(),
                Some(cur) => {
                    if point_dominates(&dom, &entry_bb, &cur, cand) {
                        cand.clone()
                    } else {
                        cur
                    }
                }
            });
        }
        match idom {
            Some(parent_node) => {
                parent.insert(node.clone(), parent_node.clone());
                children.entry(parent_node).or_default().push(node.clone());
            }
            None => roots.push(node.clone()),
        }
    }

    // Forward fixpoint over the DG (a forest, so one bottom-up pass suffices,
    // but a worklist is used to match the engine's usual idiom).
    let mut out: Map<ProgramPoint, Set<Location>> = Map::new();
    let mut in_: Map<ProgramPoint, Set<Location>> = Map::new();
    let mut worklist: VecDeque<ProgramPoint> = roots.into_iter().collect();
    let mut queued: Set<ProgramPoint> = worklist.iter().cloned().collect();

    while let Some(node) = worklist.pop_front() {
        queued.remove(&node);
        let new_in: Set<Location> = match parent.get(&node) {
            Some(par) => out.get(par).cloned().unwrap_or_default(),
            None => Set::new(),
        };
        let loc = (func.id.clone(), node.clone());
        let new_out = if is_def.contains(&node) {
            let strong = alias_size_at(&def_sites, andersen, func, &node) <= 1;
            if strong {
                Set::from([loc.clone()])
            } else {
                let mut s = new_in.clone();
                s.insert(loc.clone());
                s
            }
        } else {
            new_in.clone()
        };

        let changed_in = in_.get(&node) != Some(&new_in);
        let changed_out = out.get(&node) != Some(&new_out);
        in_.insert(node.clone(), new_in);
        out.insert(node.clone(), new_out);

        if changed_in || changed_out {
            if let Some(kids) = children.get(&node) {
                for kid in kids {
                    if queued.insert(kid.clone()) {
                        worklist.push_back(kid.clone());
                    }
                }
            }
        }
    }

    // Step 5: wire each use location to the reaching defs at its tightest
    // dominating DG node.
    for (func_of_use, use_pp) in &use_locs {
        if *func_of_use != func.id {
            continue;
        }
        let candidates: Vec<&ProgramPoint> = nodes_vec
            .iter()
            .filter(|n| point_dominates(&dom, &entry_bb, n, use_pp))
            .collect();
        let mut tightest: Option<ProgramPoint> = None;
        for cand in candidates {
            tightest = Some(match tightest {
                None => cand.clone(),
                Some(cur) => {
                    if point_dominates(&dom, &entry_bb, &cur, cand) {
                        cand.clone()
                    } else {
                        cur
                    }
                }
            });
        }
        let Some(tightest) = tightest else { continue };
        let reaching = out.get(&tightest).cloned().unwrap_or_default();
        let use_loc = (func.id.clone(), use_pp.clone());
        for def_loc in reaching {
            graph.add_edge(p.clone(), def_loc, use_loc.clone());
        }
    }
}

/// The size of the alias set backing a def of `p` at `node`: 1 for a direct
/// write through `p` itself (an alloca, a parameter, or a call/return
/// binding naming `p` directly), or the Andersen-time size of the indirect
/// pointer's address set when the write reaches `p` through a load.
fn alias_size_at(
    def_sites: &Map<VarId, super::labels::DefSite>,
    andersen: &AndersenResult,
    func: &Function,
    node: &ProgramPoint,
) -> usize {
    let operands: Vec<&VarId> = match node {
        ProgramPoint::Entry => return 1,
        ProgramPoint::Join(_) => return 1,
        ProgramPoint::Instruction(bb, idx) => {
            let inst = &func.body[bb].insts[*idx];
            match inst {
                Instruction::Alloc { .. } => return 1,
                Instruction::Store { dst, .. } => vec![dst],
                Instruction::CallExt { args, .. } => {
                    args.iter().filter_map(Operand::as_var).collect()
                }
                _ => return 1,
            }
        }
        ProgramPoint::Terminal(bb) => match &func.body[bb].term {
            Terminal::CallDirect { args, .. } | Terminal::CallIndirect { args, .. } => {
                args.iter().filter_map(Operand::as_var).collect()
            }
            Terminal::Ret(_) => return 1,
            _ => return 1,
        },
    };

    let mut best = usize::MAX;
    for v in operands {
        let size = match super::labels::resolve_root(def_sites, v) {
            PointerRoot::Direct(_) => 1,
            PointerRoot::Indirect(pv) => andersen.content(&pv).len().max(1),
        };
        best = best.min(size);
    }
    if best == usize::MAX {
        1
    } else {
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middle_end::andersen;
    use crate::middle_end::lir::{bb_id, func_id, parser::parse_program};
    use crate::middle_end::labels;

    #[test]
    fn straight_line_store_reaches_later_use() {
        let program = parse_program(
            "fn f() -> int {\nentry:\n  a: &int = alloc\n  store 1, a\n  q = load a\n  ret 0\n}\n",
        )
        .unwrap();
        let andersen_result = andersen::solve(&program);
        let built_labels = labels::build(&program, &andersen_result);
        let dug = build(&program, &andersen_result, &built_labels);

        let f = &program.functions[&func_id("f")];
        let entry = &f.body[&bb_id("entry")];
        let a = entry.insts[0].lhs().unwrap().clone();
        let store_loc = (f.id.clone(), ProgramPoint::Instruction(bb_id("entry"), 1));
        let load_loc = (f.id.clone(), ProgramPoint::Instruction(bb_id("entry"), 2));

        assert!(dug.uses_of(&a, &store_loc).contains(&load_loc));
    }

    #[test]
    fn diamond_merges_at_join_before_use() {
        let program = parse_program(
            "fn f(c: int) -> int {\nentry:\n  a: &int = alloc\n  branch c, left, right\nleft:\n  store 1, a\n  jump join\nright:\n  store 2, a\n  jump join\njoin:\n  q = load a\n  ret 0\n}\n",
        )
        .unwrap();
        let andersen_result = andersen::solve(&program);
        let built_labels = labels::build(&program, &andersen_result);
        let dug = build(&program, &andersen_result, &built_labels);

        let f = &program.functions[&func_id("f")];
        let a = f.body[&bb_id("entry")].insts[0].lhs().unwrap().clone();
        let left_store = (f.id.clone(), ProgramPoint::Instruction(bb_id("left"), 0));
        let right_store = (f.id.clone(), ProgramPoint::Instruction(bb_id("right"), 0));
        let load_loc = (f.id.clone(), ProgramPoint::Instruction(bb_id("join"), 0));

        assert!(dug.uses_of(&a, &left_store).contains(&load_loc));
        assert!(dug.uses_of(&a, &right_store).contains(&load_loc));
    }
}
