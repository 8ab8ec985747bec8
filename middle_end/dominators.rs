//! Dominator tree and dominance frontier collaborator
//! (`get_dominator_tree`/`get_dominance_frontier`).
//!
//! Implements the classic Cooper/Harvey/Kennedy iterative dominance
//! algorithm and the Cytron et al. dominance-frontier construction, in the
//! usual `Map`/`Set` idiom.

use std::collections::{BTreeMap as Map, BTreeSet as Set};
use std::sync::OnceLock;

use super::lir::cfg::Cfg;
use super::lir::BbId;

/// Immediate-dominator tree for one function's CFG. Memoized by the caller,
/// per function, and never mutated; this type itself is just the computed,
/// immutable result.
#[derive(Clone, Debug)]
pub struct DominatorTree {
    entry: BbId,
    idom: Map<BbId, BbId>,
    rpo_index: Map<BbId, usize>,
}

impl DominatorTree {
    pub fn compute(cfg: &Cfg) -> Self {
        let rpo = cfg.reverse_postorder();
        let rpo_index: Map<BbId, usize> = rpo
            .iter()
            .enumerate()
            .map(|(i, b)| (b.clone(), i))
            .collect();

        let mut idom: Map<BbId, BbId> = Map::new();
        idom.insert(cfg.entry.clone(), cfg.entry.clone());

        let mut changed = true;
        while changed {
            changed = false;
            for b in &rpo {
                if *b == cfg.entry {
                    continue;
                }
                let mut new_idom: Option<BbId> = None;
                for p in cfg.pred(b) {
                    if !idom.contains_key(p) {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p.clone(),
                        Some(cur) => Self::intersect(&cur, p, &idom, &rpo_index),
                    });
                }
                if let Some(ni) = new_idom {
                    if idom.get(b) != Some(&ni) {
                        idom.insert(b.clone(), ni);
                        changed = true;
                    }
                }
            }
        }

        DominatorTree {
            entry: cfg.entry.clone(),
            idom,
            rpo_index,
        }
    }

    fn intersect(a: &BbId, b: &BbId, idom: &Map<BbId, BbId>, rpo_index: &Map<BbId, usize>) -> BbId {
        let mut a = a.clone();
        let mut b = b.clone();
        while a != b {
            while rpo_index[&a] > rpo_index[&b] {
                a = idom[&a].clone();
            }
            while rpo_index[&b] > rpo_index[&a] {
                b = idom[&b].clone();
            }
        }
        a
    }

    /// `None` for the entry block, which has no immediate dominator.
    pub fn immediate_dominator(&self, bb: &BbId) -> Option<BbId> {
        if *bb == self.entry {
            None
        } else {
            self.idom.get(bb).cloned()
        }
    }

    /// Whether `a` dominates `b` (every path from the entry to `b` passes
    /// through `a`); a node dominates itself.
    pub fn dominates(&self, a: &BbId, b: &BbId) -> bool {
        let mut cur = b.clone();
        loop {
            if cur == *a {
                return true;
            }
            match self.idom.get(&cur) {
                Some(next) if *next != cur => cur = next.clone(),
                _ => return false,
            }
        }
    }

    pub fn entry(&self) -> &BbId {
        &self.entry
    }
}

/// Per-block dominance frontier, plus iterated-dominance-frontier closure
/// for the sparse def-use construction.
#[derive(Clone, Debug)]
pub struct DominanceFrontier {
    df: Map<BbId, Set<BbId>>,
    empty: OnceLock<Set<BbId>>,
}

impl DominanceFrontier {
    pub fn compute(cfg: &Cfg, dom: &DominatorTree) -> Self {
        let mut df: Map<BbId, Set<BbId>> = cfg.blocks().map(|b| (b.clone(), Set::new())).collect();

        for b in cfg.blocks() {
            let preds: Vec<&BbId> = cfg.pred(b).collect();
            if preds.len() < 2 {
                continue;
            }
            let idom_b = dom.immediate_dominator(b);
            for p in preds {
                let mut runner = p.clone();
                while Some(&runner) != idom_b.as_ref() {
                    df.entry(runner.clone()).or_default().insert(b.clone());
                    match dom.immediate_dominator(&runner) {
                        Some(next) => runner = next,
                        None => break,
                    }
                }
            }
        }

        DominanceFrontier {
            df,
            empty: OnceLock::new(),
        }
    }

    pub fn frontier(&self, bb: &BbId) -> &Set<BbId> {
        self.df
            .get(bb)
            .unwrap_or_else(|| self.empty.get_or_init(Set::new))
    }

    /// The iterated dominance frontier of a set of basic blocks: the
    /// transitive closure of `frontier` over the set, the join-point set
    /// the sparse def-use builder needs for a pointer's definition sites.
    pub fn iterated_frontier(&self, seeds: &Set<BbId>) -> Set<BbId> {
        let mut result: Set<BbId> = Set::new();
        let mut seen: Set<BbId> = Set::new();
        let mut worklist: Vec<BbId> = seeds.iter().cloned().collect();

        while let Some(b) = worklist.pop() {
            for df_node in self.frontier(&b) {
                if seen.insert(df_node.clone()) {
                    result.insert(df_node.clone());
                    worklist.push(df_node.clone());
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middle_end::lir::{bb_id, BasicBlock, Function, Operand, Terminal};
    use std::collections::BTreeSet as Set;

    fn diamond() -> Function {
        let mut body = Map::new();
        body.insert(
            bb_id("entry"),
            BasicBlock {
                id: bb_id("entry"),
                insts: vec![],
                term: Terminal::Branch {
                    cond: Operand::Const(1),
                    tt: bb_id("left"),
                    ff: bb_id("right"),
                },
            },
        );
        body.insert(
            bb_id("left"),
            BasicBlock {
                id: bb_id("left"),
                insts: vec![],
                term: Terminal::Jump(bb_id("join")),
            },
        );
        body.insert(
            bb_id("right"),
            BasicBlock {
                id: bb_id("right"),
                insts: vec![],
                term: Terminal::Jump(bb_id("join")),
            },
        );
        body.insert(
            bb_id("join"),
            BasicBlock {
                id: bb_id("join"),
                insts: vec![],
                term: Terminal::Ret(None),
            },
        );
        Function {
            id: crate::middle_end::lir::func_id("f"),
            params: vec![],
            locals: Set::new(),
            ret_ty: None,
            body,
        }
    }

    #[test]
    fn entry_dominates_everything() {
        let f = diamond();
        let cfg = Cfg::new(&f);
        let dom = DominatorTree::compute(&cfg);
        for b in cfg.blocks() {
            assert!(dom.dominates(&bb_id("entry"), b));
        }
        assert_eq!(dom.immediate_dominator(&bb_id("join")), Some(bb_id("entry")));
    }

    #[test]
    fn diamond_join_is_its_own_frontier_target() {
        let f = diamond();
        let cfg = Cfg::new(&f);
        let dom = DominatorTree::compute(&cfg);
        let df = DominanceFrontier::compute(&cfg, &dom);
        assert!(df.frontier(&bb_id("left")).contains(&bb_id("join")));
        assert!(df.frontier(&bb_id("right")).contains(&bb_id("join")));
        assert!(df.frontier(&bb_id("entry")).is_empty());
    }
}
