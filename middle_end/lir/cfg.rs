//! The per-function control-flow graph: successor/predecessor edges, entry
//! and exit blocks. Trimmed of the parts this analysis doesn't need
//! (`addr_taken`, `loop_headers`, struct-reachability): the flow-sensitive
//! engine doesn't widen loops or do field-sensitive struct reasoning, so
//! none of that bookkeeping has a caller.

use std::collections::{BTreeMap as Map, BTreeSet as Set};

use super::{bb_id, BasicBlock, BbId, Function, Terminal};

#[derive(Clone, Debug)]
pub struct Cfg {
    pub entry: BbId,
    pub exit: BbId,
    succ_edges: Map<BbId, Set<BbId>>,
    pred_edges: Map<BbId, Set<BbId>>,
}

impl Cfg {
    pub fn new(function: &Function) -> Self {
        let entry = bb_id("entry");
        let mut exit = bb_id("exit");
        let mut succ_edges: Map<BbId, Set<BbId>> = Map::new();
        let mut pred_edges: Map<BbId, Set<BbId>> = Map::new();

        for bbid in function.body.keys() {
            succ_edges.entry(bbid.clone()).or_default();
            pred_edges.entry(bbid.clone()).or_default();
        }

        for (bbid, bb) in &function.body {
            match &bb.term {
                Terminal::Ret(_) => {
                    exit = bbid.clone();
                }
                term => {
                    for succ in term.successors() {
                        succ_edges.entry(bbid.clone()).or_default().insert(succ.clone());
                        pred_edges.entry(succ).or_default().insert(bbid.clone());
                    }
                }
            }
        }

        Cfg {
            entry,
            exit,
            succ_edges,
            pred_edges,
        }
    }

    pub fn succ(&self, bb: &BbId) -> impl Iterator<Item = &BbId> {
        self.succ_edges.get(bb).into_iter().flatten()
    }

    pub fn pred(&self, bb: &BbId) -> impl Iterator<Item = &BbId> {
        self.pred_edges.get(bb).into_iter().flatten()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BbId> {
        self.succ_edges.keys()
    }

    /// Basic blocks in reverse-postorder from `entry`, the traversal order
    /// every fixpoint in this crate uses to minimize re-visits.
    pub fn reverse_postorder(&self) -> Vec<BbId> {
        let mut visited: Set<BbId> = Set::new();
        let mut postorder: Vec<BbId> = Vec::new();

        fn visit(cfg: &Cfg, bb: &BbId, visited: &mut Set<BbId>, postorder: &mut Vec<BbId>) {
            if !visited.insert(bb.clone()) {
                return;
            }
            for succ in cfg.succ(bb) {
                visit(cfg, succ, visited, postorder);
            }
            postorder.push(bb.clone());
        }

        visit(self, &self.entry, &mut visited, &mut postorder);
        postorder.reverse();
        postorder
    }

    /// Looks up the raw block data from the owning function; kept as a
    /// free function rather than a `Cfg` field so `Cfg` itself stays a pure
    /// graph-shape cache, memoizable independently of block contents.
    pub fn block<'f>(function: &'f Function, bb: &BbId) -> &'f BasicBlock {
        &function.body[bb]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middle_end::lir::parser::parse_program;
    use crate::middle_end::lir::func_id;

    #[test]
    fn diamond_has_expected_pred_succ_edges() {
        let program = parse_program(
            "fn f(c: int) -> int {\nentry:\n  branch c, left, right\nleft:\n  jump join\nright:\n  jump join\njoin:\n  ret 0\n}\n",
        )
        .unwrap();
        let f = &program.functions[&func_id("f")];
        let cfg = Cfg::new(f);

        assert_eq!(cfg.entry, bb_id("entry"));
        assert_eq!(cfg.exit, bb_id("join"));
        assert!(cfg.succ(&bb_id("entry")).collect::<Set<_>>().contains(&bb_id("left")));
        assert!(cfg.succ(&bb_id("entry")).collect::<Set<_>>().contains(&bb_id("right")));
        assert!(cfg.pred(&bb_id("join")).collect::<Set<_>>().contains(&bb_id("left")));
        assert!(cfg.pred(&bb_id("join")).collect::<Set<_>>().contains(&bb_id("right")));
    }

    #[test]
    fn reverse_postorder_visits_entry_first() {
        let program = parse_program(
            "fn f(c: int) -> int {\nentry:\n  branch c, left, right\nleft:\n  jump join\nright:\n  jump join\njoin:\n  ret 0\n}\n",
        )
        .unwrap();
        let f = &program.functions[&func_id("f")];
        let cfg = Cfg::new(f);
        let rpo = cfg.reverse_postorder();
        assert_eq!(rpo.first(), Some(&bb_id("entry")));
        assert_eq!(rpo.last(), Some(&bb_id("join")));
    }
}
