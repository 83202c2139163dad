//! Dominator tree and dominance frontiers (Cooper, Harvey, Kennedy, "A Simple,
//! Fast Dominance Algorithm"), the facility [`crate::ssa_reconstruct`] needs
//! to decide where phis go.

use std::collections::{HashMap, HashSet};

use crate::ir::{Graph, NodeId};

pub struct DominatorTree {
    /// Reverse-postorder index of each reachable block.
    rpo_index: HashMap<NodeId, usize>,
    rpo: Vec<NodeId>,
    idom: Vec<usize>,
}

impl DominatorTree {
    pub fn build(graph: &Graph, entry: NodeId) -> Self {
        let succs = graph.successor_map();
        let rpo = reverse_postorder(graph, entry, &succs);
        let rpo_index: HashMap<NodeId, usize> = rpo.iter().enumerate().map(|(i, &b)| (b, i)).collect();

        let mut idom = vec![usize::MAX; rpo.len()];
        let entry_idx = rpo_index[&entry];
        idom[entry_idx] = entry_idx;

        let mut changed = true;
        while changed {
            changed = false;
            for (i, &block) in rpo.iter().enumerate() {
                if i == entry_idx {
                    continue;
                }
                let preds: Vec<usize> = graph
                    .control_preds(block)
                    .iter()
                    .filter_map(|p| rpo_index.get(p).copied())
                    .filter(|&p| idom[p] != usize::MAX)
                    .collect();
                let Some((&first, rest)) = preds.split_first() else {
                    continue;
                };
                let mut new_idom = first;
                for &p in rest {
                    new_idom = intersect(&idom, new_idom, p);
                }
                if idom[i] != new_idom {
                    idom[i] = new_idom;
                    changed = true;
                }
            }
        }

        DominatorTree { rpo_index, rpo, idom }
    }

    pub fn idom(&self, block: NodeId) -> Option<NodeId> {
        let i = *self.rpo_index.get(&block)?;
        let d = self.idom[i];
        if d == usize::MAX || d == i {
            None
        } else {
            Some(self.rpo[d])
        }
    }

    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        let (Some(&mut_a), Some(&mut_b)) = (self.rpo_index.get(&a), self.rpo_index.get(&b)) else {
            return false;
        };
        let mut cur = mut_b;
        loop {
            if cur == mut_a {
                return true;
            }
            let d = self.idom[cur];
            if d == cur {
                return cur == mut_a;
            }
            cur = d;
        }
    }

    /// Immediate-dominator children of every reachable block.
    pub fn children(&self) -> HashMap<NodeId, Vec<NodeId>> {
        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (i, &block) in self.rpo.iter().enumerate() {
            let d = self.idom[i];
            if d != usize::MAX && d != i {
                children.entry(self.rpo[d]).or_default().push(block);
            }
        }
        children
    }

    /// Dominance frontier of every reachable block (Cytron et al.).
    pub fn dominance_frontiers(&self, graph: &Graph) -> HashMap<NodeId, HashSet<NodeId>> {
        let mut df: HashMap<NodeId, HashSet<NodeId>> = self.rpo.iter().map(|&b| (b, HashSet::new())).collect();
        for &block in &self.rpo {
            let preds = graph.control_preds(block);
            if preds.len() < 2 {
                continue;
            }
            let Some(&block_idx) = self.rpo_index.get(&block) else {
                continue;
            };
            for &pred in preds {
                let Some(&pred_idx) = self.rpo_index.get(&pred) else {
                    continue;
                };
                if self.idom[pred_idx] == usize::MAX {
                    continue;
                }
                let mut runner = pred_idx;
                while runner != self.idom[block_idx] {
                    df.get_mut(&self.rpo[runner]).unwrap().insert(block);
                    let next = self.idom[runner];
                    if next == runner {
                        break;
                    }
                    runner = next;
                }
            }
        }
        df
    }
}

fn intersect(idom: &[usize], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while a > b {
            a = idom[a];
        }
        while b > a {
            b = idom[b];
        }
    }
    a
}

pub(crate) fn reverse_postorder(graph: &Graph, entry: NodeId, succs: &HashMap<NodeId, Vec<NodeId>>) -> Vec<NodeId> {
    let mut visited = HashSet::new();
    let mut postorder = Vec::new();
    let mut stack: Vec<(NodeId, usize)> = vec![(entry, 0)];
    visited.insert(entry);

    while let Some((block, next_child)) = stack.pop() {
        let children = succs.get(&block).map(Vec::as_slice).unwrap_or(&[]);
        if next_child < children.len() {
            let child = children[next_child];
            stack.push((block, next_child + 1));
            if visited.insert(child) {
                stack.push((child, 0));
            }
        } else {
            postorder.push(block);
        }
    }

    postorder.reverse();
    postorder
}
