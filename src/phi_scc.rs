//! Phi-SCC Redundancy Elimination (Section 4.1).
//!
//! A group of mutually-recursive phis forms a redundant strongly-connected
//! component when every value reaching the group from outside it is the
//! same single value — the phis are just passing that one value around a
//! cycle and can be replaced by it directly. Detecting such groups is an
//! SCC problem over the phi-to-phi subgraph; this reuses the iterative
//! Tarjan shape from the delta algorithm's CRWI-cycle pass, walked here
//! over phi predecessor edges instead of copy-overlap edges.
//!
//! A replacement can make a *previously* non-redundant SCC redundant: once
//! one phi in a larger tangle resolves to a concrete value, a neighboring
//! SCC that used to see two distinct external predecessors may now see the
//! same one twice. So this re-seeds the affected phis onto a work queue and
//! repeats Tarjan over just those, round by round, until a round finds
//! nothing new — not a general dataflow fixpoint, just bounded re-detection
//! local to the phis a replacement touched.
//!
//! A phi marked `loop_carry_phi` never enters the active set, so it can
//! never be collapsed and always counts as an external predecessor for
//! whatever SCC reaches it (Section 4.1's removability predicate: eligible
//! iff phi, not loop-carry-marked, and belonging to the current round).

use std::collections::{HashMap, HashSet};

use crate::error::{CoreError, CoreResult};
use crate::ir::{Graph, NodeId};

#[derive(Debug, Default, Clone, Copy)]
pub struct PhiSccStats {
    pub phis_examined: usize,
    pub sccs_found: usize,
    pub redundant_removed: usize,
    pub rounds: usize,
}

/// Replaces every phi in a redundant SCC with the single value it's really
/// carrying, across as many rounds as needed to reach quiescence.
pub fn opt_remove_unnecessary_phi_sccs(graph: &mut Graph) -> CoreResult<PhiSccStats> {
    let mut stats = PhiSccStats::default();
    let mut replacement: HashMap<NodeId, NodeId> = HashMap::new();

    let mut active: HashSet<NodeId> = graph
        .blocks()
        .into_iter()
        .flat_map(|b| graph.phis_of(b).to_vec())
        .filter(|&p| !graph.node(p).loop_carry_phi)
        .collect();
    stats.phis_examined = active.len();
    tracing::debug!(target: "phi_scc", phis = stats.phis_examined, "starting phi-SCC redundancy elimination");

    loop {
        stats.rounds += 1;
        let phis: Vec<NodeId> = active.iter().copied().collect();
        let sccs = tarjan_scc(&phis, |p| {
            graph
                .node(p)
                .inputs
                .iter()
                .map(|&i| resolve(i, &replacement))
                .filter(|&i| active.contains(&i))
                .collect()
        });
        stats.sccs_found += sccs.len();

        let mut made_progress = false;
        for scc in &sccs {
            let members: HashSet<NodeId> = scc.iter().copied().collect();
            let mut externals: HashSet<NodeId> = HashSet::new();
            for &p in scc {
                for &input in &graph.node(p).inputs {
                    let resolved = resolve(input, &replacement);
                    if !members.contains(&resolved) {
                        externals.insert(resolved);
                    }
                }
            }

            match externals.len() {
                0 => {
                    return Err(CoreError::Invariant {
                        node: scc[0],
                        detail: "phi SCC has no external predecessor; no canonical value exists".into(),
                    });
                }
                1 => {
                    let canonical = *externals.iter().next().unwrap();
                    for &p in scc {
                        replacement.insert(p, canonical);
                        active.remove(&p);
                    }
                    stats.redundant_removed += scc.len();
                    made_progress = true;
                }
                _ => {}
            }
        }

        if !made_progress {
            break;
        }
    }

    tracing::info!(
        target: "phi_scc",
        removed = stats.redundant_removed,
        rounds = stats.rounds,
        "phi-SCC pass complete"
    );

    for (&phi, &target) in &replacement {
        let canonical = resolve(phi, &replacement);
        debug_assert_eq!(canonical, resolve(target, &replacement));
        graph.replace_all_uses(phi, canonical);
        if let Some(block) = graph.node(phi).block {
            graph.remove_phi(block, phi);
        }
    }

    Ok(stats)
}

/// Follows the replacement chain to its final canonical value. Chains are
/// short in practice (one hop per round a phi survived before resolving)
/// but this walks to a fixed point defensively rather than assuming depth 1.
fn resolve(mut id: NodeId, replacement: &HashMap<NodeId, NodeId>) -> NodeId {
    let mut seen = HashSet::new();
    while let Some(&next) = replacement.get(&id) {
        if !seen.insert(id) {
            break;
        }
        id = next;
    }
    id
}

/// Iterative Tarjan SCC restricted to an explicit node set and an adjacency
/// closure, so the same shape serves any subgraph (here: phi predecessor
/// edges) without materializing a dense index-based graph up front.
fn tarjan_scc(nodes: &[NodeId], adj: impl Fn(NodeId) -> Vec<NodeId>) -> Vec<Vec<NodeId>> {
    let index_of: HashMap<NodeId, usize> = nodes.iter().enumerate().map(|(i, &n)| (n, i)).collect();
    let n = nodes.len();
    let adjacency: Vec<Vec<usize>> = nodes
        .iter()
        .map(|&id| adj(id).into_iter().filter_map(|w| index_of.get(&w).copied()).collect())
        .collect();

    let mut index_counter = 0usize;
    let mut index = vec![usize::MAX; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut tarjan_stack: Vec<usize> = Vec::new();
    let mut sccs: Vec<Vec<usize>> = Vec::new();
    let mut call_stack: Vec<(usize, usize)> = Vec::new();

    for start in 0..n {
        if index[start] != usize::MAX {
            continue;
        }

        index[start] = index_counter;
        lowlink[start] = index_counter;
        index_counter += 1;
        on_stack[start] = true;
        tarjan_stack.push(start);
        call_stack.push((start, 0));

        while let Some(&(v, ni)) = call_stack.last() {
            if ni < adjacency[v].len() {
                let w = adjacency[v][ni];
                call_stack.last_mut().unwrap().1 += 1;
                if index[w] == usize::MAX {
                    index[w] = index_counter;
                    lowlink[w] = index_counter;
                    index_counter += 1;
                    on_stack[w] = true;
                    tarjan_stack.push(w);
                    call_stack.push((w, 0));
                } else if on_stack[w] && index[w] < lowlink[v] {
                    lowlink[v] = index[w];
                }
            } else {
                call_stack.pop();
                if let Some(&(parent, _)) = call_stack.last() {
                    if lowlink[v] < lowlink[parent] {
                        lowlink[parent] = lowlink[v];
                    }
                }
                if lowlink[v] == index[v] {
                    let mut scc = Vec::new();
                    loop {
                        let w = tarjan_stack.pop().unwrap();
                        on_stack[w] = false;
                        scc.push(w);
                        if w == v {
                            break;
                        }
                    }
                    sccs.push(scc);
                }
            }
        }
    }

    sccs.into_iter().map(|scc| scc.into_iter().map(|i| nodes[i]).collect()).collect()
}
