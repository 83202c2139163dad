//! Belady-style register spiller (Section 4.2).
//!
//! Walks each block in reverse-postorder, keeping a [`WorkingSet`] of values
//! believed to be in registers. An operand not already in the set forces a
//! reload; filling the set forces an eviction, which becomes a spill unless
//! the evicted value has no further use (the dead-value fixup).
//!
//! Next-use distances are computed once per block from the graph *before*
//! any node is inserted, then frozen into an owned table. Doing this live
//! against a [`ScheduleNextUse`] borrowing the graph would conflict with the
//! `&mut Graph` the insertion itself needs; freezing first, mutating after
//! is the same snapshot-then-apply split the rest of this crate uses.

use std::collections::HashMap;

use crate::collab::{NextUseOracle, SpillEnvironment};
use crate::dominance::reverse_postorder;
use crate::error::CoreResult;
use crate::ir::{Graph, NodeId, RegisterClass};
use crate::next_use::ScheduleNextUse;

use super::phi_walker;
use super::working_set::WorkingSet;

#[derive(Debug, Default, Clone, Copy)]
pub struct BeladyStats {
    pub blocks_processed: usize,
    pub spills_inserted: usize,
    pub reloads_inserted: usize,
    pub dead_evictions: usize,
    pub cross_edge_reloads: usize,
    pub phis_spilled_at_join: usize,
}

/// Working set a block ends with, keyed by block — what join blocks and the
/// phi-spill walker need to reconcile incoming edges.
pub type ExitSets = HashMap<NodeId, Vec<NodeId>>;

pub fn spill_belady<E: SpillEnvironment>(
    graph: &mut Graph,
    entry: NodeId,
    reg_class: &RegisterClass,
    env: &E,
) -> CoreResult<(BeladyStats, ExitSets)> {
    let succs = graph.successor_map();
    let order = reverse_postorder(graph, entry, &succs);
    tracing::debug!(target: "spill", reg_class = reg_class.id, blocks = order.len(), "running belady spiller");
    let mut stats = BeladyStats::default();
    let mut exit_sets: ExitSets = HashMap::new();

    for &block in &order {
        let preds = graph.control_preds(block).to_vec();
        let entry_set = if preds.len() <= 1 {
            preds
                .first()
                .and_then(|p| exit_sets.get(p))
                .cloned()
                .unwrap_or_default()
        } else {
            let frozen_candidates = phi_walker::freeze_join_candidates(graph, entry, block, reg_class.id);
            let before = count_register_phis(graph, block, reg_class.id);
            let resolved =
                phi_walker::resolve_join_entry(graph, block, reg_class.id, reg_class.n_regs, &frozen_candidates, env);
            stats.phis_spilled_at_join += before - count_register_phis(graph, block, reg_class.id);
            stats.cross_edge_reloads += phi_walker::fixup_cross_edges(graph, block, &resolved, &exit_sets, env);
            resolved
        };

        let candidates = register_candidates(graph, block, reg_class.id);
        let frozen = freeze_block_distances(graph, entry, block, &candidates);

        let mut working = WorkingSet::new(reg_class.n_regs);
        for v in entry_set {
            working.insert(v);
        }

        let schedule = graph.schedule(block).to_vec();
        let mut new_schedule = Vec::with_capacity(schedule.len());

        for (pos, &node) in schedule.iter().enumerate() {
            let inputs = graph.node(node).inputs.clone();
            for input in inputs {
                if graph.node(input).backend.reg_class != Some(reg_class.id) {
                    continue;
                }
                if working.contains(input) {
                    continue;
                }
                evict_one(graph, &mut working, &frozen, block, pos, &mut new_schedule, &mut stats, env);
                let reload = env.make_reload(graph, input, block);
                new_schedule.push(reload);
                working.insert(input);
                stats.reloads_inserted += 1;
            }

            new_schedule.push(node);

            if graph.node(node).backend.reg_class == Some(reg_class.id) && !working.contains(node) {
                if working.is_full() {
                    evict_one(graph, &mut working, &frozen, block, pos, &mut new_schedule, &mut stats, env);
                }
                working.insert(node);
            }
        }

        graph.set_schedule(block, new_schedule);
        exit_sets.insert(block, working.members().to_vec());
        stats.blocks_processed += 1;
    }

    tracing::info!(
        target: "spill",
        spills = stats.spills_inserted,
        reloads = stats.reloads_inserted,
        dead = stats.dead_evictions,
        "belady spill pass complete"
    );
    Ok((stats, exit_sets))
}

fn evict_one<E: SpillEnvironment>(
    graph: &mut Graph,
    working: &mut WorkingSet,
    frozen: &FrozenDistances,
    block: NodeId,
    pos: usize,
    new_schedule: &mut Vec<NodeId>,
    stats: &mut BeladyStats,
    env: &E,
) {
    let Some(evicted) = working.displace(frozen, block, pos) else {
        return;
    };
    if frozen.distance(block, pos, evicted) == FrozenDistances::NO_FURTHER_USE {
        stats.dead_evictions += 1;
        return;
    }
    let spill = env.make_spill(graph, evicted, block);
    new_schedule.push(spill);
    stats.spills_inserted += 1;
}

fn count_register_phis(graph: &Graph, block: NodeId, reg_class: u32) -> usize {
    graph
        .phis_of(block)
        .iter()
        .filter(|&&p| graph.node(p).backend.reg_class == Some(reg_class))
        .count()
}

fn register_candidates(graph: &Graph, block: NodeId, reg_class: u32) -> Vec<NodeId> {
    let mut candidates = Vec::new();
    for &phi in graph.phis_of(block) {
        if graph.node(phi).backend.reg_class == Some(reg_class) {
            candidates.push(phi);
        }
    }
    for &n in graph.schedule(block) {
        if graph.node(n).backend.reg_class == Some(reg_class) {
            candidates.push(n);
        }
        for &input in &graph.node(n).inputs {
            if graph.node(input).backend.reg_class == Some(reg_class) {
                candidates.push(input);
            }
        }
    }
    candidates.sort_by_key(|n| n.index());
    candidates.dedup();
    candidates
}

struct FrozenDistances {
    table: HashMap<(usize, NodeId), u32>,
}

impl FrozenDistances {
    const NO_FURTHER_USE: u32 = ScheduleNextUse::NO_FURTHER_USE;
}

impl NextUseOracle for FrozenDistances {
    fn distance(&self, _block: NodeId, pos: usize, value: NodeId) -> u32 {
        self.table.get(&(pos, value)).copied().unwrap_or(Self::NO_FURTHER_USE)
    }
}

fn freeze_block_distances(graph: &Graph, entry: NodeId, block: NodeId, candidates: &[NodeId]) -> FrozenDistances {
    let oracle = ScheduleNextUse::new(graph, entry);
    let len = graph.schedule(block).len();
    let mut table = HashMap::with_capacity(candidates.len() * (len + 1));
    for pos in 0..=len {
        for &v in candidates {
            table.insert((pos, v), oracle.distance(block, pos, v));
        }
    }
    FrozenDistances { table }
}
