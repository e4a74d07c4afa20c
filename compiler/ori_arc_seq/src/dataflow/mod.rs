//! Loop-region ARC sequence dataflow evaluator.
//!
//! Drives two sweeps over the region hierarchy of one function and fills
//! the two match maps the RC pair elimination transform consumes:
//!
//! 1. **Bottom-up**: subregions in reverse order, merging *successor*
//!    summaries, populating increment → decrement.
//! 2. **Top-down**: subregions in forward order, merging *predecessor*
//!    summaries, populating decrement → increment.
//!
//! Each sweep visits loops inside-out (see [`LoopNest::inside_out`]) and
//! finishes with the function root. A full [`run`] completes the whole
//! bottom-up sweep before the top-down sweep starts.
//!
//! # Merge rules
//!
//! A merge across an edge is *defined* only between two blocks, and only
//! if the edge is not an unknown control flow tail/head (see
//! [`is_defined_merge`]). An undefined merge clears the receiving summary
//! and stops the merge: nothing else can flow into it.
//!
//! Predecessors are expected to share the receiving region's scope. One
//! from an enclosing scope is treated as an undefined merge, like a loop
//! exit on the bottom-up side.
//!
//! Leak-permitting regions are excluded rather than treated as undefined:
//!
//! - top-down, a leaking subregion is skipped entirely;
//! - bottom-up, a leaking local successor is left out of the join, and a
//!   leaking loop exit is ignored. Any other loop exit clears the summary,
//!   since crossing a loop boundary is not analyzed.
//!
//! Merging composite regions is not supported; it is always undefined.
//!
//! [`run`]: ArcSequenceDataflow::run

use crate::analysis::{AliasAnalysis, BasicAliasAnalysis, RcIdentity, RcIdentityInfo};
use crate::consumed_args::ConsumedArgToReleaseMap;
use crate::ir::ArcFunction;
use crate::loop_nest::LoopNest;
use crate::region::{Region, RegionGraph, RegionId};
use crate::summary::{
    ArcRegionState, BottomUpContext, MatchMap, RegionSummary, TopDownContext,
};

/// Is it defined to merge dataflow across the edge `pred → succ`?
///
/// Bottom-up merges ask the same question with the region being updated
/// in the `pred` position.
pub fn is_defined_merge(succ: &Region, pred: &Region) -> bool {
    // Control may leave `pred` along an edge we cannot see.
    if pred.is_unknown_cf_edge_tail() {
        return false;
    }

    // Control may enter `succ` along an edge we cannot see.
    if succ.is_unknown_cf_edge_head() {
        return false;
    }

    succ.is_block() && pred.is_block()
}

/// The two maps filled by a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct DataflowResults {
    /// Decrement → increment, from the top-down sweep.
    pub dec_to_inc: MatchMap,
    /// Increment → decrement, from the bottom-up sweep.
    pub inc_to_dec: MatchMap,
}

/// Sequence dataflow evaluator for one function.
///
/// Owns one summary per region and the result maps. Collaborators are
/// borrowed immutably for the evaluator's whole lifetime.
pub struct ArcSequenceDataflow<'a, S = ArcRegionState> {
    func: &'a ArcFunction,
    graph: &'a RegionGraph,
    loops: &'a LoopNest,
    aa: &'a dyn AliasAnalysis,
    rc: &'a dyn RcIdentity,
    /// Indexed by `RegionId::index()`.
    states: Vec<S>,
    consumed_args: ConsumedArgToReleaseMap,
    results: DataflowResults,
}

impl<'a, S: RegionSummary> ArcSequenceDataflow<'a, S> {
    pub fn new(
        func: &'a ArcFunction,
        graph: &'a RegionGraph,
        loops: &'a LoopNest,
        aa: &'a dyn AliasAnalysis,
        rc: &'a dyn RcIdentity,
    ) -> Self {
        debug_assert!(
            graph.verify().is_empty(),
            "malformed region graph for {}",
            func.name
        );

        let states = graph.regions().map(S::new).collect();
        let consumed_args = ConsumedArgToReleaseMap::compute(func, rc);

        Self {
            func,
            graph,
            loops,
            aa,
            rc,
            states,
            consumed_args,
            results: DataflowResults::default(),
        }
    }

    /// Full bottom-up sweep, then full top-down sweep.
    ///
    /// Returns `true` if any region detected nesting: a candidate pair
    /// spanning a loop boundary, which code motion might expose.
    pub fn run(&mut self, freeze_owned_releases: bool) -> bool {
        tracing::debug!(
            function = self.func.name.as_str(),
            regions = self.graph.len(),
            loops = self.loops.len(),
            freeze_owned_releases,
            "running sequence dataflow"
        );

        let mut nesting = self.process_bottom_up(freeze_owned_releases);
        nesting |= self.process_top_down();

        tracing::debug!(
            function = self.func.name.as_str(),
            nesting,
            dec_to_inc = self.results.dec_to_inc.len(),
            inc_to_dec = self.results.inc_to_dec.len(),
            "sequence dataflow finished"
        );

        nesting
    }

    /// Both sweeps restricted to the direct subregions of `region`.
    ///
    /// Used to re-analyze a single loop after code motion invalidated its
    /// summaries; call [`clear_loop_state`](Self::clear_loop_state) first.
    pub fn run_on_loop(&mut self, region: RegionId, freeze_owned_releases: bool) -> bool {
        tracing::debug!(
            function = self.func.name.as_str(),
            region = region.raw(),
            "re-running sequence dataflow on loop"
        );

        let mut nesting = self.process_loop_bottom_up(region, freeze_owned_releases);
        nesting |= self.process_loop_top_down(region);
        nesting
    }

    /// Reset every summary.
    pub fn clear(&mut self) {
        for state in &mut self.states {
            state.clear();
        }
    }

    /// Reset the summaries of `region`'s direct subregions.
    pub fn clear_loop_state(&mut self, region: RegionId) {
        let graph = self.graph;
        for &sub in graph.region(region).subregions() {
            self.states[sub.index()].clear();
        }
    }

    pub fn dec_to_inc(&self) -> &MatchMap {
        &self.results.dec_to_inc
    }

    pub fn inc_to_dec(&self) -> &MatchMap {
        &self.results.inc_to_dec
    }

    pub fn results(&self) -> &DataflowResults {
        &self.results
    }

    pub fn into_results(self) -> DataflowResults {
        self.results
    }

    /// Summary of `region`.
    pub fn summary(&self, region: RegionId) -> &S {
        &self.states[region.index()]
    }

    pub fn consumed_args(&self) -> &ConsumedArgToReleaseMap {
        &self.consumed_args
    }

    // Top-down

    fn process_top_down(&mut self) -> bool {
        tracing::trace!("top-down sweep");
        let loops = self.loops;
        let mut nesting = false;
        for region in loops.inside_out(self.graph.root()) {
            nesting |= self.process_loop_top_down(region);
        }
        nesting
    }

    fn process_loop_top_down(&mut self, region: RegionId) -> bool {
        let graph = self.graph;
        let r = graph.region(region);
        debug_assert!(!r.is_block(), "expected a composite region");
        tracing::trace!(region = region.raw(), "processing loop top-down");

        let mut nesting = false;
        for &sub_id in r.subregions() {
            let sub = graph.region(sub_id);

            if self.states[sub_id.index()].allows_leaks() {
                tracing::trace!(subregion = sub_id.raw(), "skipping leaking subregion");
                continue;
            }

            self.merge_predecessors(sub);

            let mut cx = TopDownContext {
                graph,
                func: self.func,
                aa: self.aa,
                rc: self.rc,
                dec_to_inc: &mut self.results.dec_to_inc,
            };
            nesting |= self.states[sub_id.index()].process_top_down(sub, &mut cx);
        }
        nesting
    }

    fn merge_predecessors(&mut self, region: &Region) {
        let graph = self.graph;
        let id = region.id();
        let mut has_pred = false;

        for &pred_id in region.preds() {
            let pred = graph.region(pred_id);
            tracing::trace!(region = id.raw(), pred = pred_id.raw(), "merging predecessor");

            // A predecessor in an enclosing scope enters across a loop
            // boundary.
            if pred.parent() != region.parent() || !is_defined_merge(region, pred) {
                tracing::trace!(region = id.raw(), pred = pred_id.raw(), "undefined merge");
                self.states[id.index()].clear();
                return;
            }

            // A self-edge: joining a summary with itself is the identity.
            let Some((state, pred_state)) = pair_mut(&mut self.states, id, pred_id) else {
                has_pred = true;
                continue;
            };
            if has_pred {
                state.merge_pred_top_down(pred_state);
            } else {
                state.init_pred_top_down(pred_state);
                has_pred = true;
            }
        }
    }

    // Bottom-up

    fn process_bottom_up(&mut self, freeze_owned_releases: bool) -> bool {
        tracing::trace!("bottom-up sweep");
        let loops = self.loops;
        let mut nesting = false;
        for region in loops.inside_out(self.graph.root()) {
            nesting |= self.process_loop_bottom_up(region, freeze_owned_releases);
        }
        nesting
    }

    fn process_loop_bottom_up(&mut self, region: RegionId, freeze_owned_releases: bool) -> bool {
        let graph = self.graph;
        let r = graph.region(region);
        debug_assert!(!r.is_block(), "expected a composite region");
        tracing::trace!(region = region.raw(), "processing loop bottom-up");

        let mut nesting = false;
        for sub_id in r.subregions_rev() {
            let sub = graph.region(sub_id);

            self.merge_successors(sub);

            let mut cx = BottomUpContext {
                graph,
                func: self.func,
                aa: self.aa,
                rc: self.rc,
                freeze_owned_releases,
                consumed_args: &self.consumed_args,
                inc_to_dec: &mut self.results.inc_to_dec,
            };
            nesting |= self.states[sub_id.index()].process_bottom_up(sub, &mut cx);
        }
        nesting
    }

    fn merge_successors(&mut self, region: &Region) {
        let graph = self.graph;
        let id = region.id();
        let mut has_succ = false;

        for succ_id in region.local_succs() {
            let succ = graph.region(succ_id);
            tracing::trace!(region = id.raw(), succ = succ_id.raw(), "merging successor");

            if !is_defined_merge(succ, region) {
                tracing::trace!(region = id.raw(), succ = succ_id.raw(), "undefined merge");
                self.states[id.index()].clear();
                return;
            }

            // A leaking successor contributes no obligation.
            if self.states[succ_id.index()].allows_leaks() {
                continue;
            }

            let Some((state, succ_state)) = pair_mut(&mut self.states, id, succ_id) else {
                has_succ = true;
                continue;
            };
            if has_succ {
                state.merge_succ_bottom_up(succ_state);
            } else {
                state.init_succ_bottom_up(succ_state);
                has_succ = true;
            }
        }

        for exit in region.non_local_succs() {
            let Some(target) = graph.region_for_non_local_successor(id, exit) else {
                debug_assert!(false, "unresolved loop exit {exit} of region {}", id.raw());
                self.states[id.index()].clear();
                return;
            };
            tracing::trace!(region = id.raw(), exit, target = target.raw(), "loop exit");

            // TODO: also accept exits post-dominated by leaking regions,
            // not just exits that leak themselves.
            if self.states[target.index()].allows_leaks() {
                continue;
            }

            self.states[id.index()].clear();
            return;
        }
    }
}

/// Borrow `states[target]` mutably and `states[neighbor]` shared.
///
/// `None` when both name the same region.
fn pair_mut<S>(states: &mut [S], target: RegionId, neighbor: RegionId) -> Option<(&mut S, &S)> {
    let (t, n) = (target.index(), neighbor.index());
    if t == n {
        return None;
    }
    if t < n {
        let (lo, hi) = states.split_at_mut(n);
        Some((&mut lo[t], &hi[0]))
    } else {
        let (lo, hi) = states.split_at_mut(t);
        Some((&mut hi[0], &lo[n]))
    }
}

/// Run the sequence dataflow on `func` with the default collaborators.
///
/// Identity comes from `Let` aliases, aliasing from operands, and the loop
/// nest from the region graph. Returns the match maps and whether nesting
/// was detected.
pub fn match_rc_pairs(
    func: &ArcFunction,
    graph: &RegionGraph,
    freeze_owned_releases: bool,
) -> (DataflowResults, bool) {
    let rc = RcIdentityInfo::compute(func);
    let loops = LoopNest::from_regions(graph);
    let aa = BasicAliasAnalysis;

    let mut dataflow: ArcSequenceDataflow<'_> =
        ArcSequenceDataflow::new(func, graph, &loops, &aa, &rc);
    let nesting = dataflow.run(freeze_owned_releases);
    (dataflow.into_results(), nesting)
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
