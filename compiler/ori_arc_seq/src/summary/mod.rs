//! Per-region reference-count summaries.
//!
//! Every region owns one summary holding two independent lattices, one per
//! sweep direction:
//!
//! - **Top-down**: for each RC root, has an `RcInc` been seen that a later
//!   `RcDec` could still cancel?
//! - **Bottom-up**: for each RC root, has an `RcDec` been seen that an
//!   earlier `RcInc` could still cancel?
//!
//! The evaluator only talks to summaries through [`RegionSummary`], so the
//! sweep order and merge rules can be tested against an instrumented
//! implementation. [`ArcRegionState`] is the real one.
//!
//! # Join
//!
//! Both lattices use the same per-root join:
//!
//! | left \ right      | absent | `MightBeUsed` | tracking `i` | tracking `j` |
//! |-------------------|--------|---------------|--------------|--------------|
//! | absent            | absent | absent        | absent       | absent       |
//! | `MightBeUsed`     | absent | `MightBeUsed` | `MightBeUsed`| `MightBeUsed`|
//! | tracking `i`      | absent | `MightBeUsed` | tracking `i` | `MightBeUsed`|
//!
//! A root survives a join only if every neighbor tracks it, and keeps its
//! candidate instruction only if every neighbor agrees on it. The join is
//! commutative, associative and idempotent; the empty summary (after
//! [`clear`](RegionSummary::clear)) absorbs everything.

use rustc_hash::FxHashMap;

use crate::analysis::{AliasAnalysis, RcIdentity};
use crate::blot_map::BlotMap;
use crate::consumed_args::ConsumedArgToReleaseMap;
use crate::ir::{ArcBlock, ArcFunction, ArcInstr, ArcInstrId, ArcVarId};
use crate::region::{Region, RegionGraph};

/// A provably cancelling `RcInc`/`RcDec` pair, seen from one side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct RcMatch {
    /// The other half of the pair.
    pub partner: ArcInstrId,
    /// RC root both instructions operate on.
    pub root: ArcVarId,
}

/// Result map keyed by instruction identity.
pub type MatchMap = BlotMap<ArcInstrId, RcMatch>;

/// Inputs and output of top-down region processing.
pub struct TopDownContext<'a> {
    pub graph: &'a RegionGraph,
    pub func: &'a ArcFunction,
    pub aa: &'a dyn AliasAnalysis,
    pub rc: &'a dyn RcIdentity,
    /// Decrement → increment.
    pub dec_to_inc: &'a mut MatchMap,
}

/// Inputs and output of bottom-up region processing.
pub struct BottomUpContext<'a> {
    pub graph: &'a RegionGraph,
    pub func: &'a ArcFunction,
    pub aa: &'a dyn AliasAnalysis,
    pub rc: &'a dyn RcIdentity,
    /// Never start a match from an epilogue release of a consumed argument.
    pub freeze_owned_releases: bool,
    pub consumed_args: &'a ConsumedArgToReleaseMap,
    /// Increment → decrement.
    pub inc_to_dec: &'a mut MatchMap,
}

/// The contract between the evaluator and a region's summary.
///
/// `init_*` replaces the summary with a copy of the neighbor's; `merge_*`
/// joins the neighbor in. `process_*` runs the region's own transfer
/// function and returns `true` when a candidate pair spans a loop boundary
/// (nesting detected).
pub trait RegionSummary {
    /// Fresh (empty) summary for `region`.
    fn new(region: &Region) -> Self;

    /// The region exits abnormally. Unaffected by [`clear`](Self::clear).
    fn allows_leaks(&self) -> bool;

    /// Reset both lattices to the empty element. Idempotent.
    fn clear(&mut self);

    fn init_pred_top_down(&mut self, pred: &Self);
    fn merge_pred_top_down(&mut self, pred: &Self);
    fn init_succ_bottom_up(&mut self, succ: &Self);
    fn merge_succ_bottom_up(&mut self, succ: &Self);

    fn process_top_down(&mut self, region: &Region, cx: &mut TopDownContext<'_>) -> bool;
    fn process_bottom_up(&mut self, region: &Region, cx: &mut BottomUpContext<'_>) -> bool;
}

// Lattice states

/// Top-down state of one RC root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum TopDownState {
    /// Seen `RcInc` at `inc`; a later `RcDec` with no intervening use
    /// cancels it.
    Incremented { inc: ArcInstrId },
    /// Something may have used or released the object since. No match.
    MightBeUsed,
}

/// Bottom-up state of one RC root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum BottomUpState {
    /// Seen `RcDec` at `dec`; an earlier `RcInc` with no intervening use
    /// cancels it.
    Decremented { dec: ArcInstrId },
    /// Something may have used or released the object since. No match.
    MightBeUsed,
}

/// Join `other` into `acc` per the table in the module docs.
fn join<S: Copy + Eq>(
    acc: &mut FxHashMap<ArcVarId, S>,
    other: &FxHashMap<ArcVarId, S>,
    conflict: S,
) {
    acc.retain(|root, state| match other.get(root) {
        None => false,
        Some(theirs) => {
            if theirs != state {
                *state = conflict;
            }
            true
        }
    });
}

// ARC region state

/// Reference-count summary of one region.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArcRegionState {
    allows_leaks: bool,
    top_down: FxHashMap<ArcVarId, TopDownState>,
    bottom_up: FxHashMap<ArcVarId, BottomUpState>,
}

impl ArcRegionState {
    pub fn top_down_state(&self, root: ArcVarId) -> Option<TopDownState> {
        self.top_down.get(&root).copied()
    }

    pub fn bottom_up_state(&self, root: ArcVarId) -> Option<BottomUpState> {
        self.bottom_up.get(&root).copied()
    }

    pub fn is_top_down_empty(&self) -> bool {
        self.top_down.is_empty()
    }

    pub fn is_bottom_up_empty(&self) -> bool {
        self.bottom_up.is_empty()
    }

    /// Both lattices are at the empty element.
    pub fn is_empty(&self) -> bool {
        self.top_down.is_empty() && self.bottom_up.is_empty()
    }

    fn process_block_top_down(&mut self, block: &ArcBlock, cx: &mut TopDownContext<'_>) -> bool {
        let mut nesting = false;

        for (id, instr) in block.instrs() {
            match *instr {
                ArcInstr::RcInc { var, count: 1 } => {
                    let root = cx.rc.rc_root(var);
                    let prev = self
                        .top_down
                        .insert(root, TopDownState::Incremented { inc: id });
                    if matches!(prev, Some(TopDownState::Incremented { .. })) {
                        tracing::trace!(?root, ?id, "nested increment");
                        nesting = true;
                    }
                }
                ArcInstr::RcDec { var } => {
                    let root = cx.rc.rc_root(var);
                    if let Some(TopDownState::Incremented { inc }) = self.top_down.remove(&root) {
                        tracing::trace!(dec = ?id, ?inc, "matched decrement");
                        cx.dec_to_inc.insert(id, RcMatch { partner: inc, root });
                    } else if cx.dec_to_inc.blot(&id) {
                        tracing::trace!(dec = ?id, "blotted stale decrement match");
                    }
                }
                _ => {
                    for (&root, state) in &mut self.top_down {
                        if interferes(instr, root, cx.aa, cx.rc) {
                            *state = TopDownState::MightBeUsed;
                        }
                    }
                }
            }
        }

        for (&root, state) in &mut self.top_down {
            if cx.aa.terminator_may_use(&block.terminator, root, cx.rc) {
                *state = TopDownState::MightBeUsed;
            }
        }

        nesting
    }

    fn process_block_bottom_up(&mut self, block: &ArcBlock, cx: &mut BottomUpContext<'_>) -> bool {
        let mut nesting = false;

        for (&root, state) in &mut self.bottom_up {
            if cx.aa.terminator_may_use(&block.terminator, root, cx.rc) {
                *state = BottomUpState::MightBeUsed;
            }
        }

        for (id, instr) in block.instrs().rev() {
            match *instr {
                ArcInstr::RcDec { var } => {
                    let root = cx.rc.rc_root(var);
                    if cx.freeze_owned_releases
                        && cx.consumed_args.is_release_matched_to_argument(id)
                    {
                        // Frozen: acts as an opaque release, never a
                        // match candidate.
                        if let Some(state) = self.bottom_up.get_mut(&root) {
                            *state = BottomUpState::MightBeUsed;
                        }
                        continue;
                    }
                    let prev = self
                        .bottom_up
                        .insert(root, BottomUpState::Decremented { dec: id });
                    if matches!(prev, Some(BottomUpState::Decremented { .. })) {
                        tracing::trace!(?root, ?id, "nested decrement");
                        nesting = true;
                    }
                }
                ArcInstr::RcInc { var, count: 1 } => {
                    let root = cx.rc.rc_root(var);
                    if let Some(BottomUpState::Decremented { dec }) = self.bottom_up.remove(&root) {
                        tracing::trace!(inc = ?id, ?dec, "matched increment");
                        cx.inc_to_dec.insert(id, RcMatch { partner: dec, root });
                    } else if cx.inc_to_dec.blot(&id) {
                        tracing::trace!(inc = ?id, "blotted stale increment match");
                    }
                }
                _ => {
                    for (&root, state) in &mut self.bottom_up {
                        if interferes(instr, root, cx.aa, cx.rc) {
                            *state = BottomUpState::MightBeUsed;
                        }
                    }
                }
            }
        }

        nesting
    }
}

/// Non-matching instruction effect on a tracked root.
///
/// Batched increments (`count > 1`) land here too and are treated as uses.
fn interferes(
    instr: &ArcInstr,
    root: ArcVarId,
    aa: &dyn AliasAnalysis,
    rc: &dyn RcIdentity,
) -> bool {
    if let ArcInstr::RcInc { var, .. } = *instr {
        return rc.rc_root(var) == root;
    }
    aa.may_use(instr, root, rc) || aa.may_decrement(instr, root, rc)
}

/// Effect of an entire composite region on a tracked root.
///
/// Merges into and out of composites are undefined, so the evaluator
/// always hands a composite an empty summary. The composite transfer
/// functions only see tracked roots when a summary is seeded directly,
/// which is the hook a driver that defines composite merges would use.
#[derive(Clone, Copy, Debug, Default)]
struct CompositeEffect {
    touched: bool,
    increments: bool,
    decrements: bool,
}

fn composite_effect(
    graph: &RegionGraph,
    func: &ArcFunction,
    region: &Region,
    root: ArcVarId,
    aa: &dyn AliasAnalysis,
    rc: &dyn RcIdentity,
) -> CompositeEffect {
    let mut effect = CompositeEffect::default();
    for block_id in graph.blocks_within(region.id()) {
        let block = func.block(block_id);
        for instr in &block.body {
            match *instr {
                ArcInstr::RcInc { var, .. } if rc.rc_root(var) == root => {
                    effect.touched = true;
                    effect.increments = true;
                }
                ArcInstr::RcDec { var } if rc.rc_root(var) == root => {
                    effect.touched = true;
                    effect.decrements = true;
                }
                _ => {
                    if aa.may_use(instr, root, rc) || aa.may_decrement(instr, root, rc) {
                        effect.touched = true;
                    }
                }
            }
        }
        if aa.terminator_may_use(&block.terminator, root, rc) {
            effect.touched = true;
        }
    }
    effect
}

impl RegionSummary for ArcRegionState {
    fn new(region: &Region) -> Self {
        Self {
            allows_leaks: region.allows_leaks(),
            ..Self::default()
        }
    }

    fn allows_leaks(&self) -> bool {
        self.allows_leaks
    }

    fn clear(&mut self) {
        self.top_down.clear();
        self.bottom_up.clear();
    }

    fn init_pred_top_down(&mut self, pred: &Self) {
        self.top_down.clone_from(&pred.top_down);
    }

    fn merge_pred_top_down(&mut self, pred: &Self) {
        join(&mut self.top_down, &pred.top_down, TopDownState::MightBeUsed);
    }

    fn init_succ_bottom_up(&mut self, succ: &Self) {
        self.bottom_up.clone_from(&succ.bottom_up);
    }

    fn merge_succ_bottom_up(&mut self, succ: &Self) {
        join(&mut self.bottom_up, &succ.bottom_up, BottomUpState::MightBeUsed);
    }

    fn process_top_down(&mut self, region: &Region, cx: &mut TopDownContext<'_>) -> bool {
        if let Some(block) = region.block() {
            let func = cx.func;
            return self.process_block_top_down(func.block(block), cx);
        }

        // A loop is opaque at its parent's level: a pair cannot be matched
        // across it, and an increment cancelled by a decrement inside it
        // spans the loop boundary.
        let mut nesting = false;
        for (&root, state) in &mut self.top_down {
            let effect = composite_effect(cx.graph, cx.func, region, root, cx.aa, cx.rc);
            if effect.decrements && matches!(state, TopDownState::Incremented { .. }) {
                nesting = true;
            }
            if effect.touched {
                *state = TopDownState::MightBeUsed;
            }
        }
        nesting
    }

    fn process_bottom_up(&mut self, region: &Region, cx: &mut BottomUpContext<'_>) -> bool {
        if let Some(block) = region.block() {
            let func = cx.func;
            return self.process_block_bottom_up(func.block(block), cx);
        }

        let mut nesting = false;
        for (&root, state) in &mut self.bottom_up {
            let effect = composite_effect(cx.graph, cx.func, region, root, cx.aa, cx.rc);
            if effect.increments && matches!(state, BottomUpState::Decremented { .. }) {
                nesting = true;
            }
            if effect.touched {
                *state = BottomUpState::MightBeUsed;
            }
        }
        nesting
    }
}
