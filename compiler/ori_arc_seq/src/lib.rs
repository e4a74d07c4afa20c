//! Loop-region ARC sequence dataflow for the Ori compiler.
//!
//! This crate finds `RcInc`/`RcDec` pairs that provably cancel, across
//! block boundaries, without weakening memory safety. It computes facts
//! only; removing or moving the matched pairs is up to the caller.
//!
//! - **Region hierarchy** ([`RegionGraph`], [`Region`], [`RegionGraphBuilder`]):
//!   blocks nested in loops nested in the function, stored as an arena of
//!   [`RegionId`]s.
//! - **Loop nest** ([`LoopNest`]): the inside-out visitation order shared
//!   by both sweeps.
//! - **Region summaries** ([`RegionSummary`], [`ArcRegionState`]): the
//!   per-region lattices and their join.
//! - **Evaluator** ([`ArcSequenceDataflow`]): bottom-up then top-down
//!   sweeps, producing decrement → increment and increment → decrement
//!   [`MatchMap`]s.
//!
//! # Pipeline Position
//!
//! Runs after RC insertion and before pair elimination. Elimination should
//! only remove a pair present in *both* maps: each direction alone only
//! proves the pair along the paths that direction merged over.
//!
//! # Logging
//!
//! Sweeps log through `tracing` (`debug` per run, `trace` per region and
//! merge). Call [`init_tracing`] and set `RUST_LOG=ori_arc_seq=trace` to see
//! them.

pub mod analysis;
pub mod blot_map;
pub mod consumed_args;
pub mod dataflow;
pub mod ir;
pub mod loop_nest;
pub mod region;
pub mod summary;

#[cfg(test)]
mod test_helpers;

use std::sync::Once;

pub use analysis::{AliasAnalysis, BasicAliasAnalysis, RcIdentity, RcIdentityInfo};
pub use blot_map::BlotMap;
pub use consumed_args::ConsumedArgToReleaseMap;
pub use dataflow::{is_defined_merge, match_rc_pairs, ArcSequenceDataflow, DataflowResults};
pub use ir::{
    ArcBlock, ArcBlockId, ArcFunction, ArcInstr, ArcInstrId, ArcParam, ArcTerminator, ArcVarId,
    Ownership,
};
pub use loop_nest::{InsideOut, LoopNest};
pub use region::{
    Region, RegionFlags, RegionGraph, RegionGraphBuilder, RegionId, RegionKind, RegionProblem,
    Successor,
};
pub use summary::{
    ArcRegionState, BottomUpContext, BottomUpState, MatchMap, RcMatch, RegionSummary,
    TopDownContext, TopDownState,
};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Does nothing unless `RUST_LOG` is set,
/// e.g. `RUST_LOG=ori_arc_seq=debug`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
