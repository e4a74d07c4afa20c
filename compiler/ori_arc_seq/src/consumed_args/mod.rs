//! Epilogue releases of consumed (owned) arguments.
//!
//! An `Owned` parameter must be released before the function returns. On
//! each exit path that obligation is discharged by an `RcDec` in the
//! epilogue, the run of releases immediately before the `Return`. Such a
//! release post-dominates every other use of the argument in the function.
//!
//! When the bottom-up sweep runs with `freeze_owned_releases`, these
//! releases are frozen: region processing never starts a match from them,
//! so the transform will neither remove nor move them.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::analysis::RcIdentity;
use crate::ir::{ArcFunction, ArcInstr, ArcInstrId, ArcTerminator, ArcVarId, Ownership};

/// Owned argument → the epilogue release on each exit block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsumedArgToReleaseMap {
    releases: FxHashMap<ArcVarId, SmallVec<[ArcInstrId; 2]>>,
    matched: FxHashSet<ArcInstrId>,
}

impl ConsumedArgToReleaseMap {
    /// Find the epilogue releases of every owned parameter of `func`.
    ///
    /// Each `Return` block is scanned backwards from its terminator across
    /// the contiguous run of `RcDec`s; the last release of an argument's
    /// RC root in that run is its epilogue release for the block. An
    /// argument returned by a block, or lacking a release on any exit, is
    /// not recorded.
    pub fn compute(func: &ArcFunction, rc: &dyn RcIdentity) -> Self {
        let owned: SmallVec<[ArcVarId; 4]> = func
            .params
            .iter()
            .filter(|p| p.ownership == Ownership::Owned)
            .map(|p| rc.rc_root(p.var))
            .collect();

        let mut map = Self::default();
        if owned.is_empty() {
            return map;
        }

        let mut candidates: FxHashMap<ArcVarId, SmallVec<[ArcInstrId; 2]>> = FxHashMap::default();
        let mut disqualified: FxHashSet<ArcVarId> = FxHashSet::default();
        let mut num_exits = 0usize;

        for block in func.exit_blocks() {
            num_exits += 1;

            if let ArcTerminator::Return { value } = block.terminator {
                disqualified.insert(rc.rc_root(value));
            }

            let mut seen_in_block: SmallVec<[ArcVarId; 4]> = SmallVec::new();
            for (id, instr) in block.instrs().rev() {
                let ArcInstr::RcDec { var } = instr else {
                    break;
                };
                let root = rc.rc_root(*var);
                if owned.contains(&root) && !seen_in_block.contains(&root) {
                    seen_in_block.push(root);
                    candidates.entry(root).or_default().push(id);
                }
            }
        }

        for (arg, releases) in candidates {
            if disqualified.contains(&arg) || releases.len() != num_exits {
                continue;
            }
            map.matched.extend(releases.iter().copied());
            map.releases.insert(arg, releases);
        }

        tracing::trace!(
            function = func.name.as_str(),
            args = map.releases.len(),
            "computed consumed-argument epilogue releases"
        );

        map
    }

    /// Epilogue releases of `arg` (by RC root), one per exit block.
    pub fn releases_for(&self, arg: ArcVarId) -> Option<&[ArcInstrId]> {
        self.releases.get(&arg).map(SmallVec::as_slice)
    }

    /// Is `instr` the epilogue release of some consumed argument?
    pub fn is_release_matched_to_argument(&self, instr: ArcInstrId) -> bool {
        self.matched.contains(&instr)
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}
