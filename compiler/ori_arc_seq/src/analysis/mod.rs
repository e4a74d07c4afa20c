//! Query objects consulted by region processing.
//!
//! The sequence dataflow does not decide on its own whether two variables
//! name the same reference-counted object, or whether an instruction can
//! observe one. Both questions are delegated to collaborators behind the
//! [`RcIdentity`] and [`AliasAnalysis`] traits. The evaluator passes them
//! through to each [`RegionSummary`](crate::RegionSummary) unmodified and
//! only ever borrows them immutably.
//!
//! Default implementations:
//!
//! - [`RcIdentityInfo`] follows `Let` aliases to a root variable.
//! - [`BasicAliasAnalysis`] answers from an instruction's operands after
//!   mapping them through the identity analysis.

use rustc_hash::FxHashMap;

use crate::ir::{ArcFunction, ArcInstr, ArcTerminator, ArcVarId};

/// Maps a variable to the root of its reference-count identity class.
///
/// Two variables with the same root denote the same reference-counted
/// object, so an `RcInc` on one can cancel an `RcDec` on the other.
pub trait RcIdentity {
    fn rc_root(&self, var: ArcVarId) -> ArcVarId;
}

/// Answers whether an instruction may interfere with a tracked object.
///
/// `root` is always an RC root as returned by [`RcIdentity::rc_root`].
pub trait AliasAnalysis {
    /// The instruction may read the object (its refcount must stay
    /// elevated across it).
    fn may_use(&self, instr: &ArcInstr, root: ArcVarId, rc: &dyn RcIdentity) -> bool;

    /// The instruction may release the object.
    fn may_decrement(&self, instr: &ArcInstr, root: ArcVarId, rc: &dyn RcIdentity) -> bool;

    /// The terminator may read the object.
    fn terminator_may_use(
        &self,
        terminator: &ArcTerminator,
        root: ArcVarId,
        rc: &dyn RcIdentity,
    ) -> bool;
}

// RC identity

/// Reference-count identity computed from `Let` aliases.
///
/// `let b = a` makes `b` share `a`'s root. Everything else (calls,
/// projections, parameters) starts a new identity class.
#[derive(Debug, Default, Clone)]
pub struct RcIdentityInfo {
    roots: FxHashMap<ArcVarId, ArcVarId>,
}

impl RcIdentityInfo {
    /// Compute identity classes for every `Let` alias in `func`.
    ///
    /// SSA guarantees a single definition per variable, but the source of
    /// a `Let` may be defined in a later block in layout order. Chains are
    /// therefore resolved after collection rather than while scanning.
    pub fn compute(func: &ArcFunction) -> Self {
        let mut direct: FxHashMap<ArcVarId, ArcVarId> = FxHashMap::default();
        for block in &func.blocks {
            for instr in &block.body {
                if let ArcInstr::Let { dst, value } = instr {
                    direct.insert(*dst, *value);
                }
            }
        }

        let mut roots = FxHashMap::default();
        for &var in direct.keys() {
            let mut root = var;
            // Bounded by the number of aliases, so a malformed cycle
            // terminates instead of spinning.
            for _ in 0..=direct.len() {
                match direct.get(&root) {
                    Some(&next) if next != var => root = next,
                    _ => break,
                }
            }
            roots.insert(var, root);
        }

        tracing::trace!(
            function = func.name.as_str(),
            aliases = roots.len(),
            "computed rc identity"
        );

        Self { roots }
    }

    /// Build from an explicit alias table (variable → root).
    pub fn from_roots(roots: FxHashMap<ArcVarId, ArcVarId>) -> Self {
        Self { roots }
    }
}

impl RcIdentity for RcIdentityInfo {
    fn rc_root(&self, var: ArcVarId) -> ArcVarId {
        self.roots.get(&var).copied().unwrap_or(var)
    }
}

// Alias analysis

/// Operand-based alias analysis.
///
/// An instruction uses an object if any operand has the object's root. A
/// call may release any object passed to it; nothing else decrements.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicAliasAnalysis;

impl AliasAnalysis for BasicAliasAnalysis {
    fn may_use(&self, instr: &ArcInstr, root: ArcVarId, rc: &dyn RcIdentity) -> bool {
        match instr {
            // RC operations are sequence points handled by the lattice,
            // not uses.
            ArcInstr::RcInc { .. } | ArcInstr::RcDec { .. } => false,
            _ => instr.used_vars().iter().any(|&v| rc.rc_root(v) == root),
        }
    }

    fn may_decrement(&self, instr: &ArcInstr, root: ArcVarId, rc: &dyn RcIdentity) -> bool {
        match instr {
            ArcInstr::Apply { args, .. } => args.iter().any(|&v| rc.rc_root(v) == root),
            _ => false,
        }
    }

    fn terminator_may_use(
        &self,
        terminator: &ArcTerminator,
        root: ArcVarId,
        rc: &dyn RcIdentity,
    ) -> bool {
        terminator
            .used_vars()
            .iter()
            .any(|&v| rc.rc_root(v) == root)
    }
}
