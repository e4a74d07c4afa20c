//! ARC IR: the basic-block form that block regions map onto.
//!
//! The sequence dataflow only needs to know where reference-count
//! operations sit and which instructions might touch a reference-counted
//! value in between. It has three parts:
//!
//! - **[`ArcFunction`]**: parameters (with [`Ownership`]) and blocks
//! - **[`ArcBlock`]**: a body of [`ArcInstr`]s plus one [`ArcTerminator`]
//! - **[`ArcInstrId`]**: the identity of a body instruction, used as the
//!   key of the match maps
//!
//! Values are named via [`ArcVarId`] (SSA-like). Control flow uses
//! [`ArcBlockId`] references between blocks; the loop structure over those
//! edges is described separately by a [`RegionGraph`](crate::RegionGraph).

use smallvec::{smallvec, SmallVec};

// ── ID newtypes ─────────────────────────────────────────────────────

/// Variable ID within an ARC IR function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct ArcVarId(u32);

impl ArcVarId {
    /// Create a new variable ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Basic block ID within an ARC IR function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct ArcBlockId(u32);

impl ArcBlockId {
    /// Create a new block ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a body instruction: its block and its position in the body.
///
/// Stable for as long as the IR is not mutated, which holds for the whole
/// lifetime of an evaluator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ArcInstrId {
    pub block: ArcBlockId,
    pub index: u32,
}

impl ArcInstrId {
    #[inline]
    pub fn new(block: ArcBlockId, index: u32) -> Self {
        Self { block, index }
    }
}

// ── Ownership ───────────────────────────────────────────────────────

/// Ownership convention of a function parameter.
///
/// An `Owned` parameter is consumed by the callee: the function body is
/// obligated to release it before returning. Those releases are the
/// "epilogue releases" tracked by
/// [`ConsumedArgToReleaseMap`](crate::ConsumedArgToReleaseMap).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Ownership {
    /// The callee borrows the value and never releases it.
    Borrowed,
    /// The callee takes ownership and must release the value on every exit.
    Owned,
}

/// A function parameter annotated with ownership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArcParam {
    pub var: ArcVarId,
    pub ownership: Ownership,
}

// ── Instructions ────────────────────────────────────────────────────

/// A single instruction in an ARC IR basic block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArcInstr {
    /// Alias an existing variable: `let dst = value`. Both name the same
    /// reference-counted object.
    Let { dst: ArcVarId, value: ArcVarId },

    /// Opaque call: `let dst = f(args...)`. The callee may read or release
    /// any of its arguments.
    Apply { dst: ArcVarId, args: Vec<ArcVarId> },

    /// Field projection: `let dst = value.field`. Reads `value`; `dst` is a
    /// distinct object.
    Project {
        dst: ArcVarId,
        value: ArcVarId,
        field: u32,
    },

    /// Increment the reference count of `var` by `count`.
    RcInc { var: ArcVarId, count: u32 },

    /// Decrement the reference count of `var` (and free it at zero).
    RcDec { var: ArcVarId },
}

impl ArcInstr {
    /// Variables read by this instruction.
    pub fn used_vars(&self) -> SmallVec<[ArcVarId; 4]> {
        match self {
            ArcInstr::Let { value, .. } | ArcInstr::Project { value, .. } => smallvec![*value],
            ArcInstr::Apply { args, .. } => args.iter().copied().collect(),
            ArcInstr::RcInc { var, .. } | ArcInstr::RcDec { var } => smallvec![*var],
        }
    }

    /// Variable defined by this instruction, if any.
    pub fn defined_var(&self) -> Option<ArcVarId> {
        match self {
            ArcInstr::Let { dst, .. }
            | ArcInstr::Apply { dst, .. }
            | ArcInstr::Project { dst, .. } => Some(*dst),
            ArcInstr::RcInc { .. } | ArcInstr::RcDec { .. } => None,
        }
    }

    /// Returns `true` for `RcInc` and `RcDec`.
    pub fn is_rc_op(&self) -> bool {
        matches!(self, ArcInstr::RcInc { .. } | ArcInstr::RcDec { .. })
    }
}

/// Block exit.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArcTerminator {
    /// Return `value` to the caller.
    Return { value: ArcVarId },
    /// Unconditional jump.
    Jump { target: ArcBlockId },
    /// Two-way conditional branch on `cond`.
    Branch {
        cond: ArcVarId,
        then_block: ArcBlockId,
        else_block: ArcBlockId,
    },
    /// Control never reaches the end of this block (trap, diverging call).
    Unreachable,
}

impl ArcTerminator {
    /// Variables read by this terminator.
    pub fn used_vars(&self) -> SmallVec<[ArcVarId; 1]> {
        match self {
            ArcTerminator::Return { value } => smallvec![*value],
            ArcTerminator::Branch { cond, .. } => smallvec![*cond],
            ArcTerminator::Jump { .. } | ArcTerminator::Unreachable => SmallVec::new(),
        }
    }

    /// Successor blocks in the CFG.
    pub fn successors(&self) -> SmallVec<[ArcBlockId; 2]> {
        match self {
            ArcTerminator::Return { .. } | ArcTerminator::Unreachable => SmallVec::new(),
            ArcTerminator::Jump { target } => smallvec![*target],
            ArcTerminator::Branch {
                then_block,
                else_block,
                ..
            } => smallvec![*then_block, *else_block],
        }
    }
}

/// A basic block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArcBlock {
    pub id: ArcBlockId,
    pub body: Vec<ArcInstr>,
    pub terminator: ArcTerminator,
}

impl ArcBlock {
    /// Body instructions paired with their identities.
    pub fn instrs(&self) -> impl DoubleEndedIterator<Item = (ArcInstrId, &ArcInstr)> + '_ {
        let block = self.id;
        self.body.iter().enumerate().map(move |(i, instr)| {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "ARC IR block bodies fit in u32"
            )]
            let index = i as u32;
            (ArcInstrId::new(block, index), instr)
        })
    }
}

/// A function body in ARC IR.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArcFunction {
    pub name: String,
    pub params: Vec<ArcParam>,
    /// Indexed by `ArcBlockId::index()`.
    pub blocks: Vec<ArcBlock>,
    pub entry: ArcBlockId,
}

impl ArcFunction {
    #[inline]
    pub fn block(&self, id: ArcBlockId) -> &ArcBlock {
        &self.blocks[id.index()]
    }

    /// Look up a body instruction by identity.
    pub fn instr(&self, id: ArcInstrId) -> Option<&ArcInstr> {
        self.blocks
            .get(id.block.index())
            .and_then(|block| block.body.get(id.index as usize))
    }

    /// Blocks that return to the caller.
    pub fn exit_blocks(&self) -> impl Iterator<Item = &ArcBlock> + '_ {
        self.blocks
            .iter()
            .filter(|block| matches!(block.terminator, ArcTerminator::Return { .. }))
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
mod tests;
