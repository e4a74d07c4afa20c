//! Shared test utilities for the sequence dataflow.
//!
//! Factory functions for IR and region graphs used across `region`,
//! `summary`, `consumed_args`, `dataflow` and scenario tests. Only compiled
//! in test builds.

use crate::ir::{
    ArcBlock, ArcBlockId, ArcFunction, ArcInstr, ArcInstrId, ArcParam, ArcTerminator, ArcVarId,
    Ownership,
};

/// Shorthand for `ArcVarId::new(n)`.
pub(crate) fn v(n: u32) -> ArcVarId {
    ArcVarId::new(n)
}

/// Shorthand for `ArcBlockId::new(n)`.
pub(crate) fn b(n: u32) -> ArcBlockId {
    ArcBlockId::new(n)
}

/// Shorthand for the instruction at `index` of block `block`.
pub(crate) fn at(block: u32, index: u32) -> ArcInstrId {
    ArcInstrId::new(b(block), index)
}

/// `RcInc(v(n))` with count 1.
pub(crate) fn inc(n: u32) -> ArcInstr {
    ArcInstr::RcInc {
        var: v(n),
        count: 1,
    }
}

/// `RcDec(v(n))`.
pub(crate) fn dec(n: u32) -> ArcInstr {
    ArcInstr::RcDec { var: v(n) }
}

/// Opaque call `v(dst) = f(args...)`.
pub(crate) fn apply(dst: u32, args: &[u32]) -> ArcInstr {
    ArcInstr::Apply {
        dst: v(dst),
        args: args.iter().map(|&a| v(a)).collect(),
    }
}

pub(crate) fn jump(target: u32) -> ArcTerminator {
    ArcTerminator::Jump { target: b(target) }
}

pub(crate) fn branch(cond: u32, then_block: u32, else_block: u32) -> ArcTerminator {
    ArcTerminator::Branch {
        cond: v(cond),
        then_block: b(then_block),
        else_block: b(else_block),
    }
}

pub(crate) fn ret(value: u32) -> ArcTerminator {
    ArcTerminator::Return { value: v(value) }
}

/// Build a block; its ID is `b(id)`.
pub(crate) fn block(id: u32, body: Vec<ArcInstr>, terminator: ArcTerminator) -> ArcBlock {
    ArcBlock {
        id: b(id),
        body,
        terminator,
    }
}

/// Build a function named `test` with entry `b(0)`.
pub(crate) fn make_func(params: Vec<ArcParam>, blocks: Vec<ArcBlock>) -> ArcFunction {
    ArcFunction {
        name: "test".to_owned(),
        params,
        blocks,
        entry: b(0),
    }
}

pub(crate) fn owned_param(var: u32) -> ArcParam {
    ArcParam {
        var: v(var),
        ownership: Ownership::Owned,
    }
}

pub(crate) fn borrowed_param(var: u32) -> ArcParam {
    ArcParam {
        var: v(var),
        ownership: Ownership::Borrowed,
    }
}
