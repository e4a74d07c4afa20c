use pretty_assertions::assert_eq;

use crate::test_helpers::{apply, at, b, block, branch, dec, inc, jump, make_func, ret, v};

use super::*;

// Operands

#[test]
fn used_vars_per_instruction() {
    assert_eq!(
        ArcInstr::Let {
            dst: v(1),
            value: v(0)
        }
        .used_vars()
        .as_slice(),
        &[v(0)]
    );
    assert_eq!(apply(3, &[0, 1, 2]).used_vars().as_slice(), &[v(0), v(1), v(2)]);
    assert_eq!(
        ArcInstr::Project {
            dst: v(1),
            value: v(0),
            field: 2
        }
        .used_vars()
        .as_slice(),
        &[v(0)]
    );
    assert_eq!(inc(4).used_vars().as_slice(), &[v(4)]);
    assert_eq!(dec(4).used_vars().as_slice(), &[v(4)]);
}

#[test]
fn defined_var_skips_rc_ops() {
    assert_eq!(apply(3, &[0]).defined_var(), Some(v(3)));
    assert_eq!(inc(0).defined_var(), None);
    assert_eq!(dec(0).defined_var(), None);
    assert!(inc(0).is_rc_op());
    assert!(dec(0).is_rc_op());
    assert!(!apply(1, &[0]).is_rc_op());
}

#[test]
fn terminator_successors_and_uses() {
    assert_eq!(jump(2).successors().as_slice(), &[b(2)]);
    assert_eq!(branch(0, 1, 2).successors().as_slice(), &[b(1), b(2)]);
    assert!(ret(0).successors().is_empty());
    assert!(ArcTerminator::Unreachable.successors().is_empty());

    assert_eq!(branch(5, 1, 2).used_vars().as_slice(), &[v(5)]);
    assert_eq!(ret(7).used_vars().as_slice(), &[v(7)]);
    assert!(jump(1).used_vars().is_empty());
}

// Instruction identity

#[test]
fn instrs_pair_body_with_ids() {
    let blk = block(3, vec![inc(0), apply(1, &[0]), dec(0)], ret(1));
    let ids: Vec<ArcInstrId> = blk.instrs().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![at(3, 0), at(3, 1), at(3, 2)]);

    // Reverse iteration is what the bottom-up walk relies on.
    let (last, instr) = blk.instrs().next_back().unwrap();
    assert_eq!(last, at(3, 2));
    assert_eq!(instr, &dec(0));
}

#[test]
fn instr_lookup_out_of_range() {
    let func = make_func(vec![], vec![block(0, vec![inc(0)], ret(0))]);
    assert_eq!(func.instr(at(0, 0)), Some(&inc(0)));
    assert_eq!(func.instr(at(0, 1)), None);
    assert_eq!(func.instr(at(9, 0)), None);
}

#[test]
fn exit_blocks_are_returns() {
    let func = make_func(
        vec![],
        vec![
            block(0, vec![], branch(0, 1, 2)),
            block(1, vec![], ret(0)),
            block(2, vec![], ArcTerminator::Unreachable),
        ],
    );
    let exits: Vec<ArcBlockId> = func.exit_blocks().map(|blk| blk.id).collect();
    assert_eq!(exits, vec![b(1)]);
}
