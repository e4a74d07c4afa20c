use pretty_assertions::assert_eq;

use crate::ir::ArcTerminator;
use crate::test_helpers::{b, block, branch, jump, make_func, ret};

use super::*;

fn r(n: u32) -> RegionId {
    RegionId::new(n)
}

/// ```text
/// root
/// ├── b0                      (r1)
/// ├── L1                      (r2)
/// │   ├── b1                  (r3)
/// │   ├── L2                  (r4)
/// │   │   ├── b2              (r5)
/// │   │   └── b3              (r6)   b3 → b2, exits to b4 and b5
/// │   └── b4                  (r7)   b4 → b1, exits to b5
/// └── b5                      (r8)
/// ```
fn nested_graph() -> RegionGraph {
    let mut gb = RegionGraphBuilder::new();
    let root = gb.root();
    let b0 = gb.add_block(root, b(0));
    let l1 = gb.add_loop(root);
    let b1 = gb.add_block(l1, b(1));
    let l2 = gb.add_loop(l1);
    let b2 = gb.add_block(l2, b(2));
    let b3 = gb.add_block(l2, b(3));
    let b4 = gb.add_block(l1, b(4));
    let b5 = gb.add_block(root, b(5));

    gb.add_edge(b0, b1)
        .add_edge(b1, b2)
        .add_edge(b2, b3)
        .add_edge(b3, b2)
        .add_edge(b3, b4)
        .add_edge(b3, b5)
        .add_edge(b4, b1)
        .add_edge(b4, b5);
    gb.finish()
}

// Construction

#[test]
fn builder_allocates_root_first() {
    let graph = nested_graph();
    assert_eq!(graph.root(), r(0));
    assert!(graph.top_level_region().is_function());
    assert_eq!(graph.top_level_region().parent(), None);
    assert_eq!(graph.len(), 9);
    assert_eq!(graph.top_level_region().subregions(), &[r(1), r(2), r(8)]);
}

#[test]
fn subregion_orders() {
    let graph = nested_graph();
    let l1 = graph.region(r(2));
    assert!(l1.is_loop());
    assert_eq!(l1.subregions(), &[r(3), r(4), r(7)]);
    assert_eq!(l1.subregions_rev().collect::<Vec<_>>(), vec![r(7), r(4), r(3)]);
    assert_eq!(graph.region(r(5)).block(), Some(b(2)));
    assert_eq!(l1.block(), None);
}

#[test]
fn edge_into_loop_targets_the_loop_at_outer_scope() {
    let graph = nested_graph();
    // b0 → b1 crosses into L1: at root scope the successor is L1 itself.
    assert_eq!(graph.region(r(1)).succs(), &[Successor::Local(r(2))]);
    // The loop lists b0 as a predecessor; its header only the back-edge.
    assert_eq!(graph.region(r(2)).preds(), &[r(1)]);
    assert_eq!(graph.region(r(3)).preds(), &[r(7)]);
    // b1 → b2 enters L2, so b2 only sees b3.
    assert_eq!(graph.region(r(4)).preds(), &[r(3)]);
    assert_eq!(graph.region(r(5)).preds(), &[r(6)]);
}

#[test]
fn loop_exits_become_non_local_successors() {
    let graph = nested_graph();
    let b3 = graph.region(r(6));
    assert_eq!(b3.local_succs().collect::<Vec<_>>(), vec![r(5)]);
    assert_eq!(b3.non_local_succs().collect::<Vec<_>>(), vec![0, 1]);

    // L2 holds the exit to b4 locally and forwards the exit to b5.
    assert_eq!(
        graph.region(r(4)).succs(),
        &[Successor::Local(r(7)), Successor::NonLocal(0)]
    );
    assert_eq!(graph.region(r(2)).succs(), &[Successor::Local(r(8))]);
    assert_eq!(graph.region(r(8)).preds(), &[r(2)]);
}

#[test]
fn non_local_successor_resolution() {
    let graph = nested_graph();
    assert_eq!(graph.region_for_non_local_successor(r(6), 0), Some(r(7)));
    // Two levels out: b3 → L2 exit 1 → L1 exit 0 → b5.
    assert_eq!(graph.region_for_non_local_successor(r(6), 1), Some(r(8)));
    assert_eq!(graph.region_for_non_local_successor(r(7), 0), Some(r(8)));
    assert_eq!(graph.region_for_non_local_successor(r(6), 7), None);
    assert_eq!(graph.region_for_non_local_successor(r(0), 0), None);
}

#[test]
fn duplicate_edges_are_recorded_once() {
    let mut gb = RegionGraphBuilder::new();
    let root = gb.root();
    let x = gb.add_block(root, b(0));
    let y = gb.add_block(root, b(1));
    gb.add_edge(x, y).add_edge(x, y);
    let graph = gb.finish();
    assert_eq!(graph.region(x).succs(), &[Successor::Local(y)]);
    assert_eq!(graph.region(y).preds(), &[x]);
}

#[test]
fn flags_accumulate() {
    let mut gb = RegionGraphBuilder::new();
    let root = gb.root();
    let x = gb.add_block(root, b(0));
    gb.add_flags(x, RegionFlags::UNKNOWN_CF_EDGE_HEAD)
        .add_flags(x, RegionFlags::ALLOWS_LEAKS);
    let graph = gb.finish();
    let region = graph.region(x);
    assert!(region.is_unknown_cf_edge_head());
    assert!(!region.is_unknown_cf_edge_tail());
    assert!(region.allows_leaks());
}

// Queries

#[test]
fn blocks_within_is_forward_order() {
    let graph = nested_graph();
    assert_eq!(
        graph.blocks_within(graph.root()),
        vec![b(0), b(1), b(2), b(3), b(4), b(5)]
    );
    assert_eq!(graph.blocks_within(r(4)), vec![b(2), b(3)]);
    assert_eq!(graph.blocks_within(r(8)), vec![b(5)]);
}

// Verification

#[test]
fn well_formed_graph_verifies() {
    assert_eq!(nested_graph().verify(), vec![]);
}

#[test]
fn verify_reports_every_problem() {
    let mut graph = nested_graph();
    let b2 = r(5);
    graph.regions[b2.index()].parent = Some(r(6));
    graph.regions[b2.index()].preds.push(r(42));
    graph.regions[b2.index()].succs.push(Successor::NonLocal(9));

    assert_eq!(
        graph.verify(),
        vec![
            RegionProblem::MisplacedSubregion {
                parent: r(4),
                child: b2
            },
            RegionProblem::BadParent { region: b2 },
            RegionProblem::DanglingEdge {
                region: b2,
                target: 42
            },
            RegionProblem::UnresolvedExit { region: b2, exit: 9 },
        ]
    );
}

#[test]
fn verify_reports_empty_loop() {
    let mut graph = nested_graph();
    graph.regions[4].subregions.clear();
    assert_eq!(
        graph.verify(),
        vec![RegionProblem::EmptyLoop { region: r(4) }]
    );
}

// Loop-free construction

#[test]
fn without_loops_uses_reverse_postorder() {
    let func = make_func(
        vec![],
        vec![
            block(0, vec![], branch(0, 1, 2)),
            block(1, vec![], jump(3)),
            block(2, vec![], ArcTerminator::Unreachable),
            block(3, vec![], ret(0)),
            // Unreachable from the entry.
            block(4, vec![], jump(3)),
        ],
    );
    let graph = RegionGraph::without_loops(&func);

    assert_eq!(graph.len(), 5);
    assert_eq!(graph.blocks_within(graph.root()), vec![b(0), b(2), b(1), b(3)]);

    let leaking: Vec<_> = graph
        .regions()
        .filter(|region| region.allows_leaks())
        .filter_map(Region::block)
        .collect();
    assert_eq!(leaking, vec![b(2)]);

    // b0 branches to b1 (r3) then b2 (r2).
    assert_eq!(
        graph.region(r(1)).succs(),
        &[Successor::Local(r(3)), Successor::Local(r(2))]
    );
    assert_eq!(graph.region(r(4)).preds(), &[r(3)]);
    assert_eq!(graph.verify(), vec![]);
}

#[test]
fn without_loops_keeps_self_edge_local() {
    let func = make_func(
        vec![],
        vec![block(0, vec![], branch(0, 0, 1)), block(1, vec![], ret(0))],
    );
    let graph = RegionGraph::without_loops(&func);
    let entry = graph.region(r(1));
    assert_eq!(entry.local_succs().collect::<Vec<_>>(), vec![r(1), r(2)]);
    assert_eq!(entry.preds(), &[r(1)]);
}
