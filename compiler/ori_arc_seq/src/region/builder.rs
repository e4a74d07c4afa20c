//! Incremental construction of a [`RegionGraph`].

use smallvec::SmallVec;

use super::{Region, RegionFlags, RegionGraph, RegionId, RegionKind, Successor};
use crate::ir::{ArcBlockId, ArcFunction, ArcTerminator};

/// Builder for a [`RegionGraph`].
///
/// The function root is allocated on construction. Subregions must be
/// added to their parent in forward (reverse postorder) order: that order
/// is the one the top-down sweep walks, and its reverse is the bottom-up
/// order.
///
/// Edges are added between arbitrary regions with [`add_edge`]; the
/// builder works out which scope the edge lives in and records the
/// loop-exit chain for edges that leave one or more loops.
///
/// [`add_edge`]: RegionGraphBuilder::add_edge
#[derive(Debug)]
pub struct RegionGraphBuilder {
    regions: Vec<Region>,
}

impl Default for RegionGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionGraphBuilder {
    pub fn new() -> Self {
        let root = Region {
            id: RegionId::new(0),
            kind: RegionKind::Function,
            parent: None,
            preds: SmallVec::new(),
            succs: SmallVec::new(),
            subregions: Vec::new(),
            flags: RegionFlags::empty(),
        };
        Self {
            regions: vec![root],
        }
    }

    /// The function-level root region.
    #[inline]
    pub fn root(&self) -> RegionId {
        RegionId::new(0)
    }

    /// Append a block region as the last subregion of `parent`.
    pub fn add_block(&mut self, parent: RegionId, block: ArcBlockId) -> RegionId {
        self.push_region(parent, RegionKind::Block(block))
    }

    /// Append a loop region as the last subregion of `parent`.
    pub fn add_loop(&mut self, parent: RegionId) -> RegionId {
        self.push_region(parent, RegionKind::Loop)
    }

    /// Set additional flags on a region.
    pub fn add_flags(&mut self, region: RegionId, flags: RegionFlags) -> &mut Self {
        self.regions[region.index()].flags |= flags;
        self
    }

    /// Record a control flow edge `from → to`.
    ///
    /// Both regions may sit at any depth. Let `scope` be the innermost
    /// composite enclosing both, and `from_anc`/`to_anc` their ancestors
    /// that are direct children of `scope`:
    ///
    /// - `from_anc` gets `to_anc` as a local successor. Every region on the
    ///   path from `from` up to `from_anc` gets a non-local successor
    ///   naming its parent's exit entry.
    /// - `to_anc` gets `from_anc` as a predecessor. Regions inside `to_anc`
    ///   do not: a loop header only lists predecessors from its own loop.
    pub fn add_edge(&mut self, from: RegionId, to: RegionId) -> &mut Self {
        debug_assert!(
            from != self.root() && to != self.root(),
            "the function region has no edges"
        );

        let from_chain = self.ancestors(from);
        let to_chain = self.ancestors(to);

        // Innermost proper ancestor of `from` that is also a proper
        // ancestor of `to`. The root is on both chains, so this always
        // succeeds for well-formed input.
        let Some(scope_pos) = from_chain[1..]
            .iter()
            .position(|r| to_chain[1..].contains(r))
            .map(|p| p + 1)
        else {
            debug_assert!(false, "regions {from:?} and {to:?} share no scope");
            return self;
        };
        let scope = from_chain[scope_pos];
        let from_path = &from_chain[..scope_pos];
        let Some(to_scope_pos) = to_chain.iter().position(|&r| r == scope) else {
            return self;
        };
        let to_path = &to_chain[..to_scope_pos];

        let from_anc = from_path[from_path.len() - 1];
        let to_anc = to_path[to_path.len() - 1];

        // Successor side, outermost first.
        let mut exit =
            push_unique_succ(&mut self.regions[from_anc.index()], Successor::Local(to_anc));
        for &inner in from_path[..from_path.len() - 1].iter().rev() {
            exit = push_unique_succ(&mut self.regions[inner.index()], Successor::NonLocal(exit));
        }

        let preds = &mut self.regions[to_anc.index()].preds;
        if !preds.contains(&from_anc) {
            preds.push(from_anc);
        }

        self
    }

    /// Finish construction.
    pub fn finish(self) -> RegionGraph {
        let graph = RegionGraph {
            regions: self.regions,
            root: RegionId::new(0),
        };
        debug_assert!(
            graph.verify().is_empty(),
            "malformed region graph: {:?}",
            graph.verify()
        );
        graph
    }

    fn push_region(&mut self, parent: RegionId, kind: RegionKind) -> RegionId {
        debug_assert!(
            !self.regions[parent.index()].is_block(),
            "blocks cannot contain subregions"
        );
        #[expect(
            clippy::cast_possible_truncation,
            reason = "region counts fit in u32"
        )]
        let id = RegionId::new(self.regions.len() as u32);
        self.regions.push(Region {
            id,
            kind,
            parent: Some(parent),
            preds: SmallVec::new(),
            succs: SmallVec::new(),
            subregions: Vec::new(),
            flags: RegionFlags::empty(),
        });
        self.regions[parent.index()].subregions.push(id);
        id
    }

    /// `[region, parent, grandparent, ..., root]`.
    fn ancestors(&self, region: RegionId) -> SmallVec<[RegionId; 8]> {
        let mut chain = SmallVec::new();
        let mut current = Some(region);
        while let Some(id) = current {
            chain.push(id);
            current = self.regions[id.index()].parent;
        }
        chain
    }
}

/// Append `succ` unless already present; return its index.
#[expect(
    clippy::cast_possible_truncation,
    reason = "successor counts fit in u32"
)]
fn push_unique_succ(region: &mut Region, succ: Successor) -> u32 {
    let pos = match region.succs.iter().position(|&s| s == succ) {
        Some(pos) => pos,
        None => {
            region.succs.push(succ);
            region.succs.len() - 1
        }
    };
    pos as u32
}

impl RegionGraph {
    /// Build a loop-free region graph for `func`: every reachable block is
    /// a direct subregion of the root, in reverse postorder.
    ///
    /// Blocks ending in `Unreachable` allow leaks. Back-edges, if any, stay
    /// ordinary local edges, so this is only precise for acyclic CFGs;
    /// callers with loops should describe them through the builder.
    pub fn without_loops(func: &ArcFunction) -> Self {
        let mut builder = RegionGraphBuilder::new();
        let root = builder.root();

        let mut rpo = compute_postorder(func);
        rpo.reverse();

        let mut region_of = vec![None; func.blocks.len()];
        for &block_idx in &rpo {
            let block = &func.blocks[block_idx];
            let region = builder.add_block(root, block.id);
            if matches!(block.terminator, ArcTerminator::Unreachable) {
                builder.add_flags(region, RegionFlags::ALLOWS_LEAKS);
            }
            region_of[block_idx] = Some(region);
        }

        for &block_idx in &rpo {
            let Some(from) = region_of[block_idx] else {
                continue;
            };
            for succ in func.blocks[block_idx].terminator.successors() {
                if let Some(to) = region_of.get(succ.index()).copied().flatten() {
                    builder.add_edge(from, to);
                }
            }
        }

        tracing::debug!(
            function = func.name.as_str(),
            regions = builder.regions.len(),
            "built loop-free region graph"
        );

        builder.finish()
    }
}

/// Postorder over the CFG from the entry block.
///
/// Iterative DFS with an explicit stack of `(block, children_pushed)`
/// pairs. Only reachable blocks are visited.
fn compute_postorder(func: &ArcFunction) -> Vec<usize> {
    let num_blocks = func.blocks.len();
    let mut visited = vec![false; num_blocks];
    let mut postorder = Vec::with_capacity(num_blocks);

    let mut stack: Vec<(usize, bool)> = vec![(func.entry.index(), false)];

    while let Some(&mut (block_idx, ref mut children_done)) = stack.last_mut() {
        if *children_done {
            postorder.push(block_idx);
            stack.pop();
            continue;
        }

        *children_done = true;

        if block_idx >= num_blocks || visited[block_idx] {
            stack.pop();
            continue;
        }
        visited[block_idx] = true;

        // Reverse so the first successor is explored first.
        for succ_id in func.blocks[block_idx].terminator.successors().iter().rev() {
            let succ_idx = succ_id.index();
            if succ_idx < num_blocks && !visited[succ_idx] {
                stack.push((succ_idx, false));
            }
        }
    }

    postorder
}
