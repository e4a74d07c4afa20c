//! Loop region hierarchy over an ARC IR function.
//!
//! A [`RegionGraph`] decomposes a function into nested regions:
//!
//! - **Block** regions are leaves, one per basic block.
//! - **Loop** regions are composites owning an ordered list of subregions.
//! - The single **Function** region is the root composite.
//!
//! Regions live in a flat arena indexed by [`RegionId`]. Every edge
//! (predecessor, successor, parent, subregion) is stored as an ID, never
//! as a reference, so back-edges do not require cyclic ownership.
//!
//! # Successors
//!
//! A region's successors are split into two classes:
//!
//! - [`Successor::Local`]: a region in the same immediate scope.
//! - [`Successor::NonLocal`]: an exit from the enclosing loop. The payload
//!   is an index into the *parent's* successor list; resolution continues
//!   outward until a local successor is found
//!   (see [`RegionGraph::region_for_non_local_successor`]).
//!
//! Predecessors always name regions in the same scope. An edge entering a
//! loop is a predecessor of the loop region, not of its header block.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::ir::ArcBlockId;

mod builder;

pub use builder::RegionGraphBuilder;

/// Region ID within a [`RegionGraph`]. Dense, allocated from 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct RegionId(u32);

impl RegionId {
    /// Create a new region ID from a raw index.
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

/// What a region covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Leaf region for one basic block.
    Block(ArcBlockId),
    /// A natural loop.
    Loop,
    /// The whole function. Exactly one per graph.
    Function,
}

bitflags! {
    /// Per-region control flow properties.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct RegionFlags: u8 {
        /// Control may enter this region through an edge the CFG does not
        /// show.
        const UNKNOWN_CF_EDGE_HEAD = 1 << 0;
        /// Control may leave this region through an edge the CFG does not
        /// show (indirect transfer).
        const UNKNOWN_CF_EDGE_TAIL = 1 << 1;
        /// The region exits abnormally (diverges), so a reference leaking
        /// past it is acceptable.
        const ALLOWS_LEAKS = 1 << 2;
    }
}

/// A successor edge out of a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Successor {
    /// Successor in the same immediate scope.
    Local(RegionId),
    /// Exit from the enclosing loop: index into the parent's successor list.
    NonLocal(u32),
}

/// One node of the region hierarchy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub(crate) id: RegionId,
    pub(crate) kind: RegionKind,
    pub(crate) parent: Option<RegionId>,
    pub(crate) preds: SmallVec<[RegionId; 4]>,
    pub(crate) succs: SmallVec<[Successor; 4]>,
    /// Forward (reverse postorder) order. Empty for blocks.
    pub(crate) subregions: Vec<RegionId>,
    pub(crate) flags: RegionFlags,
}

impl Region {
    #[inline]
    pub fn id(&self) -> RegionId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    #[inline]
    pub fn parent(&self) -> Option<RegionId> {
        self.parent
    }

    #[inline]
    pub fn flags(&self) -> RegionFlags {
        self.flags
    }

    #[inline]
    pub fn is_block(&self) -> bool {
        matches!(self.kind, RegionKind::Block(_))
    }

    #[inline]
    pub fn is_loop(&self) -> bool {
        matches!(self.kind, RegionKind::Loop)
    }

    #[inline]
    pub fn is_function(&self) -> bool {
        matches!(self.kind, RegionKind::Function)
    }

    /// The basic block of a leaf region.
    pub fn block(&self) -> Option<ArcBlockId> {
        match self.kind {
            RegionKind::Block(block) => Some(block),
            RegionKind::Loop | RegionKind::Function => None,
        }
    }

    #[inline]
    pub fn is_unknown_cf_edge_head(&self) -> bool {
        self.flags.contains(RegionFlags::UNKNOWN_CF_EDGE_HEAD)
    }

    #[inline]
    pub fn is_unknown_cf_edge_tail(&self) -> bool {
        self.flags.contains(RegionFlags::UNKNOWN_CF_EDGE_TAIL)
    }

    #[inline]
    pub fn allows_leaks(&self) -> bool {
        self.flags.contains(RegionFlags::ALLOWS_LEAKS)
    }

    #[inline]
    pub fn preds(&self) -> &[RegionId] {
        &self.preds
    }

    #[inline]
    pub fn succs(&self) -> &[Successor] {
        &self.succs
    }

    /// Successors in the same scope, in edge order.
    pub fn local_succs(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.succs.iter().filter_map(|s| match *s {
            Successor::Local(id) => Some(id),
            Successor::NonLocal(_) => None,
        })
    }

    /// Loop-exit indices, in edge order.
    pub fn non_local_succs(&self) -> impl Iterator<Item = u32> + '_ {
        self.succs.iter().filter_map(|s| match *s {
            Successor::NonLocal(exit) => Some(exit),
            Successor::Local(_) => None,
        })
    }

    /// Subregions in forward (top-down) order.
    #[inline]
    pub fn subregions(&self) -> &[RegionId] {
        &self.subregions
    }

    /// Subregions in reverse (bottom-up) order.
    pub fn subregions_rev(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.subregions.iter().rev().copied()
    }
}

/// Structural problem found by [`RegionGraph::verify`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegionProblem {
    /// A loop region with no subregions.
    EmptyLoop { region: RegionId },
    /// A non-root region without a parent, or a parent that is a block.
    BadParent { region: RegionId },
    /// An edge names a region outside the arena.
    DanglingEdge { region: RegionId, target: u32 },
    /// A non-local successor index that does not resolve to a region.
    UnresolvedExit { region: RegionId, exit: u32 },
    /// A subregion list entry whose parent is a different region.
    MisplacedSubregion { parent: RegionId, child: RegionId },
}

/// The loop region hierarchy of one function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionGraph {
    pub(crate) regions: Vec<Region>,
    pub(crate) root: RegionId,
}

impl RegionGraph {
    /// Look up a region by ID.
    ///
    /// Panics if `id` does not belong to this graph; IDs are only ever
    /// produced by the graph's own builder.
    #[inline]
    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.index()]
    }

    /// The function-level root region.
    #[inline]
    pub fn top_level_region(&self) -> &Region {
        self.region(self.root)
    }

    #[inline]
    pub fn root(&self) -> RegionId {
        self.root
    }

    /// All regions in ID order.
    pub fn regions(&self) -> impl ExactSizeIterator<Item = &Region> + '_ {
        self.regions.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Resolve the non-local successor `exit` of `region` to an actual
    /// region.
    ///
    /// `exit` indexes the parent's successor list. When that entry is
    /// itself a loop exit the lookup moves one scope outward, until a
    /// local entry names the target.
    pub fn region_for_non_local_successor(&self, region: RegionId, exit: u32) -> Option<RegionId> {
        let mut current = region;
        let mut exit = exit;
        loop {
            let parent = self.regions.get(current.index())?.parent?;
            match self.regions.get(parent.index())?.succs.get(exit as usize)? {
                Successor::Local(target) => return Some(*target),
                Successor::NonLocal(next) => {
                    current = parent;
                    exit = *next;
                }
            }
        }
    }

    /// Leaf blocks nested (at any depth) under `region`, in forward order.
    ///
    /// Explicit stack, no recursion.
    pub fn blocks_within(&self, region: RegionId) -> Vec<ArcBlockId> {
        let mut blocks = Vec::new();
        let mut stack = vec![region];
        while let Some(id) = stack.pop() {
            let r = self.region(id);
            if let Some(block) = r.block() {
                blocks.push(block);
                continue;
            }
            // Reverse so the first subregion is popped first.
            stack.extend(r.subregions_rev());
        }
        blocks
    }

    /// Check structural invariants, collecting every problem found.
    pub fn verify(&self) -> Vec<RegionProblem> {
        let mut problems = Vec::new();
        let n = self.regions.len();
        let in_range = |id: RegionId| id.index() < n;

        for r in &self.regions {
            match r.parent {
                None if r.id != self.root => {
                    problems.push(RegionProblem::BadParent { region: r.id });
                }
                Some(p) if !in_range(p) || self.region(p).is_block() => {
                    problems.push(RegionProblem::BadParent { region: r.id });
                }
                _ => {}
            }

            if r.is_loop() && r.subregions.is_empty() {
                problems.push(RegionProblem::EmptyLoop { region: r.id });
            }

            for &child in &r.subregions {
                if !in_range(child) {
                    problems.push(RegionProblem::DanglingEdge {
                        region: r.id,
                        target: child.raw(),
                    });
                } else if self.region(child).parent != Some(r.id) {
                    problems.push(RegionProblem::MisplacedSubregion {
                        parent: r.id,
                        child,
                    });
                }
            }

            let locals = r.preds.iter().copied().chain(r.local_succs());
            for target in locals {
                if !in_range(target) {
                    problems.push(RegionProblem::DanglingEdge {
                        region: r.id,
                        target: target.raw(),
                    });
                }
            }

            for exit in r.non_local_succs() {
                let resolved = self.region_for_non_local_successor(r.id, exit);
                if !resolved.is_some_and(in_range) {
                    problems.push(RegionProblem::UnresolvedExit {
                        region: r.id,
                        exit,
                    });
                }
            }
        }

        problems
    }
}

#[cfg(test)]
mod tests;
