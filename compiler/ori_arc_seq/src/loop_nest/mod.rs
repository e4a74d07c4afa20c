//! Loop nesting forest and its inside-out walk.
//!
//! Both sweeps of the sequence dataflow visit loops children-first: every
//! loop's sub-loops are fully processed before the loop itself, and the
//! function root comes last. [`LoopNest::inside_out`] produces that order
//! with an explicit two-phase stack, so arbitrarily deep nests never
//! recurse.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::region::{RegionGraph, RegionId};

/// The loop nesting forest of one function, in region IDs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopNest {
    top_level: SmallVec<[RegionId; 4]>,
    sub_loops: FxHashMap<RegionId, SmallVec<[RegionId; 4]>>,
}

impl LoopNest {
    /// A nest with no loops.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the nest from a region graph: a loop's sub-loops are its
    /// loop-kind subregions, in subregion order.
    pub fn from_regions(graph: &RegionGraph) -> Self {
        let mut nest = Self::new();
        for region in graph.regions() {
            if !(region.is_loop() || region.is_function()) {
                continue;
            }
            let children: SmallVec<[RegionId; 4]> = region
                .subregions()
                .iter()
                .copied()
                .filter(|&id| graph.region(id).is_loop())
                .collect();
            if region.is_function() {
                nest.top_level = children;
            } else {
                nest.sub_loops.insert(region.id(), children);
            }
        }
        nest
    }

    /// Add a top-level loop.
    pub fn add_top_level(&mut self, lp: RegionId) -> &mut Self {
        self.top_level.push(lp);
        self.sub_loops.entry(lp).or_default();
        self
    }

    /// Add `child` as a sub-loop of `parent`.
    pub fn add_sub_loop(&mut self, parent: RegionId, child: RegionId) -> &mut Self {
        self.sub_loops.entry(parent).or_default().push(child);
        self.sub_loops.entry(child).or_default();
        self
    }

    #[inline]
    pub fn top_level_loops(&self) -> &[RegionId] {
        &self.top_level
    }

    /// Direct sub-loops of `lp` (empty for unknown regions).
    pub fn sub_loops(&self, lp: RegionId) -> &[RegionId] {
        self.sub_loops.get(&lp).map_or(&[], |subs| subs.as_slice())
    }

    /// Number of loops in the nest.
    pub fn len(&self) -> usize {
        self.sub_loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_loops.is_empty()
    }

    /// Walk every loop inside-out, then `root`.
    pub fn inside_out(&self, root: RegionId) -> InsideOut<'_> {
        let stack = self
            .top_level
            .iter()
            .map(|&lp| (lp, false))
            .collect();
        InsideOut {
            nest: self,
            stack,
            root: Some(root),
        }
    }
}

/// Iterator returned by [`LoopNest::inside_out`].
///
/// Stack entries are `(loop, revisit)`. An unvisited loop is pushed back
/// marked for revisit with its sub-loops on top of it, so by the time it
/// is popped again every sub-loop has been yielded.
#[derive(Debug)]
pub struct InsideOut<'a> {
    nest: &'a LoopNest,
    stack: Vec<(RegionId, bool)>,
    root: Option<RegionId>,
}

impl Iterator for InsideOut<'_> {
    type Item = RegionId;

    fn next(&mut self) -> Option<RegionId> {
        while let Some((lp, revisit)) = self.stack.pop() {
            if revisit {
                return Some(lp);
            }
            self.stack.push((lp, true));
            for &sub in self.nest.sub_loops(lp) {
                self.stack.push((sub, false));
            }
        }
        self.root.take()
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
