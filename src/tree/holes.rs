//! Hole discovery and structural partitioning around holes.
//!
//! Both operations are built on the same read-only transition traversal:
//! an in-order walk that reports every offset where nesting depth crosses
//! zero. `find_holes_in` turns the transition stream into covered segments
//! and complements them against a query interval; `partition_around_holes`
//! cuts the tree at each transition so no surviving subtree straddles a
//! hole boundary. Both collect their full plan before touching the tree's
//! structure (see the module-level design note in `SPEC_FULL.md` §9).

use super::node::{NodeId, Side};
use super::Arena;
use crate::error::IntervalError;
use crate::interval::Interval;

/// A position where nesting depth crosses zero. `direction` is `+1` when
/// depth crosses from positive to zero or below (entering a hole, cut to
/// the right of `node`) and `-1` when it crosses from zero-or-below back to
/// positive (leaving a hole, cut to the left of `node`).
#[derive(Debug, Clone, Copy)]
struct Transition {
  node: NodeId,
  direction: i8,
}

impl Arena {
  /// In-order traversal collecting every hole-boundary transition, pruning
  /// subtrees proven (via `subtree_relative_minimum`) to stay above zero.
  /// Fails if two consecutive transitions share the same polarity.
  fn collect_transitions(&self, root: Option<NodeId>) -> Result<Vec<Transition>, IntervalError> {
    let mut out = Vec::new();
    let mut last_now_hole: Option<bool> = None;
    self.collect_transitions_rec(root, 0, &mut out, &mut last_now_hole)?;
    Ok(out)
  }

  fn collect_transitions_rec(
    &self,
    node: Option<NodeId>,
    entry: i64,
    out: &mut Vec<Transition>,
    last_now_hole: &mut Option<bool>,
  ) -> Result<(), IntervalError> {
    let Some(id) = node else { return Ok(()) };

    if entry > 0 && entry + self.relative_minimum(Some(id)) > 0 {
      return Ok(());
    }

    let (left, right, adjust) = {
      let n = self.node_ref(id);
      (n.left, n.right, n.adjust)
    };

    self.collect_transitions_rec(left, entry, out, last_now_hole)?;

    let depth_before = entry + self.total(left);
    let depth_after = depth_before + adjust;
    let was_hole = depth_before <= 0;
    let now_hole = depth_after <= 0;
    if was_hole != now_hole {
      if *last_now_hole == Some(now_hole) {
        return Err(IntervalError::InvariantViolation);
      }
      *last_now_hole = Some(now_hole);
      let direction = if now_hole { 1 } else { -1 };
      out.push(Transition { node: id, direction });
    }

    self.collect_transitions_rec(right, depth_after, out, last_now_hole)?;
    Ok(())
  }

  fn covered_segments(&self, root: Option<NodeId>) -> Result<Vec<Interval>, IntervalError> {
    let transitions = self.collect_transitions(root)?;
    if transitions.len() % 2 != 0 {
      return Err(IntervalError::InvariantViolation);
    }
    Ok(
      transitions
        .chunks(2)
        .map(|pair| {
          let open = self.offset(pair[0].node);
          let close = self.offset(pair[1].node);
          Interval::new(open, close - open)
        })
        .collect(),
    )
  }

  /// Every maximal sub-interval of `query` on which nesting depth is zero,
  /// in ascending order, pairwise disjoint, each of positive length.
  pub(crate) fn find_holes_in(
    &self,
    root: Option<NodeId>,
    query: Interval,
  ) -> Result<Vec<Interval>, IntervalError> {
    if query.is_empty() {
      return Ok(Vec::new());
    }
    let segments = self.covered_segments(root)?;
    let overlapping: Vec<Interval> = segments.into_iter().filter(|s| s.overlaps(&query)).collect();

    let mut holes = Vec::new();
    let mut cursor = query.offset;
    for seg in &overlapping {
      if seg.offset > cursor {
        holes.push(Interval::new(cursor, seg.offset - cursor));
      }
      cursor = cursor.max(seg.end());
    }
    if cursor < query.end() {
      holes.push(Interval::new(cursor, query.end() - cursor));
    }
    Ok(holes)
  }

  /// Severs the tree rooted at `root` at every hole boundary, so each
  /// resulting subtree lies entirely within one covered segment or one
  /// hole. Returns the roots of every resulting subtree (in ascending key
  /// order). Fails if `root`'s total adjust is non-zero.
  pub(crate) fn partition_around_holes(&mut self, root: Option<NodeId>) -> Result<Vec<NodeId>, IntervalError> {
    let Some(root_id) = root else { return Ok(Vec::new()) };
    if self.total(Some(root_id)) != 0 {
      return Err(IntervalError::InvariantViolation);
    }

    let transitions = self.collect_transitions(Some(root_id))?;
    if transitions.len() % 2 != 0 {
      return Err(IntervalError::InvariantViolation);
    }

    let mut roots = std::collections::BTreeSet::new();
    roots.insert(self.root_of(root_id));

    for t in &transitions {
      let new_root = self.split_at(t.node, t.direction);
      roots.insert(self.root_of(t.node));
      if let Some(nr) = new_root {
        roots.insert(self.root_of(nr));
      }
    }

    Ok(roots.into_iter().collect())
  }

  /// Detaches `node`'s child on the side named by `direction`'s sign and
  /// walks the ancestor chain, reattaching the growing orphan subtree on
  /// whichever side keeps key order intact, flipping direction whenever the
  /// walk crosses it. Returns the root of the newly separated subtree, if
  /// any nodes were separated at all.
  fn split_at(&mut self, node: NodeId, direction: i8) -> Option<NodeId> {
    let mut dir = Side::of_direction(direction);
    let mut cur = node;
    let mut orphan = self.detach_child(cur, dir);

    loop {
      let Some(parent) = self.node_ref(cur).parent else {
        self.recompute(cur);
        break;
      };
      if self.child(parent, dir.opposite()) == Some(cur) {
        // `cur` sits on the far side from `dir` relative to `parent`: the
        // step up does not cross `dir`. Keep climbing with the same orphan.
        self.recompute(cur);
        cur = parent;
      } else {
        // `cur` sits on the `dir` side of `parent`: the step up crosses
        // `dir`. Hand the parent's `dir`-side slot the accumulated orphan,
        // and carry `cur` itself upward as the new orphan with direction
        // flipped.
        debug_assert_eq!(self.child(parent, dir), Some(cur));
        self.set_child(parent, dir, orphan);
        self.recompute(parent);
        orphan = Some(cur);
        cur = parent;
        dir = dir.opposite();
      }
    }

    if let Some(o) = orphan {
      self.set_parent_none(o);
      self.recompute(o);
    }
    orphan
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn covered(arena: &Arena, root: Option<NodeId>) -> Vec<Interval> {
    arena
      .find_holes_in(root, Interval::new(0, 1_000_000))
      .map(|holes| {
        // Complement the holes back into covered segments for assertions.
        let mut segs = Vec::new();
        let mut cursor = 0u64;
        for h in &holes {
          if h.offset > cursor {
            segs.push(Interval::new(cursor, h.offset - cursor));
          }
          cursor = h.end();
        }
        segs
      })
      .unwrap()
  }

  #[test]
  fn disjoint_handles_leave_a_hole_between_them() {
    let mut arena = Arena::new();
    let (root, _) = arena.include(None, 0, 1, 1).unwrap();
    let (root, _) = arena.include(root, 3, -1, 1).unwrap();
    let (root, _) = arena.include(root, 7, 1, 1).unwrap();
    let (root, _) = arena.include(root, 10, -1, 1).unwrap();

    let holes = arena.find_holes_in(root, Interval::new(0, 10)).unwrap();
    assert_eq!(holes, vec![Interval::new(3, 4)]);
  }

  #[test]
  fn partition_splits_covered_segments_from_holes() {
    let mut arena = Arena::new();
    let (root, _) = arena.include(None, 0, 1, 1).unwrap();
    let (root, _) = arena.include(root, 3, -1, 1).unwrap();
    let (root, _) = arena.include(root, 7, 1, 1).unwrap();
    let (root, _) = arena.include(root, 10, -1, 1).unwrap();

    let roots = arena.partition_around_holes(root).unwrap();
    assert_eq!(roots.len(), 2);
    for r in roots {
      assert_eq!(arena.node_ref(r).parent, None);
    }
  }

  #[test]
  fn overlapping_query_interval_clips_holes() {
    let mut arena = Arena::new();
    let (root, _) = arena.include(None, 5, 1, 1).unwrap();
    let (root, _) = arena.include(root, 15, -1, 1).unwrap();

    let holes = arena.find_holes_in(root, Interval::new(0, 10)).unwrap();
    assert_eq!(holes, vec![Interval::new(0, 5)]);
  }
}
