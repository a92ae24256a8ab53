//! The handle layer: array-like handles into a [`BackingStore`], backed by
//! the nesting-depth tree in [`crate::tree`].
//!
//! A handle is a thin wrapper around a backing [`Interval`] plus a
//! reference to one tree node (its right endpoint) sufficient to find the
//! tree it belongs to. Creation and slicing both reduce to two `include`
//! calls; release reverses them in the two-phase order described in
//! `SPEC_FULL.md` §4.2, so hole discovery always sees the reduced coverage
//! before the endpoint pins are dropped.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::IntervalError;
use crate::interval::Interval;
use crate::store::BackingStore;
use crate::tree::{Arena, NodeId};

/// A live or released reference into a [`BackingStore`]-backed region.
///
/// Cloning a store handle (the `Rc<RefCell<S>>`) is cheap and is how
/// [`Handle::slice`] produces siblings that share the same arena and store;
/// the handle itself does not implement `Clone`, since each instance owns
/// exactly one pin pair in the tree.
pub struct Handle<S: BackingStore> {
  arena: Rc<RefCell<Arena>>,
  store: Rc<RefCell<S>>,
  interval: Interval,
  /// The right-endpoint node, sufficient to locate the tree via
  /// `Arena::root_of`. `None` for degenerate (zero-length) handles, which
  /// never touch the tree at all.
  locator: Option<NodeId>,
  disposed: bool,
}

impl<S: BackingStore> Handle<S> {
  /// Allocates `length` cells from `store` and wraps them in a fresh
  /// handle, backed by a new nesting-depth tree.
  pub fn new(length: u64, store: Rc<RefCell<S>>) -> Result<Self, IntervalError> {
    let arena = Rc::new(RefCell::new(Arena::new()));
    let interval = store.borrow_mut().allocate(length);
    let locator = Self::open(&arena, None, interval)?.1;
    Ok(Self {
      arena,
      store,
      interval,
      locator,
      disposed: false,
    })
  }

  /// Opens coverage for `interval` in the tree rooted at `root`, pinning
  /// both endpoints. Returns the new root and the right-endpoint locator
  /// (`None` for a degenerate interval, which is never inserted).
  fn open(
    arena: &Rc<RefCell<Arena>>,
    root: Option<NodeId>,
    interval: Interval,
  ) -> Result<(Option<NodeId>, Option<NodeId>), IntervalError> {
    if interval.is_empty() {
      return Ok((root, None));
    }
    let mut tree = arena.borrow_mut();
    let (root, _) = tree.include(root, interval.offset, 1, 1)?;
    let (root, right) = tree.include(root, interval.end(), -1, 1)?;
    Ok((root, right))
  }

  /// Produces a child handle over `sub`, interpreted relative to this
  /// handle's own interval (`sub.offset` is an offset into `self`, not into
  /// the backing store). Fails with [`IntervalError::OutOfRange`] if `sub`
  /// does not fit within this handle's length, or [`IntervalError::UseAfterRelease`]
  /// if this handle has already been released.
  pub fn slice(&self, sub: Interval) -> Result<Handle<S>, IntervalError> {
    if self.disposed {
      return Err(IntervalError::UseAfterRelease);
    }
    if sub.offset.checked_add(sub.length).is_none_or(|end| end > self.interval.length) {
      return Err(IntervalError::OutOfRange);
    }

    let child_interval = Interval::new(self.interval.offset + sub.offset, sub.length);
    let root = self.locator.map(|n| self.arena.borrow().root_of(n));
    let locator = Self::open(&self.arena, root, child_interval)?.1;

    Ok(Handle {
      arena: Rc::clone(&self.arena),
      store: Rc::clone(&self.store),
      interval: child_interval,
      locator,
      disposed: false,
    })
  }

  /// This handle's length, in cells.
  pub fn len(&self) -> u64 {
    self.interval.length
  }

  /// True for a zero-length handle.
  pub fn is_empty(&self) -> bool {
    self.interval.is_empty()
  }

  /// Reads the cell at `index`, relative to this handle's start.
  pub fn read(&self, index: u64) -> Result<i64, IntervalError> {
    let absolute = self.absolute(index)?;
    self.store.borrow().read(absolute)
  }

  /// Writes `value` to the cell at `index`, relative to this handle's
  /// start.
  pub fn write(&self, index: u64, value: i64) -> Result<(), IntervalError> {
    let absolute = self.absolute(index)?;
    self.store.borrow_mut().write(absolute, value)
  }

  fn absolute(&self, index: u64) -> Result<u64, IntervalError> {
    if self.disposed {
      return Err(IntervalError::UseAfterRelease);
    }
    if index >= self.interval.length {
      return Err(IntervalError::OutOfRange);
    }
    Ok(self.interval.offset + index)
  }

  /// Releases this handle. Idempotent: a second call (explicit or via
  /// `Drop`) is a no-op. Frees every maximal sub-range of this handle's
  /// interval that no surviving handle still covers.
  pub fn release(&mut self) -> Result<(), IntervalError> {
    if self.disposed {
      return Ok(());
    }
    self.disposed = true;

    let Some(locator) = self.locator else {
      // Degenerate handle: nothing was ever inserted into the tree.
      return Ok(());
    };

    let left = self.interval.offset;
    let right = self.interval.end();

    let mut tree = self.arena.borrow_mut();
    let root = tree.root_of(locator);

    // Step 1: the tree must be quiescent (every open pairs with a close)
    // before a release begins.
    if tree.total_of(Some(root)) != 0 {
      return Err(IntervalError::InvariantViolation);
    }

    // Step 2: bound the hole search to this tree, before we touch it.
    let enclosing = tree.bounds(root);

    // Step 3: flip this handle's adjustments without dropping pins yet, so
    // both endpoint nodes are still reachable while we search for holes.
    let (root, _) = tree.include(Some(root), right, 1, 0)?;
    let (root, _) = tree.include(root, left, -1, 0)?;
    let root = root.expect("both endpoints are still pinned, so the tree cannot be empty");

    // Step 4: the holes opened by this release, within the tree's span.
    let holes = tree.find_holes_in(Some(root), enclosing)?;

    // Step 5: now drop the pins.
    let (root, _) = tree.include(Some(root), right, 0, -1)?;
    let (root, _) = tree.include(root, left, 0, -1)?;

    // Step 6: sever the tree at every hole boundary.
    tree.partition_around_holes(root)?;
    drop(tree);

    // Step 7: return the freed cells to the backing store.
    let mut store = self.store.borrow_mut();
    for hole in holes {
      store.free(hole)?;
    }
    Ok(())
  }
}

impl<S: BackingStore> Drop for Handle<S> {
  fn drop(&mut self) {
    let result = self.release();
    debug_assert!(result.is_ok(), "handle release failed: {result:?}");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MockStore;

  fn store() -> Rc<RefCell<MockStore>> {
    Rc::new(RefCell::new(MockStore::new()))
  }

  #[test]
  fn s1_trivial_lifecycle() {
    let s = store();
    let mut a = Handle::new(100, Rc::clone(&s)).unwrap();
    assert_eq!(s.borrow().memory_in_use(), 100);
    a.release().unwrap();
    assert_eq!(s.borrow().memory_in_use(), 0);
  }

  #[test]
  fn s2_slice_keeps_parent_alive_partly() {
    let s = store();
    let mut a = Handle::new(50, Rc::clone(&s)).unwrap();
    let b = a.slice(Interval::new(10, 15)).unwrap();
    a.write(10, 5).unwrap();
    assert_eq!(s.borrow().memory_in_use(), 50);

    a.release().unwrap();
    assert_eq!(b.read(0).unwrap(), 5);
    assert_eq!(s.borrow().memory_in_use(), 15);

    let mut b = b;
    b.release().unwrap();
    assert_eq!(s.borrow().memory_in_use(), 0);
  }

  #[test]
  fn s3_overlapping_slices_shrink_coverage_in_steps() {
    let s = store();
    let mut a = Handle::new(10, Rc::clone(&s)).unwrap();
    let mut b = a.slice(Interval::new(2, 6)).unwrap();
    let mut c = a.slice(Interval::new(5, 4)).unwrap();

    a.release().unwrap();
    assert_eq!(s.borrow().memory_in_use(), 7); // [2, 9)
    b.release().unwrap();
    assert_eq!(s.borrow().memory_in_use(), 4); // [5, 9)
    c.release().unwrap();
    assert_eq!(s.borrow().memory_in_use(), 0);
  }

  #[test]
  fn s4_disjoint_slices_create_a_hole() {
    let s = store();
    let mut a = Handle::new(10, Rc::clone(&s)).unwrap();
    let mut b = a.slice(Interval::new(0, 3)).unwrap();
    let mut c = a.slice(Interval::new(7, 3)).unwrap();

    a.release().unwrap();
    assert_eq!(s.borrow().memory_in_use(), 6); // [0,3) + [7,10)
    b.release().unwrap();
    assert_eq!(s.borrow().memory_in_use(), 3);
    c.release().unwrap();
    assert_eq!(s.borrow().memory_in_use(), 0);
  }

  #[test]
  fn s6_use_after_release_fails_and_double_release_is_a_no_op() {
    let s = store();
    let mut a = Handle::new(4, s).unwrap();
    a.release().unwrap();
    assert_eq!(a.read(0), Err(IntervalError::UseAfterRelease));
    assert_eq!(a.write(0, 1), Err(IntervalError::UseAfterRelease));
    assert_eq!(a.release(), Ok(()));
  }

  #[test]
  fn out_of_range_slice_is_rejected() {
    let s = store();
    let a = Handle::new(10, s).unwrap();
    assert_eq!(a.slice(Interval::new(5, 10)).unwrap_err(), IntervalError::OutOfRange);
  }

  #[test]
  fn zero_length_handle_never_touches_the_tree() {
    let s = store();
    let mut a = Handle::new(0, Rc::clone(&s)).unwrap();
    assert!(a.is_empty());
    assert_eq!(s.borrow().memory_in_use(), 0);
    assert!(a.locator.is_none());
    a.release().unwrap();
  }

  #[test]
  fn drop_releases_without_an_explicit_call() {
    let s = store();
    {
      let _a = Handle::new(20, Rc::clone(&s)).unwrap();
      assert_eq!(s.borrow().memory_in_use(), 20);
    }
    assert_eq!(s.borrow().memory_in_use(), 0);
  }
}
