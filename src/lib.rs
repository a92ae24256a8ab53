//! Interval references: handles into a contiguous memory region that each
//! pin a sub-range of that region, so memory is reclaimed exactly when it
//! is no longer covered by any live handle.
//!
//! The public surface is deliberately small: [`Handle`] for acquiring,
//! slicing, and releasing sub-ranges; [`BackingStore`] (and its in-memory
//! [`MockStore`] implementation) for the allocator handles sit on top of;
//! and [`Interval`] / [`IntervalError`] as the shared vocabulary between
//! them. The nesting-depth tree that makes release's "free exactly the
//! sub-ranges nothing still covers" guarantee logarithmic is an
//! implementation detail of [`Handle`], not part of this crate's API.

mod error;
mod handle;
mod interval;
mod store;
mod tree;

pub use error::IntervalError;
pub use handle::Handle;
pub use interval::Interval;
pub use store::{BackingStore, MockStore, WordState};
