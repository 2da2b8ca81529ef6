//! Memory-efficient integer sets backed by paged bitmaps.
//!
//! Every structure here stores membership as one bit per value inside 64-bit
//! pages, differing in how it maps an `i32` onto a page index:
//!
//! - [`IntSet`] zig-zag encodes values relative to the first value added, so
//!   a cluster anywhere on the number line occupies low pages.
//! - [`PagedIntSet`] zig-zag encodes against zero and allocates fixed
//!   1024-bit blocks lazily, handling several distant clusters.
//! - [`ClusteredBitmap`] is a single zig-zag bitmap that re-centers whenever
//!   it empties; [`NativeClusteredBitmap`] is the same algorithm over a
//!   manually managed allocation.
//! - [`ClusteredIntSet`] splits the key space at a 64-aligned center into
//!   two raw-index bitmaps.
//! - [`DenseIdMap`] is the odd one out: an open-addressing table handing out
//!   dense ids for arbitrary keys, useful for renaming sparse keys into the
//!   compact range the bitmap sets handle best.
//!
//! All sets expose the same algebra: `add`/`contains`/`remove`, bulk span
//! operations over `&[i32]`, and (where representations are compatible)
//! set-to-set union, intersection, difference, and symmetric difference,
//! each matching `HashSet<i32>` semantics.

pub mod bits;
mod clustered;
mod dense_id;
mod int_set;
mod native;
mod paged;

#[cfg(test)]
pub mod test_utils;

pub use clustered::{ClusteredBitmap, ClusteredBitmapIter, ClusteredIntSet, ClusteredIter};
pub use dense_id::DenseIdMap;
pub use int_set::{IntSet, Iter as IntSetIter};
pub use native::{Iter as NativeClusteredBitmapIter, NativeClusteredBitmap};
pub use paged::{Iter as PagedIntSetIter, PagedIntSet};
