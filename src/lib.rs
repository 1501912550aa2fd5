//! A linear bounding volume hierarchy, rebuilt from scratch every frame
//!
//! [`BvhBuilder`]: struct.BvhBuilder.html
//! [`query_neighbors`]: fn.query_neighbors.html
//!
//! A [`BvhBuilder`] owns every buffer needed to turn a list of axis-aligned boxes into a flat node array:
//!
//! 1. the global bounds of all boxes are reduced,
//! 2. each box center is mapped to a Morton key within those bounds,
//! 3. keys are sorted (bitonic network or LSB radix sort),
//! 4. leaves are written in key order,
//! 5. internal nodes are derived independently from the sorted keys (Karras 2012),
//! 6. parent links are back-filled,
//! 7. boxes are refit from the leaves upward.
//!
//! The finished array is then read by [`query_neighbors`], which finds the nearest object in front of
//! a query object and flags objects beside it.
//!
//! With the default `parallel` feature every stage runs on the rayon thread pool.

extern crate cgmath;
extern crate num_traits;

#[macro_use]
extern crate log;

#[cfg(feature="parallel")]
extern crate rayon;

/// Picks the rayon iterator when the `parallel` feature is enabled, and the equivalent serial one otherwise
macro_rules! par_iter {
    ($e: expr, $par: ident, $seq: ident $(, $arg: expr)*) => {{
        #[cfg(feature="parallel")]
        let iter = $e.$par($($arg),*);
        #[cfg(not(feature="parallel"))]
        let iter = $e.$seq($($arg),*);
        iter
    }};
}

mod bounds;
mod builder;
mod error;
mod geom;
mod morton;
mod node;
mod query;
mod refit;
mod sort;
mod spin;
mod traits;
mod tree;
mod validate;

pub use builder::{BuildOptions, BvhBuilder};
pub use error::BvhError;
pub use geom::{Aabb, Bounds};
pub use morton::{KeyEncoding, MortonKey};
pub use node::{leaf_offset, leaves, find_leaf, Node, NodeState};
pub use query::{query_neighbors, query_neighbors_with, HitResult, QueryParams};
#[cfg(feature="parallel")]
pub use query::par_query_all;
pub use query::query_all;
pub use sort::SortStrategy;
pub use traits::{Containment, Overlap};
pub use validate::{assert_well_formed, validate, TreeReport};
