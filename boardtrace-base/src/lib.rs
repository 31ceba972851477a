//! This library is a component of [`boardtrace-render`],
//! which defines the geometric and color primitives its raytracer is built from:
//! vectors and boxes, linear colors, rays and 2D ray segments, random jitter,
//! and time budgets.
//!
//! [`boardtrace-render`]: https://crates.io/crates/boardtrace-render/

// Crate-specific lint settings. (General settings can be found in the workspace manifest.)
#![forbid(unsafe_code)]
#![warn(clippy::missing_inline_in_public_items)]

pub mod math;

pub mod raycast;

pub mod rng;

pub mod time;

// reexport for convenience of our tests and dependents
#[doc(hidden)]
pub use euclid;
