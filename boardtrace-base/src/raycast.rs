//! Rays and 2D ray segments, with the precomputed data needed for fast box and shape
//! intersection tests.

mod classification;
pub use classification::*;
mod ray;
pub use ray::*;
mod segment;
pub use segment::*;
