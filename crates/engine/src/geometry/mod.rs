//! Geometry primitives for route shapes and GPS fixes.

pub mod extent;
pub mod location;
pub mod vector;

pub use extent::Extent;
pub use location::{Location, METERS_PER_DEGREE};
pub use vector::Vector;
