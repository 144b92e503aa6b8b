//! Pure domain types with minimal dependencies
//!
//! Types here have no rendering or storage dependencies so that the canvas,
//! codec, session and report modules can all share them.

pub mod geometry;
pub mod query;
pub mod shape;
pub mod submission;

pub use geometry::*;
pub use query::*;
pub use shape::*;
pub use submission::*;
