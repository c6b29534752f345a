//! Type definitions

pub mod coordinates;

pub use coordinates::*;
