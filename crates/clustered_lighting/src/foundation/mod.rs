//! Foundation types shared by the lighting modules
//!
//! nalgebra aliases and camera matrices, the generational light handle, and
//! logger setup.

pub mod collections;
pub mod logging;
pub mod math;
