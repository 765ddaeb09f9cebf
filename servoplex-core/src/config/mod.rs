//! Configuration types
//!
//! Timing constants and the validated configuration the encoder and
//! scheduler are built from.

pub mod timing;

pub use timing::*;
