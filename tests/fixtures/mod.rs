//! Test fixtures and data generators
//!
//! Builders for LVZ packages and ELVL map files.

pub mod builders;

pub use builders::*;
