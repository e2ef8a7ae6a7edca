//! Domain types used throughout the selection pipeline.
//!
//! This module defines:
//!
//! - the closed set of selection criteria (`Criterion`)
//! - the per-selector configuration surface (`SelectorConfig`)

pub mod types;

pub use types::*;
