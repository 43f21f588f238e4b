//! Command implementations for the CLI
//!
//! - gather: one collection pass, or a collection loop
//! - config: Configuration display and validation

pub mod config;
pub mod gather;
