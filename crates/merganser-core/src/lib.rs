//! Core types and trait definitions for the merganser sales-warehouse
//! pipeline.
//!
//! This crate is deliberately free of I/O and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod error;
pub mod gate;
pub mod record;
pub mod relation;
pub mod warehouse;

pub use error::{Error, Result};
