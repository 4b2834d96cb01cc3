//! The merganser upsert pipeline: task graph, source loading, quality
//! gate, and two-phase reconciliation, executed against any
//! [`merganser_core::warehouse::Warehouse`].
//!
//! The pipeline is a strict DAG with one fan-out (the two staging loads
//! run concurrently) and one fan-in (the quality gate). A failed step
//! halts all of its dependents; each step carries a uniform blind retry
//! budget.

pub mod error;
pub mod graph;
pub mod run;
pub mod schedule;
pub mod source;

pub use error::{Error, Result};
pub use run::{Pipeline, PipelineConfig, RunSummary};

#[cfg(test)]
mod tests;
