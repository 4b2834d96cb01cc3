//! Error type for `merganser-pipeline`.
//!
//! The three fatal failure kinds keep distinct variants so operators can
//! tell "nothing to process" ([`Error::GateFailed`]) apart from "broke
//! while loading" ([`Error::Fetch`] / [`Error::Decode`]).

use merganser_core::gate::GateReport;
use thiserror::Error;

use crate::{
  graph::{GraphError, StepId},
  source::SourceError,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid task graph: {0}")]
  Graph(#[from] GraphError),

  #[error("fetching {object}: {source}")]
  Fetch {
    object: String,
    source: SourceError,
  },

  #[error("decoding {object}: {source}")]
  Decode {
    object: String,
    source: merganser_core::Error,
  },

  /// Staging loaded successfully but the gate predicate was unmet.
  #[error("quality gate failed: {0}")]
  GateFailed(GateReport),

  /// Failure while computing or applying the enriched row set. The apply
  /// phase is transactional, so the target keeps its pre-run state.
  #[error("reconciliation failed during {phase}: {source}")]
  Reconcile {
    phase:  &'static str,
    source: BoxError,
  },

  #[error("step {step} failed: {source}")]
  Warehouse { step: StepId, source: BoxError },

  #[error("step task aborted: {0}")]
  Join(#[from] tokio::task::JoinError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
