//! Error type for `merganser-warehouse-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The store file was provisioned under a different namespace name.
  #[error("namespace mismatch: store holds {existing:?}, requested {requested:?}")]
  NamespaceMismatch { existing: String, requested: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
