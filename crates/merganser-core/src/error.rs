//! Error types for `merganser-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("source is not valid UTF-8: {0}")]
  Utf8(#[from] std::str::Utf8Error),

  /// A newline-delimited JSON record failed to decode. `line` is 1-based.
  #[error("malformed record at line {line}: {source}")]
  Ndjson {
    line:   usize,
    source: serde_json::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
