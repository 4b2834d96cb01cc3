//! Source objects — where the raw NDJSON datasets come from.
//!
//! The pipeline reads named objects through the [`ObjectStore`] seam;
//! deployments point it at a directory tree ([`FsObjectStore`]) and tests
//! at an in-memory map ([`MemoryObjectStore`]).

use std::{
  collections::HashMap,
  future::Future,
  path::{Path, PathBuf},
};

use thiserror::Error;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SourceError {
  #[error("object not found: {0}")]
  NotFound(String),

  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Read access to named source objects.
pub trait ObjectStore: Send + Sync {
  /// Fetch the full contents of the object at `key`.
  fn fetch<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Vec<u8>, SourceError>> + Send + 'a;
}

// ─── Filesystem store ────────────────────────────────────────────────────────

/// Object keys resolved as paths under a root directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
  root: PathBuf,
}

impl FsObjectStore {
  pub fn new(root: impl AsRef<Path>) -> Self {
    Self { root: root.as_ref().to_path_buf() }
  }
}

impl ObjectStore for FsObjectStore {
  async fn fetch(&self, key: &str) -> Result<Vec<u8>, SourceError> {
    let path = self.root.join(key);
    match tokio::fs::read(&path).await {
      Ok(bytes) => Ok(bytes),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        Err(SourceError::NotFound(key.to_owned()))
      }
      Err(e) => Err(e.into()),
    }
  }
}

// ─── In-memory store ─────────────────────────────────────────────────────────

/// A fixed set of objects held in memory — useful for testing.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
  objects: HashMap<String, Vec<u8>>,
}

impl MemoryObjectStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
    self.objects.insert(key.into(), bytes.into());
  }
}

impl ObjectStore for MemoryObjectStore {
  async fn fetch(&self, key: &str) -> Result<Vec<u8>, SourceError> {
    self
      .objects
      .get(key)
      .cloned()
      .ok_or_else(|| SourceError::NotFound(key.to_owned()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn memory_store_round_trips() {
    let mut store = MemoryObjectStore::new();
    store.insert("sales/sales.json", b"{}".to_vec());

    assert_eq!(store.fetch("sales/sales.json").await.unwrap(), b"{}");
    assert!(matches!(
      store.fetch("missing").await,
      Err(SourceError::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn fs_store_reports_missing_objects_by_key() {
    let store = FsObjectStore::new(std::env::temp_dir());
    let err = store.fetch("merganser-no-such-object.json").await.unwrap_err();
    match err {
      SourceError::NotFound(key) => {
        assert_eq!(key, "merganser-no-such-object.json");
      }
      other => panic!("unexpected error: {other}"),
    }
  }
}
