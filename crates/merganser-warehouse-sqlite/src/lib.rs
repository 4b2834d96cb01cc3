//! SQLite backend for the merganser warehouse.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. DDL is generated from the
//! relation contract in `merganser-core`; partition and clustering
//! attributes become secondary indexes, SQLite having no native equivalent.

mod ddl;
mod encode;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteWarehouse;
