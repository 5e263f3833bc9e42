//! Persistence layer: libSQL-backed engagement history.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::EngagementStore;
