//! Persistence layer — the action ledger (watermarks + audit log).

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlLedger;
pub use traits::{ActionRecord, Ledger};
