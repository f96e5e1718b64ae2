//! Database layer for fieldcase

mod connection;
mod migrations;
mod store;

pub use connection::Database;
pub use store::{record_columns, record_select_sql, LocalStore, StoreTransaction, META_COLUMNS};
