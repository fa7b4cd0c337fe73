//! Database layer for Halaqa

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{SqliteStoreRepository, StoreRepository};
