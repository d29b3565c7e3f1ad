//! Database layer for ByteNote's local storage

mod connection;
mod migrations;

pub use connection::Database;
