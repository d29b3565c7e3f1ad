pub mod common;
pub mod config;
pub mod draft;
pub mod offline;
pub mod queue;
pub mod save;
pub mod sync;
