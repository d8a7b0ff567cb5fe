pub mod application;
pub mod cli;
pub mod domain;
pub mod server;
pub mod storage;

pub use domain::*;
pub use storage::{ExpenseRepository, MemoryRepository, SqliteRepository};
