mod memory;
mod repository;
mod sqlite;

pub use memory::*;
pub use repository::*;
pub use sqlite::*;

/// SQL migration for the expenses table
pub const MIGRATION_001_EXPENSES: &str = include_str!("migrations/001_expenses.sql");
