use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{Expense, ExpenseDraft, ExpenseId};

use super::{Aggregate, ExpenseFilter, ExpenseRepository, StorageError, now, sort_for, touch};

#[derive(Debug, Default)]
struct Table {
    last_id: ExpenseId,
    rows: BTreeMap<ExpenseId, Expense>,
}

/// Process-local store. Nothing survives a restart.
///
/// A single lock covers the whole table, so each call sees or writes one
/// consistent state.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    table: RwLock<Table>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExpenseRepository for MemoryRepository {
    async fn insert(&self, draft: ExpenseDraft) -> Result<Expense, StorageError> {
        let mut table = self.table.write();
        table.last_id += 1;
        let expense = Expense::from_draft(table.last_id, draft, now());
        table.rows.insert(expense.id, expense.clone());
        Ok(expense)
    }

    async fn get(&self, id: ExpenseId) -> Result<Option<Expense>, StorageError> {
        Ok(self.table.read().rows.get(&id).cloned())
    }

    async fn scan(&self, filter: &ExpenseFilter) -> Result<Vec<Expense>, StorageError> {
        let mut matched: Vec<Expense> = self
            .table
            .read()
            .rows
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        sort_for(filter.order(), &mut matched);
        Ok(matched)
    }

    async fn aggregate(&self, filter: &ExpenseFilter) -> Result<Aggregate, StorageError> {
        let table = self.table.read();
        Ok(table
            .rows
            .values()
            .filter(|e| filter.matches(e))
            .fold(Aggregate::default(), |acc, e| Aggregate {
                count: acc.count + 1,
                total_cents: acc.total_cents + e.amount_cents,
            }))
    }

    async fn update(&self, expense: &Expense) -> Result<Expense, StorageError> {
        let mut table = self.table.write();
        let stored = table
            .rows
            .get_mut(&expense.id)
            .ok_or(StorageError::Missing(expense.id))?;

        if stored.version != expense.version {
            return Err(StorageError::StaleVersion {
                id: expense.id,
                expected: expense.version,
                found: stored.version,
            });
        }

        let id = stored.id;
        let created_at = stored.created_at;
        *stored = expense.clone();
        // id and creation time belong to the store, not the caller
        stored.id = id;
        stored.created_at = created_at;
        stored.version += 1;
        stored.updated_at = touch(created_at);
        Ok(stored.clone())
    }

    async fn delete(&self, id: ExpenseId) -> Result<(), StorageError> {
        self.table
            .write()
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::Missing(id))
    }
}
