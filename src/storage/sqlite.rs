use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::{Expense, ExpenseDraft, ExpenseId};

use super::{
    Aggregate, ExpenseFilter, ExpenseRepository, MIGRATION_001_EXPENSES, ScanOrder, StorageError,
    now, touch,
};

const COLUMNS: &str = "id, description, payment_method, amount_cents, paid, overdue, recurring, created_at, updated_at, version";

/// Expense store backed by a SQLite database.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run more than once.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_EXPENSES)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    fn row_to_expense(row: &sqlx::sqlite::SqliteRow) -> Result<Expense> {
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");

        Ok(Expense {
            id: row.get("id"),
            description: row.get("description"),
            payment_method: row.get("payment_method"),
            amount_cents: row.get("amount_cents"),
            paid: row.get::<i32, _>("paid") != 0,
            overdue: row.get::<i32, _>("overdue") != 0,
            recurring: row.get::<i32, _>("recurring") != 0,
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
            updated_at: parse_timestamp(&updated_at_str).context("Invalid updated_at timestamp")?,
            version: row.get("version"),
        })
    }

    /// WHERE clause for a filter plus the values to bind, in order.
    fn where_clause(filter: &ExpenseFilter) -> (&'static str, Vec<Binding>) {
        match filter {
            ExpenseFilter::All => ("1=1", vec![]),
            ExpenseFilter::PaymentMethod(method) => {
                ("payment_method = ?", vec![Binding::Text(method.clone())])
            }
            ExpenseFilter::Overdue => ("overdue = 1", vec![]),
            ExpenseFilter::Unpaid => ("paid = 0", vec![]),
            ExpenseFilter::Recurring => ("recurring = 1", vec![]),
            ExpenseFilter::PaymentStatus { paid } => ("paid = ?", vec![Binding::Flag(*paid)]),
            // instr() is case-sensitive, LIKE is not
            ExpenseFilter::DescriptionContains(term) => {
                ("instr(description, ?) > 0", vec![Binding::Text(term.clone())])
            }
            ExpenseFilter::CreatedBetween { start, end } => (
                "created_at >= ? AND created_at <= ?",
                vec![
                    Binding::Text(format_timestamp(ceil_micros(*start))),
                    Binding::Text(format_timestamp(*end)),
                ],
            ),
        }
    }
}

enum Binding {
    Text(String),
    Flag(bool),
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    bindings: Vec<Binding>,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for binding in bindings {
        query = match binding {
            Binding::Text(text) => query.bind(text),
            Binding::Flag(flag) => query.bind(flag),
        };
    }
    query
}

/// Fixed-width RFC 3339 so that text order matches time order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Stored timestamps are whole microseconds, so a finer lower bound must round
/// up to keep `created_at >= start` exact. Truncating the upper bound is already exact.
fn ceil_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = ts.trunc_subsecs(6);
    if truncated < ts {
        truncated + Duration::microseconds(1)
    } else {
        truncated
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

#[async_trait]
impl ExpenseRepository for SqliteRepository {
    async fn insert(&self, draft: ExpenseDraft) -> Result<Expense, StorageError> {
        let created_at = format_timestamp(now());

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO expenses (description, payment_method, amount_cents, paid, overdue, recurring, created_at, updated_at, version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&draft.description)
        .bind(&draft.payment_method)
        .bind(draft.amount_cents)
        .bind(draft.paid)
        .bind(draft.overdue)
        .bind(draft.recurring)
        .bind(&created_at)
        .bind(&created_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to save expense")?;

        Ok(Self::row_to_expense(&row)?)
    }

    async fn get(&self, id: ExpenseId) -> Result<Option<Expense>, StorageError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM expenses WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch expense")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_expense(&row)?)),
            None => Ok(None),
        }
    }

    async fn scan(&self, filter: &ExpenseFilter) -> Result<Vec<Expense>, StorageError> {
        let (condition, bindings) = Self::where_clause(filter);
        let order = match filter.order() {
            ScanOrder::Id => "id",
            ScanOrder::NewestFirst => "created_at DESC, id DESC",
        };
        let sql = format!("SELECT {COLUMNS} FROM expenses WHERE {condition} ORDER BY {order}");

        // A single SELECT reads one snapshot of the table
        let rows = bind_all(sqlx::query(&sql), bindings)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list expenses")?;

        Ok(rows
            .iter()
            .map(Self::row_to_expense)
            .collect::<Result<Vec<_>>>()?)
    }

    async fn aggregate(&self, filter: &ExpenseFilter) -> Result<Aggregate, StorageError> {
        let (condition, bindings) = Self::where_clause(filter);
        let sql = format!(
            "SELECT COUNT(*) as count, COALESCE(SUM(amount_cents), 0) as total FROM expenses WHERE {condition}"
        );

        let row = bind_all(sqlx::query(&sql), bindings)
            .fetch_one(&self.pool)
            .await
            .context("Failed to aggregate expenses")?;

        Ok(Aggregate {
            count: row.get("count"),
            total_cents: row.get("total"),
        })
    }

    async fn update(&self, expense: &Expense) -> Result<Expense, StorageError> {
        let updated_at = format_timestamp(touch(expense.created_at));

        // Compare-and-swap on the version column
        let row = sqlx::query(&format!(
            r#"
            UPDATE expenses
            SET description = ?, payment_method = ?, amount_cents = ?, paid = ?, overdue = ?, recurring = ?,
                updated_at = MAX(?, created_at), version = version + 1
            WHERE id = ? AND version = ?
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&expense.description)
        .bind(&expense.payment_method)
        .bind(expense.amount_cents)
        .bind(expense.paid)
        .bind(expense.overdue)
        .bind(expense.recurring)
        .bind(&updated_at)
        .bind(expense.id)
        .bind(expense.version)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update expense")?;

        if let Some(row) = row {
            return Ok(Self::row_to_expense(&row)?);
        }

        // Nothing matched: tell a vanished row apart from a newer version
        let current: Option<i64> = sqlx::query("SELECT version FROM expenses WHERE id = ?")
            .bind(expense.id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read expense version")?
            .map(|row| row.get("version"));

        match current {
            Some(found) => Err(StorageError::StaleVersion {
                id: expense.id,
                expected: expense.version,
                found,
            }),
            None => Err(StorageError::Missing(expense.id)),
        }
    }

    async fn delete(&self, id: ExpenseId) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete expense")?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Missing(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_repo() -> (SqliteRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let url = format!("sqlite:{}?mode=rwc", db_path.display());
        let repo = SqliteRepository::init(&url).await.unwrap();
        (repo, temp_dir)
    }

    #[test]
    fn test_timestamps_are_fixed_width() {
        let a = DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = DateTime::parse_from_rfc3339("2024-01-15T10:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(a), "2024-01-15T10:00:00.000000Z");
        assert!(format_timestamp(a) < format_timestamp(b));
        assert_eq!(parse_timestamp(&format_timestamp(b)).unwrap(), b);
    }

    #[test]
    fn test_ceil_micros() {
        let whole = DateTime::parse_from_rfc3339("2024-01-15T10:00:00.000001Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(ceil_micros(whole), whole);
        assert_eq!(
            ceil_micros(whole + Duration::nanoseconds(500)),
            whole + Duration::microseconds(1)
        );
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let (repo, _temp) = test_repo().await;
        let draft = ExpenseDraft::new("Rent", "Bank Transfer", 150000).with_recurring(true);
        let stored = repo.insert(draft.clone()).await.unwrap();

        assert_eq!(stored.to_draft(), draft);
        assert_eq!(stored.version, 0);
        assert_eq!(stored.created_at, stored.updated_at);
        assert_eq!(repo.get(stored.id).await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let (repo, _temp) = test_repo().await;
        repo.insert(ExpenseDraft::new("Rent", "Cash", 100))
            .await
            .unwrap();
        repo.migrate().await.unwrap();
        assert_eq!(repo.scan(&ExpenseFilter::All).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_description_search_is_case_sensitive() {
        let (repo, _temp) = test_repo().await;
        repo.insert(ExpenseDraft::new("Rent", "Cash", 100))
            .await
            .unwrap();

        let hits = repo
            .scan(&ExpenseFilter::DescriptionContains("ent".into()))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let misses = repo
            .scan(&ExpenseFilter::DescriptionContains("RENT".into()))
            .await
            .unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn test_update_compare_and_swap() {
        let (repo, _temp) = test_repo().await;
        let original = repo
            .insert(ExpenseDraft::new("Rent", "Cash", 100))
            .await
            .unwrap();

        let mut first = original.clone();
        first.amount_cents = 200;
        let saved = repo.update(&first).await.unwrap();
        assert_eq!(saved.version, 1);
        assert_eq!(saved.amount_cents, 200);
        assert!(saved.updated_at >= saved.created_at);

        assert!(matches!(
            repo.update(&original).await,
            Err(StorageError::StaleVersion { found: 1, .. })
        ));

        repo.delete(original.id).await.unwrap();
        assert!(matches!(
            repo.update(&saved).await,
            Err(StorageError::Missing(_))
        ));
        assert!(matches!(
            repo.delete(original.id).await,
            Err(StorageError::Missing(_))
        ));
    }

    #[tokio::test]
    async fn test_aggregate_sums_exactly() {
        let (repo, _temp) = test_repo().await;
        for cents in [1, 10, 99_999_999] {
            repo.insert(ExpenseDraft::new("Item", "Cash", cents))
                .await
                .unwrap();
        }
        let agg = repo.aggregate(&ExpenseFilter::All).await.unwrap();
        assert_eq!(agg.count, 3);
        assert_eq!(agg.total_cents, 100_000_010);

        let overdue = repo.aggregate(&ExpenseFilter::Overdue).await.unwrap();
        assert_eq!(overdue, Aggregate::default());
    }
}
