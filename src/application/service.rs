use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{Cents, Expense, ExpenseDraft, ExpenseId};
use crate::storage::{ExpenseFilter, ExpenseRepository, MemoryRepository, SqliteRepository};

use super::{AppError, ExpenseSummary};

/// Application service providing every expense use case.
/// This is the primary interface for any client (CLI, HTTP API, tests).
#[derive(Clone)]
pub struct ExpenseService {
    repo: Arc<dyn ExpenseRepository>,
}

impl ExpenseService {
    /// Create a new expense service over the given store.
    pub fn new(repo: Arc<dyn ExpenseRepository>) -> Self {
        Self { repo }
    }

    /// Service over a fresh process-local store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRepository::new()))
    }

    /// Initialize (create and migrate) a database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = SqliteRepository::init(&db_url).await?;
        Ok(Self::new(Arc::new(repo)))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = SqliteRepository::connect(&db_url).await?;
        Ok(Self::new(Arc::new(repo)))
    }

    // ========================
    // Lifecycle
    // ========================

    /// Validate and store a new expense.
    pub async fn create(&self, draft: ExpenseDraft) -> Result<Expense, AppError> {
        info!(description = %draft.description, "creating expense");
        let violations = draft.violations();
        if let Some(first) = violations.first() {
            warn!(field = first.field, count = violations.len(), "rejected new expense");
            return Err(AppError::rejected(violations));
        }

        let expense = self.repo.insert(draft).await?;
        info!(id = expense.id, "expense created");
        Ok(expense)
    }

    pub async fn get(&self, id: ExpenseId) -> Result<Expense, AppError> {
        debug!(id, "fetching expense");
        self.repo.get(id).await?.ok_or_else(|| {
            warn!(id, "expense not found");
            AppError::NotFound(id)
        })
    }

    /// Replace every mutable field of an expense.
    ///
    /// When `expected_version` is given it must match the stored version. A
    /// concurrent writer that lands between our read and our write also
    /// surfaces as [`AppError::Conflict`].
    pub async fn update(
        &self,
        id: ExpenseId,
        draft: ExpenseDraft,
        expected_version: Option<i64>,
    ) -> Result<Expense, AppError> {
        info!(id, "updating expense");
        let mut expense = self.get(id).await?;

        let violations = draft.violations();
        if let Some(first) = violations.first() {
            warn!(id, field = first.field, count = violations.len(), "rejected expense update");
            return Err(AppError::rejected(violations));
        }

        if let Some(expected) = expected_version.filter(|v| *v != expense.version) {
            warn!(id, expected, found = expense.version, "stale expense version");
            return Err(AppError::Conflict {
                id,
                expected,
                found: expense.version,
            });
        }

        expense.apply(draft);
        let saved = self.save(expense).await?;
        info!(id, version = saved.version, "expense updated");
        Ok(saved)
    }

    /// Mark as paid. Paying also clears the overdue flag.
    pub async fn mark_paid(&self, id: ExpenseId) -> Result<Expense, AppError> {
        info!(id, "marking expense as paid");
        self.transition(id, Expense::mark_paid).await
    }

    /// Mark as unpaid. The overdue flag is left as it is.
    pub async fn mark_unpaid(&self, id: ExpenseId) -> Result<Expense, AppError> {
        info!(id, "marking expense as unpaid");
        self.transition(id, Expense::mark_unpaid).await
    }

    /// Mark as overdue. The paid flag is left as it is.
    pub async fn mark_overdue(&self, id: ExpenseId) -> Result<Expense, AppError> {
        info!(id, "marking expense as overdue");
        self.transition(id, Expense::mark_overdue).await
    }

    pub async fn delete(&self, id: ExpenseId) -> Result<(), AppError> {
        info!(id, "deleting expense");
        self.repo.delete(id).await?;
        info!(id, "expense deleted");
        Ok(())
    }

    async fn transition(
        &self,
        id: ExpenseId,
        change: fn(&mut Expense),
    ) -> Result<Expense, AppError> {
        let mut expense = self.get(id).await?;
        change(&mut expense);
        let saved = self.save(expense).await?;
        debug!(
            id,
            paid = saved.paid,
            overdue = saved.overdue,
            version = saved.version,
            "expense status changed"
        );
        Ok(saved)
    }

    async fn save(&self, expense: Expense) -> Result<Expense, AppError> {
        self.repo.update(&expense).await.map_err(|err| {
            let err = AppError::from(err);
            if matches!(err, AppError::Conflict { .. }) {
                warn!(id = expense.id, "lost a concurrent update");
            }
            err
        })
    }

    // ========================
    // Queries
    // ========================

    pub async fn list_all(&self) -> Result<Vec<Expense>, AppError> {
        debug!("listing all expenses");
        self.scan(ExpenseFilter::All).await
    }

    /// Expenses paid with exactly this method (case-sensitive).
    pub async fn find_by_payment_method(&self, method: &str) -> Result<Vec<Expense>, AppError> {
        debug!(method, "finding expenses by payment method");
        self.scan(ExpenseFilter::PaymentMethod(method.to_string()))
            .await
    }

    pub async fn find_overdue(&self) -> Result<Vec<Expense>, AppError> {
        debug!("finding overdue expenses");
        self.scan(ExpenseFilter::Overdue).await
    }

    pub async fn find_unpaid(&self) -> Result<Vec<Expense>, AppError> {
        debug!("finding unpaid expenses");
        self.scan(ExpenseFilter::Unpaid).await
    }

    /// Recurring expenses, newest first.
    pub async fn find_recurring(&self) -> Result<Vec<Expense>, AppError> {
        debug!("finding recurring expenses");
        self.scan(ExpenseFilter::Recurring).await
    }

    /// Expenses with the given paid flag, newest first.
    pub async fn find_by_payment_status(&self, paid: bool) -> Result<Vec<Expense>, AppError> {
        debug!(paid, "finding expenses by payment status");
        self.scan(ExpenseFilter::PaymentStatus { paid }).await
    }

    /// Expenses whose description contains `term` (case-sensitive), newest first.
    pub async fn find_by_description(&self, term: &str) -> Result<Vec<Expense>, AppError> {
        debug!(term, "finding expenses by description");
        if term.trim().is_empty() {
            warn!("blank description search term");
            return Err(AppError::invalid("search term must not be blank"));
        }
        self.scan(ExpenseFilter::DescriptionContains(term.to_string()))
            .await
    }

    /// Expenses created within `[start, end]`, newest first.
    pub async fn find_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Expense>, AppError> {
        debug!(%start, %end, "finding expenses by creation date");
        if start > end {
            warn!(%start, %end, "inverted date range");
            return Err(AppError::invalid(format!(
                "start ({start}) must not be after end ({end})"
            )));
        }
        self.scan(ExpenseFilter::CreatedBetween { start, end }).await
    }

    async fn scan(&self, filter: ExpenseFilter) -> Result<Vec<Expense>, AppError> {
        Ok(self.repo.scan(&filter).await?)
    }

    // ========================
    // Aggregates
    // ========================

    pub async fn total_amount(&self) -> Result<Cents, AppError> {
        debug!("computing total amount");
        Ok(self.repo.aggregate(&ExpenseFilter::All).await?.total_cents)
    }

    pub async fn total_overdue_amount(&self) -> Result<Cents, AppError> {
        debug!("computing overdue amount");
        Ok(self.repo.aggregate(&ExpenseFilter::Overdue).await?.total_cents)
    }

    pub async fn total_unpaid_amount(&self) -> Result<Cents, AppError> {
        debug!("computing unpaid amount");
        Ok(self.repo.aggregate(&ExpenseFilter::Unpaid).await?.total_cents)
    }

    pub async fn count_unpaid(&self) -> Result<i64, AppError> {
        debug!("counting unpaid expenses");
        Ok(self.repo.aggregate(&ExpenseFilter::Unpaid).await?.count)
    }

    /// Every aggregate, computed from a single scan.
    pub async fn summary(&self) -> Result<ExpenseSummary, AppError> {
        debug!("computing expense summary");
        let expenses = self.repo.scan(&ExpenseFilter::All).await?;

        Ok(expenses.iter().fold(
            ExpenseSummary {
                total_cents: 0,
                overdue_cents: 0,
                unpaid_cents: 0,
                unpaid_count: 0,
            },
            |mut acc, e| {
                acc.total_cents += e.amount_cents;
                if e.overdue {
                    acc.overdue_cents += e.amount_cents;
                }
                if !e.paid {
                    acc.unpaid_cents += e.amount_cents;
                    acc.unpaid_count += 1;
                }
                acc
            },
        ))
    }
}
