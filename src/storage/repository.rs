use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;

use crate::domain::{Cents, Expense, ExpenseDraft, ExpenseId};

/// Failures reported by an [`ExpenseRepository`].
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("expense {0} does not exist")]
    Missing(ExpenseId),

    #[error("expense {id} changed underneath the writer (read version {expected}, stored {found})")]
    StaleVersion {
        id: ExpenseId,
        expected: i64,
        found: i64,
    },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Predicate for a repository scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpenseFilter {
    All,
    PaymentMethod(String),
    Overdue,
    Unpaid,
    Recurring,
    PaymentStatus { paid: bool },
    /// Case-sensitive substring of the description
    DescriptionContains(String),
    /// Inclusive on both ends
    CreatedBetween {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Order in which a scan returns its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    /// Ascending id, i.e. insertion order
    Id,
    /// Descending `created_at`, ties broken by descending id
    NewestFirst,
}

impl ExpenseFilter {
    pub fn matches(&self, expense: &Expense) -> bool {
        match self {
            ExpenseFilter::All => true,
            ExpenseFilter::PaymentMethod(method) => expense.payment_method == *method,
            ExpenseFilter::Overdue => expense.overdue,
            ExpenseFilter::Unpaid => !expense.paid,
            ExpenseFilter::Recurring => expense.recurring,
            ExpenseFilter::PaymentStatus { paid } => expense.paid == *paid,
            ExpenseFilter::DescriptionContains(term) => expense.description.contains(term.as_str()),
            ExpenseFilter::CreatedBetween { start, end } => {
                expense.created_at >= *start && expense.created_at <= *end
            }
        }
    }

    pub fn order(&self) -> ScanOrder {
        match self {
            ExpenseFilter::All
            | ExpenseFilter::PaymentMethod(_)
            | ExpenseFilter::Overdue
            | ExpenseFilter::Unpaid => ScanOrder::Id,
            ExpenseFilter::Recurring
            | ExpenseFilter::PaymentStatus { .. }
            | ExpenseFilter::DescriptionContains(_)
            | ExpenseFilter::CreatedBetween { .. } => ScanOrder::NewestFirst,
        }
    }
}

/// Count and sum of the amounts matched by a filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub count: i64,
    pub total_cents: Cents,
}

/// Persistent store of expenses.
///
/// Every returned [`Expense`] is an independent copy; changing it has no effect
/// until it is passed back to [`ExpenseRepository::update`].
#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    /// Store a new expense. The store assigns the id, both timestamps and version 0.
    async fn insert(&self, draft: ExpenseDraft) -> Result<Expense, StorageError>;

    async fn get(&self, id: ExpenseId) -> Result<Option<Expense>, StorageError>;

    /// Snapshot of every expense matching `filter`, in `filter.order()`.
    async fn scan(&self, filter: &ExpenseFilter) -> Result<Vec<Expense>, StorageError>;

    async fn aggregate(&self, filter: &ExpenseFilter) -> Result<Aggregate, StorageError>;

    /// Write back the mutable fields of `expense`.
    ///
    /// Succeeds only if the stored version still equals `expense.version`; the
    /// stored copy then gets `version + 1` and a fresh `updated_at`.
    async fn update(&self, expense: &Expense) -> Result<Expense, StorageError>;

    /// Remove an expense. Fails with [`StorageError::Missing`] if it is absent.
    async fn delete(&self, id: ExpenseId) -> Result<(), StorageError>;
}

/// Current time at the precision every store keeps (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Timestamp for a write that must not precede creation.
pub(crate) fn touch(created_at: DateTime<Utc>) -> DateTime<Utc> {
    now().max(created_at)
}

pub(crate) fn sort_for(order: ScanOrder, expenses: &mut [Expense]) {
    match order {
        ScanOrder::Id => expenses.sort_by_key(|e| e.id),
        ScanOrder::NewestFirst => {
            expenses.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
        }
    }
}
