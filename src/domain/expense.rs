use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Cents, MAX_AMOUNT_CENTS, MIN_AMOUNT_CENTS, decimal_string, format_cents};

/// Identifier assigned by the store on insert.
pub type ExpenseId = i64;

/// Accepted length of a description, in characters.
pub const DESCRIPTION_LEN: std::ops::RangeInclusive<usize> = 3..=255;

/// Accepted length of a payment method, in characters.
pub const PAYMENT_METHOD_LEN: std::ops::RangeInclusive<usize> = 3..=50;

/// A single tracked expense as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: ExpenseId,
    pub description: String,
    pub payment_method: String,
    #[serde(rename = "amount", with = "decimal_string")]
    pub amount_cents: Cents,
    pub paid: bool,
    pub overdue: bool,
    pub recurring: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped on every successful update
    pub version: i64,
}

impl Expense {
    /// Build the stored form of a freshly inserted draft.
    pub fn from_draft(id: ExpenseId, draft: ExpenseDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            description: draft.description,
            payment_method: draft.payment_method,
            amount_cents: draft.amount_cents,
            paid: draft.paid,
            overdue: draft.overdue,
            recurring: draft.recurring,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Replace every mutable field with the draft's values.
    /// `paid` and `overdue` are copied as given; nothing is inferred between them.
    pub fn apply(&mut self, draft: ExpenseDraft) {
        self.description = draft.description;
        self.payment_method = draft.payment_method;
        self.amount_cents = draft.amount_cents;
        self.paid = draft.paid;
        self.overdue = draft.overdue;
        self.recurring = draft.recurring;
    }

    pub fn mark_paid(&mut self) {
        self.paid = true;
        self.overdue = false;
    }

    pub fn mark_unpaid(&mut self) {
        self.paid = false;
    }

    /// Leaves `paid` alone, so an expense can end up both paid and overdue.
    pub fn mark_overdue(&mut self) {
        self.overdue = true;
    }

    /// The user-supplied fields of this expense, as a draft.
    pub fn to_draft(&self) -> ExpenseDraft {
        ExpenseDraft {
            description: self.description.clone(),
            payment_method: self.payment_method.clone(),
            amount_cents: self.amount_cents,
            paid: self.paid,
            overdue: self.overdue,
            recurring: self.recurring,
        }
    }
}

/// User input for creating or fully replacing an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDraft {
    pub description: String,
    pub payment_method: String,
    #[serde(rename = "amount", with = "decimal_string")]
    pub amount_cents: Cents,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub overdue: bool,
    #[serde(default)]
    pub recurring: bool,
}

impl ExpenseDraft {
    pub fn new(
        description: impl Into<String>,
        payment_method: impl Into<String>,
        amount_cents: Cents,
    ) -> Self {
        Self {
            description: description.into(),
            payment_method: payment_method.into(),
            amount_cents,
            paid: false,
            overdue: false,
            recurring: false,
        }
    }

    pub fn with_paid(mut self, paid: bool) -> Self {
        self.paid = paid;
        self
    }

    pub fn with_overdue(mut self, overdue: bool) -> Self {
        self.overdue = overdue;
        self
    }

    pub fn with_recurring(mut self, recurring: bool) -> Self {
        self.recurring = recurring;
        self
    }

    /// Check every field rule, stopping at the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.violations().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every field rule this draft breaks, at most one per field, in field order.
    /// Both creation and full updates go through here.
    pub fn violations(&self) -> Vec<ValidationError> {
        [
            check_text("description", &self.description, DESCRIPTION_LEN),
            check_text("paymentMethod", &self.payment_method, PAYMENT_METHOD_LEN),
            check_amount(self.amount_cents),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect()
    }
}

fn check_amount(cents: Cents) -> Result<(), ValidationError> {
    if cents < MIN_AMOUNT_CENTS {
        return Err(ValidationError::new(
            "amount",
            format!("must be at least {}", format_cents(MIN_AMOUNT_CENTS)),
        ));
    }
    if cents > MAX_AMOUNT_CENTS {
        return Err(ValidationError::new(
            "amount",
            format!("must not exceed {}", format_cents(MAX_AMOUNT_CENTS)),
        ));
    }
    Ok(())
}

fn check_text(
    field: &'static str,
    value: &str,
    len: std::ops::RangeInclusive<usize>,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be blank"));
    }
    let chars = value.chars().count();
    if !len.contains(&chars) {
        return Err(ValidationError::new(
            field,
            format!(
                "must be between {} and {} characters (got {chars})",
                len.start(),
                len.end()
            ),
        ));
    }
    Ok(())
}

/// A field rule violated by an [`ExpenseDraft`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field} {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}
