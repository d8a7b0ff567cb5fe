use serde::{Deserialize, Serialize};

use crate::domain::{Cents, decimal_string};

/// Aggregates over the whole store, taken together.
///
/// `overdue_cents` and `unpaid_cents` are independent filters: an expense that
/// is both overdue and unpaid counts in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSummary {
    #[serde(rename = "total", with = "decimal_string")]
    pub total_cents: Cents,
    #[serde(rename = "totalOverdue", with = "decimal_string")]
    pub overdue_cents: Cents,
    #[serde(rename = "totalUnpaid", with = "decimal_string")]
    pub unpaid_cents: Cents,
    pub unpaid_count: i64,
}
