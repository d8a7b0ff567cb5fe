// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::time::Duration;

use anyhow::Result;
use gastos::application::ExpenseService;
use gastos::domain::ExpenseDraft;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(ExpenseService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = ExpenseService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// A service under test together with whatever keeps its storage alive.
pub struct TestStore {
    pub name: &'static str,
    pub service: ExpenseService,
    _temp: Option<TempDir>,
}

/// One fresh service per storage backend.
pub async fn stores() -> Result<Vec<TestStore>> {
    let (sqlite, temp) = test_service().await?;
    Ok(vec![
        TestStore {
            name: "memory",
            service: ExpenseService::in_memory(),
            _temp: None,
        },
        TestStore {
            name: "sqlite",
            service: sqlite,
            _temp: Some(temp),
        },
    ])
}

/// Wait long enough for the next insert to get a later creation timestamp.
pub async fn tick() {
    tokio::time::sleep(Duration::from_millis(3)).await;
}

/// Test fixture: the monthly rent
pub fn rent() -> ExpenseDraft {
    ExpenseDraft::new("Rent", "Bank Transfer", 150000)
}

/// Test fixture: a handful of expenses with mixed flags.
///
/// | description    | method        | amount  | paid | overdue | recurring |
/// |----------------|---------------|---------|------|---------|-----------|
/// | Rent           | Bank Transfer | 1500.00 |      |         | yes       |
/// | Groceries      | Credit Card   |  230.45 | yes  |         |           |
/// | Electricity    | Bank Transfer |  120.10 |      | yes     | yes       |
/// | Gym membership | Credit Card   |   49.90 | yes  | yes     | yes       |
pub fn household() -> Vec<ExpenseDraft> {
    vec![
        rent().with_recurring(true),
        ExpenseDraft::new("Groceries", "Credit Card", 23045).with_paid(true),
        ExpenseDraft::new("Electricity", "Bank Transfer", 12010)
            .with_overdue(true)
            .with_recurring(true),
        ExpenseDraft::new("Gym membership", "Credit Card", 4990)
            .with_paid(true)
            .with_overdue(true)
            .with_recurring(true),
    ]
}

/// Create the household fixture in order, with distinct creation times.
pub async fn seed_household(service: &ExpenseService) -> Result<Vec<gastos::domain::Expense>> {
    let mut created = Vec::new();
    for draft in household() {
        created.push(service.create(draft).await?);
        tick().await;
    }
    Ok(created)
}
