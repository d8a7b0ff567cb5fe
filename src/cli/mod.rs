use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::application::ExpenseService;
use crate::domain::{Expense, ExpenseDraft, ExpenseId, format_cents, parse_cents};

/// Gastos - Expense Tracker
#[derive(Parser)]
#[command(name = "gastos")]
#[command(about = "Track expenses, their payment status and the totals still owed")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "GASTOS_DATABASE", default_value = "gastos.db")]
    pub database: String,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Record a new expense
    Add(ExpenseArgs),

    /// List expenses, optionally filtered
    List(ListArgs),

    /// Show one expense
    Show {
        /// Expense ID
        id: ExpenseId,
    },

    /// Replace every field of an expense
    Edit {
        /// Expense ID
        id: ExpenseId,

        #[command(flatten)]
        fields: ExpenseArgs,

        /// Fail unless the stored version is this one
        #[arg(long)]
        expect_version: Option<i64>,
    },

    /// Mark an expense as paid (also clears overdue)
    Pay {
        /// Expense ID
        id: ExpenseId,
    },

    /// Mark an expense as unpaid
    Unpay {
        /// Expense ID
        id: ExpenseId,
    },

    /// Mark an expense as overdue
    Overdue {
        /// Expense ID
        id: ExpenseId,
    },

    /// Delete an expense
    Delete {
        /// Expense ID
        id: ExpenseId,
    },

    /// Show totals: all, overdue, unpaid
    Totals,

    /// Serve the REST API
    Serve {
        /// Address to listen on
        #[arg(long, env = "GASTOS_BIND", default_value = "127.0.0.1:3000")]
        bind: String,

        /// Keep expenses in memory instead of the database file
        #[arg(long)]
        memory: bool,
    },
}

#[derive(Args)]
pub struct ExpenseArgs {
    /// What the money was spent on
    pub description: String,

    /// Amount (e.g., "1500.00" or "1500")
    pub amount: String,

    /// Payment method (e.g., "Credit Card", "Bank Transfer")
    #[arg(short, long)]
    pub method: String,

    /// Already paid
    #[arg(long)]
    pub paid: bool,

    /// Past due
    #[arg(long)]
    pub overdue: bool,

    /// Repeats periodically
    #[arg(long)]
    pub recurring: bool,
}

impl ExpenseArgs {
    fn into_draft(self) -> Result<ExpenseDraft> {
        let amount_cents = parse_cents(&self.amount)
            .with_context(|| format!("Invalid amount '{}'. Use '1500.00' or '1500'", self.amount))?;
        Ok(ExpenseDraft::new(self.description, self.method, amount_cents)
            .with_paid(self.paid)
            .with_overdue(self.overdue)
            .with_recurring(self.recurring))
    }
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("filter")
        .args(["method", "overdue", "unpaid", "recurring", "paid", "search", "from"])
        .multiple(false)
))]
pub struct ListArgs {
    /// Only this payment method (exact match)
    #[arg(long)]
    pub method: Option<String>,

    /// Only overdue expenses
    #[arg(long)]
    pub overdue: bool,

    /// Only unpaid expenses
    #[arg(long)]
    pub unpaid: bool,

    /// Only recurring expenses
    #[arg(long)]
    pub recurring: bool,

    /// Only expenses with this payment status
    #[arg(long)]
    pub paid: Option<bool>,

    /// Description contains this text (case-sensitive)
    #[arg(short, long)]
    pub search: Option<String>,

    /// Created on or after (YYYY-MM-DD or RFC 3339)
    #[arg(long, requires = "to")]
    pub from: Option<String>,

    /// Created on or before (YYYY-MM-DD or RFC 3339)
    #[arg(long, requires = "from")]
    pub to: Option<String>,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                ExpenseService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Add(args) => {
                let service = ExpenseService::connect(&self.database).await?;
                let expense = service.create(args.into_draft()?).await?;
                println!(
                    "Recorded expense #{}: {} {} ({})",
                    expense.id,
                    format_cents(expense.amount_cents),
                    expense.description,
                    expense.payment_method
                );
            }

            Commands::List(args) => {
                let service = ExpenseService::connect(&self.database).await?;
                run_list_command(&service, args).await?;
            }

            Commands::Show { id } => {
                let service = ExpenseService::connect(&self.database).await?;
                print_expense_details(&service.get(id).await?);
            }

            Commands::Edit {
                id,
                fields,
                expect_version,
            } => {
                let service = ExpenseService::connect(&self.database).await?;
                let expense = service
                    .update(id, fields.into_draft()?, expect_version)
                    .await?;
                println!("Updated expense #{} (version {})", expense.id, expense.version);
            }

            Commands::Pay { id } => {
                let service = ExpenseService::connect(&self.database).await?;
                let expense = service.mark_paid(id).await?;
                println!("Expense #{} marked as paid", expense.id);
            }

            Commands::Unpay { id } => {
                let service = ExpenseService::connect(&self.database).await?;
                let expense = service.mark_unpaid(id).await?;
                println!("Expense #{} marked as unpaid", expense.id);
            }

            Commands::Overdue { id } => {
                let service = ExpenseService::connect(&self.database).await?;
                let expense = service.mark_overdue(id).await?;
                println!("Expense #{} marked as overdue", expense.id);
                if expense.paid {
                    println!("Note: this expense is also marked as paid");
                }
            }

            Commands::Delete { id } => {
                let service = ExpenseService::connect(&self.database).await?;
                service.delete(id).await?;
                println!("Deleted expense #{}", id);
            }

            Commands::Totals => {
                let service = ExpenseService::connect(&self.database).await?;
                let summary = service.summary().await?;
                println!("Total:    {:>12}", format_cents(summary.total_cents));
                println!("Overdue:  {:>12}", format_cents(summary.overdue_cents));
                println!(
                    "Unpaid:   {:>12} ({} expense(s))",
                    format_cents(summary.unpaid_cents),
                    summary.unpaid_count
                );
            }

            Commands::Serve { bind, memory } => {
                let service = if memory {
                    ExpenseService::in_memory()
                } else {
                    ExpenseService::init(&self.database).await?
                };
                crate::server::run(service, &bind)
                    .await
                    .with_context(|| format!("Server on {} failed", bind))?;
            }
        }

        Ok(())
    }
}

async fn run_list_command(service: &ExpenseService, args: ListArgs) -> Result<()> {
    let expenses = if let Some(method) = args.method {
        service.find_by_payment_method(&method).await?
    } else if args.overdue {
        service.find_overdue().await?
    } else if args.unpaid {
        service.find_unpaid().await?
    } else if args.recurring {
        service.find_recurring().await?
    } else if let Some(paid) = args.paid {
        service.find_by_payment_status(paid).await?
    } else if let Some(term) = args.search {
        service.find_by_description(&term).await?
    } else if let (Some(from), Some(to)) = (args.from, args.to) {
        let start = parse_date(&from, false).context("Invalid --from date")?;
        let end = parse_date(&to, true).context("Invalid --to date")?;
        service.find_by_date_range(start, end).await?
    } else {
        service.list_all().await?
    };

    if expenses.is_empty() {
        println!("No expenses found.");
        return Ok(());
    }

    println!(
        "{:>5} {:<12} {:>12} {:<15} {:<7} DESCRIPTION",
        "ID", "DATE", "AMOUNT", "METHOD", "STATUS"
    );
    println!("{}", "-".repeat(75));

    for expense in &expenses {
        println!(
            "{:>5} {:<12} {:>12} {:<15} {:<7} {}",
            expense.id,
            expense.created_at.format("%Y-%m-%d"),
            format_cents(expense.amount_cents),
            truncate(&expense.payment_method, 15),
            status_flags(expense),
            truncate(&expense.description, 30)
        );
    }
    Ok(())
}

fn print_expense_details(expense: &Expense) {
    println!("Expense #{}", expense.id);
    println!("  Description:    {}", expense.description);
    println!("  Payment method: {}", expense.payment_method);
    println!("  Amount:         {}", format_cents(expense.amount_cents));
    println!("  Paid:           {}", yes_no(expense.paid));
    println!("  Overdue:        {}", yes_no(expense.overdue));
    println!("  Recurring:      {}", yes_no(expense.recurring));
    println!("  Created:        {}", expense.created_at.to_rfc3339());
    println!("  Updated:        {}", expense.updated_at.to_rfc3339());
    println!("  Version:        {}", expense.version);
}

/// Compact flags column: P(aid), O(verdue), R(ecurring).
fn status_flags(expense: &Expense) -> String {
    [
        (expense.paid, 'P'),
        (expense.overdue, 'O'),
        (expense.recurring, 'R'),
    ]
    .iter()
    .map(|&(set, flag)| if set { flag } else { '-' })
    .collect()
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

/// Parse `YYYY-MM-DD` (start or end of that day, UTC) or a full RFC 3339 timestamp.
fn parse_date(date_str: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(date_str) {
        return Ok(ts.with_timezone(&Utc));
    }

    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .context("Date must be in YYYY-MM-DD or RFC 3339 format")?;

    let bound = if end_of_day {
        naive_date.and_hms_micro_opt(23, 59, 59, 999_999)
    } else {
        naive_date.and_hms_opt(0, 0, 0)
    };
    let naive_datetime = bound.ok_or_else(|| anyhow::anyhow!("Invalid date"))?;

    Ok(naive_datetime.and_utc())
}
