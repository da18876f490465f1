// ⚖️ Ledger Aggregator - turn a date range into financial totals
//
//   balance = total_income - total_expense
//
// Sums are rust_decimal::Decimal, never f64: the output ends up on a printed financial
// report. Every addition is checked, so a total Decimal cannot hold surfaces as
// StoreError::Overflow instead of a panic. An inverted range (start > end) is not an
// error; it is an empty, zero-filled summary.

use crate::db::{RecordStore, StoreResult};
use crate::entities::{ExpenseRecord, IncomeRecord, LedgerEntry};
use crate::error::StoreError;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Rows shown in the dashboard's "recent" panels
pub const RECENT_LIMIT: usize = 5;

// ============================================================================
// LEDGER SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub balance: Decimal,
    pub income_records: Vec<IncomeRecord>,
    pub expense_records: Vec<ExpenseRecord>,
}

impl LedgerSummary {
    pub fn empty() -> Self {
        LedgerSummary {
            total_income: Decimal::ZERO,
            total_expense: Decimal::ZERO,
            balance: Decimal::ZERO,
            income_records: Vec::new(),
            expense_records: Vec::new(),
        }
    }

    /// Totals are derived from the records, so they can never disagree with them.
    pub fn from_records(
        income_records: Vec<IncomeRecord>,
        expense_records: Vec<ExpenseRecord>,
    ) -> StoreResult<Self> {
        let total_income = sum_amounts(&income_records)?;
        let total_expense = sum_amounts(&expense_records)?;

        Ok(LedgerSummary {
            total_income,
            total_expense,
            balance: checked_sub(total_income, total_expense)?,
            income_records,
            expense_records,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.income_records.is_empty() && self.expense_records.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.income_records.len() + self.expense_records.len()
    }
}

impl Default for LedgerSummary {
    fn default() -> Self {
        Self::empty()
    }
}

fn checked_add(a: Decimal, b: Decimal) -> StoreResult<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| StoreError::Overflow(format!("{} + {}", a, b)))
}

fn checked_sub(a: Decimal, b: Decimal) -> StoreResult<Decimal> {
    a.checked_sub(b)
        .ok_or_else(|| StoreError::Overflow(format!("{} - {}", a, b)))
}

/// Exact decimal sum; 0 for an empty slice.
pub fn sum_amounts<E: LedgerEntry>(records: &[E]) -> StoreResult<Decimal> {
    records
        .iter()
        .try_fold(Decimal::ZERO, |acc, r| checked_add(acc, r.amount()))
}

/// Pure core of the aggregator: keep the records dated within [start, end] and total them.
pub fn summarize_range(
    start: NaiveDate,
    end: NaiveDate,
    incomes: Vec<IncomeRecord>,
    expenses: Vec<ExpenseRecord>,
) -> StoreResult<LedgerSummary> {
    let incomes = incomes
        .into_iter()
        .filter(|r| r.falls_within(start, end))
        .collect();
    let expenses = expenses
        .into_iter()
        .filter(|r| r.falls_within(start, end))
        .collect();

    LedgerSummary::from_records(incomes, expenses)
}

// ============================================================================
// CASHBOOK
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Income => "Income",
            EntryKind::Expense => "Expense",
        }
    }
}

/// One line of the running-balance cashbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashbookEntry {
    pub date: NaiveDate,
    pub kind: EntryKind,
    pub record_id: i64,
    pub description: String,
    pub amount: Decimal,
    /// +amount for income, -amount for expense
    pub signed_amount: Decimal,
    pub running_balance: Decimal,
}

/// Merge a summary's records into date order (incomes first on equal dates, then id)
/// and accumulate the running balance.
pub fn build_cashbook(summary: &LedgerSummary) -> StoreResult<Vec<CashbookEntry>> {
    let mut rows: Vec<(NaiveDate, EntryKind, i64, String, Decimal)> = summary
        .income_records
        .iter()
        .map(|r| (r.date, EntryKind::Income, r.id, r.source.clone(), r.amount))
        .chain(
            summary
                .expense_records
                .iter()
                .map(|r| (r.date, EntryKind::Expense, r.id, r.category.clone(), r.amount)),
        )
        .collect();

    rows.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));

    let mut running = Decimal::ZERO;
    let mut book = Vec::with_capacity(rows.len());
    for (date, kind, record_id, description, amount) in rows {
        let signed_amount = match kind {
            EntryKind::Income => amount,
            EntryKind::Expense => -amount,
        };
        running = checked_add(running, signed_amount)?;

        book.push(CashbookEntry {
            date,
            kind,
            record_id,
            description,
            amount,
            signed_amount,
            running_balance: running,
        });
    }
    Ok(book)
}

// ============================================================================
// MONTHLY + DASHBOARD VIEWS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTotals {
    /// "YYYY-MM"
    pub month: String,
    pub income: Decimal,
    pub expense: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub balance: Decimal,
    pub student_count: i64,
    pub uniform_stock: i64,
    pub recent_incomes: Vec<IncomeRecord>,
    pub recent_expenses: Vec<ExpenseRecord>,
}

/// Group records by calendar month, newest month first, keeping at most `months` months.
pub fn group_by_month(
    incomes: &[IncomeRecord],
    expenses: &[ExpenseRecord],
    months: usize,
) -> StoreResult<Vec<MonthlyTotals>> {
    let mut buckets: BTreeMap<(i32, u32), (Decimal, Decimal)> = BTreeMap::new();

    for r in incomes {
        let bucket = buckets.entry((r.date.year(), r.date.month())).or_default();
        bucket.0 = checked_add(bucket.0, r.amount)?;
    }
    for r in expenses {
        let bucket = buckets.entry((r.date.year(), r.date.month())).or_default();
        bucket.1 = checked_add(bucket.1, r.amount)?;
    }

    buckets
        .into_iter()
        .rev()
        .take(months)
        .map(|((year, month), (income, expense))| -> StoreResult<MonthlyTotals> {
            Ok(MonthlyTotals {
                month: format!("{:04}-{:02}", year, month),
                income,
                expense,
                net: checked_sub(income, expense)?,
            })
        })
        .collect()
}

// ============================================================================
// BY CATEGORY
// ============================================================================

/// Total for one expense category or income source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub label: String,
    pub total: Decimal,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    /// Grouped by income source, label order
    pub income: Vec<CategoryTotal>,
    /// Grouped by expense category, label order
    pub expense: Vec<CategoryTotal>,
}

impl CategoryBreakdown {
    pub fn empty() -> Self {
        CategoryBreakdown {
            income: Vec::new(),
            expense: Vec::new(),
        }
    }
}

/// Sum records per label (category for expenses, source for incomes).
pub fn group_by_label<E: LedgerEntry>(records: &[E]) -> StoreResult<Vec<CategoryTotal>> {
    let mut buckets: BTreeMap<&str, (Decimal, usize)> = BTreeMap::new();

    for r in records {
        let bucket = buckets.entry(r.label()).or_default();
        bucket.0 = checked_add(bucket.0, r.amount())?;
        bucket.1 += 1;
    }

    Ok(buckets
        .into_iter()
        .map(|(label, (total, records))| CategoryTotal {
            label: label.to_string(),
            total,
            records,
        })
        .collect())
}

// ============================================================================
// LEDGER AGGREGATOR
// ============================================================================

/// Reads through an explicitly supplied store; holds no state of its own.
pub struct LedgerAggregator<'a> {
    store: &'a RecordStore,
}

impl<'a> LedgerAggregator<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        LedgerAggregator { store }
    }

    /// Totals and itemised records for [start, end], inclusive on both ends.
    ///
    /// Example:
    /// ```
    /// use costa_school::{LedgerAggregator, RecordStore};
    /// use chrono::NaiveDate;
    /// use rust_decimal::Decimal;
    ///
    /// let store = RecordStore::open_in_memory().unwrap();
    /// let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
    /// store.create_income(d(2, 1), Decimal::from(500_000), "Tuition Fees").unwrap();
    /// store.create_expense(d(2, 10), Decimal::from(120_000), "Utilities").unwrap();
    ///
    /// let summary = LedgerAggregator::new(&store)
    ///     .compute_ledger_summary(d(1, 1), d(12, 31))
    ///     .unwrap();
    /// assert_eq!(summary.balance, Decimal::from(380_000));
    /// ```
    pub fn compute_ledger_summary(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<LedgerSummary> {
        if start > end {
            debug!(%start, %end, "inverted range, returning empty summary");
            return Ok(LedgerSummary::empty());
        }

        let incomes = self.store.query_incomes_in_range(start, end)?;
        let expenses = self.store.query_expenses_in_range(start, end)?;
        let summary = summarize_range(start, end, incomes, expenses)?;

        debug!(
            %start,
            %end,
            total_income = %summary.total_income,
            total_expense = %summary.total_expense,
            balance = %summary.balance,
            "ledger summary computed"
        );
        Ok(summary)
    }

    pub fn cashbook(&self, start: NaiveDate, end: NaiveDate) -> StoreResult<Vec<CashbookEntry>> {
        let summary = self.compute_ledger_summary(start, end)?;
        build_cashbook(&summary)
    }

    /// Per-category expense and per-source income totals over [start, end], inclusive.
    /// An inverted range gives an empty breakdown.
    pub fn category_totals(&self, start: NaiveDate, end: NaiveDate) -> StoreResult<CategoryBreakdown> {
        let summary = self.compute_ledger_summary(start, end)?;
        if summary.is_empty() {
            return Ok(CategoryBreakdown::empty());
        }

        Ok(CategoryBreakdown {
            income: group_by_label(&summary.income_records)?,
            expense: group_by_label(&summary.expense_records)?,
        })
    }

    pub fn monthly_summary(&self, months: usize) -> StoreResult<Vec<MonthlyTotals>> {
        let incomes = self.store.list_incomes()?;
        let expenses = self.store.list_expenses()?;
        group_by_month(&incomes, &expenses, months)
    }

    /// Whole-ledger figures for the dashboard.
    pub fn dashboard(&self) -> StoreResult<DashboardMetrics> {
        let total_income = sum_amounts(&self.store.list_incomes()?)?;
        let total_expense = sum_amounts(&self.store.list_expenses()?)?;

        Ok(DashboardMetrics {
            total_income,
            total_expense,
            balance: checked_sub(total_income, total_expense)?,
            student_count: self.store.count_students()?,
            uniform_stock: self.store.sum_uniform_stock()?,
            recent_incomes: self.store.list_recent_incomes(RECENT_LIMIT)?,
            recent_expenses: self.store.list_recent_expenses(RECENT_LIMIT)?,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn income(id: i64, date: NaiveDate, amount: Decimal) -> IncomeRecord {
        IncomeRecord {
            id,
            date,
            amount,
            source: "Tuition Fees".to_string(),
        }
    }

    fn expense(id: i64, date: NaiveDate, amount: Decimal) -> ExpenseRecord {
        ExpenseRecord {
            id,
            date,
            amount,
            category: "Utilities".to_string(),
        }
    }

    fn seeded_store() -> RecordStore {
        let store = RecordStore::open_in_memory().unwrap();
        store
            .create_income(day(2024, 2, 1), Decimal::from(500_000), "Tuition Fees")
            .unwrap();
        store
            .create_expense(day(2024, 2, 10), Decimal::from(120_000), "Utilities")
            .unwrap();
        store
    }

    #[test]
    fn test_end_to_end_summary() {
        let store = seeded_store();
        let aggregator = LedgerAggregator::new(&store);

        let summary = aggregator
            .compute_ledger_summary(day(2024, 1, 1), day(2024, 12, 31))
            .unwrap();

        assert_eq!(summary.total_income, Decimal::from(500_000));
        assert_eq!(summary.total_expense, Decimal::from(120_000));
        assert_eq!(summary.balance, Decimal::from(380_000));
        assert_eq!(summary.record_count(), 2);

        println!("✅ Ledger summary: balance {}", summary.balance);
    }

    #[test]
    fn test_inverted_range_is_zero_filled() {
        let store = seeded_store();
        let aggregator = LedgerAggregator::new(&store);

        let summary = aggregator
            .compute_ledger_summary(day(2024, 12, 31), day(2024, 1, 1))
            .unwrap();

        assert_eq!(summary.total_income, Decimal::ZERO);
        assert_eq!(summary.total_expense, Decimal::ZERO);
        assert_eq!(summary.balance, Decimal::ZERO);
        assert!(summary.income_records.is_empty());
        assert!(summary.expense_records.is_empty());
    }

    #[test]
    fn test_boundary_inclusion() {
        let store = RecordStore::open_in_memory().unwrap();
        let start = day(2024, 3, 1);
        let end = day(2024, 3, 31);

        store.create_income(start, Decimal::from(10), "on start").unwrap();
        store.create_income(end, Decimal::from(20), "on end").unwrap();
        store.create_income(day(2024, 2, 29), Decimal::from(40), "day before").unwrap();
        store.create_expense(day(2024, 4, 1), Decimal::from(80), "day after").unwrap();
        store.create_expense(end, Decimal::from(5), "on end").unwrap();

        let summary = LedgerAggregator::new(&store)
            .compute_ledger_summary(start, end)
            .unwrap();

        assert_eq!(summary.total_income, Decimal::from(30));
        assert_eq!(summary.total_expense, Decimal::from(5));
        assert_eq!(summary.balance, Decimal::from(25));
    }

    #[test]
    fn test_balance_is_decimal_exact() {
        // 0.1 + 0.2 drifts in f64; Decimal must not
        let incomes = vec![
            income(1, day(2024, 1, 1), Decimal::new(10, 2)),
            income(2, day(2024, 1, 2), Decimal::new(20, 2)),
        ];
        let expenses = vec![expense(1, day(2024, 1, 3), Decimal::new(30, 2))];

        let summary = summarize_range(day(2024, 1, 1), day(2024, 1, 31), incomes, expenses).unwrap();

        assert_eq!(summary.total_income, Decimal::new(30, 2));
        assert_eq!(summary.balance, Decimal::ZERO);
        assert_eq!(summary.balance, summary.total_income - summary.total_expense);
    }

    #[test]
    fn test_negative_balance_allowed() {
        let summary = summarize_range(
            day(2024, 1, 1),
            day(2024, 1, 31),
            vec![income(1, day(2024, 1, 5), Decimal::new(100050, 2))],
            vec![expense(1, day(2024, 1, 6), Decimal::new(225100, 2))],
        )
        .unwrap();
        assert_eq!(summary.balance, Decimal::new(-125050, 2));
    }

    #[test]
    fn test_summary_is_idempotent() {
        let store = seeded_store();
        let aggregator = LedgerAggregator::new(&store);

        let first = aggregator
            .compute_ledger_summary(day(2024, 1, 1), day(2024, 12, 31))
            .unwrap();
        let second = aggregator
            .compute_ledger_summary(day(2024, 1, 1), day(2024, 12, 31))
            .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_cashbook_running_balance() {
        let summary = LedgerSummary::from_records(
            vec![
                income(1, day(2024, 1, 10), Decimal::from(300)),
                income(2, day(2024, 1, 2), Decimal::from(100)),
            ],
            vec![
                expense(1, day(2024, 1, 2), Decimal::from(50)),
                expense(2, day(2024, 1, 20), Decimal::from(400)),
            ],
        )
        .unwrap();

        let book = build_cashbook(&summary).unwrap();
        let balances: Vec<Decimal> = book.iter().map(|e| e.running_balance).collect();

        assert_eq!(book[0].kind, EntryKind::Income);
        assert_eq!(book[1].kind, EntryKind::Expense);
        assert_eq!(book[1].signed_amount, Decimal::from(-50));
        assert_eq!(
            balances,
            vec![
                Decimal::from(100),
                Decimal::from(50),
                Decimal::from(350),
                Decimal::from(-50),
            ]
        );
        assert_eq!(book.last().unwrap().running_balance, summary.balance);
    }

    #[test]
    fn test_cashbook_inverted_range_is_empty() {
        let store = seeded_store();
        let book = LedgerAggregator::new(&store)
            .cashbook(day(2024, 6, 1), day(2024, 1, 1))
            .unwrap();
        assert!(book.is_empty());
    }

    #[test]
    fn test_group_by_month_newest_first() {
        let incomes = vec![
            income(1, day(2024, 1, 5), Decimal::from(100)),
            income(2, day(2024, 3, 5), Decimal::from(300)),
            income(3, day(2024, 3, 25), Decimal::from(50)),
        ];
        let expenses = vec![expense(1, day(2024, 2, 1), Decimal::from(70))];

        let months = group_by_month(&incomes, &expenses, 2).unwrap();

        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month, "2024-03");
        assert_eq!(months[0].income, Decimal::from(350));
        assert_eq!(months[1].month, "2024-02");
        assert_eq!(months[1].net, Decimal::from(-70));
    }

    #[test]
    fn test_dashboard_metrics() {
        let store = seeded_store();
        store
            .create_student("Okello John", 8, day(2024, 1, 10), None)
            .unwrap();
        store
            .create_uniform_item("Sweater", "M", 12, Decimal::from(25_000))
            .unwrap();

        let metrics = LedgerAggregator::new(&store).dashboard().unwrap();

        assert_eq!(metrics.balance, Decimal::from(380_000));
        assert_eq!(metrics.student_count, 1);
        assert_eq!(metrics.uniform_stock, 12);
        assert_eq!(metrics.recent_incomes.len(), 1);
        assert_eq!(metrics.recent_expenses.len(), 1);
    }

    #[test]
    fn test_empty_store_dashboard_is_zero() {
        let store = RecordStore::open_in_memory().unwrap();
        let metrics = LedgerAggregator::new(&store).dashboard().unwrap();

        assert_eq!(metrics.total_income, Decimal::ZERO);
        assert_eq!(metrics.balance, Decimal::ZERO);
        assert_eq!(metrics.student_count, 0);
        assert_eq!(metrics.uniform_stock, 0);
    }

    fn huge() -> Decimal {
        Decimal::from_str_exact("50000000000000000000000000000").unwrap()
    }

    /// Rows written behind the store's validation, as an older build or a manual edit would.
    fn insert_raw(store: &RecordStore, table: &str, date: NaiveDate, amount: Decimal) {
        let label_column = if table == "incomes" { "source" } else { "category" };
        store
            .connection()
            .execute(
                &format!(
                    "INSERT INTO {} (date, amount, {}) VALUES (?1, ?2, 'Imported')",
                    table, label_column
                ),
                rusqlite::params![date, amount.to_string()],
            )
            .unwrap();
    }

    #[test]
    fn test_oversized_amount_rejected_at_write() {
        let store = RecordStore::open_in_memory().unwrap();

        let result = store.create_income(day(2024, 2, 1), huge(), "Tuition Fees");

        assert!(matches!(result, Err(StoreError::Invalid(_))));
        let summary = LedgerAggregator::new(&store)
            .compute_ledger_summary(day(2024, 2, 1), day(2024, 2, 1))
            .unwrap();
        assert!(summary.is_empty());
    }

    #[test]
    fn test_overflowing_totals_are_errors_not_panics() {
        let store = RecordStore::open_in_memory().unwrap();
        let d = day(2024, 2, 1);
        insert_raw(&store, "incomes", d, huge());
        insert_raw(&store, "incomes", d, huge());
        insert_raw(&store, "expenses", d, huge());
        insert_raw(&store, "expenses", d, huge());
        let aggregator = LedgerAggregator::new(&store);

        assert!(matches!(
            aggregator.compute_ledger_summary(d, d),
            Err(StoreError::Overflow(_))
        ));
        assert!(matches!(aggregator.cashbook(d, d), Err(StoreError::Overflow(_))));
        assert!(matches!(aggregator.dashboard(), Err(StoreError::Overflow(_))));
        assert!(matches!(aggregator.monthly_summary(6), Err(StoreError::Overflow(_))));
        assert!(matches!(
            aggregator.category_totals(d, d),
            Err(StoreError::Overflow(_))
        ));

        // Store stays usable afterwards
        assert!(aggregator
            .compute_ledger_summary(day(2024, 3, 1), day(2024, 3, 31))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_cashbook_running_total_overflow() {
        // Totals fit individually, but the income-first running balance does not
        let summary = LedgerSummary {
            total_income: huge(),
            total_expense: Decimal::ZERO,
            balance: huge(),
            income_records: vec![
                income(1, day(2024, 1, 1), huge()),
                income(2, day(2024, 1, 2), huge()),
            ],
            expense_records: Vec::new(),
        };

        assert!(matches!(build_cashbook(&summary), Err(StoreError::Overflow(_))));
    }

    #[test]
    fn test_category_totals() {
        let store = RecordStore::open_in_memory().unwrap();
        let start = day(2024, 3, 1);
        let end = day(2024, 3, 31);

        store.create_income(start, Decimal::from(300_000), "Tuition Fees").unwrap();
        store.create_income(end, Decimal::from(200_000), "Tuition Fees").unwrap();
        store.create_income(day(2024, 3, 15), Decimal::from(40_000), "Donations").unwrap();
        store.create_income(day(2024, 2, 29), Decimal::from(999), "Tuition Fees").unwrap();
        store.create_expense(day(2024, 3, 10), Decimal::new(1250050, 2), "Utilities").unwrap();
        store.create_expense(end, Decimal::new(749950, 2), "Utilities").unwrap();
        store.create_expense(day(2024, 4, 1), Decimal::from(5_000), "Stationery").unwrap();

        let breakdown = LedgerAggregator::new(&store)
            .category_totals(start, end)
            .unwrap();

        assert_eq!(
            breakdown.income,
            vec![
                CategoryTotal {
                    label: "Donations".to_string(),
                    total: Decimal::from(40_000),
                    records: 1,
                },
                CategoryTotal {
                    label: "Tuition Fees".to_string(),
                    total: Decimal::from(500_000),
                    records: 2,
                },
            ]
        );
        assert_eq!(breakdown.expense.len(), 1);
        assert_eq!(breakdown.expense[0].label, "Utilities");
        assert_eq!(breakdown.expense[0].total, Decimal::from(20_000));
        assert_eq!(breakdown.expense[0].records, 2);
    }

    #[test]
    fn test_category_totals_inverted_range_is_empty() {
        let store = seeded_store();
        let breakdown = LedgerAggregator::new(&store)
            .category_totals(day(2024, 12, 31), day(2024, 1, 1))
            .unwrap();

        assert_eq!(breakdown, CategoryBreakdown::empty());
    }
}
