// 💰 Ledger Entries - flat, append-only income and expense facts
//
// Amounts are rust_decimal::Decimal end to end so sums never drift.

use super::{require_non_negative, require_text};
use crate::error::StoreError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub source: String,
}

/// Common view over dated money records, used by the aggregator.
pub trait LedgerEntry {
    fn id(&self) -> i64;
    fn date(&self) -> NaiveDate;
    fn amount(&self) -> Decimal;
    /// Category for expenses, source for incomes.
    fn label(&self) -> &str;

    /// Inclusive range test. An inverted range contains nothing.
    fn falls_within(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.date() && self.date() <= end
    }
}

impl LedgerEntry for ExpenseRecord {
    fn id(&self) -> i64 {
        self.id
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn amount(&self) -> Decimal {
        self.amount
    }

    fn label(&self) -> &str {
        &self.category
    }
}

impl LedgerEntry for IncomeRecord {
    fn id(&self) -> i64 {
        self.id
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn amount(&self) -> Decimal {
        self.amount
    }

    fn label(&self) -> &str {
        &self.source
    }
}

/// Validate creation fields shared by both record kinds: (amount, label).
pub(crate) fn validate_entry(
    label_field: &str,
    amount: Decimal,
    label: &str,
) -> Result<(Decimal, String), StoreError> {
    let amount = require_non_negative("amount", amount)?;
    let label = require_text(label_field, label)?;
    Ok((amount, label))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_falls_within_is_inclusive() {
        let income = IncomeRecord {
            id: 1,
            date: day(2024, 3, 1),
            amount: Decimal::new(1000, 0),
            source: "Tuition Fees".to_string(),
        };

        assert!(income.falls_within(day(2024, 3, 1), day(2024, 3, 31)));
        assert!(income.falls_within(day(2024, 2, 1), day(2024, 3, 1)));
        assert!(!income.falls_within(day(2024, 3, 2), day(2024, 3, 31)));
        assert!(!income.falls_within(day(2024, 3, 31), day(2024, 3, 1)));
    }

    #[test]
    fn test_validate_entry() {
        let (amount, label) =
            validate_entry("category", Decimal::new(120000, 0), " Utilities ").unwrap();
        assert_eq!(amount, Decimal::new(120000, 0));
        assert_eq!(label, "Utilities");

        assert!(validate_entry("category", Decimal::new(-1, 0), "Utilities").is_err());
        assert!(validate_entry("source", Decimal::ONE, "").is_err());
    }
}
