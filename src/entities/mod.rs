// Entity Models - the five record types owned by the Record Store
//
// Every entity is create-only: ids come from SQLite AUTOINCREMENT and nothing is ever
// updated or deleted. Validation lives next to each type so the store can reject bad
// input before touching the database.

pub mod class;
pub mod student;
pub mod uniform;
pub mod ledger_entry;

pub use class::Class;
pub use student::{Student, StudentWithClass, MAX_STUDENT_AGE, MIN_STUDENT_AGE};
pub use uniform::UniformItem;
pub use ledger_entry::{ExpenseRecord, IncomeRecord, LedgerEntry};

use crate::error::StoreError;
use rust_decimal::Decimal;

/// Trim a free-text field and reject it when nothing is left.
pub(crate) fn require_text(field: &str, value: &str) -> Result<String, StoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Invalid(format!("{} must not be blank", field)));
    }
    Ok(trimmed.to_string())
}

/// Largest single amount accepted: one trillion. Keeps every ledger total far below
/// Decimal's ~7.9e28 ceiling.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Money fields are never negative and never above MAX_AMOUNT.
pub(crate) fn require_non_negative(field: &str, value: Decimal) -> Result<Decimal, StoreError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(StoreError::Invalid(format!(
            "{} must not be negative (got {})",
            field, value
        )));
    }
    if value > MAX_AMOUNT {
        return Err(StoreError::Invalid(format!(
            "{} must not exceed {} (got {})",
            field, MAX_AMOUNT, value
        )));
    }
    Ok(value.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text_trims() {
        assert_eq!(require_text("name", "  P.1 ").unwrap(), "P.1");
        assert!(require_text("name", "   ").is_err());
    }

    #[test]
    fn test_require_non_negative() {
        assert_eq!(
            require_non_negative("amount", Decimal::new(50000, 0)).unwrap(),
            Decimal::new(50000, 0)
        );
        assert!(require_non_negative("amount", Decimal::ZERO).is_ok());
        assert!(require_non_negative("amount", Decimal::new(-1, 2)).is_err());
    }

    #[test]
    fn test_amount_ceiling() {
        assert_eq!(MAX_AMOUNT, Decimal::from(1_000_000_000_000i64));
        assert!(require_non_negative("amount", MAX_AMOUNT).is_ok());
        assert!(require_non_negative("amount", MAX_AMOUNT + Decimal::new(1, 2)).is_err());

        let huge = Decimal::from_str_exact("50000000000000000000000000000").unwrap();
        assert!(matches!(
            require_non_negative("amount", huge),
            Err(StoreError::Invalid(_))
        ));
    }
}
