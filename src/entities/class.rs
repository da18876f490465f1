// 🏫 Class Entity - a named school class ("P.1", "S.4 East")
//
// Name is unique across the store. Students point at a class by id only.

use super::require_text;
use crate::error::StoreError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: i64,
    pub name: String,
}

impl Class {
    /// Clean a proposed class name. Uniqueness is checked by the database, not here.
    pub fn validate_name(name: &str) -> Result<String, StoreError> {
        require_text("class name", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert_eq!(Class::validate_name(" P.1 ").unwrap(), "P.1");
        assert!(matches!(
            Class::validate_name(""),
            Err(StoreError::Invalid(_))
        ));
    }
}
