// 🎒 Student Entity - enrolled pupil with a weak reference to a Class
//
// class_id is a lookup key only. Deleting classes is unsupported, so there is no
// cascade to worry about.

use super::require_text;
use crate::error::StoreError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MIN_STUDENT_AGE: i64 = 5;
pub const MAX_STUDENT_AGE: i64 = 25;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub enrollment_date: NaiveDate,
    pub class_id: Option<i64>,
}

/// Student row joined with the name of its class (None when unassigned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentWithClass {
    #[serde(flatten)]
    pub student: Student,
    pub class_name: Option<String>,
}

impl Student {
    pub fn validate_name(name: &str) -> Result<String, StoreError> {
        require_text("student name", name)
    }

    pub fn validate_age(age: i64) -> Result<i64, StoreError> {
        if !(MIN_STUDENT_AGE..=MAX_STUDENT_AGE).contains(&age) {
            return Err(StoreError::Invalid(format!(
                "age must be between {} and {} (got {})",
                MIN_STUDENT_AGE, MAX_STUDENT_AGE, age
            )));
        }
        Ok(age)
    }
}
