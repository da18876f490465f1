// 👕 Uniform Item - stock line for one uniform type and size
//
// stock is an absolute count set at creation. Nothing decrements it.

use super::{require_non_negative, require_text};
use crate::error::StoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniformItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub item_type: String,
    pub size: String,
    pub stock: i64,
    pub unit_cost: Decimal,
}

impl UniformItem {
    /// Validate and clean the creation fields, returning (type, size, stock, unit_cost).
    pub fn validate(
        item_type: &str,
        size: &str,
        stock: i64,
        unit_cost: Decimal,
    ) -> Result<(String, String, i64, Decimal), StoreError> {
        let item_type = require_text("uniform type", item_type)?;
        let size = require_text("uniform size", size)?;
        if stock < 0 {
            return Err(StoreError::Invalid(format!(
                "stock must not be negative (got {})",
                stock
            )));
        }
        let unit_cost = require_non_negative("unit cost", unit_cost)?;
        Ok((item_type, size, stock, unit_cost))
    }
}
