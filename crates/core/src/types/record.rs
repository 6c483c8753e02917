//! Transaction record domain model

use crate::types::{Timestamp, Validator};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest accepted amount magnitude
const MAX_AMOUNT: i64 = 1_000_000_000;

/// Amounts are stored in whole cents
const MAX_AMOUNT_SCALE: u32 = 2;

const MAX_ID_LEN: usize = 128;
const MAX_DESCRIPTION_LEN: usize = 1_000;
const MAX_CATEGORY_LEN: usize = 100;

/// Client-assigned record identifier
///
/// Ids are generated on the device that creates the record so that
/// resubmitting a creation after a lost acknowledgment targets the same row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a new random RecordId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing identifier
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A financial transaction, the unit of synchronization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(rename = "recordId")]
    pub id: RecordId,
    /// Owning account; the server never reassigns it
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub occurred_on: NaiveDate,
    pub updated_at: Timestamp,
}

impl Record {
    /// Creates a new record with a fresh id, stamped now
    pub fn new(
        user_id: impl Into<String>,
        amount: Decimal,
        description: impl Into<String>,
        category: impl Into<String>,
        occurred_on: NaiveDate,
    ) -> Self {
        Self {
            id: RecordId::new(),
            user_id: user_id.into(),
            amount,
            description: description.into(),
            category: category.into(),
            occurred_on,
            updated_at: Timestamp::now(),
        }
    }

    /// Replaces the generated id with a caller-supplied one
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = id;
        self
    }

    /// Sets the recency stamp explicitly
    pub fn with_updated_at(mut self, updated_at: Timestamp) -> Self {
        self.updated_at = updated_at;
        self
    }

    /// Marks the record as modified now
    pub fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }

    /// True when every synchronized field matches `other`
    ///
    /// Ownership is not compared; the server keeps its own owner.
    pub fn same_content(&self, other: &Record) -> bool {
        self.id == other.id
            && self.amount == other.amount
            && self.description == other.description
            && self.category == other.category
            && self.occurred_on == other.occurred_on
            && self.updated_at == other.updated_at
    }
}

impl Validator for Record {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let id = self.id.as_str();
        if id.is_empty() {
            errors.push("Record id must not be empty".to_string());
        } else if id.len() > MAX_ID_LEN {
            errors.push(format!("Record id exceeds {} characters", MAX_ID_LEN));
        } else if id.trim() != id {
            errors.push("Record id must not have surrounding whitespace".to_string());
        }

        if self.user_id.trim().is_empty() {
            errors.push("Record owner must not be empty".to_string());
        }

        if self.amount.abs() > Decimal::from(MAX_AMOUNT) {
            errors.push(format!("Amount magnitude exceeds {}", MAX_AMOUNT));
        }
        if self.amount.normalize().scale() > MAX_AMOUNT_SCALE {
            errors.push(format!(
                "Amount has more than {} decimal places",
                MAX_AMOUNT_SCALE
            ));
        }

        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            errors.push(format!(
                "Description exceeds {} characters",
                MAX_DESCRIPTION_LEN
            ));
        }
        if self.category.chars().count() > MAX_CATEGORY_LEN {
            errors.push(format!("Category exceeds {} characters", MAX_CATEGORY_LEN));
        }

        let earliest = NaiveDate::from_ymd_opt(1900, 1, 1);
        let latest = NaiveDate::from_ymd_opt(2199, 12, 31);
        if let (Some(earliest), Some(latest)) = (earliest, latest) {
            if self.occurred_on < earliest || self.occurred_on > latest {
                errors.push(format!(
                    "Date {} is outside {}..={}",
                    self.occurred_on, earliest, latest
                ));
            }
        }

        if self.updated_at.as_millis() < 0 {
            errors.push("updatedAt must not be negative".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
