use bson::Document;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Field every replicated row carries and the watermark is computed from.
pub const CREATED_AT: &str = "created_at";

/// A strictly typed row of one replicated table.
pub trait Record: DeserializeOwned + Serialize + Send + Sync + 'static {
    /// Fields that identify a row, used in failure reports.
    const KEY_FIELDS: &'static [&'static str];

    fn created_at(&self) -> DateTime<Utc>;
}

/// A row that passed strict validation, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRow {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub document: Document,
}

/// Why a single fetched row was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowViolation {
    pub index: usize,
    pub key: String,
    pub message: String,
}

impl std::fmt::Display for RowViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {} ({}): {}", self.index, self.key, self.message)
    }
}

/// Type-erased validator stored in table mappings.
pub type RowValidator = fn(&Value) -> Result<ValidatedRow, String>;

/// Validate a raw row against `R` and encode it as a destination document.
///
/// `created_at` is stored as a native BSON date so the destination can sort on it.
pub fn validate_row<R: Record>(raw: &Value) -> Result<ValidatedRow, String> {
    let record: R = serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;
    let created_at = record.created_at();

    let mut document = bson::to_document(&record).map_err(|e| e.to_string())?;
    document.insert(CREATED_AT, bson::DateTime::from_chrono(created_at));

    Ok(ValidatedRow {
        key: row_key(raw, R::KEY_FIELDS),
        created_at,
        document,
    })
}

/// Validate a whole result set.
///
/// Any violation rejects the set: a partially applied table would hide
/// schema drift between the two stores.
pub fn validate_rows(
    validator: RowValidator,
    key_fields: &[&str],
    raw_rows: &[Value],
) -> Result<Vec<ValidatedRow>, Vec<RowViolation>> {
    let mut rows = Vec::with_capacity(raw_rows.len());
    let mut violations = Vec::new();

    for (index, raw) in raw_rows.iter().enumerate() {
        match validator(raw) {
            Ok(row) => rows.push(row),
            Err(message) => violations.push(RowViolation {
                index,
                key: row_key(raw, key_fields),
                message,
            }),
        }
    }

    if violations.is_empty() {
        Ok(rows)
    } else {
        Err(violations)
    }
}

/// Identifying key of a raw row, e.g. `game_id:user_id`. Missing parts show as `?`.
pub fn row_key(raw: &Value, key_fields: &[&str]) -> String {
    key_fields
        .iter()
        .map(|field| match raw.get(field) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "?".to_string(),
            Some(other) => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(":")
}
