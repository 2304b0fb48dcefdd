use chrono::{DateTime, DurationRound, TimeDelta, Utc};

/// Get current timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Drop the sub-second part of a timestamp.
pub fn truncate_to_second(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .duration_trunc(TimeDelta::seconds(1))
        .unwrap_or(instant)
}

/// Quote a SQL identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Schema-qualified, quoted table reference.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}
