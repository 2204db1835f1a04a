//! Table layout for a collection and the SQL that creates it.
//!
//! A collection `note` with indexes `[["foo"], ["foo", "bar"]]` owns:
//! 1. `note`: `id` (internal rowid), `uuid` (external id), `data` (blob).
//! 2. `note_uuid_index`: unique index on `note.uuid`.
//! 3. `note_foo`, `note_foo_bar`: one row per indexed document.
//! 4. `note_foo_index`, `note_foo_bar_index`: composite indexes on those tables.

use crate::core::error::{GoatfishError, Result};
use regex::Regex;
use std::sync::OnceLock;

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

/// Names end up inside SQL text, so only plain identifiers are accepted.
pub fn validate_ident(name: &str) -> Result<()> {
    if ident_re().is_match(name) {
        Ok(())
    } else {
        Err(GoatfishError::ValidationError(format!(
            "Invalid identifier: '{}'. Must match [A-Za-z_][A-Za-z0-9_]*",
            name
        )))
    }
}

pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident)
}

pub fn index_table_name(collection: &str, fields: &[String]) -> String {
    let mut name = collection.to_string();
    for field in fields {
        name.push('_');
        name.push_str(field);
    }
    name
}

pub fn primary_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT,
            data BLOB NOT NULL
        )",
        quote(table)
    )
}

pub fn uuid_index_sql(table: &str) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} (uuid)",
        quote(&format!("{}_uuid_index", table)),
        quote(table)
    )
}

pub fn index_table_sql(index_table: &str, fields: &[String]) -> String {
    let columns: Vec<String> = fields.iter().map(|f| quote(f)).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (uuid TEXT PRIMARY KEY, {})",
        quote(index_table),
        columns.join(", ")
    )
}

pub fn index_table_index_sql(index_table: &str, fields: &[String]) -> String {
    let columns: Vec<String> = fields.iter().map(|f| format!("{} ASC", quote(f))).collect();
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        quote(&format!("{}_index", index_table)),
        quote(index_table),
        columns.join(", ")
    )
}

pub fn index_upsert_sql(index_table: &str, fields: &[String]) -> String {
    let columns: Vec<String> = fields.iter().map(|f| quote(f)).collect();
    let placeholders: Vec<String> = (1..=fields.len() + 1).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT OR REPLACE INTO {} (uuid, {}) VALUES ({})",
        quote(index_table),
        columns.join(", "),
        placeholders.join(", ")
    )
}
