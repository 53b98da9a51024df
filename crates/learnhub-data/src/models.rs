//! Data models for reference rows, profiles and cleanup reports

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::tables::AppTable;

/// A typed column value bound into an upsert
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    Integer(Option<i32>),
    Boolean(bool),
    Uuid(Uuid),
}

impl SqlValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(Some(value.into()))
    }

    /// Key rendering for logs and failure reports
    pub fn display_key(&self) -> String {
        match self {
            Self::Text(Some(v)) => v.clone(),
            Self::Integer(Some(v)) => v.to_string(),
            Self::Text(None) | Self::Integer(None) => "NULL".to_string(),
            Self::Boolean(v) => v.to_string(),
            Self::Uuid(v) => v.to_string(),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<Option<&str>> for SqlValue {
    fn from(value: Option<&str>) -> Self {
        Self::Text(value.map(str::to_string))
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Integer(Some(value))
    }
}

impl From<Option<i32>> for SqlValue {
    fn from(value: Option<i32>) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

/// One row to insert or update on its natural key
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertRow {
    pub table: AppTable,
    /// Columns of the unique constraint used for conflict detection
    pub key_columns: &'static [&'static str],
    /// All columns to write, key columns included
    pub columns: Vec<(&'static str, SqlValue)>,
}

impl UpsertRow {
    pub const fn new(table: AppTable, key_columns: &'static [&'static str]) -> Self {
        Self {
            table,
            key_columns,
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn column(mut self, name: &'static str, value: impl Into<SqlValue>) -> Self {
        self.columns.push((name, value.into()));
        self
    }

    pub fn value(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    /// Natural key rendered as `a/b` for multi-column keys
    pub fn natural_key(&self) -> String {
        self.key_columns
            .iter()
            .map(|column| {
                self.value(column)
                    .map_or_else(|| "?".to_string(), SqlValue::display_key)
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// What an upsert did to its row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Course difficulty, stored as text with a CHECK constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl CourseLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for CourseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog course, keyed by slug
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub slug: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: String,
    pub level: CourseLevel,
    pub duration_weeks: Option<i32>,
    pub price_cents: i32,
    pub is_published: bool,
    pub sort_order: i32,
}

/// An authorization role, keyed by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
}

/// Profile row derived from a Supabase Auth user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Row count observed for one table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: AppTable,
    /// `None` when the table has not been provisioned
    pub rows: Option<i64>,
}

impl TableCount {
    /// Count for display, `-` for a missing table
    pub fn rows_label(&self) -> String {
        self.rows.map_or_else(|| "-".to_string(), |rows| rows.to_string())
    }
}

/// Rows removed from one table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableDeletion {
    pub table: AppTable,
    pub deleted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_key_joins_key_columns() {
        let row = UpsertRow::new(AppTable::UserRoles, &["user_id", "role_id"])
            .column("user_id", Uuid::nil())
            .column("role_id", Uuid::nil());
        assert_eq!(
            row.natural_key(),
            "00000000-0000-0000-0000-000000000000/00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_missing_key_value_renders_placeholder() {
        let row = UpsertRow::new(AppTable::Roles, &["name"]).column("display_name", "Admin");
        assert_eq!(row.natural_key(), "?");
        assert_eq!(row.value("display_name"), Some(&SqlValue::text("Admin")));
    }
}
