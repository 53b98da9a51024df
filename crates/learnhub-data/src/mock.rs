//! In-memory implementation of the repository traits for testing

// Allow test-specific patterns in mock implementation
#![allow(clippy::unwrap_used)] // Mocks can panic on lock poisoning
#![allow(clippy::significant_drop_tightening)] // Mock locks don't need optimization

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::{DatabaseError, DatabaseOperation, DatabaseResult};
use crate::models::{TableDeletion, UpsertOutcome, UpsertRow};
use crate::tables::AppTable;
use crate::traits::{CleanupStore, ReferenceStore, SchemaExecutor};

// Type aliases to simplify complex types
type RowMap = Arc<Mutex<HashMap<AppTable, BTreeMap<String, UpsertRow>>>>;
type CountMap = Arc<Mutex<HashMap<AppTable, i64>>>;
type NameSet = Arc<Mutex<HashSet<String>>>;
type StatementFailures = Arc<Mutex<Vec<(String, String)>>>;

/// Mock repository for testing
///
/// DDL is interpreted just enough to track which tables and triggers exist:
/// `CREATE TABLE IF NOT EXISTS` is a no-op on rerun and `DROP TRIGGER` forgets
/// a trigger, while `CREATE TABLE` and `CREATE TRIGGER` on an existing object
/// fail with the Postgres SQLSTATE.
#[derive(Clone, Default)]
pub struct MockRepository {
    rows: RowMap,
    extra_rows: CountMap,
    relations: NameSet,
    triggers: NameSet,
    executed: Arc<Mutex<Vec<String>>>,

    // Behavior controls for testing
    statement_failures: StatementFailures,
    failing_keys: NameSet,
    failing_deletes: Arc<Mutex<HashSet<AppTable>>>,
    missing_tables: Arc<Mutex<HashSet<AppTable>>>,
}

fn sql_error(operation: DatabaseOperation, sqlstate: &str, message: &str) -> DatabaseError {
    DatabaseError::QueryFailed {
        operation: Box::new(operation),
        message: message.to_string(),
        sqlstate: Some(sqlstate.to_string()),
        constraint: None,
        source: None,
    }
}

/// Object name following `keyword` (and an optional `IF [NOT] EXISTS`)
fn object_name<'a>(words: &[&'a str], keyword: &str) -> Option<&'a str> {
    let at = words.iter().position(|w| w.eq_ignore_ascii_case(keyword))?;
    let mut rest = words.iter().skip(at.saturating_add(1));
    let mut name = *rest.next()?;
    if name.eq_ignore_ascii_case("IF") {
        rest.find(|w| w.eq_ignore_ascii_case("EXISTS"))?;
        name = *rest.next()?;
    }
    name.split('(').next().filter(|n| !n.is_empty())
}

fn has_if_not_exists(words: &[&str]) -> bool {
    words.windows(3).any(|w| {
        matches!(w, [a, b, c]
            if a.eq_ignore_ascii_case("IF")
                && b.eq_ignore_ascii_case("NOT")
                && c.eq_ignore_ascii_case("EXISTS"))
    })
}

impl MockRepository {
    /// Create a new mock repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every statement containing `pattern` with `sqlstate`
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned
    pub fn fail_statements_containing(&self, pattern: &str, sqlstate: &str) {
        self.statement_failures
            .lock()
            .unwrap()
            .push((pattern.to_string(), sqlstate.to_string()));
    }

    /// Fail upserts whose natural key equals `key`
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned
    pub fn fail_upsert_for(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    /// Fail `delete_all` whenever it reaches `table`
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned
    pub fn fail_delete_on(&self, table: AppTable) {
        self.failing_deletes.lock().unwrap().insert(table);
    }

    /// Pretend `table` was never provisioned
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned
    pub fn drop_table(&self, table: AppTable) {
        self.missing_tables.lock().unwrap().insert(table);
    }

    /// Pretend `table` holds `rows` rows that were not written through upserts
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned
    pub fn set_row_count(&self, table: AppTable, rows: i64) {
        self.extra_rows.lock().unwrap().insert(table, rows);
    }

    /// Total rows in `table`
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned
    pub fn row_count(&self, table: AppTable) -> usize {
        let stored = self.rows.lock().unwrap().get(&table).map_or(0, BTreeMap::len);
        let extra = self.extra_rows.lock().unwrap().get(&table).copied().unwrap_or(0);
        stored.saturating_add(usize::try_from(extra).unwrap_or(0))
    }

    /// Row stored under `key` by an earlier upsert
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned
    pub fn stored_row(&self, table: AppTable, key: &str) -> Option<UpsertRow> {
        self.rows
            .lock()
            .unwrap()
            .get(&table)
            .and_then(|rows| rows.get(key))
            .cloned()
    }

    /// Statements that executed successfully, in order
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned
    pub fn executed_statements(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Synchronous variant of [`SchemaExecutor::relation_exists`]
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned
    pub fn relation_exists_sync(&self, qualified_name: &str) -> bool {
        self.relations.lock().unwrap().contains(qualified_name)
    }

    fn apply_ddl(&self, operation: DatabaseOperation, statement: &str) -> DatabaseResult<()> {
        let words: Vec<&str> = statement.split_whitespace().collect();
        let starts_with = |a: &str, b: &str| {
            words.first().is_some_and(|w| w.eq_ignore_ascii_case(a))
                && words.get(1).is_some_and(|w| w.eq_ignore_ascii_case(b))
        };

        if starts_with("CREATE", "TABLE") {
            let Some(name) = object_name(&words, "TABLE") else {
                return Err(sql_error(operation, "42601", "syntax error at or near \"(\""));
            };
            let inserted = self.relations.lock().unwrap().insert(name.to_string());
            if !inserted && !has_if_not_exists(&words) {
                return Err(sql_error(
                    operation,
                    "42P07",
                    &format!("relation \"{name}\" already exists"),
                ));
            }
        } else if starts_with("DROP", "TRIGGER") {
            let trigger = object_name(&words, "TRIGGER").unwrap_or_default();
            let table = object_name(&words, "ON").unwrap_or_default();
            self.triggers.lock().unwrap().remove(&format!("{table}:{trigger}"));
        } else if starts_with("CREATE", "TRIGGER") {
            let trigger = object_name(&words, "TRIGGER").unwrap_or_default();
            let table = object_name(&words, "ON").unwrap_or_default();
            let key = format!("{table}:{trigger}");
            if !self.triggers.lock().unwrap().insert(key) {
                return Err(sql_error(
                    operation,
                    "42710",
                    &format!("trigger \"{trigger}\" for relation \"{table}\" already exists"),
                ));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl SchemaExecutor for MockRepository {
    async fn execute_statement(
        &self,
        definition: &str,
        index: usize,
        statement: &str,
    ) -> DatabaseResult<()> {
        let operation = DatabaseOperation::ProvisionStatement {
            definition: definition.to_string(),
            index,
        };

        let forced = self
            .statement_failures
            .lock()
            .unwrap()
            .iter()
            .find(|(pattern, _)| statement.contains(pattern.as_str()))
            .map(|(_, sqlstate)| sqlstate.clone());
        if let Some(sqlstate) = forced {
            return Err(sql_error(operation, &sqlstate, "mock statement failure"));
        }

        self.apply_ddl(operation, statement)?;
        self.executed.lock().unwrap().push(statement.to_string());
        Ok(())
    }

    async fn relation_exists(&self, qualified_name: &str) -> DatabaseResult<bool> {
        Ok(self.relation_exists_sync(qualified_name))
    }
}

#[async_trait]
impl ReferenceStore for MockRepository {
    async fn upsert(&self, row: &UpsertRow) -> DatabaseResult<UpsertOutcome> {
        let key = row.natural_key();
        if self.failing_keys.lock().unwrap().contains(&key) {
            return Err(sql_error(
                DatabaseOperation::UpsertRow {
                    table: row.table.qualified(),
                    key,
                },
                "23502",
                "null value violates not-null constraint",
            ));
        }

        let mut rows = self.rows.lock().unwrap();
        let previous = rows.entry(row.table).or_default().insert(key, row.clone());
        Ok(if previous.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }
}

#[async_trait]
impl CleanupStore for MockRepository {
    async fn count_rows(&self, table: AppTable) -> DatabaseResult<Option<i64>> {
        if self.missing_tables.lock().unwrap().contains(&table) {
            return Ok(None);
        }
        Ok(Some(i64::try_from(self.row_count(table)).unwrap_or(i64::MAX)))
    }

    async fn delete_all(&self, tables: &[AppTable]) -> DatabaseResult<Vec<TableDeletion>> {
        let mut failing = self.failing_deletes.lock().unwrap().clone();
        failing.extend(self.missing_tables.lock().unwrap().iter().copied());
        if let Some(table) = tables.iter().find(|t| failing.contains(t)) {
            return Err(DatabaseError::TransactionRollback {
                operation: Box::new(DatabaseOperation::Transaction {
                    description: format!("clear {} tables", tables.len()),
                }),
                reason: format!("deleting from {} failed", table.qualified()),
                source: None,
            });
        }

        let mut deleted = Vec::with_capacity(tables.len());
        for &table in tables {
            let count = self.row_count(table);
            self.rows.lock().unwrap().remove(&table);
            self.extra_rows.lock().unwrap().remove(&table);
            deleted.push(TableDeletion {
                table,
                deleted: u64::try_from(count).unwrap_or(u64::MAX),
            });
        }
        Ok(deleted)
    }
}
