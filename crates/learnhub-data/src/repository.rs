//! Postgres implementation of the repository traits

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

use crate::error::{DatabaseError, DatabaseErrorExt, DatabaseOperation, DatabaseResult};
use crate::models::{SqlValue, TableDeletion, UpsertOutcome, UpsertRow};
use crate::pool_manager::PoolManager;
use crate::seed::build_upsert_sql;
use crate::tables::AppTable;
use crate::traits::{CleanupStore, ReferenceStore, SchemaExecutor};

/// Repository backed by the memoised pools
///
/// DDL runs on the migration pool (direct when configured); reads and writes
/// run on the primary pool.
#[derive(Clone)]
pub struct DbRepository {
    pools: Arc<PoolManager>,
}

impl DbRepository {
    pub const fn new(pools: Arc<PoolManager>) -> Self {
        Self { pools }
    }

    pub fn pools(&self) -> &PoolManager {
        &self.pools
    }

    fn primary(&self) -> DatabaseResult<&PgPool> {
        self.pools.primary()
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Text(v) => query.bind(v.as_deref()),
        SqlValue::Integer(v) => query.bind(*v),
        SqlValue::Boolean(v) => query.bind(*v),
        SqlValue::Uuid(v) => query.bind(*v),
    }
}

#[async_trait]
impl SchemaExecutor for DbRepository {
    async fn execute_statement(
        &self,
        definition: &str,
        index: usize,
        statement: &str,
    ) -> DatabaseResult<()> {
        let pool = self.pools.migration_pool()?;
        tracing::debug!(definition, statement = index, "Executing DDL");
        sqlx::raw_sql(statement)
            .execute(pool)
            .await
            .map_db_err(DatabaseOperation::ProvisionStatement {
                definition: definition.to_string(),
                index,
            })?;
        Ok(())
    }

    async fn relation_exists(&self, qualified_name: &str) -> DatabaseResult<bool> {
        let pool = self.pools.migration_pool()?;
        sqlx::query_scalar::<_, bool>("SELECT to_regclass($1) IS NOT NULL")
            .bind(qualified_name)
            .fetch_one(pool)
            .await
            .map_db_err(DatabaseOperation::RelationExists {
                relation: qualified_name.to_string(),
            })
    }
}

#[async_trait]
impl ReferenceStore for DbRepository {
    async fn upsert(&self, row: &UpsertRow) -> DatabaseResult<UpsertOutcome> {
        if row.key_columns.is_empty() || row.columns.is_empty() {
            return Err(DatabaseError::InvalidDefinition {
                name: row.table.qualified(),
                message: "upsert needs at least one key column and one value".to_string(),
            });
        }

        let sql = build_upsert_sql(row);
        let query = row
            .columns
            .iter()
            .fold(sqlx::query(&sql), |query, (_, value)| bind_value(query, value));

        let record = query
            .fetch_one(self.primary()?)
            .await
            .map_db_err(DatabaseOperation::UpsertRow {
                table: row.table.qualified(),
                key: row.natural_key(),
            })?;

        let inserted: bool = record
            .try_get("inserted")
            .map_db_err(DatabaseOperation::UpsertRow {
                table: row.table.qualified(),
                key: row.natural_key(),
            })?;

        Ok(if inserted {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        })
    }
}

#[async_trait]
impl CleanupStore for DbRepository {
    async fn count_rows(&self, table: AppTable) -> DatabaseResult<Option<i64>> {
        if !self.relation_exists(&table.qualified()).await? {
            return Ok(None);
        }

        let sql = format!("SELECT count(*) FROM {}", table.qualified());
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(self.primary()?)
            .await
            .map(Some)
            .map_db_err(DatabaseOperation::CountRows {
                table: table.qualified(),
            })
    }

    async fn delete_all(&self, tables: &[AppTable]) -> DatabaseResult<Vec<TableDeletion>> {
        let transaction_op = || DatabaseOperation::Transaction {
            description: format!("clear {} tables", tables.len()),
        };

        let mut tx = self
            .primary()?
            .begin()
            .await
            .map_db_err(transaction_op())?;

        let mut deleted = Vec::with_capacity(tables.len());
        for &table in tables {
            let sql = format!("DELETE FROM {}", table.qualified());
            match sqlx::query(&sql).execute(&mut *tx).await {
                Ok(result) => deleted.push(TableDeletion {
                    table,
                    deleted: result.rows_affected(),
                }),
                Err(e) => {
                    let source = DatabaseError::from_sqlx(
                        DatabaseOperation::DeleteRows {
                            table: table.qualified(),
                        },
                        e,
                    );
                    if let Err(rollback) = tx.rollback().await {
                        tracing::warn!(error = %rollback, "Explicit rollback failed");
                    }
                    return Err(DatabaseError::TransactionRollback {
                        operation: Box::new(transaction_op()),
                        reason: format!("deleting from {} failed", table.qualified()),
                        source: Some(Box::new(source)),
                    });
                }
            }
        }

        tx.commit().await.map_db_err(transaction_op())?;
        Ok(deleted)
    }
}
