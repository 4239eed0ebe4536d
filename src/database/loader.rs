use log::{debug, info, warn};
use crate::database::config::PROGRESS_INTERVAL;
use crate::database::connection::acquire;
use crate::database::models::{FailedRow, FailureSet, Row};
use crate::database::statements::SqlWriter;
use crate::database::structure::TableId;
use crate::database::DatabaseManager;
use crate::error::{db_error_text, SyncError};

/// A row together with the columns to write back
#[derive(Debug, Clone)]
pub struct RowChange {
    pub row: Row,
    pub changed: Vec<String>,
}

impl DatabaseManager {
    /// Insert `rows` into `table`, isolating rows that fail
    ///
    /// 1. Every row is rendered as one INSERT and the statements are executed
    ///    as a single transaction.
    /// 2. If the batch fails, one connection is opened and each statement is
    ///    executed on its own with auto-commit; a failing row is recorded and
    ///    rolled back before moving on.
    ///
    /// Returns the rows that could not be inserted. Connectivity failures are
    /// returned as errors, not as row failures.
    pub async fn load(&self, table: TableId, rows: &[Row]) -> Result<FailureSet, SyncError> {
        if rows.is_empty() {
            info!("No rows to insert into {}", table);
            return Ok(FailureSet::empty(table, 0));
        }

        info!("Generating {} INSERT statements for {}", rows.len(), table);
        let statements: Vec<String> = rows.iter().map(|row| SqlWriter::insert(table, row)).collect();

        // Attempt 1: one transaction for the whole batch
        match self.execute_batch(&statements).await {
            Ok(()) => {
                info!("Inserted {} rows into {} as one batch", rows.len(), table);
                return Ok(FailureSet::empty(table, rows.len()));
            }
            Err(e) if e.is_connectivity() => return Err(e),
            Err(e) => {
                warn!("Batch insert into {} failed, retrying rows individually: {}", table, e);
            }
        }

        // Attempt 2: row by row
        self.execute_individually(table, rows, &statements).await
    }

    async fn execute_batch(&self, statements: &[String]) -> Result<(), SyncError> {
        let mut conn = acquire(&self.admin_database(&self.database())).await?;
        let transaction = conn.transaction().await?;
        transaction.batch_execute(&SqlWriter::batch(statements)).await?;
        transaction.commit().await?;
        Ok(())
    }

    async fn execute_individually(
        &self,
        table: TableId,
        rows: &[Row],
        statements: &[String],
    ) -> Result<FailureSet, SyncError> {
        let conn = acquire(&self.admin_database(&self.database())).await?;
        let total = statements.len();
        let mut failures = Vec::new();

        info!("Executing {} individual INSERT statements for {}", total, table);
        for (index, (row, statement)) in rows.iter().zip(statements).enumerate() {
            if let Err(e) = conn.batch_execute(statement).await {
                if conn.is_closed() {
                    return Err(SyncError::Database(e));
                }
                let error = db_error_text(&e);
                debug!("Row {} of {} failed: {}", index, table, error);
                failures.push(FailedRow {
                    index,
                    row: row.clone(),
                    error,
                });
                if let Err(rollback) = conn.batch_execute("ROLLBACK").await {
                    warn!(
                        "Rollback after failed row {} of {} failed: {}",
                        index,
                        table,
                        db_error_text(&rollback)
                    );
                }
            }

            if (index + 1) % PROGRESS_INTERVAL == 0 {
                info!("{}: {}/{} rows processed, {} failed", table, index + 1, total, failures.len());
            }
        }

        if failures.is_empty() {
            info!("Inserted all {} rows into {} individually", total, table);
        } else {
            warn!("{} of {} rows could not be inserted into {}", failures.len(), total, table);
        }

        Ok(FailureSet {
            table,
            attempted: total,
            batched: false,
            failures,
        })
    }

    /// Write changed columns back, one UPDATE per row, in one transaction
    ///
    /// Rows are matched on the table's update-key columns. There is no per-row
    /// fallback: any failure rolls back the whole batch and is returned.
    /// Returns the number of statements executed.
    pub async fn update(&self, table: TableId, changes: &[RowChange]) -> Result<usize, SyncError> {
        let statements: Vec<String> = changes
            .iter()
            .filter_map(|change| {
                let changed: Vec<&str> = change.changed.iter().map(String::as_str).collect();
                SqlWriter::update_by_key(table, &change.row, &changed)
            })
            .collect();

        if statements.is_empty() {
            return Ok(0);
        }

        info!("Executing {} UPDATE statements for {}", statements.len(), table);
        self.execute_batch(&statements).await?;
        Ok(statements.len())
    }

    /// Delete rows matched on the table's delete-key columns, in one transaction
    pub async fn delete(&self, table: TableId, rows: &[Row]) -> Result<usize, SyncError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let statements: Vec<String> = rows.iter().map(|row| SqlWriter::delete(table, row)).collect();
        info!("Executing {} DELETE statements for {}", statements.len(), table);
        self.execute_batch(&statements).await?;
        Ok(statements.len())
    }
}
