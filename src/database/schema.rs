use log::{error, info, warn};
use crate::database::config::{GEOSPATIAL_EXTENSION, PUBLIC_SCHEMA};
use crate::database::connection::{acquire, ScopedConnection};
use crate::database::statements::quote_identifier;
use crate::database::structure::TableId;
use crate::database::DatabaseManager;
use crate::error::SyncError;

const DATABASE_EXISTS_SQL: &str = "SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)";
const TABLE_EXISTS_SQL: &str = "SELECT EXISTS(
    SELECT 1
    FROM information_schema.tables
    WHERE table_schema = $1 AND table_name = $2
)";

fn schema_error(object: String) -> impl FnOnce(tokio_postgres::Error) -> SyncError {
    move |source| SyncError::Schema { object, source }
}

impl DatabaseManager {
    /// Check whether a database named exactly `name` exists (case-sensitive)
    pub async fn database_exists(&self, name: &str) -> Result<bool, SyncError> {
        let conn = acquire(&self.admin_server()).await?;
        Self::database_exists_on(&conn, name).await
    }

    async fn database_exists_on(conn: &ScopedConnection, name: &str) -> Result<bool, SyncError> {
        conn.exists(DATABASE_EXISTS_SQL, name)
            .await
            .map_err(schema_error(format!("database {}", name)))
    }

    /// Create the database if it is missing
    ///
    /// The geospatial extension is only created on a database created by this
    /// call; an existing database is left untouched. If the extension cannot
    /// be created the new database is dropped again, so the next run starts
    /// from scratch. Returns whether the database was created.
    pub async fn ensure_database(&self, name: &str) -> Result<bool, SyncError> {
        self.ensure_database_with(name, GEOSPATIAL_EXTENSION).await
    }

    pub(crate) async fn ensure_database_with(&self, name: &str, extension: &str) -> Result<bool, SyncError> {
        info!("Verifying that database {} exists", name);

        {
            let conn = acquire(&self.admin_server()).await?;
            if Self::database_exists_on(&conn, name).await? {
                info!("Database {} already exists", name);
                return Ok(false);
            }
            info!("Database {} missing, creating it", name);
            conn.batch_execute(&format!("CREATE DATABASE {}", quote_identifier(name)))
                .await
                .map_err(schema_error(format!("database {}", name)))?;
            info!("Created database {}", name);
        }

        if let Err(e) = self.create_extension(name, extension).await {
            warn!("Dropping database {} after failed extension setup", name);
            if let Err(drop_error) = self.drop_database(name).await {
                error!("Could not drop database {}: {}", name, drop_error);
            }
            return Err(e);
        }

        Ok(true)
    }

    async fn create_extension(&self, database: &str, extension: &str) -> Result<(), SyncError> {
        let conn = acquire(&self.admin_database(database)).await?;
        conn.batch_execute(&format!("CREATE EXTENSION {}", quote_identifier(extension)))
            .await
            .map_err(schema_error(format!("extension {} on {}", extension, database)))?;
        info!("Created extension {} on {}", extension, database);
        Ok(())
    }

    /// Drop a database; the caller must not hold a connection to it
    pub(crate) async fn drop_database(&self, name: &str) -> Result<(), SyncError> {
        let conn = acquire(&self.admin_server()).await?;
        conn.batch_execute(&format!("DROP DATABASE IF EXISTS {}", quote_identifier(name)))
            .await
            .map_err(schema_error(format!("database {}", name)))?;
        info!("Dropped database {}", name);
        Ok(())
    }

    /// Create every missing table, in the order given
    ///
    /// Tables referenced by a foreign key must come before the tables that
    /// reference them. Returns the names of the tables created.
    pub async fn ensure_tables(&self, tables: &[TableId]) -> Result<Vec<String>, SyncError> {
        let database = self.database();
        info!("Verifying that {} tables exist", database);

        let conn = acquire(&self.admin_database(&database)).await?;
        let mut created = Vec::new();

        for table in tables {
            let schema = table.schema();
            if Self::table_exists_on(&conn, schema.name).await? {
                info!("Table {} exists", schema.name);
                continue;
            }

            info!("Table {} missing, creating it", schema.name);
            conn.batch_execute(schema.ddl)
                .await
                .map_err(schema_error(format!("table {}", schema.name)))?;
            created.push(schema.name.to_string());
        }

        Ok(created)
    }

    /// Check whether a table exists in the target database
    pub async fn table_exists(&self, table: TableId) -> Result<bool, SyncError> {
        let conn = acquire(&self.admin_database(&self.database())).await?;
        Self::table_exists_on(&conn, table.name()).await
    }

    async fn table_exists_on(conn: &ScopedConnection, name: &str) -> Result<bool, SyncError> {
        let row = conn
            .query_one(TABLE_EXISTS_SQL, &[&PUBLIC_SCHEMA, &name])
            .await
            .map_err(schema_error(format!("table {}", name)))?;
        Ok(row.get(0))
    }

    /// Empty every existing table, cascading to dependent tables
    ///
    /// Runs in one session with one TRUNCATE per table; missing tables are
    /// skipped. Returns the names of the tables truncated.
    pub async fn truncate_all(&self, tables: &[TableId]) -> Result<Vec<String>, SyncError> {
        let database = self.database();
        info!("Truncating existing {} tables", database);

        let conn = acquire(&self.admin_database(&database)).await?;
        let mut truncated = Vec::new();

        for table in tables {
            if !Self::table_exists_on(&conn, table.name()).await? {
                continue;
            }
            conn.batch_execute(&format!("TRUNCATE TABLE {} CASCADE", table.name()))
                .await
                .map_err(schema_error(format!("table {}", table.name())))?;
            info!("Truncated {}", table.name());
            truncated.push(table.name().to_string());
        }

        Ok(truncated)
    }
}
