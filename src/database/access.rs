use log::info;
use crate::database::config::PUBLIC_SCHEMA;
use crate::database::connection::{acquire, ScopedConnection};
use crate::database::statements::{quote_identifier, quote_literal};
use crate::database::structure::TableId;
use crate::database::DatabaseManager;
use crate::error::SyncError;

const ROLE_EXISTS_SQL: &str = "SELECT EXISTS(SELECT 1 FROM pg_roles WHERE rolname = $1)";

/// Password of a read-only user, derived from the administrative password
///
/// Known limitation: anyone holding the admin password can compute every
/// read-only password. Acceptable only because these accounts are internal
/// and can do nothing beyond SELECT on the published tables.
pub fn derived_password(username: &str, admin_password: &str) -> String {
    format!("{}_{}", username, admin_password)
}

async fn grant(conn: &ScopedConnection, username: &str, statement: String) -> Result<(), SyncError> {
    conn.batch_execute(&statement)
        .await
        .map_err(|source| SyncError::Grant {
            username: username.to_string(),
            statement,
            source,
        })
}

impl DatabaseManager {
    /// Create a login role with `password` unless it already exists
    ///
    /// Returns whether the role was created. An existing role keeps its
    /// current password.
    pub async fn ensure_role(&self, username: &str, password: &str) -> Result<bool, SyncError> {
        let conn = acquire(&self.admin_server()).await?;
        Self::ensure_role_on(&conn, username, password).await
    }

    async fn ensure_role_on(conn: &ScopedConnection, username: &str, password: &str) -> Result<bool, SyncError> {
        let exists = conn
            .exists(ROLE_EXISTS_SQL, username)
            .await
            .map_err(|source| SyncError::Grant {
                username: username.to_string(),
                statement: ROLE_EXISTS_SQL.to_string(),
                source,
            })?;

        if exists {
            info!("User {} already exists", username);
            return Ok(false);
        }

        let statement = format!(
            "CREATE USER {} WITH PASSWORD {}",
            quote_identifier(username),
            quote_literal(password)
        );
        conn.batch_execute(&statement)
            .await
            .map_err(|source| SyncError::Grant {
                username: username.to_string(),
                // the statement carries the password
                statement: format!("CREATE USER {}", quote_identifier(username)),
                source,
            })?;
        info!("Created user {}", username);
        Ok(true)
    }

    /// `GRANT CONNECT ON DATABASE database TO username`
    pub async fn grant_connect(&self, database: &str, username: &str) -> Result<(), SyncError> {
        let conn = acquire(&self.admin_server()).await?;
        Self::grant_connect_on(&conn, database, username).await
    }

    async fn grant_connect_on(conn: &ScopedConnection, database: &str, username: &str) -> Result<(), SyncError> {
        let statement = format!(
            "GRANT CONNECT ON DATABASE {} TO {}",
            quote_identifier(database),
            quote_identifier(username)
        );
        grant(conn, username, statement).await
    }

    /// `GRANT USAGE ON SCHEMA schema TO username` in the target database
    pub async fn grant_schema_usage(&self, schema: &str, username: &str) -> Result<(), SyncError> {
        let conn = acquire(&self.admin_database(&self.database())).await?;
        Self::grant_schema_usage_on(&conn, schema, username).await
    }

    async fn grant_schema_usage_on(conn: &ScopedConnection, schema: &str, username: &str) -> Result<(), SyncError> {
        let statement = format!(
            "GRANT USAGE ON SCHEMA {} TO {}",
            quote_identifier(schema),
            quote_identifier(username)
        );
        grant(conn, username, statement).await
    }

    /// `GRANT SELECT ON table TO username` in the target database
    pub async fn grant_select(&self, table: TableId, username: &str) -> Result<(), SyncError> {
        let conn = acquire(&self.admin_database(&self.database())).await?;
        Self::grant_select_on(&conn, table, username).await
    }

    async fn grant_select_on(conn: &ScopedConnection, table: TableId, username: &str) -> Result<(), SyncError> {
        let statement = format!(
            "GRANT SELECT ON {} TO {}",
            quote_identifier(table.name()),
            quote_identifier(username)
        );
        grant(conn, username, statement).await
    }

    /// Ensure one read-only user exists and holds its grants
    ///
    /// Grants are re-applied on every call. Any failure aborts provisioning
    /// for this user and is returned; a partially granted user is never
    /// reported as provisioned.
    pub async fn provision_read_only_user(&self, username: &str) -> Result<(), SyncError> {
        let database = self.database();
        let password = derived_password(username, &self.admin_password);

        {
            let conn = acquire(&self.admin_server()).await?;
            Self::ensure_role_on(&conn, username, &password).await?;
            Self::grant_connect_on(&conn, &database, username).await?;
        }

        let conn = acquire(&self.admin_database(&database)).await?;
        Self::grant_schema_usage_on(&conn, PUBLIC_SCHEMA, username).await?;
        for table in TableId::read_only() {
            Self::grant_select_on(&conn, table, username).await?;
        }

        info!("User {} has read-only access to {}", username, database);
        Ok(())
    }

    /// Provision every configured user other than the administrative one
    ///
    /// Stops at the first failure. Returns the users provisioned.
    pub async fn provision_read_only_users(&self) -> Result<Vec<String>, SyncError> {
        let users: Vec<String> = self
            .config
            .read_only_users()
            .into_iter()
            .map(str::to_string)
            .collect();

        info!("Provisioning {} read-only users", users.len());
        for username in &users {
            self.provision_read_only_user(username).await?;
        }
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_password_joins_user_and_admin_password() {
        assert_eq!(derived_password("analyst", "s3cret"), "analyst_s3cret");
    }

    #[test]
    fn derived_password_is_deterministic() {
        assert_eq!(derived_password("viewer", "pw"), derived_password("viewer", "pw"));
        assert_ne!(derived_password("viewer", "pw"), derived_password("analyst", "pw"));
    }
}
