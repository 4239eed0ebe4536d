// Tests against a live PostgreSQL server with PostGIS available.
//
// Run with:
//   AFDC_TEST_ADMIN_PASSWORD=... cargo test -- --ignored
//
// AFDC_TEST_DB_HOST, AFDC_TEST_DB_PORT and AFDC_TEST_ADMIN_USER override the
// defaults. Every test works in its own throwaway database and drops it,
// together with any role it created, before returning.

use tokio_test::assert_ok;
use crate::database::statements::quote_identifier;
use crate::database::{acquire, derived_password, ConnectionDescriptor, DatabaseManager, Row, SqlValue, SyncConfig, TableId};
use crate::error::SyncError;

fn admin_password() -> String {
    std::env::var("AFDC_TEST_ADMIN_PASSWORD").unwrap_or_else(|_| "postgres".to_string())
}

fn test_config(namespace: &str) -> SyncConfig {
    let defaults = SyncConfig::default();
    SyncConfig {
        namespace: format!("afdc_test_{}_{}", namespace, std::process::id()),
        hostname: std::env::var("AFDC_TEST_DB_HOST").unwrap_or(defaults.hostname.clone()),
        port: std::env::var("AFDC_TEST_DB_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port),
        admin_user: std::env::var("AFDC_TEST_ADMIN_USER").unwrap_or(defaults.admin_user.clone()),
        ..defaults
    }
}

async fn provisioned(namespace: &str) -> DatabaseManager {
    let db = DatabaseManager::new(test_config(namespace), admin_password());
    assert_ok!(db.ensure_database(&db.database()).await);
    assert_ok!(db.ensure_tables(&TableId::ALL).await);
    assert_ok!(db.truncate_all(&TableId::ALL).await);
    db
}

/// Drop the test database and the read-only roles of its config
async fn teardown(db: &DatabaseManager) {
    assert_ok!(db.drop_database(&db.database()).await);

    let descriptor = ConnectionDescriptor::server(db.config(), &db.config().admin_user, &admin_password());
    let conn = acquire(&descriptor).await.unwrap();
    for role in db.config().read_only_users() {
        conn.batch_execute(&format!("DROP ROLE IF EXISTS {}", quote_identifier(role)))
            .await
            .unwrap();
    }
}

async fn admin_conn(db: &DatabaseManager) -> crate::database::ScopedConnection {
    let descriptor = ConnectionDescriptor::database(db.config(), &db.config().admin_user, &admin_password(), &db.database());
    acquire(&descriptor).await.unwrap()
}

async fn station_ids(db: &DatabaseManager) -> Vec<String> {
    let conn = admin_conn(db).await;
    conn.query("SELECT id FROM station ORDER BY id", &[])
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<_, String>(0))
        .collect()
}

fn station(id: &str, name: &str) -> Row {
    Row::new()
        .with("id", id)
        .with("station_name", name)
        .with("latitude", 34.5)
        .with("longitude", f64::NAN)
}

#[tokio::test]
#[ignore]
async fn ensure_database_is_idempotent() {
    let db = DatabaseManager::new(test_config("database"), admin_password());
    let name = db.database();

    assert_ok!(db.ensure_database(&name).await);
    let second = db.ensure_database(&name).await.unwrap();

    assert!(db.database_exists(&name).await.unwrap());
    assert!(!second);

    teardown(&db).await;
    assert!(!db.database_exists(&name).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn failed_extension_leaves_no_database_behind() {
    let db = DatabaseManager::new(test_config("extension"), admin_password());
    let name = db.database();

    let result = db.ensure_database_with(&name, "afdc_missing_extension").await;

    match result {
        Err(SyncError::Schema { object, .. }) => assert!(object.contains("afdc_missing_extension")),
        other => panic!("expected a schema error, got {:?}", other),
    }
    assert!(!db.database_exists(&name).await.unwrap());

    // The next attempt starts from scratch and installs the extension
    assert!(db.ensure_database(&name).await.unwrap());
    teardown(&db).await;
}

#[tokio::test]
#[ignore]
async fn ensure_tables_creates_once() {
    let db = DatabaseManager::new(test_config("tables"), admin_password());
    db.ensure_database(&db.database()).await.unwrap();

    db.ensure_tables(&TableId::ALL).await.unwrap();
    let again = db.ensure_tables(&TableId::ALL).await.unwrap();

    assert!(again.is_empty());
    for table in TableId::ALL {
        assert!(db.table_exists(table).await.unwrap(), "{} missing", table);
    }
    teardown(&db).await;
}

#[tokio::test]
#[ignore]
async fn clean_batch_inserts_every_row() {
    let db = provisioned("batch").await;
    let rows = vec![station("1", "Alpha"), station("2", "Beta")];

    let failures = db.load(TableId::Station, &rows).await.unwrap();

    assert!(failures.is_empty());
    assert!(failures.batched);
    assert_eq!(station_ids(&db).await, vec!["1", "2"]);
    teardown(&db).await;
}

#[tokio::test]
#[ignore]
async fn bad_row_is_isolated_by_fallback() {
    let db = provisioned("fallback").await;
    let rows = vec![
        station("1", "O'Brien"),
        Row::new().with("id", SqlValue::Null).with("station_name", "no id"),
        station("3", "Gamma"),
    ];

    let failures = db.load(TableId::Station, &rows).await.unwrap();

    assert_eq!(failures.len(), 1);
    assert!(!failures.batched);
    assert_eq!(failures.failures[0].index, 1);
    assert_eq!(station_ids(&db).await, vec!["1", "3"]);

    // The server's reason is kept, not just "db error"
    let error = &failures.failures[0].error;
    assert!(error.contains("violates not-null constraint"), "unexpected error text {:?}", error);
    assert!(error.contains("\"id\""), "unexpected error text {:?}", error);

    teardown(&db).await;
}

#[tokio::test]
#[ignore]
async fn unencodable_row_fails_alone_and_quotes_are_stripped() {
    let db = provisioned("encoding").await;
    let rows = vec![
        Row::new().with("id", "1").with("station_name", "O'Brien"),
        Row::new().with("id", "2").with("station_name", "bad\x00value"),
    ];

    let failures = db.load(TableId::Station, &rows).await.unwrap();

    assert!(!failures.batched);
    assert_eq!(failures.failures.iter().map(|f| f.index).collect::<Vec<_>>(), vec![1]);
    assert_eq!(failures.inserted(), 1);

    {
        let conn = admin_conn(&db).await;
        let stored: Vec<(String, String)> = conn
            .query("SELECT id, station_name FROM station ORDER BY id", &[])
            .await
            .unwrap()
            .iter()
            .map(|row| (row.get(0), row.get(1)))
            .collect();
        assert_eq!(stored, vec![("1".to_string(), "OBrien".to_string())]);
    }

    teardown(&db).await;
}

#[tokio::test]
#[ignore]
async fn nan_and_null_are_stored_as_null() {
    let db = provisioned("nulls").await;
    db.load(TableId::Station, &[station("1", "Alpha")]).await.unwrap();

    {
        let conn = admin_conn(&db).await;
        let row = conn
            .query_one(
                "SELECT longitude IS NULL, city IS NULL, latitude::text FROM station WHERE id = '1'",
                &[],
            )
            .await
            .unwrap();
        assert!(row.get::<_, bool>(0));
        assert!(row.get::<_, bool>(1));
        assert_eq!(row.get::<_, String>(2), "34.5");
    }

    teardown(&db).await;
}

#[tokio::test]
#[ignore]
async fn update_and_delete_apply_by_key() {
    let db = provisioned("update").await;
    db.load(TableId::Station, &[station("1", "Alpha"), station("2", "Beta")]).await.unwrap();

    let change = crate::database::RowChange {
        row: station("1", "Renamed"),
        changed: vec!["station_name".to_string()],
    };
    assert_eq!(db.update(TableId::Station, &[change]).await.unwrap(), 1);
    assert_eq!(db.delete(TableId::Station, &[station("2", "Beta")]).await.unwrap(), 1);

    assert_eq!(station_ids(&db).await, vec!["1"]);
    teardown(&db).await;
}

#[tokio::test]
#[ignore]
async fn read_only_user_provisioning_is_idempotent() {
    let mut config = test_config("grants");
    let reader = format!("{}_reader", config.namespace);
    config.users = vec![reader.clone()];
    let db = DatabaseManager::new(config, admin_password());
    db.ensure_database(&db.database()).await.unwrap();
    db.ensure_tables(&TableId::ALL).await.unwrap();

    assert_eq!(db.provision_read_only_users().await.unwrap(), vec![reader.clone()]);
    assert_eq!(db.provision_read_only_users().await.unwrap(), vec![reader.clone()]);

    let password = derived_password(&reader, &admin_password());
    let descriptor = ConnectionDescriptor::database(db.config(), &reader, &password, &db.database());
    {
        let conn = acquire(&descriptor).await.unwrap();
        assert_ok!(conn.query("SELECT count(*) FROM station", &[]).await);
        assert!(conn.batch_execute("DELETE FROM station").await.is_err());
    }

    teardown(&db).await;
}
