use lavcontrol::storage;
use lavcontrol::types::{AccessMethod, Severity};
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tempfile::NamedTempFile;

/// Test database with automatic cleanup
pub struct TestDb {
    connection: DatabaseConnection,
    _temp_file: NamedTempFile,
}

impl TestDb {
    /// Create a new test database with migrations applied
    pub async fn new() -> Self {
        // Create temporary SQLite database file
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = temp_file.path().to_str().expect("Invalid temp file path");
        let db_url = format!("sqlite://{}?mode=rwc", db_path);

        let connection = Database::connect(&db_url)
            .await
            .expect("Failed to connect to test database");

        migration::Migrator::up(&connection, None)
            .await
            .expect("Failed to run migrations");

        Self {
            connection,
            _temp_file: temp_file,
        }
    }

    /// Get database connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}

/// Insert an unresolved alert
pub async fn seed_alert(
    db: &DatabaseConnection,
    severity: Severity,
    store_id: Option<i32>,
) -> storage::Alert {
    storage::create_alert(
        db,
        storage::NewAlert {
            kind: "test".to_string(),
            severity,
            message: "Test alert".to_string(),
            device_id: None,
            store_id,
        },
    )
    .await
    .expect("Failed to create test alert")
}

/// Insert an access log entry
pub async fn seed_access_log(
    db: &DatabaseConnection,
    device_id: Option<&str>,
    store_id: Option<i32>,
    success: bool,
) -> storage::AccessLog {
    storage::record_access_log(
        db,
        storage::NewAccessLog {
            user_id: None,
            client_id: None,
            device_id: device_id.map(str::to_string),
            store_id,
            method: AccessMethod::Facial,
            success,
            details: None,
        },
    )
    .await
    .expect("Failed to create test access log")
}
