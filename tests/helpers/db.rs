use canopy::{Canopy, RoleTopology};
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

        // Connect to database
        let connection = Database::connect(&db_url)
            .await
            .expect("Failed to connect to test database");

        // Run migrations
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

    /// Open an engine over this database with both trees prepared
    pub async fn canopy(&self, topology: RoleTopology) -> Canopy {
        Canopy::open(self.connection.clone(), topology)
            .await
            .expect("Failed to open engine")
    }
}

/// Insert `(alias, parent)` pairs in order
pub async fn seed_resources(canopy: &Canopy, nodes: &[(&str, &str)]) {
    for (alias, parent) in nodes {
        let inserted = canopy
            .add_resource(alias, parent, None)
            .await
            .expect("Failed to add resource");
        assert!(inserted, "parent `{parent}` of `{alias}` missing");
    }
}
