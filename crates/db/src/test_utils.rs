//! Scratch PostgreSQL databases for integration tests.

use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::migrations::Migrator;

/// Server the scratch databases are created on, read from `TEST_DB_*`.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Database used by [`ScratchDatabase::connect`].
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };
        Self {
            host: var("TEST_DB_HOST", "localhost"),
            port: var("TEST_DB_PORT", "5433").parse().unwrap_or(5433),
            username: var("TEST_DB_USER", "photowall_test"),
            password: var("TEST_DB_PASSWORD", "photowall_test"),
            database: var("TEST_DB_NAME", "photowall_test"),
        }
    }
}

impl TestDbConfig {
    /// Connection URL for `database` on the configured server.
    #[must_use]
    pub fn url_for(&self, database: &str) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{database}",
            self.username, self.password, self.host, self.port
        )
    }

    #[must_use]
    pub fn database_url(&self) -> String {
        self.url_for(&self.database)
    }
}

/// A database owned by one test.
pub struct ScratchDatabase {
    conn: DatabaseConnection,
    config: TestDbConfig,
}

impl ScratchDatabase {
    /// Connect to the configured database as is.
    pub async fn connect(config: TestDbConfig) -> Result<Self, DbErr> {
        let conn = Database::connect(&config.database_url()).await?;
        Ok(Self { conn, config })
    }

    /// Create a freshly migrated database with a random name.
    pub async fn create() -> Result<Self, DbErr> {
        let mut config = TestDbConfig::default();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        config.database = format!("photowall_test_{}", &suffix[..8]);

        let admin = Database::connect(&config.url_for("postgres")).await?;
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("CREATE DATABASE \"{}\"", config.database),
            ))
            .await?;
        admin.close().await?;

        let conn = Database::connect(&config.database_url()).await?;
        Migrator::up(&conn, None).await?;
        info!(database = %config.database, "Created scratch database");

        Ok(Self { conn, config })
    }

    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Close the connection and drop the database.
    pub async fn drop_database(self) -> Result<(), DbErr> {
        self.conn.close().await?;

        let admin = Database::connect(&self.config.url_for("postgres")).await?;
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", self.config.database),
            ))
            .await?;
        admin.close().await?;

        info!(database = %self.config.database, "Dropped scratch database");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_other_database() {
        let config = TestDbConfig {
            host: "db".to_string(),
            port: 5433,
            username: "wall".to_string(),
            password: "secret".to_string(),
            database: "photowall_test".to_string(),
        };
        assert_eq!(
            config.database_url(),
            "postgres://wall:secret@db:5433/photowall_test"
        );
        assert_eq!(config.url_for("postgres"), "postgres://wall:secret@db:5433/postgres");
    }
}
