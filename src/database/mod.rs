use crate::assets::MigrationAssets;
use crate::config::DatabaseConfig;
use anyhow::Result;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Pool, Sqlite};
use tracing;

pub mod config_store;
pub mod jobs;
pub mod play_log;
pub mod tracks;

/// Parse a datetime stored as either RFC3339 or SQLite's native
/// `YYYY-MM-DD HH:MM:SS` format.
pub(crate) fn parse_datetime(s: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&chrono::Utc));
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    Err(anyhow::anyhow!("failed to parse datetime: {s}"))
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        // Create database if it doesn't exist (for SQLite)
        if !Sqlite::database_exists(&config.url).await? {
            Sqlite::create_database(&config.url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.unwrap_or(5))
            .connect(&config.url)
            .await?;

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        self.run_embedded_migrations().await?;
        Ok(())
    }

    async fn run_embedded_migrations(&self) -> Result<()> {
        // Create migrations table if it doesn't exist
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _sqlx_migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                success BOOLEAN NOT NULL,
                checksum BLOB NOT NULL,
                execution_time BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Get embedded migrations
        let migrations = MigrationAssets::get_migrations();

        for (name, content) in migrations {
            // Extract version from filename (e.g., "001_initial_schema.sql" -> 1)
            let version: i64 = name
                .split('_')
                .next()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| {
                    // Fallback: use hash of filename as version
                    use std::collections::hash_map::DefaultHasher;
                    use std::hash::{Hash, Hasher};
                    let mut hasher = DefaultHasher::new();
                    name.hash(&mut hasher);
                    hasher.finish() as i64
                });

            // Check if migration is already applied
            let existing = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM _sqlx_migrations WHERE version = ? AND success = true",
            )
            .bind(version)
            .fetch_one(&self.pool)
            .await?;

            if existing > 0 {
                continue; // Migration already applied
            }

            // Apply migration
            let start = std::time::Instant::now();
            let mut transaction = self.pool.begin().await?;

            match sqlx::query(&content).execute(&mut *transaction).await {
                Ok(_) => {
                    let execution_time = start.elapsed().as_millis() as i64;
                    let checksum = Self::calculate_checksum(&content);

                    // Record successful migration
                    sqlx::query(
                        r#"
                        INSERT INTO _sqlx_migrations (version, description, success, checksum, execution_time)
                        VALUES (?, ?, true, ?, ?)
                        "#,
                    )
                    .bind(version)
                    .bind(&name)
                    .bind(&checksum)
                    .bind(execution_time)
                    .execute(&mut *transaction)
                    .await?;

                    transaction.commit().await?;
                    tracing::info!("Applied migration: {} ({}ms)", name, execution_time);
                }
                Err(e) => {
                    transaction.rollback().await?;
                    return Err(anyhow::anyhow!("Migration {} failed: {}", name, e));
                }
            }
        }

        Ok(())
    }

    fn calculate_checksum(content: &str) -> Vec<u8> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        hasher.finish().to_be_bytes().to_vec()
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Demote any job/track left in `processing` by a crash back to
    /// `pending`, restoring the "at most one job processing" invariant
    /// before the worker's consumer loop starts.
    pub async fn recover_orphaned_processing(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let orphaned: Vec<String> =
            sqlx::query_scalar("SELECT track_id FROM jobs WHERE status = 'processing'")
                .fetch_all(&mut *tx)
                .await?;

        let count = orphaned.len() as u64;

        sqlx::query(
            "UPDATE jobs SET status = 'pending', started_at = NULL WHERE status = 'processing'",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE tracks SET status = 'pending' WHERE status = 'processing'")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if count > 0 {
            tracing::warn!(
                "Recovered {} orphaned processing job(s) on startup: {:?}",
                count,
                orphaned
            );
        }

        Ok(count)
    }
}
