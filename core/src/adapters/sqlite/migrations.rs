//! Embedded schema migrations, applied in ascending version order.

use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to execute migration {version}: {source}")]
    ExecutionError { version: i64, #[source] source: sqlx::Error },
    #[error("failed to read schema version: {0}")]
    VersionCheckError(#[source] sqlx::Error),
}

struct Migration {
    version: i64,
    sql: &'static str,
}

fn migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            sql: r#"
                CREATE TABLE IF NOT EXISTS runners (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    contents TEXT NOT NULL,
                    file_name TEXT NOT NULL,
                    file_type TEXT NOT NULL,
                    custom_executable TEXT,
                    dependency_file TEXT
                );

                CREATE TABLE IF NOT EXISTS agents (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    hostname TEXT NOT NULL,
                    agent_url TEXT NOT NULL,
                    agent_state TEXT NOT NULL DEFAULT 'NO_RUNNER',
                    last_contact_attempt INTEGER NOT NULL DEFAULT 0,
                    assigned_task INTEGER,
                    assigned_runner INTEGER REFERENCES runners(id),
                    UNIQUE (hostname, agent_url)
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    url TEXT NOT NULL,
                    json_metadata TEXT,
                    task_result TEXT,
                    task_state TEXT NOT NULL DEFAULT 'QUEUED',
                    assigned_agent INTEGER REFERENCES agents(id),
                    fail_num INTEGER NOT NULL DEFAULT 0,
                    start_time INTEGER NOT NULL DEFAULT 0,
                    end_time INTEGER
                );

                CREATE INDEX IF NOT EXISTS idx_tasks_queue_order
                    ON tasks (task_state, fail_num, id);

                CREATE TABLE IF NOT EXISTS error_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    message TEXT NOT NULL,
                    reporting_agent INTEGER REFERENCES agents(id),
                    runner INTEGER REFERENCES runners(id),
                    timestamp INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS screenshots (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    task INTEGER NOT NULL REFERENCES tasks(id),
                    file_name TEXT NOT NULL,
                    timestamp INTEGER NOT NULL,
                    bytes BLOB NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_screenshots_task ON screenshots (task);
            "#,
        },
    ]
}

pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run(&self) -> Result<usize, MigrationError> {
        self.ensure_migrations_table().await?;
        let current = self.current_version().await?;
        let pending: Vec<_> = migrations().into_iter().filter(|m| m.version > current).collect();

        for migration in &pending {
            sqlx::query(migration.sql)
                .execute(&self.pool)
                .await
                .map_err(|source| MigrationError::ExecutionError { version: migration.version, source })?;

            sqlx::query("INSERT INTO schema_migrations (version) VALUES (?)")
                .bind(migration.version)
                .execute(&self.pool)
                .await
                .map_err(|source| MigrationError::ExecutionError { version: migration.version, source })?;
        }

        Ok(pending.len())
    }

    async fn ensure_migrations_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|source| MigrationError::ExecutionError { version: 0, source })?;
        Ok(())
    }

    async fn current_version(&self) -> Result<i64, MigrationError> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
            .fetch_one(&self.pool)
            .await
            .map_err(MigrationError::VersionCheckError)?;
        Ok(version.unwrap_or(0))
    }
}
