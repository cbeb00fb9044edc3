///! SQLite-backed store
///!
///! Persists enrollment state across restarts. The schema is managed by
///! an idempotent migration ledger; `connect` runs it before returning.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use fidelius_common::{BackupCode, Error, Result, Secret, TwoFactorState};

use super::TwoFactorStore;

/// Store implementation over a `sqlx` SQLite pool
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `database_url`
    pub async fn connect(database_url: &str) -> Result<Self> {
        // Create parent directory if needed
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        Error::Storage(format!("Failed to create database directory: {}", e))
                    })?;
                }
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await
            .map_err(|e| Error::Storage(format!("Database connection failed: {}", e)))?;

        run_migrations(&pool).await?;
        tracing::info!("Two-factor database ready");

        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TwoFactorStore for SqliteStore {
    async fn get_state(&self, account_id: &str) -> Result<TwoFactorState> {
        // Read the account row and its codes from one snapshot, so a
        // concurrent whole-state write cannot land between the queries
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Storage(format!("Failed to begin transaction: {}", e)))?;

        let account =
            sqlx::query("SELECT enabled, secret FROM twofactor_accounts WHERE account_id = ?")
                .bind(account_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| Error::Storage(format!("Failed to load account: {}", e)))?;

        let code_rows = if account.is_some() {
            sqlx::query(
                "SELECT salt, hash, consumed, consumed_at FROM twofactor_backup_codes
                 WHERE account_id = ? ORDER BY id",
            )
            .bind(account_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| Error::Storage(format!("Failed to load backup codes: {}", e)))?
        } else {
            Vec::new()
        };

        tx.commit()
            .await
            .map_err(|e| Error::Storage(format!("Failed to close read transaction: {}", e)))?;

        let Some(row) = account else {
            return Ok(TwoFactorState::Disabled);
        };

        let enabled: bool = row.get("enabled");
        let secret = Secret::from_base32(&row.get::<String, _>("secret"))?;

        let mut backup_codes = Vec::with_capacity(code_rows.len());
        for row in code_rows {
            backup_codes.push(row_to_backup_code(&row));
        }

        Ok(if enabled {
            TwoFactorState::Enabled {
                secret,
                backup_codes,
            }
        } else {
            TwoFactorState::Pending {
                secret,
                backup_codes,
            }
        })
    }

    async fn set_state(&self, account_id: &str, state: TwoFactorState) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Storage(format!("Failed to begin transaction: {}", e)))?;

        // Whole-state replace: clear both tables, then reinsert
        sqlx::query("DELETE FROM twofactor_backup_codes WHERE account_id = ?")
            .bind(account_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Storage(format!("Failed to clear backup codes: {}", e)))?;

        sqlx::query("DELETE FROM twofactor_accounts WHERE account_id = ?")
            .bind(account_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Storage(format!("Failed to clear account: {}", e)))?;

        let record = match &state {
            TwoFactorState::Disabled => None,
            TwoFactorState::Pending {
                secret,
                backup_codes,
            } => Some((false, secret, backup_codes)),
            TwoFactorState::Enabled {
                secret,
                backup_codes,
            } => Some((true, secret, backup_codes)),
        };

        if let Some((enabled, secret, backup_codes)) = record {
            sqlx::query(
                "INSERT INTO twofactor_accounts (account_id, enabled, secret) VALUES (?, ?, ?)",
            )
            .bind(account_id)
            .bind(enabled)
            .bind(secret.to_base32())
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Storage(format!("Failed to store account: {}", e)))?;

            for code in backup_codes {
                sqlx::query(
                    "INSERT INTO twofactor_backup_codes (account_id, salt, hash, consumed, consumed_at)
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(account_id)
                .bind(&code.salt)
                .bind(&code.hash)
                .bind(code.consumed)
                .bind(code.consumed_at.map(|t| t.timestamp()))
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::Storage(format!("Failed to store backup code: {}", e)))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| Error::Storage(format!("Failed to commit state: {}", e)))?;

        Ok(())
    }

    async fn consume_backup_code(&self, account_id: &str, hash: &str) -> Result<bool> {
        // The consumed = 0 guard makes this compare-and-set; of two
        // racing callers, only one update lands
        let result = sqlx::query(
            "UPDATE twofactor_backup_codes
             SET consumed = 1, consumed_at = ?
             WHERE account_id = ? AND hash = ? AND consumed = 0",
        )
        .bind(Utc::now().timestamp())
        .bind(account_id)
        .bind(hash)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(format!("Failed to consume backup code: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }
}

fn row_to_backup_code(row: &SqliteRow) -> BackupCode {
    let consumed_at: Option<i64> = row.get("consumed_at");

    BackupCode {
        salt: row.get("salt"),
        hash: row.get("hash"),
        consumed: row.get("consumed"),
        consumed_at: consumed_at.and_then(|t| DateTime::from_timestamp(t, 0)),
    }
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Create migrations table
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS twofactor_migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            executed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| Error::Storage(format!("Failed to create migrations table: {}", e)))?;

    run_migration(pool, "001_create_accounts_table", MIGRATION_001_CREATE_ACCOUNTS).await?;
    run_migration(
        pool,
        "002_create_backup_codes_table",
        MIGRATION_002_CREATE_BACKUP_CODES,
    )
    .await?;

    Ok(())
}

async fn run_migration(pool: &SqlitePool, name: &str, sql: &str) -> Result<()> {
    // Check if migration already ran
    let row = sqlx::query("SELECT COUNT(*) as count FROM twofactor_migrations WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::Storage(format!("Migration check failed: {}", e)))?;

    let count: i64 = row.get("count");
    if count > 0 {
        tracing::debug!("Migration {} already applied", name);
        return Ok(());
    }

    tracing::info!("Running migration: {}", name);

    sqlx::query(sql)
        .execute(pool)
        .await
        .map_err(|e| Error::Storage(format!("Migration {} failed: {}", name, e)))?;

    sqlx::query("INSERT INTO twofactor_migrations (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await
        .map_err(|e| Error::Storage(format!("Failed to record migration: {}", e)))?;

    Ok(())
}

const MIGRATION_001_CREATE_ACCOUNTS: &str = "
CREATE TABLE twofactor_accounts (
    account_id TEXT PRIMARY KEY,
    enabled INTEGER NOT NULL DEFAULT 0,
    secret TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
";

const MIGRATION_002_CREATE_BACKUP_CODES: &str = "
CREATE TABLE twofactor_backup_codes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id TEXT NOT NULL,
    salt TEXT NOT NULL,
    hash TEXT NOT NULL,
    consumed INTEGER NOT NULL DEFAULT 0,
    consumed_at INTEGER
);

CREATE INDEX idx_backup_codes_account ON twofactor_backup_codes(account_id);
CREATE UNIQUE INDEX idx_backup_codes_account_hash ON twofactor_backup_codes(account_id, hash);
";
