use anyhow::Result;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;

// The database URL for the production database
const DATABASE_URL: &str = "sqlite:spendwatch.db";

/// DbConnection manages database operations
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Create a new database connection
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options).await?;

        // Setup database schema
        Self::setup_schema(&pool).await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Initialize the standard database
    pub async fn init() -> Result<Self> {
        Self::new(DATABASE_URL).await
    }

    /// Initialize a test database with a unique name
    pub async fn init_test() -> Result<Self> {
        // Generate a unique database name so parallel tests don't collide
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("sqlite:file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&db_url).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Set up the required database schema
    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        // Budgets table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS budgets (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                category_id TEXT,
                name TEXT NOT NULL,
                amount REAL NOT NULL,
                period_type TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                currency TEXT NOT NULL DEFAULT 'USD',
                warning_threshold_pct INTEGER NOT NULL DEFAULT 80,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_budgets_user_active
            ON budgets(user_id, is_active);
            "#,
        )
        .execute(pool)
        .await?;

        // Ledger transactions table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                category_id TEXT,
                amount REAL NOT NULL,
                transaction_type TEXT NOT NULL,
                description TEXT,
                transaction_date TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_transactions_user_date
            ON transactions(user_id, transaction_date);
            "#,
        )
        .execute(pool)
        .await?;

        // Per-(budget, period) spending snapshots, unique on the window
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS spending_snapshots (
                budget_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                period_start TEXT NOT NULL,
                period_end TEXT NOT NULL,
                total_spent REAL NOT NULL,
                transaction_count INTEGER NOT NULL,
                last_updated TEXT NOT NULL,
                PRIMARY KEY (budget_id, period_start, period_end),
                FOREIGN KEY (budget_id) REFERENCES budgets (id)
            );
            "#,
        )
        .execute(pool)
        .await?;

        // Append-only alert log
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS budget_alerts (
                id TEXT PRIMARY KEY,
                budget_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                alert_type TEXT NOT NULL,
                current_spent REAL NOT NULL,
                budget_amount REAL NOT NULL,
                percentage_used REAL NOT NULL,
                message TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                email_sent INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                read_at TEXT,
                FOREIGN KEY (budget_id) REFERENCES budgets (id)
            );
            "#,
        )
        .execute(pool)
        .await?;

        // Index for the deduplication lookup (latest alert per budget/user/type)
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_alerts_dedup
            ON budget_alerts(budget_id, user_id, alert_type, created_at DESC);
            "#,
        )
        .execute(pool)
        .await?;

        // Notification preferences, one row per user
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notification_preferences (
                user_id TEXT PRIMARY KEY,
                email_alerts INTEGER NOT NULL DEFAULT 1,
                threshold_warning INTEGER,
                threshold_critical INTEGER,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_setup_is_idempotent() {
        let db = DbConnection::init_test().await.expect("Failed to init test DB");
        // Running setup again must not fail (CREATE TABLE IF NOT EXISTS)
        DbConnection::setup_schema(db.pool()).await.expect("Second setup failed");
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let db = DbConnection::init_test().await.expect("Failed to init test DB");

        // A snapshot for a budget that doesn't exist must be rejected
        let result = sqlx::query(
            r#"
            INSERT INTO spending_snapshots
                (budget_id, user_id, period_start, period_end, total_spent, transaction_count, last_updated)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind("budget::does-not-exist")
        .bind("user-1")
        .bind("2025-01-01T00:00:00.000Z")
        .bind("2025-01-31T23:59:59.000Z")
        .bind(0.0_f64)
        .bind(0_i64)
        .bind("2025-01-15T00:00:00.000Z")
        .execute(db.pool())
        .await;

        assert!(result.is_err(), "Expected foreign key violation");
    }
}
