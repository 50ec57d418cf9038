use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::storage::connection::DbConnection;
use shared::{format_timestamp, parse_timestamp, SpendingSnapshot};

/// Repository for per-(budget, period) spending snapshot rows
#[derive(Clone)]
pub struct SpendingRepository {
    db: DbConnection,
}

impl SpendingRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Idempotent upsert keyed by (budget_id, period_start, period_end).
    /// On conflict the totals and last_updated are overwritten.
    pub async fn upsert_snapshot(&self, snapshot: &SpendingSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO spending_snapshots
                (budget_id, user_id, period_start, period_end, total_spent, transaction_count, last_updated)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (budget_id, period_start, period_end) DO UPDATE SET
                total_spent = excluded.total_spent,
                transaction_count = excluded.transaction_count,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(&snapshot.budget_id)
        .bind(&snapshot.user_id)
        .bind(format_timestamp(snapshot.period_start))
        .bind(format_timestamp(snapshot.period_end))
        .bind(snapshot.total_spent)
        .bind(snapshot.transaction_count)
        .bind(format_timestamp(snapshot.last_updated))
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Get the snapshot for a specific period window
    pub async fn get_snapshot(
        &self,
        budget_id: &str,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Option<SpendingSnapshot>> {
        let row = sqlx::query(
            r#"
            SELECT budget_id, user_id, period_start, period_end, total_spent, transaction_count, last_updated
            FROM spending_snapshots
            WHERE budget_id = ? AND period_start = ? AND period_end = ?
            "#,
        )
        .bind(budget_id)
        .bind(format_timestamp(period_start))
        .bind(format_timestamp(period_end))
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(r) => Ok(Some(SpendingSnapshot {
                budget_id: r.get("budget_id"),
                user_id: r.get("user_id"),
                period_start: parse_timestamp(r.get::<String, _>("period_start").as_str())?,
                period_end: parse_timestamp(r.get::<String, _>("period_end").as_str())?,
                total_spent: r.get("total_spent"),
                transaction_count: r.get("transaction_count"),
                last_updated: parse_timestamp(r.get::<String, _>("last_updated").as_str())?,
            })),
            None => Ok(None),
        }
    }

    /// Count snapshot rows for a budget (diagnostics and tests)
    pub async fn count_snapshots(&self, budget_id: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM spending_snapshots WHERE budget_id = ?")
            .bind(budget_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(row.get("n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::budget_repository::BudgetRepository;
    use chrono::TimeZone;
    use shared::{Budget, PeriodType};

    async fn seed_budget(db: &DbConnection, id: &str) {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let budget = Budget {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            category_id: None,
            name: "Groceries".to_string(),
            amount: 500.0,
            period_type: PeriodType::Monthly,
            start_date: now,
            end_date: Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap(),
            currency: "USD".to_string(),
            warning_threshold_pct: 80,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        BudgetRepository::new(db.clone()).store_budget(&budget).await.unwrap();
    }

    fn snapshot(budget_id: &str, total_spent: f64, transaction_count: i64) -> SpendingSnapshot {
        SpendingSnapshot {
            budget_id: budget_id.to_string(),
            user_id: "user-1".to_string(),
            period_start: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            period_end: Utc.with_ymd_and_hms(2025, 6, 30, 23, 59, 59).unwrap(),
            total_spent,
            transaction_count,
            last_updated: Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_period() {
        let db = DbConnection::init_test().await.unwrap();
        seed_budget(&db, "budget::1").await;
        let repo = SpendingRepository::new(db);

        repo.upsert_snapshot(&snapshot("budget::1", 100.0, 2)).await.unwrap();
        repo.upsert_snapshot(&snapshot("budget::1", 160.0, 3)).await.unwrap();

        // Still exactly one row for the period, holding the latest totals
        assert_eq!(repo.count_snapshots("budget::1").await.unwrap(), 1);

        let loaded = repo
            .get_snapshot(
                "budget::1",
                Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 6, 30, 23, 59, 59).unwrap(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.total_spent, 160.0);
        assert_eq!(loaded.transaction_count, 3);
    }

    #[tokio::test]
    async fn test_distinct_periods_get_distinct_rows() {
        let db = DbConnection::init_test().await.unwrap();
        seed_budget(&db, "budget::1").await;
        let repo = SpendingRepository::new(db);

        repo.upsert_snapshot(&snapshot("budget::1", 100.0, 2)).await.unwrap();

        let mut july = snapshot("budget::1", 40.0, 1);
        july.period_start = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        july.period_end = Utc.with_ymd_and_hms(2025, 7, 31, 23, 59, 59).unwrap();
        repo.upsert_snapshot(&july).await.unwrap();

        assert_eq!(repo.count_snapshots("budget::1").await.unwrap(), 2);
    }
}
