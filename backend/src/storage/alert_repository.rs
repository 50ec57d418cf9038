use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::storage::connection::DbConnection;
use shared::{format_timestamp, parse_timestamp, AlertType, BudgetAlert};

/// Repository for the append-only budget alert log
#[derive(Clone)]
pub struct AlertRepository {
    db: DbConnection,
}

impl AlertRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Append one alert record
    pub async fn store_alert(&self, alert: &BudgetAlert) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO budget_alerts
                (id, budget_id, user_id, alert_type, current_spent, budget_amount,
                 percentage_used, message, is_read, email_sent, created_at, read_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&alert.id)
        .bind(&alert.budget_id)
        .bind(&alert.user_id)
        .bind(alert.alert_type.as_str())
        .bind(alert.current_spent)
        .bind(alert.budget_amount)
        .bind(alert.percentage_used)
        .bind(&alert.message)
        .bind(alert.is_read)
        .bind(alert.email_sent)
        .bind(format_timestamp(alert.created_at))
        .bind(alert.read_at.map(format_timestamp))
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// The single most recent alert for (budget, user, type), regardless of
    /// age. This is the row the deduplication decision runs against.
    pub async fn get_latest_alert(
        &self,
        budget_id: &str,
        user_id: &str,
        alert_type: AlertType,
    ) -> Result<Option<BudgetAlert>> {
        let row = sqlx::query(
            r#"
            SELECT id, budget_id, user_id, alert_type, current_spent, budget_amount,
                   percentage_used, message, is_read, email_sent, created_at, read_at
            FROM budget_alerts
            WHERE budget_id = ? AND user_id = ? AND alert_type = ?
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(budget_id)
        .bind(user_id)
        .bind(alert_type.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(r) => Ok(Some(alert_from_row(&r)?)),
            None => Ok(None),
        }
    }

    /// List a user's alerts, newest first
    pub async fn list_alerts(&self, user_id: &str, unread_only: bool) -> Result<Vec<BudgetAlert>> {
        let rows = if unread_only {
            sqlx::query(
                r#"
                SELECT id, budget_id, user_id, alert_type, current_spent, budget_amount,
                       percentage_used, message, is_read, email_sent, created_at, read_at
                FROM budget_alerts
                WHERE user_id = ? AND is_read = 0
                ORDER BY created_at DESC
                "#,
            )
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?
        } else {
            sqlx::query(
                r#"
                SELECT id, budget_id, user_id, alert_type, current_spent, budget_amount,
                       percentage_used, message, is_read, email_sent, created_at, read_at
                FROM budget_alerts
                WHERE user_id = ?
                ORDER BY created_at DESC
                "#,
            )
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?
        };

        rows.iter().map(alert_from_row).collect()
    }

    /// Count a user's unread alerts
    pub async fn count_unread(&self, user_id: &str) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM budget_alerts WHERE user_id = ? AND is_read = 0",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(row.get("n"))
    }

    /// Mark one alert as read. The only mutation the log permits.
    pub async fn mark_read(&self, alert_id: &str, read_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE budget_alerts SET is_read = 1, read_at = ? WHERE id = ?",
        )
        .bind(format_timestamp(read_at))
        .bind(alert_id)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip the email flag after a successful best-effort send
    pub async fn mark_email_sent(&self, alert_id: &str) -> Result<()> {
        sqlx::query("UPDATE budget_alerts SET email_sent = 1 WHERE id = ?")
            .bind(alert_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}

fn alert_from_row(row: &SqliteRow) -> Result<BudgetAlert> {
    let type_str: String = row.get("alert_type");
    let alert_type = AlertType::parse(&type_str)
        .ok_or_else(|| anyhow!("Unknown alert type in budget_alerts row: {}", type_str))?;

    let read_at: Option<String> = row.get("read_at");
    let read_at = match read_at {
        Some(s) => Some(parse_timestamp(&s)?),
        None => None,
    };

    Ok(BudgetAlert {
        id: row.get("id"),
        budget_id: row.get("budget_id"),
        user_id: row.get("user_id"),
        alert_type,
        current_spent: row.get("current_spent"),
        budget_amount: row.get("budget_amount"),
        percentage_used: row.get("percentage_used"),
        message: row.get("message"),
        is_read: row.get("is_read"),
        email_sent: row.get("email_sent"),
        created_at: parse_timestamp(row.get::<String, _>("created_at").as_str())?,
        read_at,
    })
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

    fn alert(id: &str, alert_type: AlertType, hour: u32) -> BudgetAlert {
        BudgetAlert {
            id: id.to_string(),
            budget_id: "budget::1".to_string(),
            user_id: "user-1".to_string(),
            alert_type,
            current_spent: 410.0,
            budget_amount: 500.0,
            percentage_used: 82.0,
            message: "Budget warning".to_string(),
            is_read: false,
            email_sent: false,
            created_at: Utc.with_ymd_and_hms(2025, 6, 10, hour, 0, 0).unwrap(),
            read_at: None,
        }
    }

    #[tokio::test]
    async fn test_latest_alert_is_per_type_and_newest() {
        let db = DbConnection::init_test().await.unwrap();
        seed_budget(&db, "budget::1").await;
        let repo = AlertRepository::new(db);

        repo.store_alert(&alert("alert::1", AlertType::Warning, 8)).await.unwrap();
        repo.store_alert(&alert("alert::2", AlertType::Warning, 14)).await.unwrap();
        repo.store_alert(&alert("alert::3", AlertType::Exceeded, 10)).await.unwrap();

        let latest = repo
            .get_latest_alert("budget::1", "user-1", AlertType::Warning)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, "alert::2");

        let latest = repo
            .get_latest_alert("budget::1", "user-1", AlertType::Exceeded)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, "alert::3");

        let none = repo
            .get_latest_alert("budget::1", "user-1", AlertType::Critical)
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_mark_read_and_unread_count() {
        let db = DbConnection::init_test().await.unwrap();
        seed_budget(&db, "budget::1").await;
        let repo = AlertRepository::new(db);

        repo.store_alert(&alert("alert::1", AlertType::Warning, 8)).await.unwrap();
        repo.store_alert(&alert("alert::2", AlertType::Exceeded, 9)).await.unwrap();

        assert_eq!(repo.count_unread("user-1").await.unwrap(), 2);

        let read_at = Utc.with_ymd_and_hms(2025, 6, 11, 9, 0, 0).unwrap();
        assert!(repo.mark_read("alert::1", read_at).await.unwrap());
        assert!(!repo.mark_read("alert::missing", read_at).await.unwrap());

        assert_eq!(repo.count_unread("user-1").await.unwrap(), 1);

        let unread = repo.list_alerts("user-1", true).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, "alert::2");

        let all = repo.list_alerts("user-1", false).await.unwrap();
        assert_eq!(all.len(), 2);
        let read = all.iter().find(|a| a.id == "alert::1").unwrap();
        assert!(read.is_read);
        assert_eq!(read.read_at, Some(read_at));
    }
}
