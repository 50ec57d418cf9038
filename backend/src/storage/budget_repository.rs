use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::storage::connection::DbConnection;
use shared::{format_timestamp, parse_timestamp, Budget, PeriodType};

/// Repository for budget operations
#[derive(Clone)]
pub struct BudgetRepository {
    db: DbConnection,
}

impl BudgetRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Store a new budget in the database
    pub async fn store_budget(&self, budget: &Budget) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO budgets
                (id, user_id, category_id, name, amount, period_type, start_date, end_date,
                 currency, warning_threshold_pct, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&budget.id)
        .bind(&budget.user_id)
        .bind(&budget.category_id)
        .bind(&budget.name)
        .bind(budget.amount)
        .bind(budget.period_type.as_str())
        .bind(format_timestamp(budget.start_date))
        .bind(format_timestamp(budget.end_date))
        .bind(&budget.currency)
        .bind(budget.warning_threshold_pct)
        .bind(budget.is_active)
        .bind(format_timestamp(budget.created_at))
        .bind(format_timestamp(budget.updated_at))
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Get a specific budget by ID
    pub async fn get_budget(&self, budget_id: &str) -> Result<Option<Budget>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, category_id, name, amount, period_type, start_date, end_date,
                   currency, warning_threshold_pct, is_active, created_at, updated_at
            FROM budgets
            WHERE id = ?
            "#,
        )
        .bind(budget_id)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(r) => Ok(Some(budget_from_row(&r)?)),
            None => Ok(None),
        }
    }

    /// List all budgets for a user, newest first
    pub async fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, category_id, name, amount, period_type, start_date, end_date,
                   currency, warning_threshold_pct, is_active, created_at, updated_at
            FROM budgets
            WHERE user_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(budget_from_row).collect()
    }

    /// Find the active budgets a transaction could affect: category match
    /// or wildcard (NULL category), with the transaction date inside the
    /// budget's own start/end window.
    pub async fn find_active_budgets(
        &self,
        user_id: &str,
        category_id: Option<&str>,
        date: DateTime<Utc>,
    ) -> Result<Vec<Budget>> {
        let date_str = format_timestamp(date);

        let rows = if let Some(category_id) = category_id {
            sqlx::query(
                r#"
                SELECT id, user_id, category_id, name, amount, period_type, start_date, end_date,
                       currency, warning_threshold_pct, is_active, created_at, updated_at
                FROM budgets
                WHERE user_id = ?
                  AND is_active = 1
                  AND (category_id = ? OR category_id IS NULL)
                  AND start_date <= ?
                  AND end_date >= ?
                ORDER BY created_at ASC
                "#,
            )
            .bind(user_id)
            .bind(category_id)
            .bind(&date_str)
            .bind(&date_str)
            .fetch_all(self.db.pool())
            .await?
        } else {
            // A transaction with no category only matches wildcard budgets
            sqlx::query(
                r#"
                SELECT id, user_id, category_id, name, amount, period_type, start_date, end_date,
                       currency, warning_threshold_pct, is_active, created_at, updated_at
                FROM budgets
                WHERE user_id = ?
                  AND is_active = 1
                  AND category_id IS NULL
                  AND start_date <= ?
                  AND end_date >= ?
                ORDER BY created_at ASC
                "#,
            )
            .bind(user_id)
            .bind(&date_str)
            .bind(&date_str)
            .fetch_all(self.db.pool())
            .await?
        };

        rows.iter().map(budget_from_row).collect()
    }

    /// Update an existing budget (full row overwrite)
    pub async fn update_budget(&self, budget: &Budget) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE budgets
            SET name = ?, amount = ?, end_date = ?, warning_threshold_pct = ?,
                is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&budget.name)
        .bind(budget.amount)
        .bind(format_timestamp(budget.end_date))
        .bind(budget.warning_threshold_pct)
        .bind(budget.is_active)
        .bind(format_timestamp(budget.updated_at))
        .bind(&budget.id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete a budget by clearing its active flag
    pub async fn deactivate_budget(&self, budget_id: &str, updated_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE budgets SET is_active = 0, updated_at = ? WHERE id = ?",
        )
        .bind(format_timestamp(updated_at))
        .bind(budget_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn budget_from_row(row: &SqliteRow) -> Result<Budget> {
    let period_type_str: String = row.get("period_type");
    let period_type = PeriodType::parse(&period_type_str)
        .ok_or_else(|| anyhow!("Unknown period type in budgets row: {}", period_type_str))?;

    Ok(Budget {
        id: row.get("id"),
        user_id: row.get("user_id"),
        category_id: row.get("category_id"),
        name: row.get("name"),
        amount: row.get("amount"),
        period_type,
        start_date: parse_timestamp(row.get::<String, _>("start_date").as_str())?,
        end_date: parse_timestamp(row.get::<String, _>("end_date").as_str())?,
        currency: row.get("currency"),
        warning_threshold_pct: row.get("warning_threshold_pct"),
        is_active: row.get("is_active"),
        created_at: parse_timestamp(row.get::<String, _>("created_at").as_str())?,
        updated_at: parse_timestamp(row.get::<String, _>("updated_at").as_str())?,
    })
}
