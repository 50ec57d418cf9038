use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::storage::connection::DbConnection;
use shared::{format_timestamp, parse_timestamp, LedgerTransaction, TransactionType};

/// Repository for ledger transaction operations
#[derive(Clone)]
pub struct TransactionRepository {
    db: DbConnection,
}

impl TransactionRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Store a committed transaction in the ledger
    pub async fn store_transaction(&self, transaction: &LedgerTransaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, user_id, category_id, amount, transaction_type, description,
                 transaction_date, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.user_id)
        .bind(&transaction.category_id)
        .bind(transaction.amount)
        .bind(transaction.transaction_type.as_str())
        .bind(&transaction.description)
        .bind(format_timestamp(transaction.transaction_date))
        .bind(format_timestamp(transaction.created_at))
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Retrieve a specific transaction by ID
    pub async fn get_transaction(&self, transaction_id: &str) -> Result<Option<LedgerTransaction>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, category_id, amount, transaction_type, description,
                   transaction_date, created_at
            FROM transactions
            WHERE id = ?
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(r) => {
                let type_str: String = r.get("transaction_type");
                let transaction_type = TransactionType::parse(&type_str)
                    .ok_or_else(|| anyhow!("Unknown transaction type in row: {}", type_str))?;
                Ok(Some(LedgerTransaction {
                    id: r.get("id"),
                    user_id: r.get("user_id"),
                    category_id: r.get("category_id"),
                    amount: r.get("amount"),
                    transaction_type,
                    description: r.get("description"),
                    transaction_date: parse_timestamp(r.get::<String, _>("transaction_date").as_str())?,
                    created_at: parse_timestamp(r.get::<String, _>("created_at").as_str())?,
                }))
            }
            None => Ok(None),
        }
    }

    /// Sum eligible expenses (positive-amount expense rows) inside a period
    /// window, optionally scoped to one category. A budget with no category
    /// aggregates every expense category.
    pub async fn aggregate_expenses(
        &self,
        user_id: &str,
        category_id: Option<&str>,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<(f64, i64)> {
        let start_str = format_timestamp(period_start);
        let end_str = format_timestamp(period_end);

        let row = if let Some(category_id) = category_id {
            sqlx::query(
                r#"
                SELECT COALESCE(SUM(amount), 0.0) AS total_spent, COUNT(*) AS transaction_count
                FROM transactions
                WHERE user_id = ?
                  AND category_id = ?
                  AND transaction_type = 'expense'
                  AND amount > 0
                  AND transaction_date >= ?
                  AND transaction_date <= ?
                "#,
            )
            .bind(user_id)
            .bind(category_id)
            .bind(&start_str)
            .bind(&end_str)
            .fetch_one(self.db.pool())
            .await?
        } else {
            sqlx::query(
                r#"
                SELECT COALESCE(SUM(amount), 0.0) AS total_spent, COUNT(*) AS transaction_count
                FROM transactions
                WHERE user_id = ?
                  AND transaction_type = 'expense'
                  AND amount > 0
                  AND transaction_date >= ?
                  AND transaction_date <= ?
                "#,
            )
            .bind(user_id)
            .bind(&start_str)
            .bind(&end_str)
            .fetch_one(self.db.pool())
            .await?
        };

        Ok((row.get("total_spent"), row.get("transaction_count")))
    }
}
