use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::storage::connection::DbConnection;
use shared::{format_timestamp, NotificationPreferences};

/// Repository for per-user notification preferences
#[derive(Clone)]
pub struct PreferencesRepository {
    db: DbConnection,
}

impl PreferencesRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Store or replace a user's notification preferences
    pub async fn upsert_preferences(
        &self,
        preferences: &NotificationPreferences,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO notification_preferences
                (user_id, email_alerts, threshold_warning, threshold_critical, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&preferences.user_id)
        .bind(preferences.email_alerts)
        .bind(preferences.threshold_warning)
        .bind(preferences.threshold_critical)
        .bind(format_timestamp(updated_at))
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Get a user's notification preferences, if any exist
    pub async fn get_preferences(&self, user_id: &str) -> Result<Option<NotificationPreferences>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, email_alerts, threshold_warning, threshold_critical
            FROM notification_preferences
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(r) => Ok(Some(NotificationPreferences {
                user_id: r.get("user_id"),
                email_alerts: r.get("email_alerts"),
                threshold_warning: r.get("threshold_warning"),
                threshold_critical: r.get("threshold_critical"),
            })),
            None => Ok(None),
        }
    }
}
