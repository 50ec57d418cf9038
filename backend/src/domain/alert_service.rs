use anyhow::Result;
use chrono::Duration;
use log::{info, warn};
use std::sync::Arc;

use crate::domain::budget_service::BudgetService;
use crate::domain::clock::Clock;
use crate::domain::currency::format_currency;
use crate::domain::email::EmailSender;
use crate::domain::{to_amount_or_zero, DomainError};
use crate::storage::{AlertRepository, BudgetRepository, DbConnection, PreferencesRepository};
use shared::{
    AlertType, Budget, BudgetAlert, NotificationPreferences, UpdatePreferencesRequest,
};

/// Spending percentage at which a budget is considered exceeded. Fixed,
/// not user-configurable; the preferences column of the same name is
/// deliberately ignored.
pub const CRITICAL_THRESHOLD_PCT: f64 = 100.0;

/// Warning threshold used when a budget carries no usable value.
pub const DEFAULT_WARNING_THRESHOLD_PCT: f64 = 80.0;

/// Minimum age of the previous same-type alert before a new one may fire
/// on time alone.
pub const ALERT_COOLDOWN_HOURS: i64 = 24;

/// Spending increase, in percentage points of the budget amount, that
/// overrides the cooldown. The boundary is inclusive: exactly 5.00% emits.
pub const SPENDING_JUMP_OVERRIDE_PCT: f64 = 5.0;

/// Share of the budget spent, rounded to two decimals. Zero for budgets
/// with a non-positive amount.
pub fn percentage_used(total_spent: f64, budget_amount: f64) -> f64 {
    if budget_amount <= 0.0 {
        return 0.0;
    }
    (total_spent / budget_amount * 100.0 * 100.0).round() / 100.0
}

/// Map a spending percentage to an alert category, or `None` below the
/// warning threshold. Pure; callers sanitize inputs first.
pub fn classify_threshold(
    percentage_used: f64,
    warning_threshold: f64,
    critical_threshold: f64,
) -> Option<AlertType> {
    if percentage_used >= critical_threshold {
        Some(AlertType::Exceeded)
    } else if percentage_used >= warning_threshold {
        Some(AlertType::Warning)
    } else {
        None
    }
}

/// Service for alert classification, deduplication, and emission.
#[derive(Clone)]
pub struct AlertService {
    alert_repository: AlertRepository,
    budget_repository: BudgetRepository,
    preferences_repository: PreferencesRepository,
    budget_service: BudgetService,
    clock: Arc<dyn Clock>,
    email_sender: Option<Arc<dyn EmailSender>>,
}

impl AlertService {
    pub fn new(
        db: Arc<DbConnection>,
        budget_service: BudgetService,
        clock: Arc<dyn Clock>,
        email_sender: Option<Arc<dyn EmailSender>>,
    ) -> Self {
        Self {
            alert_repository: AlertRepository::new((*db).clone()),
            budget_repository: BudgetRepository::new((*db).clone()),
            preferences_repository: PreferencesRepository::new((*db).clone()),
            budget_service,
            clock,
            email_sender,
        }
    }

    /// Classify the budget's spending level and emit an alert unless the
    /// user opted out or deduplication suppresses it.
    pub async fn check_and_send_alerts(
        &self,
        budget: &Budget,
        total_spent: f64,
    ) -> Result<Option<BudgetAlert>> {
        let preferences = self
            .preferences_repository
            .get_preferences(&budget.user_id)
            .await?;

        let current_spent = to_amount_or_zero(total_spent);
        let pct = percentage_used(current_spent, to_amount_or_zero(budget.amount));
        let warning = warning_threshold(budget, preferences.as_ref());

        let Some(alert_type) = classify_threshold(pct, warning, CRITICAL_THRESHOLD_PCT) else {
            return Ok(None);
        };

        // A missing preferences row means alerts are enabled
        if let Some(prefs) = &preferences {
            if !prefs.email_alerts {
                info!(
                    "User {} opted out of alerts, skipping {} for budget {}",
                    budget.user_id, alert_type, budget.id
                );
                return Ok(None);
            }
        }

        if self
            .should_suppress(&budget.id, &budget.user_id, alert_type)
            .await?
        {
            info!(
                "Suppressing duplicate {} alert for budget {}",
                alert_type, budget.id
            );
            return Ok(None);
        }

        let alert = self.emit_alert(budget, alert_type, current_spent).await?;
        Ok(Some(alert))
    }

    /// Deduplication decision: suppress a freshly classified alert when a
    /// recent same-type alert exists, unless spending jumped materially.
    ///
    /// This is an OR-gate over "enough time elapsed" and "spend jumped by
    /// at least 5 percentage points of the budget since the last alert".
    /// Budget amount and spending are re-read here rather than trusting
    /// the caller's values, so concurrent drift since the last alert is
    /// measured against current state.
    pub async fn should_suppress(
        &self,
        budget_id: &str,
        user_id: &str,
        alert_type: AlertType,
    ) -> Result<bool> {
        let Some(last_alert) = self
            .alert_repository
            .get_latest_alert(budget_id, user_id, alert_type)
            .await?
        else {
            return Ok(false);
        };

        let elapsed = self.clock.now() - last_alert.created_at;
        if elapsed >= Duration::hours(ALERT_COOLDOWN_HOURS) {
            return Ok(false);
        }

        // Inside the cooldown: only a material spending jump gets through.
        // A budget that disappeared mid-flight means skip, not error.
        let Some(budget) = self.budget_repository.get_budget(budget_id).await? else {
            warn!("Budget {} vanished during dedup check, suppressing", budget_id);
            return Ok(true);
        };

        let current_spent = self
            .budget_service
            .compute_spending(&budget)
            .await?
            .map(|s| s.total_spent)
            .unwrap_or(0.0);

        // Not clamped: a refund makes this negative and never overrides
        let spending_increase = current_spent - last_alert.current_spent;
        let amount = to_amount_or_zero(budget.amount);
        let percentage_increase = if amount > 0.0 {
            spending_increase / amount * 100.0
        } else {
            0.0
        };

        Ok(percentage_increase < SPENDING_JUMP_OVERRIDE_PCT)
    }

    /// Persist one alert record and attempt best-effort email delivery.
    /// Email failure is logged and never rolls back the record.
    pub async fn emit_alert(
        &self,
        budget: &Budget,
        alert_type: AlertType,
        current_spent: f64,
    ) -> Result<BudgetAlert> {
        let budget_amount = to_amount_or_zero(budget.amount);
        let pct = percentage_used(current_spent, budget_amount);
        let message = compose_message(budget, alert_type, current_spent, pct);

        let mut alert = BudgetAlert {
            id: format!("alert::{}", uuid::Uuid::new_v4()),
            budget_id: budget.id.clone(),
            user_id: budget.user_id.clone(),
            alert_type,
            current_spent,
            budget_amount,
            percentage_used: pct,
            message,
            is_read: false,
            email_sent: false,
            created_at: self.clock.now(),
            read_at: None,
        };

        self.alert_repository.store_alert(&alert).await?;
        info!(
            "Emitted {} alert {} for budget {} at {:.2}%",
            alert_type, alert.id, budget.id, pct
        );

        if let Some(sender) = &self.email_sender {
            let subject = format!("Budget alert: {}", budget.name);
            match sender.send_alert(&subject, &alert.message) {
                Ok(()) => {
                    alert.email_sent = true;
                    if let Err(e) = self.alert_repository.mark_email_sent(&alert.id).await {
                        warn!("Failed to record email flag for alert {}: {}", alert.id, e);
                    }
                }
                Err(e) => {
                    warn!("Failed to send alert email for budget {}: {}", budget.id, e);
                }
            }
        }

        Ok(alert)
    }

    /// Effective warning threshold for a budget, preference override
    /// included. The read-only impact preview uses this so its projections
    /// match what the live path would do.
    pub async fn effective_warning_threshold(&self, budget: &Budget) -> Result<f64> {
        let preferences = self
            .preferences_repository
            .get_preferences(&budget.user_id)
            .await?;
        Ok(warning_threshold(budget, preferences.as_ref()))
    }

    /// List a user's alerts, newest first
    pub async fn list_alerts(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<(Vec<BudgetAlert>, usize)> {
        let alerts = self.alert_repository.list_alerts(user_id, unread_only).await?;
        let unread_count = self.alert_repository.count_unread(user_id).await? as usize;
        Ok((alerts, unread_count))
    }

    /// Mark one alert as read
    pub async fn mark_read(&self, alert_id: &str) -> Result<bool> {
        self.alert_repository.mark_read(alert_id, self.clock.now()).await
    }

    /// Fetch a user's saved notification preferences, if any
    pub async fn get_preferences(&self, user_id: &str) -> Result<Option<NotificationPreferences>> {
        self.preferences_repository.get_preferences(user_id).await
    }

    /// Create or replace a user's notification preferences.
    pub async fn update_preferences(
        &self,
        request: UpdatePreferencesRequest,
    ) -> Result<NotificationPreferences> {
        if request.user_id.trim().is_empty() {
            return Err(DomainError::Validation("user_id is required".to_string()).into());
        }
        if let Some(threshold) = request.threshold_warning {
            if !(1..=100).contains(&threshold) {
                return Err(DomainError::Validation(
                    "threshold_warning must be between 1 and 100".to_string(),
                )
                .into());
            }
        }

        let preferences = NotificationPreferences {
            user_id: request.user_id,
            email_alerts: request.email_alerts,
            threshold_warning: request.threshold_warning,
            threshold_critical: request.threshold_critical,
        };
        self.preferences_repository
            .upsert_preferences(&preferences, self.clock.now())
            .await?;
        Ok(preferences)
    }
}

/// Effective warning threshold: preference override, then the budget's
/// own value, then the default when neither is usable.
fn warning_threshold(budget: &Budget, preferences: Option<&NotificationPreferences>) -> f64 {
    let configured = preferences
        .and_then(|p| p.threshold_warning)
        .unwrap_or(budget.warning_threshold_pct);
    if (1..=100).contains(&configured) {
        configured as f64
    } else {
        DEFAULT_WARNING_THRESHOLD_PCT
    }
}

fn compose_message(budget: &Budget, alert_type: AlertType, spent: f64, pct: f64) -> String {
    let spent_display = format_currency(spent, &budget.currency);
    let amount_display = format_currency(budget.amount, &budget.currency);

    match alert_type {
        AlertType::Warning => format!(
            "You've used {:.1}% of your {} budget \"{}\" ({} of {}).",
            pct, budget.period_type, budget.name, spent_display, amount_display
        ),
        AlertType::Exceeded => format!(
            "You've exceeded your {} budget \"{}\": {} spent of {} ({:.1}%).",
            budget.period_type, budget.name, spent_display, amount_display, pct
        ),
        AlertType::Critical => format!(
            "Critical: your {} budget \"{}\" is at {:.1}% ({} of {}).",
            budget.period_type, budget.name, pct, spent_display, amount_display
        ),
    }
}
