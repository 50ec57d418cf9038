use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How often a budget window rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
    /// Fixed window defined by the budget's own start/end dates
    Custom,
}

impl PeriodType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(PeriodType::Daily),
            "weekly" => Some(PeriodType::Weekly),
            "monthly" => Some(PeriodType::Monthly),
            "quarterly" => Some(PeriodType::Quarterly),
            "yearly" => Some(PeriodType::Yearly),
            "custom" => Some(PeriodType::Custom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Daily => "daily",
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
            PeriodType::Quarterly => "quarterly",
            PeriodType::Yearly => "yearly",
            PeriodType::Custom => "custom",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type of ledger transaction; only expenses affect budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
    Transfer,
}

impl TransactionType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(TransactionType::Income),
            "expense" => Some(TransactionType::Expense),
            "transfer" => Some(TransactionType::Transfer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
            TransactionType::Transfer => "transfer",
        }
    }
}

/// Severity category assigned by the threshold classifier.
///
/// Ordering matters: `Warning < Exceeded < Critical`. Classification is
/// monotonic in the percentage spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Warning,
    Exceeded,
    Critical,
}

impl AlertType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "warning" => Some(AlertType::Warning),
            "exceeded" => Some(AlertType::Exceeded),
            "critical" => Some(AlertType::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Warning => "warning",
            AlertType::Exceeded => "exceeded",
            AlertType::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A spending budget for a user, optionally scoped to one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Budget ID in format: "budget::<uuid>"
    pub id: String,
    pub user_id: String,
    /// Category this budget watches; None means all expense categories
    pub category_id: Option<String>,
    pub name: String,
    /// Budget limit in the budget's own currency
    pub amount: f64,
    pub period_type: PeriodType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// ISO 4217 currency code (e.g. "USD")
    pub currency: String,
    /// Percentage of the budget at which a warning alert fires (1-100)
    pub warning_threshold_pct: i64,
    /// Soft-delete flag; inactive budgets are never checked
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Denormalized per-(budget, period) spending snapshot.
///
/// Unique on (budget_id, period_start, period_end); refreshed by full
/// re-aggregation after every eligible transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingSnapshot {
    pub budget_id: String,
    pub user_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_spent: f64,
    pub transaction_count: i64,
    pub last_updated: DateTime<Utc>,
}

/// Aggregated spending for a budget's current period window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingSummary {
    pub total_spent: f64,
    pub transaction_count: i64,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

/// One emitted alert. Append-only except for the read flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAlert {
    /// Alert ID in format: "alert::<uuid>"
    pub id: String,
    pub budget_id: String,
    pub user_id: String,
    pub alert_type: AlertType,
    /// Spending total at the moment this alert was emitted
    pub current_spent: f64,
    /// Budget amount at the moment this alert was emitted
    pub budget_amount: f64,
    /// round(current_spent / budget_amount * 100, 2); 0 when amount <= 0
    pub percentage_used: f64,
    pub message: String,
    pub is_read: bool,
    pub email_sent: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// A committed ledger transaction, trusted as-is by the alert engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Transaction ID in format: "transaction::<uuid>"
    pub id: String,
    pub user_id: String,
    pub category_id: Option<String>,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub description: Option<String>,
    pub transaction_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Per-user alerting preferences; a missing row means alerts enabled
/// with the budget's own thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub user_id: String,
    pub email_alerts: bool,
    /// Optional override for the warning threshold percentage
    pub threshold_warning: Option<i64>,
    /// Read but not consulted by classification (critical is fixed at 100)
    pub threshold_critical: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBudgetRequest {
    pub user_id: String,
    pub category_id: Option<String>,
    pub name: String,
    pub amount: f64,
    /// One of: daily, weekly, monthly, quarterly, yearly, custom
    pub period_type: String,
    /// RFC 3339 timestamp
    pub start_date: String,
    /// RFC 3339 timestamp
    pub end_date: String,
    /// ISO 4217 code; defaults to "USD"
    pub currency: Option<String>,
    /// Defaults to 80 when not provided
    pub warning_threshold_pct: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateBudgetRequest {
    pub name: Option<String>,
    pub amount: Option<f64>,
    /// RFC 3339 timestamp
    pub end_date: Option<String>,
    pub warning_threshold_pct: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessTransactionRequest {
    pub user_id: String,
    pub category_id: Option<String>,
    pub amount: f64,
    /// One of: income, expense, transfer
    pub transaction_type: String,
    /// RFC 3339 timestamp; defaults to now
    pub transaction_date: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkProcessRequest {
    pub transactions: Vec<ProcessTransactionRequest>,
}

/// Manual "check this budget now" trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetCheckRequest {
    pub user_id: String,
    pub budget_id: String,
}

/// Outcome of checking one budget during the fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetCheckOutcome {
    pub budget_id: String,
    pub budget_name: String,
    pub alert_sent: bool,
    pub alert_type: Option<AlertType>,
    /// Set when this budget's processing failed; siblings are unaffected
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub budgets_checked: usize,
    pub alerts_sent: usize,
    pub total_budgets: usize,
}

/// Whether the fan-out ran or the transaction was ineligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Processed,
    /// Non-expense or non-positive amount; budgets untouched
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub transaction_id: String,
    pub status: ProcessingStatus,
    pub budget_checks: Vec<BudgetCheckOutcome>,
    pub summary: ProcessingSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemOutcome {
    pub index: usize,
    pub success: bool,
    pub result: Option<ProcessingResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkProcessingResult {
    pub results: Vec<BulkItemOutcome>,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewImpactRequest {
    pub user_id: String,
    pub category_id: Option<String>,
    pub amount: f64,
    /// RFC 3339 timestamp; defaults to now
    pub transaction_date: Option<String>,
}

/// Read-only projection of what an expense would do to one budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetImpactProjection {
    pub budget_id: String,
    pub budget_name: String,
    pub budget_amount: f64,
    pub current_spent: f64,
    pub projected_spent: f64,
    pub current_percentage: f64,
    pub projected_percentage: f64,
    pub would_trigger_alert: bool,
    pub projected_alert_type: Option<AlertType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewImpactResponse {
    pub impacts: Vec<BudgetImpactProjection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertListResponse {
    pub alerts: Vec<BudgetAlert>,
    pub unread_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePreferencesRequest {
    pub user_id: String,
    pub email_alerts: bool,
    pub threshold_warning: Option<i64>,
    pub threshold_critical: Option<i64>,
}

/// Standard response envelope: { success, message, data }
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Format a timestamp for storage: fixed-width RFC 3339 with milliseconds
/// and a "Z" suffix, so lexicographic order matches chronological order.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored or client-supplied RFC 3339 timestamp.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_roundtrip() {
        let dt = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let s = format_timestamp(dt);
        assert_eq!(s, "2025-03-14T09:26:53.000Z");
        assert_eq!(parse_timestamp(&s).unwrap(), dt);
    }

    #[test]
    fn test_timestamp_order_is_lexicographic() {
        let earlier = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 11, 2, 23, 59, 59).unwrap();
        assert!(format_timestamp(earlier) < format_timestamp(later));
    }

    #[test]
    fn test_period_type_parse() {
        assert_eq!(PeriodType::parse("monthly"), Some(PeriodType::Monthly));
        assert_eq!(PeriodType::parse("fortnightly"), None);
        assert_eq!(PeriodType::Quarterly.as_str(), "quarterly");
    }

    #[test]
    fn test_alert_type_ordering() {
        assert!(AlertType::Warning < AlertType::Exceeded);
        assert!(AlertType::Exceeded < AlertType::Critical);
    }

    #[test]
    fn test_alert_type_serde_lowercase() {
        let json = serde_json::to_string(&AlertType::Exceeded).unwrap();
        assert_eq!(json, "\"exceeded\"");
        let parsed: AlertType = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(parsed, AlertType::Warning);
    }
}
