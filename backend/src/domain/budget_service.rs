use anyhow::Result;
use log::info;
use std::sync::Arc;

use crate::domain::clock::Clock;
use crate::domain::{period, to_amount_or_zero, DomainError};
use crate::storage::{
    BudgetRepository, DbConnection, SpendingRepository, TransactionRepository,
};
use shared::{
    parse_timestamp, Budget, CreateBudgetRequest, PeriodType, SpendingSnapshot, SpendingSummary,
    UpdateBudgetRequest,
};

/// Service for budget management and the per-period spending cache.
///
/// Spending is always computed by full re-aggregation over the ledger,
/// never by applying an incremental delta, so a recompute after drift is
/// the same code path as the post-transaction refresh.
#[derive(Clone)]
pub struct BudgetService {
    budget_repository: BudgetRepository,
    spending_repository: SpendingRepository,
    transaction_repository: TransactionRepository,
    clock: Arc<dyn Clock>,
}

impl BudgetService {
    pub fn new(db: Arc<DbConnection>, clock: Arc<dyn Clock>) -> Self {
        Self {
            budget_repository: BudgetRepository::new((*db).clone()),
            spending_repository: SpendingRepository::new((*db).clone()),
            transaction_repository: TransactionRepository::new((*db).clone()),
            clock,
        }
    }

    /// Create a new budget
    pub async fn create_budget(&self, request: CreateBudgetRequest) -> Result<Budget> {
        info!("Creating budget: {:?}", request);

        if request.user_id.trim().is_empty() {
            return Err(DomainError::Validation("user_id is required".to_string()).into());
        }
        if request.name.trim().is_empty() {
            return Err(DomainError::Validation("Budget name cannot be empty".to_string()).into());
        }

        let amount = to_amount_or_zero(request.amount);
        if amount <= 0.0 {
            return Err(DomainError::Validation("Budget amount must be positive".to_string()).into());
        }

        let period_type = PeriodType::parse(&request.period_type).ok_or_else(|| {
            DomainError::Validation(format!("Invalid period type: {}", request.period_type))
        })?;

        let start_date = parse_timestamp(&request.start_date)
            .map_err(|_| DomainError::Validation("Invalid start_date".to_string()))?;
        let end_date = parse_timestamp(&request.end_date)
            .map_err(|_| DomainError::Validation("Invalid end_date".to_string()))?;
        if end_date <= start_date {
            return Err(
                DomainError::Validation("end_date must be after start_date".to_string()).into(),
            );
        }

        let warning_threshold_pct = request.warning_threshold_pct.unwrap_or(80);
        if !(1..=100).contains(&warning_threshold_pct) {
            return Err(DomainError::Validation(
                "warning_threshold_pct must be between 1 and 100".to_string(),
            )
            .into());
        }

        let now = self.clock.now();
        let budget = Budget {
            id: format!("budget::{}", uuid::Uuid::new_v4()),
            user_id: request.user_id,
            category_id: request.category_id,
            name: request.name.trim().to_string(),
            amount,
            period_type,
            start_date,
            end_date,
            currency: request.currency.unwrap_or_else(|| "USD".to_string()),
            warning_threshold_pct,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.budget_repository.store_budget(&budget).await?;
        info!("Created budget {} for user {}", budget.id, budget.user_id);
        Ok(budget)
    }

    /// Get a budget by ID
    pub async fn get_budget(&self, budget_id: &str) -> Result<Option<Budget>> {
        self.budget_repository.get_budget(budget_id).await
    }

    /// List all budgets for a user
    pub async fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>> {
        self.budget_repository.list_budgets(user_id).await
    }

    /// Apply a partial update to a budget
    pub async fn update_budget(
        &self,
        budget_id: &str,
        request: UpdateBudgetRequest,
    ) -> Result<Budget> {
        info!("Updating budget {}: {:?}", budget_id, request);

        let mut budget = self
            .budget_repository
            .get_budget(budget_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Budget {}", budget_id)))?;

        if let Some(name) = request.name {
            if name.trim().is_empty() {
                return Err(
                    DomainError::Validation("Budget name cannot be empty".to_string()).into(),
                );
            }
            budget.name = name.trim().to_string();
        }
        if let Some(amount) = request.amount {
            let amount = to_amount_or_zero(amount);
            if amount <= 0.0 {
                return Err(
                    DomainError::Validation("Budget amount must be positive".to_string()).into(),
                );
            }
            budget.amount = amount;
        }
        if let Some(end_date) = request.end_date {
            let end_date = parse_timestamp(&end_date)
                .map_err(|_| DomainError::Validation("Invalid end_date".to_string()))?;
            if end_date <= budget.start_date {
                return Err(
                    DomainError::Validation("end_date must be after start_date".to_string()).into(),
                );
            }
            budget.end_date = end_date;
        }
        if let Some(threshold) = request.warning_threshold_pct {
            if !(1..=100).contains(&threshold) {
                return Err(DomainError::Validation(
                    "warning_threshold_pct must be between 1 and 100".to_string(),
                )
                .into());
            }
            budget.warning_threshold_pct = threshold;
        }
        if let Some(is_active) = request.is_active {
            budget.is_active = is_active;
        }

        budget.updated_at = self.clock.now();
        self.budget_repository.update_budget(&budget).await?;
        Ok(budget)
    }

    /// Soft-delete a budget
    pub async fn deactivate_budget(&self, budget_id: &str) -> Result<()> {
        let changed = self
            .budget_repository
            .deactivate_budget(budget_id, self.clock.now())
            .await?;
        if !changed {
            return Err(DomainError::NotFound(format!("Budget {}", budget_id)).into());
        }
        info!("Deactivated budget {}", budget_id);
        Ok(())
    }

    /// Aggregate spending for the budget's current period window.
    ///
    /// Returns `None` when the budget has no current period (now is outside
    /// its active range); callers treat that as "nothing to update".
    pub async fn compute_spending(&self, budget: &Budget) -> Result<Option<SpendingSummary>> {
        let Some((period_start, period_end)) = period::current_period(budget, self.clock.now())
        else {
            return Ok(None);
        };

        let (total_spent, transaction_count) = self
            .transaction_repository
            .aggregate_expenses(
                &budget.user_id,
                budget.category_id.as_deref(),
                period_start,
                period_end,
            )
            .await?;

        Ok(Some(SpendingSummary {
            total_spent,
            transaction_count,
            period_start,
            period_end,
        }))
    }

    /// Re-aggregate the current period and upsert the spending snapshot.
    pub async fn refresh_spending(&self, budget: &Budget) -> Result<Option<SpendingSnapshot>> {
        let Some(summary) = self.compute_spending(budget).await? else {
            info!("Budget {} has no current period, skipping refresh", budget.id);
            return Ok(None);
        };

        let snapshot = SpendingSnapshot {
            budget_id: budget.id.clone(),
            user_id: budget.user_id.clone(),
            period_start: summary.period_start,
            period_end: summary.period_end,
            total_spent: summary.total_spent,
            transaction_count: summary.transaction_count,
            last_updated: self.clock.now(),
        };

        self.spending_repository.upsert_snapshot(&snapshot).await?;
        info!(
            "Refreshed spending for budget {}: {:.2} over {} transactions",
            budget.id, snapshot.total_spent, snapshot.transaction_count
        );
        Ok(Some(snapshot))
    }

    /// Drift-correction path: full recompute of a budget's snapshot from
    /// the ledger. Same aggregation as the post-transaction refresh.
    pub async fn recalculate_spending(&self, budget_id: &str) -> Result<Option<SpendingSnapshot>> {
        let budget = self
            .budget_repository
            .get_budget(budget_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Budget {}", budget_id)))?;

        self.refresh_spending(&budget).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::FixedClock;
    use crate::storage::TransactionRepository;
    use chrono::{TimeZone, Utc};
    use shared::{LedgerTransaction, TransactionType};

    fn create_request(user_id: &str) -> CreateBudgetRequest {
        CreateBudgetRequest {
            user_id: user_id.to_string(),
            category_id: Some("cat-food".to_string()),
            name: "Groceries".to_string(),
            amount: 500.0,
            period_type: "monthly".to_string(),
            start_date: "2025-01-01T00:00:00Z".to_string(),
            end_date: "2025-12-31T23:59:59Z".to_string(),
            currency: Some("USD".to_string()),
            warning_threshold_pct: Some(80),
        }
    }

    async fn setup() -> (BudgetService, Arc<DbConnection>, Arc<FixedClock>) {
        let db = Arc::new(DbConnection::init_test().await.unwrap());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap(),
        ));
        let service = BudgetService::new(db.clone(), clock.clone());
        (service, db, clock)
    }

    async fn store_expense(db: &DbConnection, id: &str, amount: f64, day: u32) {
        let date = Utc.with_ymd_and_hms(2025, 6, day, 10, 0, 0).unwrap();
        let tx = LedgerTransaction {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            category_id: Some("cat-food".to_string()),
            amount,
            transaction_type: TransactionType::Expense,
            description: None,
            transaction_date: date,
            created_at: date,
        };
        TransactionRepository::new(db.clone()).store_transaction(&tx).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_budget_applies_defaults() {
        let (service, _db, _clock) = setup().await;

        let mut request = create_request("user-1");
        request.currency = None;
        request.warning_threshold_pct = None;

        let budget = service.create_budget(request).await.unwrap();
        assert_eq!(budget.currency, "USD");
        assert_eq!(budget.warning_threshold_pct, 80);
        assert!(budget.is_active);
        assert!(budget.id.starts_with("budget::"));
    }

    #[tokio::test]
    async fn test_create_budget_validation() {
        let (service, _db, _clock) = setup().await;

        let mut bad_amount = create_request("user-1");
        bad_amount.amount = 0.0;
        assert!(service.create_budget(bad_amount).await.is_err());

        let mut bad_period = create_request("user-1");
        bad_period.period_type = "fortnightly".to_string();
        assert!(service.create_budget(bad_period).await.is_err());

        let mut bad_threshold = create_request("user-1");
        bad_threshold.warning_threshold_pct = Some(0);
        assert!(service.create_budget(bad_threshold).await.is_err());

        let mut bad_dates = create_request("user-1");
        bad_dates.end_date = "2024-01-01T00:00:00Z".to_string();
        assert!(service.create_budget(bad_dates).await.is_err());

        // NaN amounts are coerced to zero at the boundary and rejected
        let mut nan_amount = create_request("user-1");
        nan_amount.amount = f64::NAN;
        assert!(service.create_budget(nan_amount).await.is_err());
    }

    #[tokio::test]
    async fn test_update_budget_partial_fields() {
        let (service, _db, _clock) = setup().await;
        let budget = service.create_budget(create_request("user-1")).await.unwrap();

        let updated = service
            .update_budget(
                &budget.id,
                UpdateBudgetRequest {
                    name: None,
                    amount: Some(750.0),
                    end_date: None,
                    warning_threshold_pct: Some(90),
                    is_active: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Groceries");
        assert_eq!(updated.amount, 750.0);
        assert_eq!(updated.warning_threshold_pct, 90);

        let missing = service
            .update_budget(
                "budget::missing",
                UpdateBudgetRequest {
                    name: None,
                    amount: None,
                    end_date: None,
                    warning_threshold_pct: None,
                    is_active: None,
                },
            )
            .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_compute_spending_sums_current_period() {
        let (service, db, _clock) = setup().await;
        let budget = service.create_budget(create_request("user-1")).await.unwrap();

        store_expense(&db, "transaction::1", 120.0, 5).await;
        store_expense(&db, "transaction::2", 80.0, 14).await;

        let summary = service.compute_spending(&budget).await.unwrap().unwrap();
        assert_eq!(summary.total_spent, 200.0);
        assert_eq!(summary.transaction_count, 2);
        assert_eq!(
            summary.period_start,
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_compute_spending_outside_budget_range() {
        let (service, _db, clock) = setup().await;
        let budget = service.create_budget(create_request("user-1")).await.unwrap();

        clock.set(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap());
        let summary = service.compute_spending(&budget).await.unwrap();
        assert!(summary.is_none());
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent_recompute() {
        let (service, db, _clock) = setup().await;
        let budget = service.create_budget(create_request("user-1")).await.unwrap();

        store_expense(&db, "transaction::1", 120.0, 5).await;

        let first = service.refresh_spending(&budget).await.unwrap().unwrap();
        let second = service.refresh_spending(&budget).await.unwrap().unwrap();

        // No new transactions between refreshes: identical totals, one row
        assert_eq!(first.total_spent, second.total_spent);
        assert_eq!(first.transaction_count, second.transaction_count);

        let spending_repo = SpendingRepository::new((*db).clone());
        assert_eq!(spending_repo.count_snapshots(&budget.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recalculate_unknown_budget_is_not_found() {
        let (service, _db, _clock) = setup().await;
        let result = service.recalculate_spending("budget::missing").await;
        assert!(result.is_err());
    }
}
