use anyhow::Result;
use log::{error, info};
use std::sync::Arc;

use crate::domain::alert_service::{
    classify_threshold, percentage_used, AlertService, CRITICAL_THRESHOLD_PCT,
};
use crate::domain::budget_service::BudgetService;
use crate::domain::clock::Clock;
use crate::domain::{to_amount_or_zero, DomainError};
use crate::storage::{BudgetRepository, DbConnection, TransactionRepository};
use shared::{
    parse_timestamp, Budget, BudgetCheckOutcome, BudgetCheckRequest, BudgetImpactProjection,
    BulkItemOutcome, BulkProcessRequest, BulkProcessingResult, LedgerTransaction,
    PreviewImpactRequest, PreviewImpactResponse, ProcessTransactionRequest, ProcessingResult,
    ProcessingStatus, ProcessingSummary, TransactionType,
};

/// Per-transaction fan-out: record the ledger row, then drive a
/// refresh/classify/dedup/emit pipeline for every budget the transaction
/// touches, with per-budget failure isolation.
#[derive(Clone)]
pub struct TransactionService {
    transaction_repository: TransactionRepository,
    budget_repository: BudgetRepository,
    budget_service: BudgetService,
    alert_service: AlertService,
    clock: Arc<dyn Clock>,
}

impl TransactionService {
    pub fn new(
        db: Arc<DbConnection>,
        budget_service: BudgetService,
        alert_service: AlertService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transaction_repository: TransactionRepository::new((*db).clone()),
            budget_repository: BudgetRepository::new((*db).clone()),
            budget_service,
            alert_service,
            clock,
        }
    }

    /// Record a transaction and run the budget fan-out.
    ///
    /// The ledger row is always written. Budgets are only touched for
    /// positive-amount expenses; income, transfers, and zero or negative
    /// amounts come back as a `skipped` result with no budget side effects.
    /// Per-budget failures are downgraded to result entries and never fail
    /// the transaction itself.
    pub async fn process_transaction(
        &self,
        request: ProcessTransactionRequest,
    ) -> Result<ProcessingResult> {
        if request.user_id.trim().is_empty() {
            return Err(DomainError::Validation("user_id is required".to_string()).into());
        }

        let transaction_type = TransactionType::parse(&request.transaction_type).ok_or_else(|| {
            DomainError::Validation(format!(
                "Invalid transaction_type: {}",
                request.transaction_type
            ))
        })?;

        let transaction_date = match &request.transaction_date {
            Some(raw) => parse_timestamp(raw).map_err(|_| {
                DomainError::Validation(format!("Invalid transaction_date: {}", raw))
            })?,
            None => self.clock.now(),
        };

        let amount = to_amount_or_zero(request.amount);

        let transaction = LedgerTransaction {
            id: format!("transaction::{}", uuid::Uuid::new_v4()),
            user_id: request.user_id.clone(),
            category_id: request.category_id.clone(),
            amount,
            transaction_type,
            description: request.description.clone(),
            transaction_date,
            created_at: self.clock.now(),
        };
        self.transaction_repository
            .store_transaction(&transaction)
            .await?;

        if transaction_type != TransactionType::Expense || amount <= 0.0 {
            info!(
                "Transaction {} is not a positive expense, skipping budget checks",
                transaction.id
            );
            return Ok(ProcessingResult {
                transaction_id: transaction.id,
                status: ProcessingStatus::Skipped,
                budget_checks: Vec::new(),
                summary: ProcessingSummary {
                    budgets_checked: 0,
                    alerts_sent: 0,
                    total_budgets: 0,
                },
            });
        }

        let budgets = self
            .budget_repository
            .find_active_budgets(
                &request.user_id,
                request.category_id.as_deref(),
                transaction_date,
            )
            .await?;

        // Uncategorized expenses update wildcard budget spending but never
        // raise alerts
        let allow_alerts = request.category_id.is_some();
        let (budget_checks, summary) = self.fan_out(&budgets, allow_alerts).await;

        info!(
            "Transaction {} fanned out to {} budgets, {} alerts sent",
            transaction.id, summary.total_budgets, summary.alerts_sent
        );

        Ok(ProcessingResult {
            transaction_id: transaction.id,
            status: ProcessingStatus::Processed,
            budget_checks,
            summary,
        })
    }

    /// Sequentially check each budget, isolating failures: one budget's
    /// error becomes its outcome entry and the remaining budgets still run.
    async fn fan_out(
        &self,
        budgets: &[Budget],
        allow_alerts: bool,
    ) -> (Vec<BudgetCheckOutcome>, ProcessingSummary) {
        let mut budget_checks = Vec::with_capacity(budgets.len());
        let mut budgets_checked = 0;
        let mut alerts_sent = 0;

        for budget in budgets {
            match self.check_budget(budget, allow_alerts).await {
                Ok((alert_sent, alert_type)) => {
                    budgets_checked += 1;
                    if alert_sent {
                        alerts_sent += 1;
                    }
                    budget_checks.push(BudgetCheckOutcome {
                        budget_id: budget.id.clone(),
                        budget_name: budget.name.clone(),
                        alert_sent,
                        alert_type,
                        error: None,
                    });
                }
                Err(e) => {
                    error!("Budget check failed for {}: {:#}", budget.id, e);
                    budget_checks.push(BudgetCheckOutcome {
                        budget_id: budget.id.clone(),
                        budget_name: budget.name.clone(),
                        alert_sent: false,
                        alert_type: None,
                        error: Some(format!("{:#}", e)),
                    });
                }
            }
        }

        let summary = ProcessingSummary {
            budgets_checked,
            alerts_sent,
            total_budgets: budgets.len(),
        };
        (budget_checks, summary)
    }

    /// Refresh one budget's spending snapshot and run the alert pipeline.
    async fn check_budget(
        &self,
        budget: &Budget,
        allow_alerts: bool,
    ) -> Result<(bool, Option<shared::AlertType>)> {
        let Some(snapshot) = self.budget_service.refresh_spending(budget).await? else {
            return Ok((false, None));
        };

        if !allow_alerts {
            return Ok((false, None));
        }

        let alert = self
            .alert_service
            .check_and_send_alerts(budget, snapshot.total_spent)
            .await?;

        Ok(match alert {
            Some(alert) => (true, Some(alert.alert_type)),
            None => (false, None),
        })
    }

    /// Manual "check this budget now" trigger
    pub async fn check_budget_now(&self, request: BudgetCheckRequest) -> Result<BudgetCheckOutcome> {
        let budget = self
            .budget_repository
            .get_budget(&request.budget_id)
            .await?
            .filter(|b| b.user_id == request.user_id)
            .ok_or_else(|| DomainError::NotFound(format!("Budget {}", request.budget_id)))?;

        let (alert_sent, alert_type) = self.check_budget(&budget, true).await?;
        Ok(BudgetCheckOutcome {
            budget_id: budget.id,
            budget_name: budget.name,
            alert_sent,
            alert_type,
            error: None,
        })
    }

    /// Project what an expense would do to each affected budget without
    /// writing anything. Uses the same thresholds as the live path.
    pub async fn preview_impact(
        &self,
        request: PreviewImpactRequest,
    ) -> Result<PreviewImpactResponse> {
        if request.user_id.trim().is_empty() {
            return Err(DomainError::Validation("user_id is required".to_string()).into());
        }

        let transaction_date = match &request.transaction_date {
            Some(raw) => parse_timestamp(raw).map_err(|_| {
                DomainError::Validation(format!("Invalid transaction_date: {}", raw))
            })?,
            None => self.clock.now(),
        };
        let amount = to_amount_or_zero(request.amount);

        let budgets = self
            .budget_repository
            .find_active_budgets(
                &request.user_id,
                request.category_id.as_deref(),
                transaction_date,
            )
            .await?;

        let mut impacts = Vec::with_capacity(budgets.len());
        for budget in &budgets {
            let current_spent = self
                .budget_service
                .compute_spending(budget)
                .await?
                .map(|s| s.total_spent)
                .unwrap_or(0.0);

            let budget_amount = to_amount_or_zero(budget.amount);
            let projected_spent = current_spent + amount;
            let current_percentage = percentage_used(current_spent, budget_amount);
            let projected_percentage = percentage_used(projected_spent, budget_amount);

            let warning = self.alert_service.effective_warning_threshold(budget).await?;
            let current_type = classify_threshold(current_percentage, warning, CRITICAL_THRESHOLD_PCT);
            let projected_type =
                classify_threshold(projected_percentage, warning, CRITICAL_THRESHOLD_PCT);

            impacts.push(BudgetImpactProjection {
                budget_id: budget.id.clone(),
                budget_name: budget.name.clone(),
                budget_amount,
                current_spent,
                projected_spent,
                current_percentage,
                projected_percentage,
                // Only crossing into a new, more severe band counts
                would_trigger_alert: projected_type > current_type,
                projected_alert_type: projected_type,
            });
        }

        Ok(PreviewImpactResponse { impacts })
    }

    /// Process a batch sequentially, collecting per-item outcomes without
    /// stopping on the first failure.
    pub async fn process_bulk(&self, request: BulkProcessRequest) -> Result<BulkProcessingResult> {
        let mut results = Vec::with_capacity(request.transactions.len());
        let mut succeeded = 0;
        let mut failed = 0;

        for (index, item) in request.transactions.into_iter().enumerate() {
            match self.process_transaction(item).await {
                Ok(result) => {
                    succeeded += 1;
                    results.push(BulkItemOutcome {
                        index,
                        success: true,
                        result: Some(result),
                        error: None,
                    });
                }
                Err(e) => {
                    error!("Bulk item {} failed: {:#}", index, e);
                    failed += 1;
                    results.push(BulkItemOutcome {
                        index,
                        success: false,
                        result: None,
                        error: Some(format!("{:#}", e)),
                    });
                }
            }
        }

        Ok(BulkProcessingResult {
            results,
            succeeded,
            failed,
        })
    }
}
