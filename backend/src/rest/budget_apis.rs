//! # REST API for Budgets
//!
//! Endpoints for budget CRUD, manual checks, and snapshot recalculation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::info;
use serde::Deserialize;

use crate::rest::error_response;
use crate::AppState;
use shared::{ApiResponse, BudgetCheckRequest, CreateBudgetRequest, UpdateBudgetRequest};

#[derive(Debug, Deserialize)]
pub struct BudgetListQuery {
    pub user_id: String,
}

/// Create a new budget
pub async fn create_budget(
    State(state): State<AppState>,
    Json(request): Json<CreateBudgetRequest>,
) -> impl IntoResponse {
    info!("POST /api/budgets - request: {:?}", request);

    match state.budget_service.create_budget(request).await {
        Ok(budget) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok("Budget created", budget)),
        )
            .into_response(),
        Err(e) => error_response(e, "Error creating budget"),
    }
}

/// List a user's budgets
pub async fn list_budgets(
    State(state): State<AppState>,
    Query(query): Query<BudgetListQuery>,
) -> impl IntoResponse {
    info!("GET /api/budgets - user: {}", query.user_id);

    match state.budget_service.list_budgets(&query.user_id).await {
        Ok(budgets) => (StatusCode::OK, Json(ApiResponse::ok("Budgets", budgets))).into_response(),
        Err(e) => error_response(e, "Error listing budgets"),
    }
}

/// Fetch a single budget
pub async fn get_budget(
    State(state): State<AppState>,
    Path(budget_id): Path<String>,
) -> impl IntoResponse {
    info!("GET /api/budgets/{}", budget_id);

    match state.budget_service.get_budget(&budget_id).await {
        Ok(Some(budget)) => (StatusCode::OK, Json(ApiResponse::ok("Budget", budget))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(format!(
                "Budget {} not found",
                budget_id
            ))),
        )
            .into_response(),
        Err(e) => error_response(e, "Error fetching budget"),
    }
}

/// Apply a partial update to a budget
pub async fn update_budget(
    State(state): State<AppState>,
    Path(budget_id): Path<String>,
    Json(request): Json<UpdateBudgetRequest>,
) -> impl IntoResponse {
    info!("PUT /api/budgets/{} - request: {:?}", budget_id, request);

    match state.budget_service.update_budget(&budget_id, request).await {
        Ok(budget) => (StatusCode::OK, Json(ApiResponse::ok("Budget updated", budget))).into_response(),
        Err(e) => error_response(e, "Error updating budget"),
    }
}

/// Deactivate a budget. Alert history is kept; the budget just stops
/// matching new transactions.
pub async fn deactivate_budget(
    State(state): State<AppState>,
    Path(budget_id): Path<String>,
) -> impl IntoResponse {
    info!("DELETE /api/budgets/{}", budget_id);

    match state.budget_service.deactivate_budget(&budget_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::ok("Budget deactivated", ())),
        )
            .into_response(),
        Err(e) => error_response(e, "Error deactivating budget"),
    }
}

/// Manually run the alert pipeline for one budget
pub async fn check_budget(
    State(state): State<AppState>,
    Json(request): Json<BudgetCheckRequest>,
) -> impl IntoResponse {
    info!("POST /api/budgets/check - request: {:?}", request);

    match state.transaction_service.check_budget_now(request).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ApiResponse::ok("Budget checked", outcome)),
        )
            .into_response(),
        Err(e) => error_response(e, "Error checking budget"),
    }
}

/// Recompute a budget's spending snapshot from scratch
pub async fn recalculate_budget(
    State(state): State<AppState>,
    Path(budget_id): Path<String>,
) -> impl IntoResponse {
    info!("POST /api/budgets/{}/recalculate", budget_id);

    match state.budget_service.recalculate_spending(&budget_id).await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(ApiResponse::ok("Spending recalculated", snapshot)),
        )
            .into_response(),
        Err(e) => error_response(e, "Error recalculating spending"),
    }
}
