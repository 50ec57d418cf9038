//! # REST API for Transaction Processing
//!
//! Endpoints that feed committed ledger transactions into the budget
//! fan-out, plus the read-only impact preview and the bulk variant.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::info;

use crate::rest::error_response;
use crate::AppState;
use shared::{ApiResponse, BulkProcessRequest, PreviewImpactRequest, ProcessTransactionRequest};

/// Record a transaction and run budget checks for it.
///
/// Per-budget failures never surface as HTTP errors; they come back as
/// error entries inside the processing result.
pub async fn process_transaction(
    State(state): State<AppState>,
    Json(request): Json<ProcessTransactionRequest>,
) -> impl IntoResponse {
    info!("POST /api/transactions - request: {:?}", request);

    match state.transaction_service.process_transaction(request).await {
        Ok(result) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok("Transaction processed", result)),
        )
            .into_response(),
        Err(e) => error_response(e, "Error processing transaction"),
    }
}

/// Project what an expense would do to the user's budgets without
/// committing anything
pub async fn preview_impact(
    State(state): State<AppState>,
    Json(request): Json<PreviewImpactRequest>,
) -> impl IntoResponse {
    info!("POST /api/transactions/preview - request: {:?}", request);

    match state.transaction_service.preview_impact(request).await {
        Ok(response) => (
            StatusCode::OK,
            Json(ApiResponse::ok("Impact preview", response)),
        )
            .into_response(),
        Err(e) => error_response(e, "Error previewing impact"),
    }
}

/// Process a batch of transactions sequentially
pub async fn process_bulk(
    State(state): State<AppState>,
    Json(request): Json<BulkProcessRequest>,
) -> impl IntoResponse {
    info!(
        "POST /api/transactions/bulk - {} transactions",
        request.transactions.len()
    );

    match state.transaction_service.process_bulk(request).await {
        Ok(result) => (
            StatusCode::OK,
            Json(ApiResponse::ok("Bulk processing complete", result)),
        )
            .into_response(),
        Err(e) => error_response(e, "Error processing bulk transactions"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::test_support::setup_test_state;
    use axum::response::IntoResponse;

    fn expense_request(amount: f64) -> ProcessTransactionRequest {
        ProcessTransactionRequest {
            user_id: "user-1".to_string(),
            category_id: Some("cat-food".to_string()),
            amount,
            transaction_type: "expense".to_string(),
            transaction_date: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_process_transaction_handler() {
        let state = setup_test_state().await;

        let response = process_transaction(State(state), Json(expense_request(25.0))).await;
        assert_eq!(response.into_response().status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_process_transaction_invalid_type() {
        let state = setup_test_state().await;

        let request = ProcessTransactionRequest {
            transaction_type: "gift".to_string(),
            ..expense_request(25.0)
        };
        let response = process_transaction(State(state), Json(request)).await;
        assert_eq!(response.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_preview_impact_handler() {
        let state = setup_test_state().await;

        let response = preview_impact(
            State(state),
            Json(PreviewImpactRequest {
                user_id: "user-1".to_string(),
                category_id: Some("cat-food".to_string()),
                amount: 25.0,
                transaction_date: None,
            }),
        )
        .await;
        assert_eq!(response.into_response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_process_bulk_handler() {
        let state = setup_test_state().await;

        let response = process_bulk(
            State(state),
            Json(BulkProcessRequest {
                transactions: vec![expense_request(10.0), expense_request(20.0)],
            }),
        )
        .await;
        assert_eq!(response.into_response().status(), StatusCode::OK);
    }
}
