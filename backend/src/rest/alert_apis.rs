//! # REST API for Alerts
//!
//! Endpoints for listing alert history and marking alerts read.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::info;
use serde::Deserialize;

use crate::rest::error_response;
use crate::AppState;
use shared::{AlertListResponse, ApiResponse};

#[derive(Debug, Deserialize)]
pub struct AlertListQuery {
    pub user_id: String,
    #[serde(default)]
    pub unread_only: bool,
}

/// List a user's alerts, newest first
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertListQuery>,
) -> impl IntoResponse {
    info!(
        "GET /api/alerts - user: {}, unread_only: {}",
        query.user_id, query.unread_only
    );

    match state
        .alert_service
        .list_alerts(&query.user_id, query.unread_only)
        .await
    {
        Ok((alerts, unread_count)) => (
            StatusCode::OK,
            Json(ApiResponse::ok(
                "Alerts",
                AlertListResponse {
                    alerts,
                    unread_count,
                },
            )),
        )
            .into_response(),
        Err(e) => error_response(e, "Error listing alerts"),
    }
}

/// Mark one alert as read
pub async fn mark_alert_read(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
) -> impl IntoResponse {
    info!("POST /api/alerts/{}/read", alert_id);

    match state.alert_service.mark_read(&alert_id).await {
        Ok(true) => (StatusCode::OK, Json(ApiResponse::ok("Alert marked read", ()))).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(format!(
                "Alert {} not found",
                alert_id
            ))),
        )
            .into_response(),
        Err(e) => error_response(e, "Error marking alert read"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::test_support::setup_test_state;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn test_list_alerts_handler_empty() {
        let state = setup_test_state().await;

        let response = list_alerts(
            State(state),
            Query(AlertListQuery {
                user_id: "user-1".to_string(),
                unread_only: false,
            }),
        )
        .await;
        assert_eq!(response.into_response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_mark_alert_read_not_found() {
        let state = setup_test_state().await;

        let response = mark_alert_read(State(state), Path("alert::missing".to_string())).await;
        assert_eq!(response.into_response().status(), StatusCode::NOT_FOUND);
    }
}
