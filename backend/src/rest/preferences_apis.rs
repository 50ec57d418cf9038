//! # REST API for Notification Preferences

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::info;
use serde::Deserialize;

use crate::rest::error_response;
use crate::AppState;
use shared::{ApiResponse, UpdatePreferencesRequest};

#[derive(Debug, Deserialize)]
pub struct PreferencesQuery {
    pub user_id: String,
}

/// Fetch a user's notification preferences. A user with no saved row gets
/// `data: null`; the engine treats that as alerts enabled with defaults.
pub async fn get_preferences(
    State(state): State<AppState>,
    Query(query): Query<PreferencesQuery>,
) -> impl IntoResponse {
    info!("GET /api/preferences - user: {}", query.user_id);

    match state.alert_service.get_preferences(&query.user_id).await {
        Ok(preferences) => (
            StatusCode::OK,
            Json(ApiResponse::ok("Preferences", preferences)),
        )
            .into_response(),
        Err(e) => error_response(e, "Error fetching preferences"),
    }
}

/// Create or replace a user's notification preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    Json(request): Json<UpdatePreferencesRequest>,
) -> impl IntoResponse {
    info!("PUT /api/preferences - request: {:?}", request);

    match state.alert_service.update_preferences(request).await {
        Ok(preferences) => (
            StatusCode::OK,
            Json(ApiResponse::ok("Preferences updated", preferences)),
        )
            .into_response(),
        Err(e) => error_response(e, "Error updating preferences"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::test_support::setup_test_state;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn test_update_then_get_preferences() {
        let state = setup_test_state().await;

        let response = update_preferences(
            State(state.clone()),
            Json(UpdatePreferencesRequest {
                user_id: "user-1".to_string(),
                email_alerts: true,
                threshold_warning: Some(75),
                threshold_critical: None,
            }),
        )
        .await;
        assert_eq!(response.into_response().status(), StatusCode::OK);

        let response = get_preferences(
            State(state),
            Query(PreferencesQuery {
                user_id: "user-1".to_string(),
            }),
        )
        .await;
        assert_eq!(response.into_response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_update_preferences_invalid_threshold() {
        let state = setup_test_state().await;

        let response = update_preferences(
            State(state),
            Json(UpdatePreferencesRequest {
                user_id: "user-1".to_string(),
                email_alerts: true,
                threshold_warning: Some(0),
                threshold_critical: None,
            }),
        )
        .await;
        assert_eq!(response.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
