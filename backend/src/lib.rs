//! # Spendwatch Backend
//!
//! Budget threshold evaluation and alert deduplication engine.
//!
//! The backend follows a layered architecture:
//! ```text
//! REST layer (axum handlers)
//!     ↓
//! Domain layer (services, alert pipeline)
//!     ↓
//! Storage layer (SQLite repositories)
//! ```
//!
//! Committed ledger transactions enter through the REST layer and fan out
//! to every budget they affect: spending is re-aggregated, classified
//! against the warning/exceeded thresholds, deduplicated against recent
//! alert history, and emitted as alert records with best-effort email.

pub mod domain;
pub mod rest;
pub mod storage;

use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use log::info;
use tower_http::cors::{Any, CorsLayer};

use crate::domain::clock::SystemClock;
use crate::domain::{AlertService, BudgetService, TransactionService};
use crate::storage::DbConnection;

use anyhow::Result;

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState {
    pub budget_service: BudgetService,
    pub alert_service: AlertService,
    pub transaction_service: TransactionService,
}

/// Initialize the backend with all required services.
///
/// No email sender is wired in here: alerts are recorded with
/// `email_sent = false` unless a deployment constructs its own state with
/// an SMTP sender.
pub async fn initialize_backend() -> Result<AppState> {
    info!("Setting up database");
    let db = Arc::new(DbConnection::init().await?);

    info!("Setting up domain services");
    let clock = Arc::new(SystemClock);
    let budget_service = BudgetService::new(db.clone(), clock.clone());
    let alert_service = AlertService::new(db.clone(), budget_service.clone(), clock.clone(), None);
    let transaction_service = TransactionService::new(
        db.clone(),
        budget_service.clone(),
        alert_service.clone(),
        clock,
    );

    Ok(AppState {
        budget_service,
        alert_service,
        transaction_service,
    })
}

/// Create the axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router {
    // CORS setup to allow a local frontend to make requests
    let cors = CorsLayer::new()
        .allow_origin("http://localhost:8080".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/budgets", get(rest::list_budgets).post(rest::create_budget))
        .route(
            "/budgets/:budget_id",
            get(rest::get_budget)
                .put(rest::update_budget)
                .delete(rest::deactivate_budget),
        )
        .route("/budgets/check", post(rest::check_budget))
        .route(
            "/budgets/:budget_id/recalculate",
            post(rest::recalculate_budget),
        )
        .route("/transactions", post(rest::process_transaction))
        .route("/transactions/preview", post(rest::preview_impact))
        .route("/transactions/bulk", post(rest::process_bulk))
        .route("/alerts", get(rest::list_alerts))
        .route("/alerts/:alert_id/read", post(rest::mark_alert_read))
        .route(
            "/preferences",
            get(rest::get_preferences).put(rest::update_preferences),
        );

    Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .with_state(app_state)
}
