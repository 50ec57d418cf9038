//! # Domain Layer
//!
//! Business logic for the budget alert engine.
//!
//! ## Module Organization
//!
//! - **budget_service**: Budget CRUD plus the spending aggregator and the
//!   per-period spending snapshot cache
//! - **alert_service**: Threshold classification, alert deduplication, and
//!   alert emission with best-effort email
//! - **transaction_service**: The per-transaction fan-out that drives a
//!   refresh/classify/dedup/emit pipeline for every affected budget
//! - **period**: Period window math (the only place it lives)
//! - **clock**: Injectable time source for the dedup cooldown logic
//! - **currency**: Display formatting for alert messages
//! - **email**: Best-effort outbound email behind a trait
//!
//! ## Key Rules
//!
//! - Only positive-amount expense transactions affect budgets
//! - An alert fires at the warning threshold (default 80%) and again at
//!   100%, deduplicated by a 24-hour cooldown that a 5-percentage-point
//!   spending jump can override
//! - Per-budget failures during the fan-out are isolated; one budget's
//!   error never aborts its siblings or the transaction itself

pub mod alert_service;
pub mod budget_service;
pub mod clock;
pub mod currency;
pub mod email;
pub mod period;
pub mod transaction_service;

pub use alert_service::AlertService;
pub use budget_service::BudgetService;
pub use clock::{Clock, SystemClock};
pub use transaction_service::TransactionService;

use thiserror::Error;

/// Errors the REST boundary maps to 4xx responses. Everything else is an
/// internal failure.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
}

/// Boundary conversion for money values: malformed numerics become zero
/// so the pure threshold functions can assume well-formed floats.
pub fn to_amount_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_amount_or_zero() {
        assert_eq!(to_amount_or_zero(12.5), 12.5);
        assert_eq!(to_amount_or_zero(-3.0), -3.0);
        assert_eq!(to_amount_or_zero(f64::NAN), 0.0);
        assert_eq!(to_amount_or_zero(f64::INFINITY), 0.0);
    }
}
