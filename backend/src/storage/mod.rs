//! # Storage Layer
//!
//! SQLite-backed persistence for the budget alert engine. One repository
//! per table, all sharing a pooled `DbConnection`. The schema is created
//! on startup with `CREATE TABLE IF NOT EXISTS` statements.

pub mod alert_repository;
pub mod budget_repository;
pub mod connection;
pub mod preferences_repository;
pub mod spending_repository;
pub mod transaction_repository;

pub use alert_repository::AlertRepository;
pub use budget_repository::BudgetRepository;
pub use connection::DbConnection;
pub use preferences_repository::PreferencesRepository;
pub use spending_repository::SpendingRepository;
pub use transaction_repository::TransactionRepository;
