//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod audit;
pub mod budgets;
pub mod transactions;

// Re-export all handlers for use in router
pub use audit::*;
pub use budgets::*;
pub use transactions::*;
