//! HTTP routes.

pub mod changes;
pub mod health;
pub mod metrics;
