//! HTTP route handlers.

pub mod cart;
pub mod checkout;
pub mod health;
pub mod metrics;
pub mod transactions;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path segment into a typed id.
fn parse_id<T: FromStr>(field: &str, raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {field}: {raw}")))
}
