//! Checkout error types.

use domain::DomainError;
use store::StoreError;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors surfaced by cart and checkout operations.
///
/// Each variant corresponds to one response class.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Malformed or inconsistent input.
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The request is valid but conflicts with current state, such as
    /// insufficient stock or a concurrent checkout of the same books.
    #[error("{0}")]
    Conflict(String),

    /// The payment gateway failed or timed out.
    #[error("Payment gateway error: {0}")]
    ExternalService(String),

    /// Anything else.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl CheckoutError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CheckoutError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::Validation(_) => "validation",
            CheckoutError::NotFound { .. } => "not_found",
            CheckoutError::Conflict(_) => "conflict",
            CheckoutError::ExternalService(_) => "external_service",
            CheckoutError::Unexpected(_) => "unexpected",
        }
    }
}

impl From<DomainError> for CheckoutError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::ShippingServiceNotFound(id) => {
                CheckoutError::not_found("Shipping service", id)
            }
            DomainError::BookUnavailable { .. } | DomainError::InsufficientStock { .. } => {
                CheckoutError::Conflict(err.to_string())
            }
            DomainError::EmptyCheckout
            | DomainError::DuplicateCartItem(_)
            | DomainError::InvalidId { .. }
            | DomainError::MultipleShippingServices { .. }
            | DomainError::InvalidQuantity { .. }
            | DomainError::QuantityOverflow { .. }
            | DomainError::AmountOverflow
            | DomainError::OwnBook(_) => CheckoutError::Validation(err.to_string()),
        }
    }
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SerializationFailure(_) | StoreError::InsufficientStock { .. } => {
                CheckoutError::Conflict(err.to_string())
            }
            StoreError::NotFound { entity, id } => CheckoutError::NotFound { entity, id },
            StoreError::InvalidQuantity { .. } => CheckoutError::Validation(err.to_string()),
            StoreError::Database(_)
            | StoreError::Migration(_)
            | StoreError::Corrupt(_)
            | StoreError::Simulated(_) => CheckoutError::Unexpected(err.to_string()),
        }
    }
}

impl From<GatewayError> for CheckoutError {
    fn from(err: GatewayError) -> Self {
        CheckoutError::ExternalService(err.to_string())
    }
}
