//! Domain error types.

use common::{BookId, CartItemId, ShippingServiceId, UserId};
use thiserror::Error;

use crate::catalog::BookStatus;

/// Errors raised by domain validation and pricing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A checkout was requested without any cart items.
    #[error("Checkout requires at least one cart item")]
    EmptyCheckout,

    /// The same cart item was listed more than once.
    #[error("Cart item {0} is listed more than once")]
    DuplicateCartItem(CartItemId),

    /// An identifier in the request could not be parsed.
    #[error("Invalid {field}: {value}")]
    InvalidId { field: &'static str, value: String },

    /// Items from one seller were given different shipping services.
    #[error("Items from the same seller must share one shipping method (seller {seller_id})")]
    MultipleShippingServices { seller_id: UserId },

    /// A line references a shipping service that was not loaded.
    #[error("Shipping service not found: {0}")]
    ShippingServiceNotFound(ShippingServiceId),

    /// Quantity must be at least one.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: i32 },

    /// Adding to a cart item would exceed the largest storable quantity.
    #[error("Quantity of book {book_id} cannot grow by {added}")]
    QuantityOverflow { book_id: BookId, added: i32 },

    /// A price or total does not fit the money type.
    #[error("Amount exceeds the supported range")]
    AmountOverflow,

    /// The book cannot be bought in its current status.
    #[error("Book {book_id} is not available (status {status})")]
    BookUnavailable { book_id: BookId, status: BookStatus },

    /// Not enough stock for the requested quantity.
    #[error("Insufficient stock for book {book_id}: requested {requested}, available {available}")]
    InsufficientStock {
        book_id: BookId,
        requested: i32,
        available: i32,
    },

    /// Sellers cannot put their own books in their cart.
    #[error("Book {0} belongs to the buyer")]
    OwnBook(BookId),
}
