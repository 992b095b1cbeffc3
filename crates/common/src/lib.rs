//! Identifier types shared across the bookstore crates.

mod types;

pub use types::{
    BookId, CartId, CartItemId, OrderId, PaymentMethodId, ShippingServiceId, TransactionId, UserId,
};
