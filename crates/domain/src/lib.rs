//! Domain layer for the bookstore checkout service.
//!
//! This crate provides the core domain types including:
//! - Catalog entities (users, books, shipping services, payment methods)
//! - Carts and cart items with their price snapshot
//! - Checkout request validation and pure pricing (seller partitions, fee split)
//! - Transaction and order records produced by a checkout

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod money;
pub mod transaction;

pub use cart::{Cart, CartItem, CartLine, validate_quantity};
pub use catalog::{Book, BookStatus, PaymentMethod, ShippingService, User};
pub use checkout::{
    CheckoutCommand, CheckoutItemRequest, CheckoutLine, CheckoutPolicy, CheckoutQuote,
    CheckoutRequest, CheckoutSelection, OrderDraft, SellerPartition, partition_by_seller,
    price_checkout,
};
pub use error::DomainError;
pub use money::Money;
pub use transaction::{Order, PaymentStatus, Transaction};
