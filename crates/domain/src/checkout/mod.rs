//! Checkout input contract and pricing.

mod pricing;
mod request;

pub use pricing::{
    CheckoutLine, CheckoutPolicy, CheckoutQuote, OrderDraft, SellerPartition, partition_by_seller,
    price_checkout,
};
pub use request::{CheckoutCommand, CheckoutItemRequest, CheckoutRequest, CheckoutSelection};
