//! Cart management and checkout for the bookstore.
//!
//! A checkout turns selected cart items into one transaction record and one
//! order per item, reserves stock, and registers a payment invoice with the
//! gateway. It runs as a single unit of work:
//! 1. Validate the user, cart items, shipping choices and payment method
//! 2. Price the checkout and record the transaction
//! 3. Create the gateway invoice
//! 4. Write orders, decrement stock, clear the cart items, commit
//!
//! Any failure rolls the unit back. An invoice created before a later failure
//! is expired again.

pub mod cart;
pub mod error;
pub mod gateway;
pub mod orchestrator;

pub use cart::CartService;
pub use error::CheckoutError;
pub use gateway::{
    GatewayError, InMemoryPaymentGateway, Invoice, InvoiceItem, InvoiceRequest, PaymentGateway,
    XenditGateway,
};
pub use orchestrator::{CheckoutOrchestrator, CheckoutOutcome};
