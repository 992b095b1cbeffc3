//! Payment gateway trait and implementations.

mod memory;
mod xendit;

use async_trait::async_trait;
use domain::Money;
use serde::Serialize;
use thiserror::Error;

pub use memory::InMemoryPaymentGateway;
pub use xendit::XenditGateway;

/// Invoices stay payable for 48 hours.
pub const INVOICE_DURATION_SECS: u64 = 48 * 60 * 60;

/// Category attached to every invoice line.
pub const INVOICE_ITEM_CATEGORY: &str = "book";

/// One line of an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceItem {
    pub name: String,
    pub price: Money,
    pub quantity: i32,
    pub category: String,
    pub reference_id: String,
}

/// A request for a hosted payment invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceRequest {
    /// Our reference, the transaction id. Also used as the idempotency key.
    pub external_id: String,
    pub amount: Money,
    pub payer_email: String,
    pub currency: String,
    pub invoice_duration_secs: u64,
    /// Payment channels offered on the hosted page.
    pub payment_methods: Vec<String>,
    pub items: Vec<InvoiceItem>,
}

/// A created invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub id: String,
    pub invoice_url: String,
}

/// Errors returned by payment gateways.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The HTTP request could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-success status.
    #[error("Gateway rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The gateway refused to create the invoice.
    #[error("Invoice declined: {0}")]
    Declined(String),
}

/// Trait for hosted-invoice payment gateways.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates an invoice and returns its payer-facing URL.
    async fn create_invoice(&self, request: InvoiceRequest) -> Result<Invoice, GatewayError>;

    /// Looks up the invoice created for `external_id`, if any.
    async fn find_invoice(&self, external_id: &str) -> Result<Option<Invoice>, GatewayError>;

    /// Expires an invoice so it can no longer be paid.
    async fn expire_invoice(&self, invoice_id: &str) -> Result<(), GatewayError>;
}
