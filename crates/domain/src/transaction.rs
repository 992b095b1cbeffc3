//! Financial records written by a checkout.

use chrono::{DateTime, Utc};
use common::{BookId, OrderId, ShippingServiceId, TransactionId, UserId};
use serde::{Deserialize, Serialize};

use crate::checkout::{CheckoutQuote, OrderDraft};
use crate::money::Money;

/// Payment progress of a transaction as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Expired,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Expired => "EXPIRED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "EXPIRED" => Ok(PaymentStatus::Expired),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// The fee breakdown and totals of one checkout.
///
/// Not to be confused with a database transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub subtotal_price: Money,
    pub total_shipping_services_fee: Money,
    pub admin_fee: Money,
    pub discount: Money,
    pub payment_method_fee: Money,
    pub total_price: Money,
    pub payment_reference: String,
    pub payment_invoice_url: Option<String>,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Builds a pending transaction from a priced checkout.
    pub fn pending(
        user_id: UserId,
        quote: &CheckoutQuote,
        payment_reference: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new(),
            user_id,
            subtotal_price: quote.subtotal_price,
            total_shipping_services_fee: quote.total_shipping_services_fee,
            admin_fee: quote.admin_fee,
            discount: quote.discount,
            payment_method_fee: quote.payment_method_fee,
            total_price: quote.total_price,
            payment_reference: payment_reference.into(),
            payment_invoice_url: None,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One purchased cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub quantity: i32,
    pub shipping_service_id: ShippingServiceId,
    pub transaction_id: TransactionId,
    /// Line price plus this line's share of the seller's shipping fee.
    pub total_price: Money,
    pub price_sold: Money,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Stamps a priced draft with its owner and transaction.
    pub fn from_draft(draft: &OrderDraft, user_id: UserId, transaction_id: TransactionId) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            book_id: draft.book_id,
            quantity: draft.quantity,
            shipping_service_id: draft.shipping_service_id,
            transaction_id,
            total_price: draft.total_price,
            price_sold: draft.price_sold,
            created_at: Utc::now(),
        }
    }
}
