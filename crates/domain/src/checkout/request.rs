//! Checkout request body and its validated form.

use std::collections::HashSet;
use std::str::FromStr;

use common::{CartItemId, PaymentMethodId, ShippingServiceId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Raw checkout body as sent by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub cart_checkout_data: Vec<CheckoutItemRequest>,
    pub payment_method_id: String,
}

/// One `{cartItemId, shippingServiceId}` pair of the raw body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItemRequest {
    pub cart_item_id: String,
    pub shipping_service_id: String,
}

impl CheckoutRequest {
    /// Parses identifiers and checks the structural rules of a checkout.
    pub fn into_command(self) -> Result<CheckoutCommand, DomainError> {
        let items = self
            .cart_checkout_data
            .iter()
            .map(|item| {
                Ok(CheckoutSelection {
                    cart_item_id: parse_id("cartItemId", &item.cart_item_id)?,
                    shipping_service_id: parse_id("shippingServiceId", &item.shipping_service_id)?,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;
        let payment_method_id = parse_id("paymentMethodId", &self.payment_method_id)?;

        CheckoutCommand::new(items, payment_method_id)
    }
}

fn parse_id<T: FromStr>(field: &'static str, value: &str) -> Result<T, DomainError> {
    value.trim().parse().map_err(|_| DomainError::InvalidId {
        field,
        value: value.to_string(),
    })
}

/// A cart item chosen for checkout together with its shipping service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutSelection {
    pub cart_item_id: CartItemId,
    pub shipping_service_id: ShippingServiceId,
}

/// A validated checkout: non-empty, no cart item listed twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutCommand {
    items: Vec<CheckoutSelection>,
    payment_method_id: PaymentMethodId,
}

impl CheckoutCommand {
    pub fn new(
        items: Vec<CheckoutSelection>,
        payment_method_id: PaymentMethodId,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::EmptyCheckout);
        }
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(item.cart_item_id) {
                return Err(DomainError::DuplicateCartItem(item.cart_item_id));
            }
        }
        Ok(Self {
            items,
            payment_method_id,
        })
    }

    pub fn items(&self) -> &[CheckoutSelection] {
        &self.items
    }

    pub fn payment_method_id(&self) -> PaymentMethodId {
        self.payment_method_id
    }

    /// Cart item ids in request order.
    pub fn cart_item_ids(&self) -> Vec<CartItemId> {
        self.items.iter().map(|item| item.cart_item_id).collect()
    }

    /// Distinct shipping service ids in first-seen order.
    pub fn shipping_service_ids(&self) -> Vec<ShippingServiceId> {
        let mut seen = HashSet::new();
        self.items
            .iter()
            .map(|item| item.shipping_service_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}
