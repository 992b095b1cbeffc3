//! Checkout pricing.
//!
//! Lines are grouped by the seller of their book. Each seller ships with
//! exactly one shipping service whose flat price is charged once per seller
//! and spread over that seller's lines.

use std::collections::{BTreeMap, HashMap};

use common::{BookId, ShippingServiceId, UserId};

use crate::cart::CartItem;
use crate::catalog::{Book, PaymentMethod, ShippingService};
use crate::error::DomainError;
use crate::money::Money;

/// Fee policy applied to every checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutPolicy {
    pub admin_fee: Money,
    pub discount: Money,
}

impl CheckoutPolicy {
    pub const DEFAULT_ADMIN_FEE: Money = Money::new(2500);
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        Self {
            admin_fee: Self::DEFAULT_ADMIN_FEE,
            discount: Money::zero(),
        }
    }
}

/// A cart item being checked out with its book and chosen shipping service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub item: CartItem,
    pub book: Book,
    pub shipping_service_id: ShippingServiceId,
}

/// The lines of one seller, by index into the checkout lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerPartition {
    pub seller_id: UserId,
    pub shipping_service_id: ShippingServiceId,
    pub line_indices: Vec<usize>,
}

/// Groups lines by seller in first-seen order.
///
/// Fails if one seller's lines name more than one shipping service.
pub fn partition_by_seller(lines: &[CheckoutLine]) -> Result<Vec<SellerPartition>, DomainError> {
    let mut partitions: Vec<SellerPartition> = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        let seller_id = line.book.seller_id;
        match partitions.iter_mut().find(|p| p.seller_id == seller_id) {
            Some(partition) => {
                if partition.shipping_service_id != line.shipping_service_id {
                    return Err(DomainError::MultipleShippingServices { seller_id });
                }
                partition.line_indices.push(index);
            }
            None => partitions.push(SellerPartition {
                seller_id,
                shipping_service_id: line.shipping_service_id,
                line_indices: vec![index],
            }),
        }
    }

    Ok(partitions)
}

/// A priced order line awaiting its transaction id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub book_id: BookId,
    pub quantity: i32,
    pub shipping_service_id: ShippingServiceId,
    /// `price_sold * quantity`.
    pub line_price: Money,
    pub shipping_share: Money,
    pub total_price: Money,
    pub price_sold: Money,
}

/// Totals and order drafts of a priced checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutQuote {
    pub subtotal_price: Money,
    pub total_shipping_services_fee: Money,
    pub admin_fee: Money,
    pub discount: Money,
    pub payment_method_fee: Money,
    pub total_price: Money,
    pub orders: Vec<OrderDraft>,
}

impl CheckoutQuote {
    /// Summed purchased quantity per distinct book.
    pub fn stock_requirements(&self) -> BTreeMap<BookId, i32> {
        let mut requirements = BTreeMap::new();
        for order in &self.orders {
            *requirements.entry(order.book_id).or_insert(0) += order.quantity;
        }
        requirements
    }
}

/// Prices a checkout.
///
/// `total_price = subtotal + shipping + admin fee - discount`. The payment
/// method fee is recorded on the quote but not added to the total.
pub fn price_checkout(
    lines: &[CheckoutLine],
    shipping_services: &HashMap<ShippingServiceId, ShippingService>,
    payment_method: &PaymentMethod,
    policy: &CheckoutPolicy,
) -> Result<CheckoutQuote, DomainError> {
    if lines.is_empty() {
        return Err(DomainError::EmptyCheckout);
    }

    let partitions = partition_by_seller(lines)?;

    let mut shares = vec![Money::zero(); lines.len()];
    let mut total_shipping_services_fee = Money::zero();
    for partition in &partitions {
        let service = shipping_services
            .get(&partition.shipping_service_id)
            .ok_or(DomainError::ShippingServiceNotFound(
                partition.shipping_service_id,
            ))?;
        total_shipping_services_fee += service.price;

        let split = service.price.split(partition.line_indices.len());
        for (&index, share) in partition.line_indices.iter().zip(split) {
            if let Some(slot) = shares.get_mut(index) {
                *slot = share;
            }
        }
    }

    let mut subtotal_price = Money::zero();
    let mut orders = Vec::with_capacity(lines.len());
    for (line, shipping_share) in lines.iter().zip(shares) {
        let line_price = line.item.line_price()?;
        subtotal_price = subtotal_price
            .checked_add(line_price)
            .ok_or(DomainError::AmountOverflow)?;
        orders.push(OrderDraft {
            book_id: line.book.id,
            quantity: line.item.quantity,
            shipping_service_id: line.shipping_service_id,
            line_price,
            shipping_share,
            total_price: line_price
                .checked_add(shipping_share)
                .ok_or(DomainError::AmountOverflow)?,
            price_sold: line.item.price_at_cart,
        });
    }

    let total_price = subtotal_price
        .checked_add(total_shipping_services_fee)
        .and_then(|total| total.checked_add(policy.admin_fee))
        .ok_or(DomainError::AmountOverflow)?
        - policy.discount;

    Ok(CheckoutQuote {
        subtotal_price,
        total_shipping_services_fee,
        admin_fee: policy.admin_fee,
        discount: policy.discount,
        payment_method_fee: payment_method.fee,
        total_price,
        orders,
    })
}
