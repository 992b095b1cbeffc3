//! Catalog entities read by the cart and checkout flows.

use common::{BookId, PaymentMethodId, ShippingServiceId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;

/// A registered user. Buyers and sellers are both users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Sale status of a book listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookStatus {
    #[default]
    Available,
    Sold,
    Archived,
}

impl BookStatus {
    /// Returns the persisted representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "AVAILABLE",
            BookStatus::Sold => "SOLD",
            BookStatus::Archived => "ARCHIVED",
        }
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(BookStatus::Available),
            "SOLD" => Ok(BookStatus::Sold),
            "ARCHIVED" => Ok(BookStatus::Archived),
            other => Err(format!("unknown book status: {other}")),
        }
    }
}

/// A book listing owned by a seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub price: Money,
    pub stock: i32,
    pub status: BookStatus,
    pub seller_id: UserId,
}

impl Book {
    /// Creates an available listing.
    pub fn new(seller_id: UserId, title: impl Into<String>, price: Money, stock: i32) -> Self {
        Self {
            id: BookId::new(),
            title: title.into(),
            price,
            stock,
            status: BookStatus::Available,
            seller_id,
        }
    }

    /// Checks that `quantity` copies can be sold right now.
    pub fn ensure_purchasable(&self, quantity: i32) -> Result<(), DomainError> {
        if quantity < 1 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        if self.status != BookStatus::Available {
            return Err(DomainError::BookUnavailable {
                book_id: self.id,
                status: self.status,
            });
        }
        if quantity > self.stock {
            return Err(DomainError::InsufficientStock {
                book_id: self.id,
                requested: quantity,
                available: self.stock,
            });
        }
        Ok(())
    }
}

/// A shipping offering with a flat per-seller price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingService {
    pub id: ShippingServiceId,
    pub name: String,
    pub price: Money,
    pub estimation_time: String,
}

impl ShippingService {
    pub fn new(name: impl Into<String>, price: Money, estimation_time: impl Into<String>) -> Self {
        Self {
            id: ShippingServiceId::new(),
            name: name.into(),
            price,
            estimation_time: estimation_time.into(),
        }
    }
}

/// A payment method. Its name doubles as the gateway payment channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub name: String,
    pub fee: Money,
}

impl PaymentMethod {
    pub fn new(name: impl Into<String>, fee: Money) -> Self {
        Self {
            id: PaymentMethodId::new(),
            name: name.into(),
            fee,
        }
    }
}
