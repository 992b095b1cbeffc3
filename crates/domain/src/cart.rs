//! Cart and cart item types.

use chrono::{DateTime, Utc};
use common::{BookId, CartId, CartItemId, UserId};
use serde::{Deserialize, Serialize};

use crate::catalog::Book;
use crate::error::DomainError;
use crate::money::Money;

/// A user's persistent shopping cart. Each user has at most one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
}

impl Cart {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            id: CartId::new(),
            user_id,
        }
    }
}

/// A (book, quantity, price snapshot) line in a cart.
///
/// `price_at_cart` is captured when the book is added and is what checkout
/// charges, regardless of later changes to the book's live price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub book_id: BookId,
    pub quantity: i32,
    pub price_at_cart: Money,
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    pub fn new(cart_id: CartId, book: &Book, quantity: i32) -> Self {
        Self {
            id: CartItemId::new(),
            cart_id,
            book_id: book.id,
            quantity,
            price_at_cart: book.price,
            created_at: Utc::now(),
        }
    }

    /// Increases the quantity by `added`.
    pub fn add_quantity(&mut self, added: i32) -> Result<(), DomainError> {
        self.quantity = self
            .quantity
            .checked_add(added)
            .ok_or(DomainError::QuantityOverflow {
                book_id: self.book_id,
                added,
            })?;
        Ok(())
    }

    /// Returns `price_at_cart * quantity`.
    pub fn line_price(&self) -> Result<Money, DomainError> {
        self.price_at_cart
            .checked_multiply(self.quantity)
            .ok_or(DomainError::AmountOverflow)
    }
}

/// A cart item joined with the book it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item: CartItem,
    pub book: Book,
}

/// Rejects quantities below one.
pub fn validate_quantity(quantity: i32) -> Result<i32, DomainError> {
    if quantity < 1 {
        return Err(DomainError::InvalidQuantity { quantity });
    }
    Ok(quantity)
}
