//! Cart management.

use common::{BookId, CartItemId, UserId};
use domain::{CartItem, CartLine, DomainError, validate_quantity};
use store::{Store, UnitOfWork};

use crate::error::CheckoutError;

/// Cart operations for an authenticated user.
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists the user's cart items, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, user_id: UserId) -> Result<Vec<CartLine>, CheckoutError> {
        let mut unit = self.store.begin().await?;
        let lines = unit.list_cart_lines(user_id).await?;
        unit.commit().await?;
        Ok(lines)
    }

    /// Adds a book to the user's cart.
    ///
    /// Adding a book that is already in the cart increases its quantity and
    /// refreshes the captured price.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        book_id: BookId,
        quantity: i32,
    ) -> Result<CartLine, CheckoutError> {
        let quantity = validate_quantity(quantity)?;
        let mut unit = self.store.begin().await?;

        if unit.find_user(user_id).await?.is_none() {
            return Err(CheckoutError::not_found("User", user_id));
        }
        let book = unit
            .find_book(book_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("Book", book_id))?;
        if book.seller_id == user_id {
            return Err(DomainError::OwnBook(book_id).into());
        }

        let cart = unit.find_or_create_cart(user_id).await?;
        let item = match unit.find_cart_item_for_book(cart.id, book_id).await? {
            Some(mut existing) => {
                existing.add_quantity(quantity)?;
                existing.price_at_cart = book.price;
                existing
            }
            None => CartItem::new(cart.id, &book, quantity),
        };
        book.ensure_purchasable(item.quantity)?;

        unit.save_cart_item(&item).await?;
        unit.commit().await?;

        tracing::info!(cart_item_id = %item.id, quantity = item.quantity, "cart item saved");
        Ok(CartLine { item, book })
    }

    /// Replaces the quantity of a cart item.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        cart_item_id: CartItemId,
        quantity: i32,
    ) -> Result<CartLine, CheckoutError> {
        let quantity = validate_quantity(quantity)?;
        let mut unit = self.store.begin().await?;

        let CartLine { mut item, book } = find_owned_line(&mut unit, user_id, cart_item_id).await?;
        book.ensure_purchasable(quantity)?;
        item.quantity = quantity;

        unit.save_cart_item(&item).await?;
        unit.commit().await?;

        Ok(CartLine { item, book })
    }

    /// Removes an item from the user's cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        cart_item_id: CartItemId,
    ) -> Result<(), CheckoutError> {
        let mut unit = self.store.begin().await?;

        find_owned_line(&mut unit, user_id, cart_item_id).await?;
        unit.delete_cart_items(&[cart_item_id]).await?;
        unit.commit().await?;

        tracing::info!(%cart_item_id, "cart item removed");
        Ok(())
    }
}

async fn find_owned_line<U: UnitOfWork>(
    unit: &mut U,
    user_id: UserId,
    cart_item_id: CartItemId,
) -> Result<CartLine, CheckoutError> {
    unit.find_cart_lines(user_id, &[cart_item_id])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| CheckoutError::not_found("Cart item", cart_item_id))
}
