use async_trait::async_trait;
use common::{
    BookId, CartId, CartItemId, PaymentMethodId, ShippingServiceId, TransactionId, UserId,
};
use domain::{Book, Cart, CartItem, CartLine, Order, PaymentMethod, ShippingService, Transaction, User};

use crate::Result;

/// A source of units of work.
#[async_trait]
pub trait Store: Send + Sync {
    type Unit: UnitOfWork;

    /// Starts a new unit of work.
    ///
    /// Units are isolated from each other as if they ran one after another.
    /// Implementations that cannot guarantee that report conflicts as
    /// [`StoreError::SerializationFailure`](crate::StoreError::SerializationFailure).
    async fn begin(&self) -> Result<Self::Unit>;
}

/// One atomic unit of reads and writes.
///
/// Nothing written through a unit is visible to other units until
/// [`commit`](UnitOfWork::commit) succeeds. Dropping a unit rolls it back.
#[async_trait]
pub trait UnitOfWork: Send {
    // -- Users --

    async fn find_user(&mut self, id: UserId) -> Result<Option<User>>;

    async fn insert_user(&mut self, user: &User) -> Result<()>;

    // -- Books --

    async fn find_book(&mut self, id: BookId) -> Result<Option<Book>>;

    /// Loads the given books and locks them until the unit ends.
    async fn lock_books(&mut self, ids: &[BookId]) -> Result<Vec<Book>>;

    async fn insert_book(&mut self, book: &Book) -> Result<()>;

    /// Decrements stock by `quantity`.
    ///
    /// Fails with `InsufficientStock` instead of going below zero, and with
    /// `InvalidQuantity` when `quantity` is not positive.
    async fn decrement_stock(&mut self, id: BookId, quantity: i32) -> Result<()>;

    // -- Carts --

    /// Returns the user's cart, creating it on first use.
    async fn find_or_create_cart(&mut self, user_id: UserId) -> Result<Cart>;

    /// Loads the listed cart items that belong to the user's cart, joined
    /// with their books. Ids outside the user's cart are skipped.
    async fn find_cart_lines(&mut self, user_id: UserId, ids: &[CartItemId])
    -> Result<Vec<CartLine>>;

    /// All items of the user's cart, oldest first.
    async fn list_cart_lines(&mut self, user_id: UserId) -> Result<Vec<CartLine>>;

    async fn find_cart_item_for_book(
        &mut self,
        cart_id: CartId,
        book_id: BookId,
    ) -> Result<Option<CartItem>>;

    /// Inserts the item, or updates quantity and price snapshot if it exists.
    async fn save_cart_item(&mut self, item: &CartItem) -> Result<()>;

    /// Deletes the listed cart items and returns how many were removed.
    async fn delete_cart_items(&mut self, ids: &[CartItemId]) -> Result<u64>;

    // -- Shipping & payment --

    async fn find_shipping_services(
        &mut self,
        ids: &[ShippingServiceId],
    ) -> Result<Vec<ShippingService>>;

    async fn insert_shipping_service(&mut self, service: &ShippingService) -> Result<()>;

    async fn find_payment_method(&mut self, id: PaymentMethodId) -> Result<Option<PaymentMethod>>;

    async fn insert_payment_method(&mut self, method: &PaymentMethod) -> Result<()>;

    // -- Transactions & orders --

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<()>;

    async fn attach_invoice(&mut self, id: TransactionId, invoice_url: &str) -> Result<()>;

    async fn find_transaction(&mut self, id: TransactionId) -> Result<Option<Transaction>>;

    async fn insert_orders(&mut self, orders: &[Order]) -> Result<()>;

    async fn find_orders_for_transaction(&mut self, id: TransactionId) -> Result<Vec<Order>>;

    // -- Completion --

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}
