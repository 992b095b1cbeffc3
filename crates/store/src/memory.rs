use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{
    BookId, CartId, CartItemId, PaymentMethodId, ShippingServiceId, TransactionId, UserId,
};
use domain::{Book, Cart, CartItem, CartLine, Order, PaymentMethod, ShippingService, Transaction, User};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{Result, Store, StoreError, UnitOfWork};

/// Operations of an in-memory unit that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    InsertTransaction,
    AttachInvoice,
    InsertOrders,
    DecrementStock,
    DeleteCartItems,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    books: HashMap<BookId, Book>,
    carts: HashMap<CartId, Cart>,
    cart_items: HashMap<CartItemId, CartItem>,
    shipping_services: HashMap<ShippingServiceId, ShippingService>,
    payment_methods: HashMap<PaymentMethodId, PaymentMethod>,
    transactions: HashMap<TransactionId, Transaction>,
    orders: Vec<Order>,
}

impl Tables {
    fn cart_of(&self, user_id: UserId) -> Option<&Cart> {
        self.carts.values().find(|c| c.user_id == user_id)
    }

    fn line(&self, item: &CartItem) -> Result<CartLine> {
        let book = self
            .books
            .get(&item.book_id)
            .cloned()
            .ok_or_else(|| StoreError::Corrupt(format!("cart item {} has no book", item.id)))?;
        Ok(CartLine {
            item: item.clone(),
            book,
        })
    }
}

/// In-memory store for tests and local development.
///
/// A unit of work holds the store-wide lock for its whole lifetime and works
/// on a private copy of the tables, published on commit. Units therefore run
/// strictly one after another.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_point: Arc<std::sync::Mutex<Option<FailPoint>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequently started unit fail at `point`.
    pub fn set_fail_point(&self, point: Option<FailPoint>) {
        if let Ok(mut guard) = self.fail_point.lock() {
            *guard = point;
        }
    }

    fn current_fail_point(&self) -> Option<FailPoint> {
        self.fail_point.lock().map(|guard| *guard).unwrap_or(None)
    }

    /// Returns a committed book.
    pub async fn book(&self, id: BookId) -> Option<Book> {
        self.tables.lock().await.books.get(&id).cloned()
    }

    /// Returns whether a committed cart item exists.
    pub async fn has_cart_item(&self, id: CartItemId) -> bool {
        self.tables.lock().await.cart_items.contains_key(&id)
    }

    /// Returns the number of committed cart items across all carts.
    pub async fn cart_item_count(&self) -> usize {
        self.tables.lock().await.cart_items.len()
    }

    /// Returns the number of committed transactions.
    pub async fn transaction_count(&self) -> usize {
        self.tables.lock().await.transactions.len()
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Unit = InMemoryUnit;

    async fn begin(&self) -> Result<InMemoryUnit> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryUnit {
            guard,
            working,
            fail_point: self.current_fail_point(),
        })
    }
}

/// Unit of work over an [`InMemoryStore`].
pub struct InMemoryUnit {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    fail_point: Option<FailPoint>,
}

impl InMemoryUnit {
    fn check(&self, point: FailPoint) -> Result<()> {
        if self.fail_point == Some(point) {
            return Err(StoreError::Simulated(point));
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnit {
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn insert_user(&mut self, user: &User) -> Result<()> {
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_book(&mut self, id: BookId) -> Result<Option<Book>> {
        Ok(self.working.books.get(&id).cloned())
    }

    async fn lock_books(&mut self, ids: &[BookId]) -> Result<Vec<Book>> {
        // The store-wide lock already covers every row.
        Ok(ids
            .iter()
            .filter_map(|id| self.working.books.get(id).cloned())
            .collect())
    }

    async fn insert_book(&mut self, book: &Book) -> Result<()> {
        self.working.books.insert(book.id, book.clone());
        Ok(())
    }

    async fn decrement_stock(&mut self, id: BookId, quantity: i32) -> Result<()> {
        self.check(FailPoint::DecrementStock)?;
        if quantity < 1 {
            return Err(StoreError::InvalidQuantity {
                book_id: id,
                quantity,
            });
        }
        let book = self.working.books.get_mut(&id).ok_or_else(|| StoreError::NotFound {
            entity: "Book",
            id: id.to_string(),
        })?;
        if book.stock < quantity {
            return Err(StoreError::InsufficientStock {
                book_id: id,
                requested: quantity,
            });
        }
        book.stock -= quantity;
        Ok(())
    }

    async fn find_or_create_cart(&mut self, user_id: UserId) -> Result<Cart> {
        if let Some(cart) = self.working.cart_of(user_id) {
            return Ok(cart.clone());
        }
        let cart = Cart::for_user(user_id);
        self.working.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn find_cart_lines(
        &mut self,
        user_id: UserId,
        ids: &[CartItemId],
    ) -> Result<Vec<CartLine>> {
        let Some(cart_id) = self.working.cart_of(user_id).map(|c| c.id) else {
            return Ok(Vec::new());
        };
        ids.iter()
            .filter_map(|id| self.working.cart_items.get(id))
            .filter(|item| item.cart_id == cart_id)
            .map(|item| self.working.line(item))
            .collect()
    }

    async fn list_cart_lines(&mut self, user_id: UserId) -> Result<Vec<CartLine>> {
        let Some(cart_id) = self.working.cart_of(user_id).map(|c| c.id) else {
            return Ok(Vec::new());
        };
        let mut items: Vec<&CartItem> = self
            .working
            .cart_items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .collect();
        items.sort_by_key(|item| (item.created_at, item.id));
        items.into_iter().map(|item| self.working.line(item)).collect()
    }

    async fn find_cart_item_for_book(
        &mut self,
        cart_id: CartId,
        book_id: BookId,
    ) -> Result<Option<CartItem>> {
        Ok(self
            .working
            .cart_items
            .values()
            .find(|item| item.cart_id == cart_id && item.book_id == book_id)
            .cloned())
    }

    async fn save_cart_item(&mut self, item: &CartItem) -> Result<()> {
        let duplicate = self.working.cart_items.values().any(|existing| {
            existing.id != item.id
                && existing.cart_id == item.cart_id
                && existing.book_id == item.book_id
        });
        if duplicate {
            return Err(StoreError::Corrupt(format!(
                "cart {} already holds book {}",
                item.cart_id, item.book_id
            )));
        }
        self.working.cart_items.insert(item.id, item.clone());
        Ok(())
    }

    async fn delete_cart_items(&mut self, ids: &[CartItemId]) -> Result<u64> {
        self.check(FailPoint::DeleteCartItems)?;
        let removed = ids
            .iter()
            .filter(|id| self.working.cart_items.remove(id).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn find_shipping_services(
        &mut self,
        ids: &[ShippingServiceId],
    ) -> Result<Vec<ShippingService>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.working.shipping_services.get(id).cloned())
            .collect())
    }

    async fn insert_shipping_service(&mut self, service: &ShippingService) -> Result<()> {
        self.working
            .shipping_services
            .insert(service.id, service.clone());
        Ok(())
    }

    async fn find_payment_method(&mut self, id: PaymentMethodId) -> Result<Option<PaymentMethod>> {
        Ok(self.working.payment_methods.get(&id).cloned())
    }

    async fn insert_payment_method(&mut self, method: &PaymentMethod) -> Result<()> {
        self.working.payment_methods.insert(method.id, method.clone());
        Ok(())
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        self.check(FailPoint::InsertTransaction)?;
        self.working
            .transactions
            .insert(transaction.id, transaction.clone());
        Ok(())
    }

    async fn attach_invoice(&mut self, id: TransactionId, invoice_url: &str) -> Result<()> {
        self.check(FailPoint::AttachInvoice)?;
        let transaction = self
            .working
            .transactions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Transaction",
                id: id.to_string(),
            })?;
        transaction.payment_invoice_url = Some(invoice_url.to_string());
        transaction.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn find_transaction(&mut self, id: TransactionId) -> Result<Option<Transaction>> {
        Ok(self.working.transactions.get(&id).cloned())
    }

    async fn insert_orders(&mut self, orders: &[Order]) -> Result<()> {
        self.check(FailPoint::InsertOrders)?;
        self.working.orders.extend_from_slice(orders);
        Ok(())
    }

    async fn find_orders_for_transaction(&mut self, id: TransactionId) -> Result<Vec<Order>> {
        Ok(self
            .working
            .orders
            .iter()
            .filter(|order| order.transaction_id == id)
            .cloned()
            .collect())
    }

    async fn commit(self) -> Result<()> {
        self.check(FailPoint::Commit)?;
        let InMemoryUnit {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
