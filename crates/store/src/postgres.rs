use async_trait::async_trait;
use common::{
    BookId, CartId, CartItemId, OrderId, PaymentMethodId, ShippingServiceId, TransactionId, UserId,
};
use domain::{
    Book, BookStatus, Cart, CartItem, CartLine, Money, Order, PaymentMethod, PaymentStatus,
    ShippingService, Transaction, User,
};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{Result, Store, StoreError, UnitOfWork};

const BOOK_COLUMNS: &str = "id, title, price, stock, status, seller_id";

const CART_LINE_SELECT: &str = r#"
    SELECT ci.id, ci.cart_id, ci.book_id, ci.quantity, ci.price_at_cart, ci.created_at,
           b.title, b.price, b.stock, b.status, b.seller_id
    FROM cart_items ci
    JOIN carts c ON c.id = ci.cart_id
    JOIN books b ON b.id = ci.book_id
"#;

const TRANSACTION_COLUMNS: &str = "id, user_id, subtotal_price, total_shipping_services_fee, \
     admin_fee, discount, payment_method_fee, total_price, payment_reference, \
     payment_invoice_url, payment_status, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, user_id, book_id, quantity, shipping_service_id, transaction_id, \
     total_price, price_sold, created_at";

/// PostgreSQL-backed store.
///
/// Units of work run at `SERIALIZABLE` isolation. Books touched by a checkout
/// are additionally row-locked with `SELECT ... FOR UPDATE`, and stock is
/// only ever decremented with a guarded `UPDATE`, so stock cannot go negative
/// under concurrent checkouts.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::debug!("migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Unit = PostgresUnit;

    async fn begin(&self) -> Result<PostgresUnit> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(PostgresUnit { tx })
    }
}

/// Unit of work backed by one database transaction.
pub struct PostgresUnit {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn uuids<T: Copy + Into<Uuid>>(ids: &[T]) -> Vec<Uuid> {
    ids.iter().map(|id| (*id).into()).collect()
}

fn row_to_book(row: &PgRow, id_column: &str) -> Result<Book> {
    let status: String = row.try_get("status")?;
    Ok(Book {
        id: BookId::from_uuid(row.try_get(id_column)?),
        title: row.try_get("title")?,
        price: Money::new(row.try_get("price")?),
        stock: row.try_get("stock")?,
        status: status.parse::<BookStatus>().map_err(StoreError::Corrupt)?,
        seller_id: UserId::from_uuid(row.try_get("seller_id")?),
    })
}

fn row_to_cart_line(row: PgRow) -> Result<CartLine> {
    let item = CartItem {
        id: CartItemId::from_uuid(row.try_get("id")?),
        cart_id: CartId::from_uuid(row.try_get("cart_id")?),
        book_id: BookId::from_uuid(row.try_get("book_id")?),
        quantity: row.try_get("quantity")?,
        price_at_cart: Money::new(row.try_get("price_at_cart")?),
        created_at: row.try_get("created_at")?,
    };
    let book = row_to_book(&row, "book_id")?;
    Ok(CartLine { item, book })
}

fn row_to_cart_item(row: PgRow) -> Result<CartItem> {
    Ok(CartItem {
        id: CartItemId::from_uuid(row.try_get("id")?),
        cart_id: CartId::from_uuid(row.try_get("cart_id")?),
        book_id: BookId::from_uuid(row.try_get("book_id")?),
        quantity: row.try_get("quantity")?,
        price_at_cart: Money::new(row.try_get("price_at_cart")?),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_shipping_service(row: PgRow) -> Result<ShippingService> {
    Ok(ShippingService {
        id: ShippingServiceId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        price: Money::new(row.try_get("price")?),
        estimation_time: row.try_get("estimation_time")?,
    })
}

fn row_to_transaction(row: PgRow) -> Result<Transaction> {
    let status: String = row.try_get("payment_status")?;
    Ok(Transaction {
        id: TransactionId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        subtotal_price: Money::new(row.try_get("subtotal_price")?),
        total_shipping_services_fee: Money::new(row.try_get("total_shipping_services_fee")?),
        admin_fee: Money::new(row.try_get("admin_fee")?),
        discount: Money::new(row.try_get("discount")?),
        payment_method_fee: Money::new(row.try_get("payment_method_fee")?),
        total_price: Money::new(row.try_get("total_price")?),
        payment_reference: row.try_get("payment_reference")?,
        payment_invoice_url: row.try_get("payment_invoice_url")?,
        payment_status: status.parse::<PaymentStatus>().map_err(StoreError::Corrupt)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        book_id: BookId::from_uuid(row.try_get("book_id")?),
        quantity: row.try_get("quantity")?,
        shipping_service_id: ShippingServiceId::from_uuid(row.try_get("shipping_service_id")?),
        transaction_id: TransactionId::from_uuid(row.try_get("transaction_id")?),
        total_price: Money::new(row.try_get("total_price")?),
        price_sold: Money::new(row.try_get("price_sold")?),
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl UnitOfWork for PostgresUnit {
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, name, email FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(Some(User {
                id: UserId::from_uuid(row.try_get("id")?),
                name: row.try_get("name")?,
                email: row.try_get("email")?,
            })),
            None => Ok(None),
        }
    }

    async fn insert_user(&mut self, user: &User) -> Result<()> {
        sqlx::query("INSERT INTO users (id, name, email) VALUES ($1, $2, $3)")
            .bind(user.id.as_uuid())
            .bind(&user.name)
            .bind(&user.email)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_book(&mut self, id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(|row| row_to_book(&row, "id")).transpose()
    }

    async fn lock_books(&mut self, ids: &[BookId]) -> Result<Vec<Book>> {
        // Stable lock order keeps concurrent checkouts from deadlocking.
        let rows = sqlx::query(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(uuids(ids))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(|row| row_to_book(row, "id")).collect()
    }

    async fn insert_book(&mut self, book: &Book) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO books (id, title, price, stock, status, seller_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(book.id.as_uuid())
        .bind(&book.title)
        .bind(book.price.amount())
        .bind(book.stock)
        .bind(book.status.as_str())
        .bind(book.seller_id.as_uuid())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn decrement_stock(&mut self, id: BookId, quantity: i32) -> Result<()> {
        if quantity < 1 {
            return Err(StoreError::InvalidQuantity {
                book_id: id,
                quantity,
            });
        }
        let result = sqlx::query("UPDATE books SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
            .bind(id.as_uuid())
            .bind(quantity)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(book_id = %id, quantity, "guarded stock decrement matched no row");
            return Err(StoreError::InsufficientStock {
                book_id: id,
                requested: quantity,
            });
        }
        Ok(())
    }

    async fn find_or_create_cart(&mut self, user_id: UserId) -> Result<Cart> {
        sqlx::query("INSERT INTO carts (id, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
            .bind(CartId::new().as_uuid())
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        let row = sqlx::query("SELECT id, user_id FROM carts WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(Cart {
            id: CartId::from_uuid(row.try_get("id")?),
            user_id: UserId::from_uuid(row.try_get("user_id")?),
        })
    }

    async fn find_cart_lines(
        &mut self,
        user_id: UserId,
        ids: &[CartItemId],
    ) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(&format!(
            "{CART_LINE_SELECT} WHERE c.user_id = $1 AND ci.id = ANY($2) ORDER BY ci.created_at, ci.id"
        ))
        .bind(user_id.as_uuid())
        .bind(uuids(ids))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_cart_line).collect()
    }

    async fn list_cart_lines(&mut self, user_id: UserId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(&format!(
            "{CART_LINE_SELECT} WHERE c.user_id = $1 ORDER BY ci.created_at, ci.id"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_cart_line).collect()
    }

    async fn find_cart_item_for_book(
        &mut self,
        cart_id: CartId,
        book_id: BookId,
    ) -> Result<Option<CartItem>> {
        let row = sqlx::query(
            r#"
            SELECT id, cart_id, book_id, quantity, price_at_cart, created_at
            FROM cart_items
            WHERE cart_id = $1 AND book_id = $2
            "#,
        )
        .bind(cart_id.as_uuid())
        .bind(book_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_cart_item).transpose()
    }

    async fn save_cart_item(&mut self, item: &CartItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, book_id, quantity, price_at_cart, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                price_at_cart = EXCLUDED.price_at_cart
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.cart_id.as_uuid())
        .bind(item.book_id.as_uuid())
        .bind(item.quantity)
        .bind(item.price_at_cart.amount())
        .bind(item.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_cart_items(&mut self, ids: &[CartItemId]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = ANY($1)")
            .bind(uuids(ids))
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_shipping_services(
        &mut self,
        ids: &[ShippingServiceId],
    ) -> Result<Vec<ShippingService>> {
        let rows = sqlx::query(
            "SELECT id, name, price, estimation_time FROM shipping_services WHERE id = ANY($1)",
        )
        .bind(uuids(ids))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_shipping_service).collect()
    }

    async fn insert_shipping_service(&mut self, service: &ShippingService) -> Result<()> {
        sqlx::query(
            "INSERT INTO shipping_services (id, name, price, estimation_time) VALUES ($1, $2, $3, $4)",
        )
        .bind(service.id.as_uuid())
        .bind(&service.name)
        .bind(service.price.amount())
        .bind(&service.estimation_time)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_payment_method(&mut self, id: PaymentMethodId) -> Result<Option<PaymentMethod>> {
        let row = sqlx::query("SELECT id, name, fee FROM payment_methods WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(Some(PaymentMethod {
                id: PaymentMethodId::from_uuid(row.try_get("id")?),
                name: row.try_get("name")?,
                fee: Money::new(row.try_get("fee")?),
            })),
            None => Ok(None),
        }
    }

    async fn insert_payment_method(&mut self, method: &PaymentMethod) -> Result<()> {
        sqlx::query("INSERT INTO payment_methods (id, name, fee) VALUES ($1, $2, $3)")
            .bind(method.id.as_uuid())
            .bind(&method.name)
            .bind(method.fee.amount())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO transactions ({TRANSACTION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(transaction.id.as_uuid())
        .bind(transaction.user_id.as_uuid())
        .bind(transaction.subtotal_price.amount())
        .bind(transaction.total_shipping_services_fee.amount())
        .bind(transaction.admin_fee.amount())
        .bind(transaction.discount.amount())
        .bind(transaction.payment_method_fee.amount())
        .bind(transaction.total_price.amount())
        .bind(&transaction.payment_reference)
        .bind(&transaction.payment_invoice_url)
        .bind(transaction.payment_status.as_str())
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn attach_invoice(&mut self, id: TransactionId, invoice_url: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE transactions SET payment_invoice_url = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(invoice_url)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "Transaction",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn find_transaction(&mut self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_transaction).transpose()
    }

    async fn insert_orders(&mut self, orders: &[Order]) -> Result<()> {
        if orders.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("INSERT INTO orders ({ORDER_COLUMNS}) "));
        builder.push_values(orders, |mut b, order| {
            b.push_bind(order.id.as_uuid())
                .push_bind(order.user_id.as_uuid())
                .push_bind(order.book_id.as_uuid())
                .push_bind(order.quantity)
                .push_bind(order.shipping_service_id.as_uuid())
                .push_bind(order.transaction_id.as_uuid())
                .push_bind(order.total_price.amount())
                .push_bind(order.price_sold.amount())
                .push_bind(order.created_at);
        });
        builder.build().execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn find_orders_for_transaction(&mut self, id: TransactionId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE transaction_id = $1 ORDER BY created_at, id"
        ))
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_order).collect()
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
