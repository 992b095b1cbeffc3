//! Checkout orchestrator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{BookId, TransactionId, UserId};
use domain::{
    CheckoutCommand, CheckoutLine, CheckoutPolicy, CheckoutQuote, DomainError, Money, Order,
    PaymentMethod, Transaction, User, partition_by_seller, price_checkout, validate_quantity,
};
use serde::Serialize;
use store::{Store, UnitOfWork};

use crate::error::CheckoutError;
use crate::gateway::{
    INVOICE_DURATION_SECS, INVOICE_ITEM_CATEGORY, Invoice, InvoiceItem, InvoiceRequest,
    PaymentGateway,
};

/// Default bound on the invoice creation call.
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a successful checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub transaction: Transaction,
    pub orders: Vec<Order>,
}

/// Everything validated and written before the gateway is called.
struct PreparedCheckout {
    user: User,
    payment_method: PaymentMethod,
    lines: Vec<CheckoutLine>,
    quote: CheckoutQuote,
    transaction: Transaction,
}

/// Converts cart items into a transaction and orders.
///
/// The whole checkout runs inside one unit of work. The payment gateway call
/// happens in the middle of it and is bounded by a timeout. If anything after
/// the invoice was created fails, the unit is rolled back and the invoice is
/// expired.
pub struct CheckoutOrchestrator<S: Store> {
    store: S,
    gateway: Arc<dyn PaymentGateway>,
    policy: CheckoutPolicy,
    gateway_timeout: Duration,
}

impl<S: Store> CheckoutOrchestrator<S> {
    /// Creates an orchestrator with the default fee policy and timeout.
    pub fn new(store: S, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            store,
            gateway,
            policy: CheckoutPolicy::default(),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: CheckoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    /// Checks out the selected cart items of `user_id`.
    #[tracing::instrument(skip(self, command), fields(items = command.items().len()))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        command: CheckoutCommand,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let start = Instant::now();

        let result = self.run(user_id, &command).await;

        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());
        match &result {
            Ok(outcome) => {
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(
                    transaction_id = %outcome.transaction.id,
                    total_price = outcome.transaction.total_price.amount(),
                    orders = outcome.orders.len(),
                    "checkout completed"
                );
            }
            Err(err) => {
                metrics::counter!("checkout_failures_total", "reason" => err.kind()).increment(1);
                match err {
                    CheckoutError::Unexpected(_) => {
                        tracing::error!(error = %err, "checkout failed unexpectedly")
                    }
                    _ => tracing::warn!(error = %err, reason = err.kind(), "checkout rejected"),
                }
            }
        }

        result
    }

    async fn run(
        &self,
        user_id: UserId,
        command: &CheckoutCommand,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let mut unit = self.store.begin().await?;

        let prepared = match self.prepare(&mut unit, user_id, command).await {
            Ok(prepared) => prepared,
            Err(err) => {
                rollback_quietly(unit).await;
                return Err(err);
            }
        };

        let invoice = match self.create_invoice(&prepared).await {
            Ok(invoice) => invoice,
            Err(err) => {
                rollback_quietly(unit).await;
                return Err(err);
            }
        };

        match self.complete(&mut unit, command, prepared, &invoice).await {
            Ok(outcome) => match unit.commit().await {
                Ok(()) => Ok(outcome),
                Err(err) => {
                    self.expire_orphaned(&invoice).await;
                    Err(err.into())
                }
            },
            Err(err) => {
                rollback_quietly(unit).await;
                self.expire_orphaned(&invoice).await;
                Err(err)
            }
        }
    }

    /// Validates the checkout, prices it and records the transaction.
    async fn prepare(
        &self,
        unit: &mut S::Unit,
        user_id: UserId,
        command: &CheckoutCommand,
    ) -> Result<PreparedCheckout, CheckoutError> {
        let user = unit
            .find_user(user_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("User", user_id))?;

        let lines = self.load_lines(unit, user_id, command).await?;

        partition_by_seller(&lines)?;

        let shipping_ids = command.shipping_service_ids();
        let shipping_services: HashMap<_, _> = unit
            .find_shipping_services(&shipping_ids)
            .await?
            .into_iter()
            .map(|service| (service.id, service))
            .collect();
        if let Some(missing) = shipping_ids
            .iter()
            .find(|id| !shipping_services.contains_key(*id))
        {
            return Err(CheckoutError::not_found("Shipping service", missing));
        }

        let payment_method = unit
            .find_payment_method(command.payment_method_id())
            .await?
            .ok_or_else(|| {
                CheckoutError::not_found("Payment method", command.payment_method_id())
            })?;

        ensure_stock(&lines)?;

        let quote = price_checkout(&lines, &shipping_services, &payment_method, &self.policy)?;

        let transaction = Transaction::pending(user_id, &quote, &payment_method.name);
        unit.insert_transaction(&transaction).await?;
        tracing::debug!(transaction_id = %transaction.id, "transaction recorded");

        Ok(PreparedCheckout {
            user,
            payment_method,
            lines,
            quote,
            transaction,
        })
    }

    /// Loads the selected cart items in request order, with their books locked.
    async fn load_lines(
        &self,
        unit: &mut S::Unit,
        user_id: UserId,
        command: &CheckoutCommand,
    ) -> Result<Vec<CheckoutLine>, CheckoutError> {
        let mut found: HashMap<_, _> = unit
            .find_cart_lines(user_id, &command.cart_item_ids())
            .await?
            .into_iter()
            .map(|line| (line.item.id, line))
            .collect();

        let mut book_ids: Vec<BookId> = found.values().map(|line| line.book.id).collect();
        book_ids.sort();
        book_ids.dedup();
        let locked: HashMap<_, _> = unit
            .lock_books(&book_ids)
            .await?
            .into_iter()
            .map(|book| (book.id, book))
            .collect();

        command
            .items()
            .iter()
            .map(|selection| -> Result<CheckoutLine, CheckoutError> {
                let line = found.remove(&selection.cart_item_id).ok_or_else(|| {
                    CheckoutError::Validation(format!(
                        "Cart item {} is not in the user's cart",
                        selection.cart_item_id
                    ))
                })?;
                let book = locked.get(&line.book.id).cloned().unwrap_or(line.book);
                Ok(CheckoutLine {
                    item: line.item,
                    book,
                    shipping_service_id: selection.shipping_service_id,
                })
            })
            .collect()
    }

    async fn create_invoice(&self, prepared: &PreparedCheckout) -> Result<Invoice, CheckoutError> {
        let request = invoice_request(prepared);
        let external_id = request.external_id.clone();

        match tokio::time::timeout(self.gateway_timeout, self.gateway.create_invoice(request)).await
        {
            Ok(Ok(invoice)) => {
                metrics::counter!("payment_invoices_created_total").increment(1);
                tracing::info!(
                    transaction_id = %prepared.transaction.id,
                    invoice_id = %invoice.id,
                    "payment invoice created"
                );
                Ok(invoice)
            }
            Ok(Err(err)) => Err(err.into()),
            Err(_) => {
                self.expire_late_invoice(&external_id).await;
                Err(CheckoutError::ExternalService(format!(
                    "invoice creation timed out after {}ms",
                    self.gateway_timeout.as_millis()
                )))
            }
        }
    }

    /// Attaches the invoice, writes orders, reserves stock and clears the cart.
    async fn complete(
        &self,
        unit: &mut S::Unit,
        command: &CheckoutCommand,
        prepared: PreparedCheckout,
        invoice: &Invoice,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let PreparedCheckout {
            user,
            quote,
            mut transaction,
            ..
        } = prepared;

        unit.attach_invoice(transaction.id, &invoice.invoice_url)
            .await?;
        transaction.payment_invoice_url = Some(invoice.invoice_url.clone());

        let orders: Vec<Order> = quote
            .orders
            .iter()
            .map(|draft| Order::from_draft(draft, user.id, transaction.id))
            .collect();
        unit.insert_orders(&orders).await?;

        for (book_id, quantity) in quote.stock_requirements() {
            unit.decrement_stock(book_id, quantity).await?;
        }

        unit.delete_cart_items(&command.cart_item_ids()).await?;

        Ok(CheckoutOutcome {
            transaction,
            orders,
        })
    }

    /// Expires an invoice the gateway created after the creation call timed out.
    ///
    /// An invoice that appears after this lookup stays payable until the
    /// gateway expires it after `INVOICE_DURATION_SECS`.
    async fn expire_late_invoice(&self, external_id: &str) {
        match tokio::time::timeout(self.gateway_timeout, self.gateway.find_invoice(external_id))
            .await
        {
            Ok(Ok(Some(invoice))) => self.expire_orphaned(&invoice).await,
            Ok(Ok(None)) => tracing::debug!(external_id, "no invoice created before the timeout"),
            Ok(Err(err)) => tracing::warn!(
                external_id,
                error = %err,
                "failed to look up invoice after timeout"
            ),
            Err(_) => tracing::warn!(external_id, "timed out looking up invoice"),
        }
    }

    async fn expire_orphaned(&self, invoice: &Invoice) {
        match tokio::time::timeout(
            self.gateway_timeout,
            self.gateway.expire_invoice(&invoice.id),
        )
        .await
        {
            Ok(Ok(())) => tracing::info!(invoice_id = %invoice.id, "orphaned invoice expired"),
            Ok(Err(err)) => tracing::warn!(
                invoice_id = %invoice.id,
                error = %err,
                "failed to expire orphaned invoice"
            ),
            Err(_) => tracing::warn!(
                invoice_id = %invoice.id,
                "timed out expiring orphaned invoice"
            ),
        }
    }

    /// Returns a transaction of `user_id` with its orders.
    #[tracing::instrument(skip(self))]
    pub async fn get_transaction(
        &self,
        user_id: UserId,
        transaction_id: TransactionId,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let mut unit = self.store.begin().await?;

        let transaction = unit
            .find_transaction(transaction_id)
            .await?
            .filter(|transaction| transaction.user_id == user_id)
            .ok_or_else(|| CheckoutError::not_found("Transaction", transaction_id))?;
        let orders = unit.find_orders_for_transaction(transaction_id).await?;
        unit.commit().await?;

        Ok(CheckoutOutcome {
            transaction,
            orders,
        })
    }
}

/// Rejects books that are not for sale or lack stock for the summed quantity.
fn ensure_stock(lines: &[CheckoutLine]) -> Result<(), CheckoutError> {
    let mut requested: HashMap<BookId, (i32, &domain::Book)> = HashMap::new();
    for line in lines {
        validate_quantity(line.item.quantity)?;
        let entry = requested.entry(line.book.id).or_insert((0, &line.book));
        entry.0 = entry
            .0
            .checked_add(line.item.quantity)
            .ok_or(DomainError::QuantityOverflow {
                book_id: line.book.id,
                added: line.item.quantity,
            })?;
    }
    for (quantity, book) in requested.values() {
        book.ensure_purchasable(*quantity)?;
    }
    Ok(())
}

fn invoice_request(prepared: &PreparedCheckout) -> InvoiceRequest {
    InvoiceRequest {
        external_id: prepared.transaction.id.to_string(),
        amount: prepared.transaction.total_price,
        payer_email: prepared.user.email.clone(),
        currency: Money::CURRENCY.to_string(),
        invoice_duration_secs: INVOICE_DURATION_SECS,
        payment_methods: vec![prepared.payment_method.name.clone()],
        items: prepared
            .lines
            .iter()
            .map(|line| InvoiceItem {
                name: line.book.title.clone(),
                price: line.item.price_at_cart,
                quantity: line.item.quantity,
                category: INVOICE_ITEM_CATEGORY.to_string(),
                reference_id: line.book.id.to_string(),
            })
            .collect(),
    }
}

async fn rollback_quietly<U: UnitOfWork>(unit: U) {
    if let Err(err) = unit.rollback().await {
        tracing::warn!(error = %err, "rollback failed");
    }
}
