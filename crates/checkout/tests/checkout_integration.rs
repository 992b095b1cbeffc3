//! Integration tests for the cart checkout.

use std::sync::Arc;
use std::time::Duration;

use checkout::{CartService, CheckoutError, CheckoutOrchestrator, InMemoryPaymentGateway};
use common::{BookId, CartItemId, PaymentMethodId, ShippingServiceId, UserId};
use domain::{
    Book, BookStatus, CheckoutCommand, CheckoutPolicy, CheckoutSelection, Money, PaymentMethod,
    PaymentStatus, ShippingService, User,
};
use store::{FailPoint, InMemoryStore, Store, UnitOfWork};

struct TestHarness {
    store: InMemoryStore,
    gateway: InMemoryPaymentGateway,
    orchestrator: CheckoutOrchestrator<InMemoryStore>,
    cart: CartService<InMemoryStore>,
    buyer: User,
    seller: User,
    regular: ShippingService,
    express: ShippingService,
    qris: PaymentMethod,
}

impl TestHarness {
    async fn new() -> Self {
        let store = InMemoryStore::new();
        let gateway = InMemoryPaymentGateway::new();

        let buyer = User::new("Buyer", "buyer@example.com");
        let seller = User::new("Seller", "seller@example.com");
        let regular = ShippingService::new("Regular", Money::new(9000), "2-3 days");
        let express = ShippingService::new("Express", Money::new(20_000), "1 day");
        let qris = PaymentMethod::new("QRIS", Money::zero());

        let mut unit = store.begin().await.unwrap();
        unit.insert_user(&buyer).await.unwrap();
        unit.insert_user(&seller).await.unwrap();
        unit.insert_shipping_service(&regular).await.unwrap();
        unit.insert_shipping_service(&express).await.unwrap();
        unit.insert_payment_method(&qris).await.unwrap();
        unit.commit().await.unwrap();

        let orchestrator = CheckoutOrchestrator::new(store.clone(), Arc::new(gateway.clone()));
        let cart = CartService::new(store.clone());

        Self {
            store,
            gateway,
            orchestrator,
            cart,
            buyer,
            seller,
            regular,
            express,
            qris,
        }
    }

    async fn add_user(&self, name: &str) -> User {
        let user = User::new(name, format!("{}@example.com", name.to_lowercase()));
        let mut unit = self.store.begin().await.unwrap();
        unit.insert_user(&user).await.unwrap();
        unit.commit().await.unwrap();
        user
    }

    async fn add_book(&self, seller_id: UserId, title: &str, price: i64, stock: i32) -> Book {
        let book = Book::new(seller_id, title, Money::new(price), stock);
        let mut unit = self.store.begin().await.unwrap();
        unit.insert_book(&book).await.unwrap();
        unit.commit().await.unwrap();
        book
    }

    async fn add_to_cart(&self, user_id: UserId, book_id: BookId, quantity: i32) -> CartItemId {
        self.cart
            .add_item(user_id, book_id, quantity)
            .await
            .unwrap()
            .item
            .id
    }

    fn command(&self, items: &[(CartItemId, ShippingServiceId)]) -> CheckoutCommand {
        self.command_with(items, self.qris.id)
    }

    fn command_with(
        &self,
        items: &[(CartItemId, ShippingServiceId)],
        payment_method_id: PaymentMethodId,
    ) -> CheckoutCommand {
        let selections = items
            .iter()
            .map(|&(cart_item_id, shipping_service_id)| CheckoutSelection {
                cart_item_id,
                shipping_service_id,
            })
            .collect();
        CheckoutCommand::new(selections, payment_method_id).unwrap()
    }

    async fn stock(&self, book_id: BookId) -> i32 {
        self.store.book(book_id).await.unwrap().stock
    }

    async fn assert_nothing_written(&self, book: &Book, items: &[CartItemId]) {
        assert_eq!(self.store.transaction_count().await, 0);
        assert_eq!(self.store.order_count().await, 0);
        assert_eq!(self.stock(book.id).await, book.stock);
        for id in items {
            assert!(self.store.has_cart_item(*id).await);
        }
    }
}

#[tokio::test]
async fn test_example_checkout() {
    let h = TestHarness::new().await;
    let dune = h.add_book(h.seller.id, "Dune", 50_000, 10).await;
    let emma = h.add_book(h.seller.id, "Emma", 30_000, 10).await;
    let a = h.add_to_cart(h.buyer.id, dune.id, 1).await;
    let b = h.add_to_cart(h.buyer.id, emma.id, 2).await;

    let outcome = h
        .orchestrator
        .checkout(h.buyer.id, h.command(&[(a, h.regular.id), (b, h.regular.id)]))
        .await
        .unwrap();

    let tx = &outcome.transaction;
    assert_eq!(tx.subtotal_price, Money::new(110_000));
    assert_eq!(tx.total_shipping_services_fee, Money::new(9000));
    assert_eq!(tx.admin_fee, Money::new(2500));
    assert_eq!(tx.discount, Money::zero());
    assert_eq!(tx.total_price, Money::new(121_500));
    assert_eq!(tx.payment_status, PaymentStatus::Pending);
    assert_eq!(tx.payment_reference, "QRIS");
    assert!(tx.payment_invoice_url.is_some());

    assert_eq!(outcome.orders.len(), 2);
    assert_eq!(outcome.orders[0].total_price, Money::new(54_500));
    assert_eq!(outcome.orders[1].total_price, Money::new(64_500));
    assert_eq!(outcome.orders[1].price_sold, Money::new(30_000));

    assert_eq!(h.stock(dune.id).await, 9);
    assert_eq!(h.stock(emma.id).await, 8);
    assert!(!h.store.has_cart_item(a).await);
    assert!(!h.store.has_cart_item(b).await);

    let request = h.gateway.request_for(&tx.id.to_string()).unwrap();
    assert_eq!(request.amount, Money::new(121_500));
    assert_eq!(request.payer_email, "buyer@example.com");
    assert_eq!(request.payment_methods, vec!["QRIS".to_string()]);
    assert_eq!(request.items.len(), 2);
    assert_eq!(h.gateway.active_invoice_count(), 1);
}

#[tokio::test]
async fn test_shipping_fee_split_evenly_across_three_items() {
    let h = TestHarness::new().await;
    let mut selections = Vec::new();
    for (title, price) in [("A", 10_000), ("B", 20_000), ("C", 30_000)] {
        let book = h.add_book(h.seller.id, title, price, 5).await;
        let item = h.add_to_cart(h.buyer.id, book.id, 1).await;
        selections.push((item, h.regular.id));
    }

    let outcome = h
        .orchestrator
        .checkout(h.buyer.id, h.command(&selections))
        .await
        .unwrap();

    let totals: Vec<i64> = outcome.orders.iter().map(|o| o.total_price.amount()).collect();
    assert_eq!(totals, vec![13_000, 23_000, 33_000]);
    assert_eq!(
        outcome.transaction.total_shipping_services_fee,
        Money::new(9000)
    );
}

#[tokio::test]
async fn test_order_totals_reconcile_with_transaction() {
    let h = TestHarness::new().await;
    let other_seller = h.add_user("Other").await;
    let a = h.add_book(h.seller.id, "A", 1000, 5).await;
    let b = h.add_book(other_seller.id, "B", 2000, 5).await;
    let c = h.add_book(h.seller.id, "C", 3000, 5).await;
    let ia = h.add_to_cart(h.buyer.id, a.id, 1).await;
    let ib = h.add_to_cart(h.buyer.id, b.id, 3).await;
    let ic = h.add_to_cart(h.buyer.id, c.id, 2).await;

    let outcome = h
        .orchestrator
        .checkout(
            h.buyer.id,
            h.command(&[(ia, h.regular.id), (ib, h.express.id), (ic, h.regular.id)]),
        )
        .await
        .unwrap();

    let tx = &outcome.transaction;
    let order_sum: Money = outcome.orders.iter().map(|o| o.total_price).sum();
    assert_eq!(order_sum + tx.admin_fee - tx.discount, tx.total_price);
    assert_eq!(tx.total_shipping_services_fee, Money::new(29_000));
    assert_eq!(
        tx.total_price,
        tx.subtotal_price + tx.total_shipping_services_fee + tx.admin_fee - tx.discount
    );
}

#[tokio::test]
async fn test_seller_with_two_shipping_services_is_rejected() {
    let h = TestHarness::new().await;
    let a = h.add_book(h.seller.id, "A", 10_000, 5).await;
    let b = h.add_book(h.seller.id, "B", 10_000, 5).await;
    let ia = h.add_to_cart(h.buyer.id, a.id, 1).await;
    let ib = h.add_to_cart(h.buyer.id, b.id, 1).await;

    let result = h
        .orchestrator
        .checkout(h.buyer.id, h.command(&[(ia, h.regular.id), (ib, h.express.id)]))
        .await;

    assert!(matches!(result, Err(CheckoutError::Validation(_))));
    h.assert_nothing_written(&a, &[ia, ib]).await;
    assert_eq!(h.gateway.invoice_count(), 0);
}

#[tokio::test]
async fn test_only_selected_cart_items_are_removed() {
    let h = TestHarness::new().await;
    let a = h.add_book(h.seller.id, "A", 10_000, 5).await;
    let b = h.add_book(h.seller.id, "B", 10_000, 5).await;
    let ia = h.add_to_cart(h.buyer.id, a.id, 1).await;
    let ib = h.add_to_cart(h.buyer.id, b.id, 1).await;

    h.orchestrator
        .checkout(h.buyer.id, h.command(&[(ia, h.regular.id)]))
        .await
        .unwrap();

    assert!(!h.store.has_cart_item(ia).await);
    assert!(h.store.has_cart_item(ib).await);
    assert_eq!(h.cart.list(h.buyer.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_stock_decremented_by_quantity() {
    let h = TestHarness::new().await;
    let book = h.add_book(h.seller.id, "Dune", 50_000, 10).await;
    let item = h.add_to_cart(h.buyer.id, book.id, 3).await;

    h.orchestrator
        .checkout(h.buyer.id, h.command(&[(item, h.regular.id)]))
        .await
        .unwrap();

    assert_eq!(h.stock(book.id).await, 7);
}

#[tokio::test]
async fn test_quantity_above_stock_is_conflict() {
    let h = TestHarness::new().await;
    let book = h.add_book(h.seller.id, "Dune", 50_000, 5).await;
    let item = h.add_to_cart(h.buyer.id, book.id, 5).await;

    let mut unit = h.store.begin().await.unwrap();
    let mut sold_down = unit.find_book(book.id).await.unwrap().unwrap();
    sold_down.stock = 2;
    unit.insert_book(&sold_down).await.unwrap();
    unit.commit().await.unwrap();

    let result = h
        .orchestrator
        .checkout(h.buyer.id, h.command(&[(item, h.regular.id)]))
        .await;

    assert!(matches!(result, Err(CheckoutError::Conflict(_))));
    assert_eq!(h.stock(book.id).await, 2);
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn test_unavailable_book_is_conflict() {
    let h = TestHarness::new().await;
    let book = h.add_book(h.seller.id, "Dune", 50_000, 5).await;
    let item = h.add_to_cart(h.buyer.id, book.id, 1).await;

    let mut unit = h.store.begin().await.unwrap();
    let mut withdrawn = unit.find_book(book.id).await.unwrap().unwrap();
    withdrawn.status = BookStatus::Archived;
    unit.insert_book(&withdrawn).await.unwrap();
    unit.commit().await.unwrap();

    let result = h
        .orchestrator
        .checkout(h.buyer.id, h.command(&[(item, h.regular.id)]))
        .await;

    assert!(matches!(result, Err(CheckoutError::Conflict(_))));
    assert!(h.store.has_cart_item(item).await);
}

#[tokio::test]
async fn test_concurrent_checkouts_never_oversell() {
    let h = TestHarness::new().await;
    let other_buyer = h.add_user("Second").await;
    let book = h.add_book(h.seller.id, "Dune", 50_000, 10).await;
    let first = h.add_to_cart(h.buyer.id, book.id, 6).await;
    let second = h.add_to_cart(other_buyer.id, book.id, 6).await;

    let (r1, r2) = tokio::join!(
        h.orchestrator
            .checkout(h.buyer.id, h.command(&[(first, h.regular.id)])),
        h.orchestrator
            .checkout(other_buyer.id, h.command(&[(second, h.regular.id)])),
    );

    let successes = [r1.is_ok(), r2.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1);
    let failure = if r1.is_err() { r1 } else { r2 };
    assert!(matches!(failure, Err(CheckoutError::Conflict(_))));

    assert_eq!(h.stock(book.id).await, 4);
    assert_eq!(h.store.transaction_count().await, 1);
    assert_eq!(h.store.order_count().await, 1);
}

#[tokio::test]
async fn test_missing_user_is_not_found() {
    let h = TestHarness::new().await;
    let book = h.add_book(h.seller.id, "Dune", 50_000, 5).await;
    let item = h.add_to_cart(h.buyer.id, book.id, 1).await;

    let result = h
        .orchestrator
        .checkout(UserId::new(), h.command(&[(item, h.regular.id)]))
        .await;

    assert!(matches!(result, Err(CheckoutError::NotFound { entity: "User", .. })));
}

#[tokio::test]
async fn test_foreign_cart_item_is_rejected() {
    let h = TestHarness::new().await;
    let other_buyer = h.add_user("Second").await;
    let book = h.add_book(h.seller.id, "Dune", 50_000, 5).await;
    let item = h.add_to_cart(other_buyer.id, book.id, 1).await;

    let result = h
        .orchestrator
        .checkout(h.buyer.id, h.command(&[(item, h.regular.id)]))
        .await;

    assert!(matches!(result, Err(CheckoutError::Validation(_))));
    h.assert_nothing_written(&book, &[item]).await;
}

#[tokio::test]
async fn test_missing_shipping_service_is_not_found() {
    let h = TestHarness::new().await;
    let book = h.add_book(h.seller.id, "Dune", 50_000, 5).await;
    let item = h.add_to_cart(h.buyer.id, book.id, 1).await;

    let result = h
        .orchestrator
        .checkout(h.buyer.id, h.command(&[(item, ShippingServiceId::new())]))
        .await;

    assert!(matches!(
        result,
        Err(CheckoutError::NotFound {
            entity: "Shipping service",
            ..
        })
    ));
    h.assert_nothing_written(&book, &[item]).await;
}

#[tokio::test]
async fn test_missing_payment_method_is_not_found() {
    let h = TestHarness::new().await;
    let book = h.add_book(h.seller.id, "Dune", 50_000, 5).await;
    let item = h.add_to_cart(h.buyer.id, book.id, 1).await;

    let result = h
        .orchestrator
        .checkout(
            h.buyer.id,
            h.command_with(&[(item, h.regular.id)], PaymentMethodId::new()),
        )
        .await;

    assert!(matches!(
        result,
        Err(CheckoutError::NotFound {
            entity: "Payment method",
            ..
        })
    ));
    h.assert_nothing_written(&book, &[item]).await;
}

#[tokio::test]
async fn test_gateway_failure_rolls_back() {
    let h = TestHarness::new().await;
    let book = h.add_book(h.seller.id, "Dune", 50_000, 5).await;
    let item = h.add_to_cart(h.buyer.id, book.id, 2).await;
    h.gateway.set_fail_on_create(true);

    let result = h
        .orchestrator
        .checkout(h.buyer.id, h.command(&[(item, h.regular.id)]))
        .await;

    assert!(matches!(result, Err(CheckoutError::ExternalService(_))));
    h.assert_nothing_written(&book, &[item]).await;
}

#[tokio::test]
async fn test_gateway_timeout_rolls_back() {
    let h = TestHarness::new().await;
    let orchestrator = CheckoutOrchestrator::new(h.store.clone(), Arc::new(h.gateway.clone()))
        .with_gateway_timeout(Duration::from_millis(20));
    let book = h.add_book(h.seller.id, "Dune", 50_000, 5).await;
    let item = h.add_to_cart(h.buyer.id, book.id, 2).await;
    h.gateway.set_delay(Some(Duration::from_millis(500)));

    let result = orchestrator
        .checkout(h.buyer.id, h.command(&[(item, h.regular.id)]))
        .await;

    assert!(matches!(result, Err(CheckoutError::ExternalService(_))));
    h.assert_nothing_written(&book, &[item]).await;
    assert_eq!(h.gateway.invoice_count(), 0);
}

#[tokio::test]
async fn test_invoice_created_after_timeout_is_expired() {
    let h = TestHarness::new().await;
    let orchestrator = CheckoutOrchestrator::new(h.store.clone(), Arc::new(h.gateway.clone()))
        .with_gateway_timeout(Duration::from_millis(20));
    let book = h.add_book(h.seller.id, "Dune", 50_000, 5).await;
    let item = h.add_to_cart(h.buyer.id, book.id, 2).await;
    h.gateway.set_response_delay(Some(Duration::from_millis(500)));

    let result = orchestrator
        .checkout(h.buyer.id, h.command(&[(item, h.regular.id)]))
        .await;

    assert!(matches!(result, Err(CheckoutError::ExternalService(_))));
    h.assert_nothing_written(&book, &[item]).await;
    assert_eq!(h.gateway.invoice_count(), 1);
    assert_eq!(h.gateway.active_invoice_count(), 0);
}

#[tokio::test]
async fn test_non_positive_cart_quantity_is_rejected() {
    let h = TestHarness::new().await;
    let book = h.add_book(h.seller.id, "Dune", 50_000, 5).await;
    let item = h.add_to_cart(h.buyer.id, book.id, 1).await;

    for quantity in [0, -3, i32::MIN] {
        let mut unit = h.store.begin().await.unwrap();
        let mut line = unit
            .find_cart_lines(h.buyer.id, &[item])
            .await
            .unwrap()
            .remove(0);
        line.item.quantity = quantity;
        unit.save_cart_item(&line.item).await.unwrap();
        unit.commit().await.unwrap();

        let result = h
            .orchestrator
            .checkout(h.buyer.id, h.command(&[(item, h.regular.id)]))
            .await;

        assert!(
            matches!(result, Err(CheckoutError::Validation(_))),
            "quantity {quantity}"
        );
        h.assert_nothing_written(&book, &[item]).await;
        assert_eq!(h.gateway.invoice_count(), 0);
    }
}

#[tokio::test]
async fn test_custom_policy_applies_admin_fee_and_discount() {
    let h = TestHarness::new().await;
    let orchestrator = CheckoutOrchestrator::new(h.store.clone(), Arc::new(h.gateway.clone()))
        .with_policy(CheckoutPolicy {
            admin_fee: Money::new(1000),
            discount: Money::new(5000),
        });
    let book = h.add_book(h.seller.id, "Dune", 50_000, 5).await;
    let item = h.add_to_cart(h.buyer.id, book.id, 1).await;

    let outcome = orchestrator
        .checkout(h.buyer.id, h.command(&[(item, h.regular.id)]))
        .await
        .unwrap();

    let tx = &outcome.transaction;
    assert_eq!(tx.admin_fee, Money::new(1000));
    assert_eq!(tx.discount, Money::new(5000));
    assert_eq!(tx.total_price, Money::new(55_000));
    assert_eq!(outcome.orders[0].total_price, Money::new(59_000));
    let request = h.gateway.request_for(&tx.id.to_string()).unwrap();
    assert_eq!(request.amount, Money::new(55_000));
}

#[tokio::test]
async fn test_failure_before_invoice_creates_no_invoice() {
    let h = TestHarness::new().await;
    let book = h.add_book(h.seller.id, "Dune", 50_000, 5).await;
    let item = h.add_to_cart(h.buyer.id, book.id, 2).await;
    h.store.set_fail_point(Some(FailPoint::InsertTransaction));

    let result = h
        .orchestrator
        .checkout(h.buyer.id, h.command(&[(item, h.regular.id)]))
        .await;

    assert!(matches!(result, Err(CheckoutError::Unexpected(_))));
    h.store.set_fail_point(None);
    h.assert_nothing_written(&book, &[item]).await;
    assert_eq!(h.gateway.invoice_count(), 0);
}

#[tokio::test]
async fn test_failure_after_invoice_rolls_back_and_expires_invoice() {
    for point in [
        FailPoint::AttachInvoice,
        FailPoint::InsertOrders,
        FailPoint::DecrementStock,
        FailPoint::DeleteCartItems,
        FailPoint::Commit,
    ] {
        let h = TestHarness::new().await;
        let book = h.add_book(h.seller.id, "Dune", 50_000, 5).await;
        let item = h.add_to_cart(h.buyer.id, book.id, 2).await;
        h.store.set_fail_point(Some(point));

        let result = h
            .orchestrator
            .checkout(h.buyer.id, h.command(&[(item, h.regular.id)]))
            .await;

        assert!(
            matches!(result, Err(CheckoutError::Unexpected(_))),
            "{point:?} should fail the checkout"
        );
        h.store.set_fail_point(None);
        h.assert_nothing_written(&book, &[item]).await;
        assert_eq!(h.gateway.invoice_count(), 1, "{point:?}");
        assert_eq!(h.gateway.active_invoice_count(), 0, "{point:?}");
    }
}

#[tokio::test]
async fn test_failed_invoice_expiry_still_reports_original_error() {
    let h = TestHarness::new().await;
    let book = h.add_book(h.seller.id, "Dune", 50_000, 5).await;
    let item = h.add_to_cart(h.buyer.id, book.id, 1).await;
    h.store.set_fail_point(Some(FailPoint::InsertOrders));
    h.gateway.set_fail_on_expire(true);

    let result = h
        .orchestrator
        .checkout(h.buyer.id, h.command(&[(item, h.regular.id)]))
        .await;

    assert!(matches!(result, Err(CheckoutError::Unexpected(_))));
    h.store.set_fail_point(None);
    h.assert_nothing_written(&book, &[item]).await;
}

#[tokio::test]
async fn test_get_transaction_is_owner_scoped() {
    let h = TestHarness::new().await;
    let book = h.add_book(h.seller.id, "Dune", 50_000, 5).await;
    let item = h.add_to_cart(h.buyer.id, book.id, 1).await;
    let outcome = h
        .orchestrator
        .checkout(h.buyer.id, h.command(&[(item, h.regular.id)]))
        .await
        .unwrap();
    let tx_id = outcome.transaction.id;

    let fetched = h.orchestrator.get_transaction(h.buyer.id, tx_id).await.unwrap();
    assert_eq!(fetched.transaction.id, tx_id);
    assert_eq!(
        fetched.transaction.payment_invoice_url,
        outcome.transaction.payment_invoice_url
    );
    assert_eq!(fetched.orders.len(), 1);

    let foreign = h.orchestrator.get_transaction(h.seller.id, tx_id).await;
    assert!(matches!(foreign, Err(CheckoutError::NotFound { .. })));
}
