mod common;

use common::TestApp;
use freshmart_api::errors::ServiceError;
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn fefo_consumes_soonest_expiring_batch_first() {
    let app = TestApp::new().await;
    let product = app.seed_product("Whole milk 1L", dec!(2.50), None).await;
    let b1 = app.seed_batch(product.id, "MILK-A", 5, 1).await;
    let b2 = app.seed_batch(product.id, "MILK-B", 10, 5).await;

    let allocations = app
        .services
        .inventory
        .allocate(product.id, 7, None)
        .await
        .expect("allocation should succeed");

    assert_eq!(allocations.len(), 2);
    assert_eq!(allocations[0].batch_id, b1.id);
    assert_eq!(allocations[0].quantity_taken, 5);
    assert_eq!(allocations[1].batch_id, b2.id);
    assert_eq!(allocations[1].quantity_taken, 2);

    assert_eq!(app.batch_on_hand(b1.id).await, 0);
    assert_eq!(app.batch_on_hand(b2.id).await, 8);
}

#[tokio::test]
async fn equal_expirations_tie_break_on_batch_id() {
    let app = TestApp::new().await;
    let product = app.seed_product("Baby spinach 200g", dec!(3.20), None).await;
    let b1 = app.seed_batch(product.id, "SPIN-A", 4, 3).await;
    let b2 = app.seed_batch(product.id, "SPIN-B", 4, 3).await;

    let (first, second) = if b1.id < b2.id { (b1, b2) } else { (b2, b1) };

    let allocations = app
        .services
        .inventory
        .allocate(product.id, 6, None)
        .await
        .expect("allocation should succeed");

    assert_eq!(allocations[0].batch_id, first.id);
    assert_eq!(allocations[0].quantity_taken, 4);
    assert_eq!(allocations[1].batch_id, second.id);
    assert_eq!(allocations[1].quantity_taken, 2);
}

#[tokio::test]
async fn shortfall_fails_whole_and_touches_nothing() {
    let app = TestApp::new().await;
    let product = app.seed_product("Strawberries 250g", dec!(4.00), None).await;
    let b1 = app.seed_batch(product.id, "STRAW-A", 3, 2).await;
    let b2 = app.seed_batch(product.id, "STRAW-B", 5, 4).await;

    let err = app
        .services
        .inventory
        .allocate(product.id, 10, None)
        .await
        .expect_err("allocation should fail");

    match err {
        ServiceError::InsufficientStock {
            product_id,
            requested,
            available,
        } => {
            assert_eq!(product_id, product.id);
            assert_eq!(requested, 10);
            assert_eq!(available, 8);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // No partial allocation: both batches untouched, nothing logged.
    assert_eq!(app.batch_on_hand(b1.id).await, 3);
    assert_eq!(app.batch_on_hand(b2.id).await, 5);
    assert!(app.adjustments_for(b1.id).await.is_empty());
    assert!(app.adjustments_for(b2.id).await.is_empty());
}

#[tokio::test]
async fn allocation_logs_one_adjustment_per_batch_drawn() {
    let app = TestApp::new().await;
    let product = app.seed_product("Sourdough loaf", dec!(5.80), None).await;
    let b1 = app.seed_batch(product.id, "BREAD-A", 2, 1).await;
    let b2 = app.seed_batch(product.id, "BREAD-B", 6, 2).await;

    app.services
        .inventory
        .allocate(product.id, 5, None)
        .await
        .expect("allocation should succeed");

    let a1 = app.adjustments_for(b1.id).await;
    let a2 = app.adjustments_for(b2.id).await;
    assert_eq!(a1.len(), 1);
    assert_eq!(a1[0].quantity_delta, -2);
    assert_eq!(a2.len(), 1);
    assert_eq!(a2[0].quantity_delta, -3);
}

#[tokio::test]
async fn stock_info_reports_total_and_soonest_expiration() {
    let app = TestApp::new().await;
    let product = app.seed_product("Cherry tomatoes 300g", dec!(2.90), None).await;
    app.seed_batch(product.id, "TOM-LATE", 10, 9).await;
    let soon = app.seed_batch(product.id, "TOM-SOON", 4, 2).await;

    let info = app
        .services
        .inventory
        .stock_info(product.id)
        .await
        .expect("stock info should succeed");
    assert_eq!(info.total_available, 14);
    assert_eq!(info.soonest_expiration, Some(soon.expires_on));
}

#[tokio::test]
async fn unknown_and_depleted_products_report_zero_without_error() {
    let app = TestApp::new().await;

    // Never-seen product id: a query, not an error.
    let availability = app
        .services
        .inventory
        .stock_availability(Uuid::new_v4())
        .await
        .expect("availability should not error");
    assert_eq!(availability, 0);

    // Fully-depleted product: batch rows remain but count for nothing.
    let product = app.seed_product("Raspberries 125g", dec!(3.50), None).await;
    let batch = app.seed_batch(product.id, "RASP-A", 6, 3).await;
    app.services
        .inventory
        .allocate(product.id, 6, None)
        .await
        .expect("allocation should succeed");

    let info = app
        .services
        .inventory
        .stock_info(product.id)
        .await
        .expect("stock info should succeed");
    assert_eq!(info.total_available, 0);
    assert_eq!(info.soonest_expiration, None);

    // The depleted batch still exists for audit.
    assert_eq!(app.batch_on_hand(batch.id).await, 0);
}

#[tokio::test]
async fn non_positive_allocation_quantity_is_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product("Eggs dozen", dec!(4.20), None).await;
    app.seed_batch(product.id, "EGG-A", 12, 10).await;

    let err = app
        .services
        .inventory
        .allocate(product.id, 0, None)
        .await
        .expect_err("zero quantity should be rejected");
    assert!(matches!(err, ServiceError::ValidationError(_)));
}
