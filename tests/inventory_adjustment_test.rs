mod common;

use common::TestApp;
use freshmart_api::{
    entities::inventory_adjustment::AdjustmentKind, errors::ServiceError,
};
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn manual_adjustment_updates_quantity_and_appends_log() {
    let app = TestApp::new().await;
    let product = app.seed_product("Gala apples kg", dec!(1.99), None).await;
    let batch = app.seed_batch(product.id, "APL-1", 20, 14).await;
    let staff = Uuid::new_v4();

    let updated = app
        .services
        .inventory
        .adjust_stock(batch.id, -4, "bruised in storage", staff)
        .await
        .expect("adjustment should succeed");
    assert_eq!(updated.quantity_on_hand, 16);

    let log = app.adjustments_for(batch.id).await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].quantity_delta, -4);
    assert_eq!(log[0].kind, AdjustmentKind::Manual);
    assert_eq!(log[0].adjusted_by, Some(staff));
    assert_eq!(log[0].reason, "bruised in storage");
}

#[tokio::test]
async fn adjustment_below_zero_is_rejected_without_side_effects() {
    let app = TestApp::new().await;
    let product = app.seed_product("Bananas kg", dec!(1.20), None).await;
    let batch = app.seed_batch(product.id, "BAN-1", 5, 6).await;

    let err = app
        .services
        .inventory
        .adjust_stock(batch.id, -8, "miscount", Uuid::new_v4())
        .await
        .expect_err("negative result should be rejected");

    match err {
        ServiceError::InvalidAdjustment {
            batch_id,
            delta,
            resulting,
        } => {
            assert_eq!(batch_id, batch.id);
            assert_eq!(delta, -8);
            assert_eq!(resulting, -3);
        }
        other => panic!("expected InvalidAdjustment, got {other:?}"),
    }

    assert_eq!(app.batch_on_hand(batch.id).await, 5);
    assert!(app.adjustments_for(batch.id).await.is_empty());
}

#[tokio::test]
async fn adjustment_cannot_exceed_quantity_received() {
    let app = TestApp::new().await;
    let product = app.seed_product("Oat milk 1L", dec!(3.10), None).await;
    let batch = app.seed_batch(product.id, "OAT-1", 10, 30).await;

    // Drain some stock, then try to "correct" past the original receipt.
    app.services
        .inventory
        .adjust_stock(batch.id, -2, "damaged", Uuid::new_v4())
        .await
        .expect("draining adjustment should succeed");

    let err = app
        .services
        .inventory
        .adjust_stock(batch.id, 5, "recount", Uuid::new_v4())
        .await
        .expect_err("exceeding the receipt should be rejected");
    assert!(matches!(err, ServiceError::InvalidAdjustment { resulting: 13, .. }));
    assert_eq!(app.batch_on_hand(batch.id).await, 8);
}

#[tokio::test]
async fn zero_delta_is_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product("Butter 250g", dec!(2.75), None).await;
    let batch = app.seed_batch(product.id, "BUT-1", 8, 60).await;

    let err = app
        .services
        .inventory
        .adjust_stock(batch.id, 0, "noop", Uuid::new_v4())
        .await
        .expect_err("zero delta should be rejected");
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn destroy_batch_writes_off_all_remaining_stock() {
    let app = TestApp::new().await;
    let product = app.seed_product("Chicken breast kg", dec!(7.90), None).await;
    let batch = app.seed_batch(product.id, "CHK-1", 12, 2).await;
    let staff = Uuid::new_v4();

    let destroyed = app
        .services
        .inventory
        .destroy_batch(batch.id, "cold chain broken", staff)
        .await
        .expect("destruction should succeed");
    assert_eq!(destroyed.quantity_on_hand, 0);

    let log = app.adjustments_for(batch.id).await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].quantity_delta, -12);
    assert_eq!(log[0].kind, AdjustmentKind::Destruction);
}

#[tokio::test]
async fn destroying_an_empty_batch_fails_with_no_state_change() {
    let app = TestApp::new().await;
    let product = app.seed_product("Salmon fillet kg", dec!(14.50), None).await;
    let batch = app.seed_batch(product.id, "SAL-1", 6, 1).await;
    let staff = Uuid::new_v4();

    app.services
        .inventory
        .destroy_batch(batch.id, "recall", staff)
        .await
        .expect("first destruction should succeed");

    let err = app
        .services
        .inventory
        .destroy_batch(batch.id, "recall again", staff)
        .await
        .expect_err("second destruction should fail");
    assert!(matches!(err, ServiceError::BatchAlreadyEmpty(id) if id == batch.id));

    // Still exactly one destruction on record.
    assert_eq!(app.batch_on_hand(batch.id).await, 0);
    assert_eq!(app.adjustments_for(batch.id).await.len(), 1);
}

#[tokio::test]
async fn restore_stock_is_the_inverse_of_allocation() {
    let app = TestApp::new().await;
    let product = app.seed_product("Greek yogurt 500g", dec!(3.99), None).await;
    let batch = app.seed_batch(product.id, "YOG-1", 10, 7).await;

    let allocations = app
        .services
        .inventory
        .allocate(product.id, 4, None)
        .await
        .expect("allocation should succeed");
    assert_eq!(app.batch_on_hand(batch.id).await, 6);

    let restored = app
        .services
        .inventory
        .restore_stock(batch.id, allocations[0].quantity_taken)
        .await
        .expect("restore should succeed");
    assert_eq!(restored.quantity_on_hand, 10);

    let log = app.adjustments_for(batch.id).await;
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].kind, AdjustmentKind::OrderAllocation);
    assert_eq!(log[0].quantity_delta, -4);
    assert_eq!(log[1].kind, AdjustmentKind::Restock);
    assert_eq!(log[1].quantity_delta, 4);
}

#[tokio::test]
async fn adjusting_an_unknown_batch_is_not_found() {
    let app = TestApp::new().await;
    let err = app
        .services
        .inventory
        .adjust_stock(Uuid::new_v4(), -1, "ghost", Uuid::new_v4())
        .await
        .expect_err("unknown batch should fail");
    assert!(matches!(err, ServiceError::NotFound(_)));
}
