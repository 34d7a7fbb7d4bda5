mod common;

use common::*;
use smartfridge::domain::error::SettlementError;
use smartfridge::domain::gateway::GatewayPaymentStatus;
use smartfridge::domain::invoice::InvoiceRates;
use smartfridge::domain::order::{CartItem, PaymentMethod};
use smartfridge::services::billing;
use smartfridge::services::reconciliation::{
    PaymentNotification, ReconcileOutcome, handle_payment_event, report_failure,
};
use smartfridge::services::settlement;

const DB: &str = "smartfridge_test_webhook";

fn payment(id: &str) -> PaymentNotification {
    PaymentNotification {
        topic: Some("payment".into()),
        payment_id: Some(id.into()),
    }
}

// ── pix_webhook_settles_and_redelivery_is_noop ─────────────────────────────

#[tokio::test]
async fn pix_webhook_settles_and_redelivery_is_noop() {
    let Some(pool) = setup_pool(DB).await else { return };
    let fx = seed(&pool, 0, 0).await;
    let gateway = FakeGateway::default();

    let order = settlement::open_order(
        &pool,
        fx.user_id,
        fx.condo_id,
        &[CartItem {
            product_id: fx.product_a,
            quantity: 3,
        }],
        PaymentMethod::Pix,
    )
    .await
    .unwrap();

    let payment_id = format!("9{}", order.id);
    gateway.set_payment(&payment_id, GatewayPaymentStatus::Approved, &order.id.to_string(), 1500);

    let first = handle_payment_event(&pool, &gateway, &payment(&payment_id)).await.unwrap();
    assert_eq!(first, ReconcileOutcome::OrderSettled(order.id));
    assert_eq!(order_status(&pool, order.id).await, "paid");
    assert_eq!(stock(&pool, fx.condo_id, fx.product_a).await, 7);
    assert_eq!(count_unlocks(&pool, order.id).await, 1);

    let second = handle_payment_event(&pool, &gateway, &payment(&payment_id)).await.unwrap();
    assert_eq!(second, ReconcileOutcome::OrderAlreadyPaid(order.id));
    assert_eq!(stock(&pool, fx.condo_id, fx.product_a).await, 7);
    assert_eq!(count_unlocks(&pool, order.id).await, 1);

    let gateway_ref: Option<String> =
        sqlx::query_scalar("SELECT gateway_ref FROM orders WHERE id = $1")
            .bind(order.id.get())
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(gateway_ref.as_deref(), Some(payment_id.as_str()));
}

// ── pending_payment_changes_nothing ────────────────────────────────────────

#[tokio::test]
async fn pending_payment_changes_nothing() {
    let Some(pool) = setup_pool(DB).await else { return };
    let fx = seed(&pool, 0, 0).await;
    let gateway = FakeGateway::default();
    let order = settlement::open_order(
        &pool,
        fx.user_id,
        fx.condo_id,
        &[CartItem {
            product_id: fx.product_b,
            quantity: 1,
        }],
        PaymentMethod::Pix,
    )
    .await
    .unwrap();

    let payment_id = format!("8{}", order.id);
    gateway.set_payment(&payment_id, GatewayPaymentStatus::Pending, &order.id.to_string(), 300);

    let outcome = handle_payment_event(&pool, &gateway, &payment(&payment_id)).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::NotApproved(GatewayPaymentStatus::Pending));
    assert_eq!(order_status(&pool, order.id).await, "pending");
}

// ── deposit_is_credited_once ───────────────────────────────────────────────
// The credited amount is the gateway's, whatever was requested.

#[tokio::test]
async fn deposit_is_credited_once() {
    let Some(pool) = setup_pool(DB).await else { return };
    let fx = seed(&pool, 500, 0).await;
    let gateway = FakeGateway::default();
    let payment_id = format!("55{}", fx.user_id);
    gateway.set_payment(
        &payment_id,
        GatewayPaymentStatus::Approved,
        &format!("wallet_deposit_{}_1700000000000", fx.user_id),
        2000,
    );

    for _ in 0..2 {
        handle_payment_event(&pool, &gateway, &payment(&payment_id)).await.unwrap();
    }

    assert_eq!(wallet_balance(&pool, fx.user_id).await, 2500);
    assert_eq!(count_ledger(&pool, fx.user_id, "deposit").await, 1);
}

// ── invoice_payment_zeroes_credit_once ─────────────────────────────────────

#[tokio::test]
async fn invoice_payment_zeroes_credit_once() {
    let Some(pool) = setup_pool(DB).await else { return };
    let fx = seed(&pool, 0, 10_000).await;
    let due = chrono::NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
    insert_invoice(&pool, fx.user_id, 3000, due, "late").await;
    sqlx::query("UPDATE users SET credit_used_cents = 1200 WHERE id = $1")
        .bind(fx.user_id)
        .execute(&pool)
        .await
        .unwrap();

    let gateway = FakeGateway::default();
    let payment_id = format!("66{}", fx.user_id);
    gateway.set_payment(
        &payment_id,
        GatewayPaymentStatus::Approved,
        &format!("credit_invoice_{}_1700000000000", fx.user_id),
        5000,
    );

    let first = handle_payment_event(&pool, &gateway, &payment(&payment_id)).await.unwrap();
    assert_eq!(
        first,
        ReconcileOutcome::InvoicePaid {
            user_id: fx.user_id,
            invoices: 1
        }
    );
    assert_eq!(credit_used(&pool, fx.user_id).await, 0);
    let detail: serde_json::Value = sqlx::query_scalar(
        "SELECT detail FROM audit_log WHERE entity_id = $1 AND action = 'invoice_paid'",
    )
    .bind(fx.user_id.to_string())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(detail["credit_used_cleared"], "12.00");

    // New spending after the payment must survive a redelivery.
    sqlx::query("UPDATE users SET credit_used_cents = 400 WHERE id = $1")
        .bind(fx.user_id)
        .execute(&pool)
        .await
        .unwrap();
    let second = handle_payment_event(&pool, &gateway, &payment(&payment_id)).await.unwrap();
    assert_eq!(second, ReconcileOutcome::Duplicate);
    assert_eq!(credit_used(&pool, fx.user_id).await, 400);
    assert_eq!(count_ledger(&pool, fx.user_id, "invoice_payment").await, 1);
}

// ── non_payment_topics_are_ignored ─────────────────────────────────────────

#[tokio::test]
async fn non_payment_topics_are_ignored() {
    let Some(pool) = setup_pool(DB).await else { return };
    let gateway = FakeGateway::default();

    let notification = PaymentNotification {
        topic: Some("merchant_order".into()),
        payment_id: Some("1".into()),
    };
    assert_eq!(
        handle_payment_event(&pool, &gateway, &notification).await.unwrap(),
        ReconcileOutcome::Ignored
    );

    let no_id = PaymentNotification {
        topic: Some("payment".into()),
        payment_id: None,
    };
    assert_eq!(
        handle_payment_event(&pool, &gateway, &no_id).await.unwrap(),
        ReconcileOutcome::Ignored
    );
}

// ── approval_for_failed_order_is_an_invalid_state ──────────────────────────
// A card that was declined and later approved out of band must surface,
// not be swallowed.

#[tokio::test]
async fn approval_for_failed_order_is_an_invalid_state() {
    let Some(pool) = setup_pool(DB).await else { return };
    let fx = seed(&pool, 0, 0).await;
    let gateway = FakeGateway::default();
    let order = settlement::open_order(
        &pool,
        fx.user_id,
        fx.condo_id,
        &[CartItem {
            product_id: fx.product_b,
            quantity: 1,
        }],
        PaymentMethod::Card,
    )
    .await
    .unwrap();
    settlement::mark_failed(&pool, order.id, "card rejected", "test").await.unwrap();

    let payment_id = format!("44{}", order.id);
    gateway.set_payment(&payment_id, GatewayPaymentStatus::Approved, &order.id.to_string(), 300);

    let notification = payment(&payment_id);
    let err = handle_payment_event(&pool, &gateway, &notification).await.unwrap_err();
    assert!(matches!(err, SettlementError::InvalidState(_)));

    report_failure(&pool, &notification, &err).await;
    assert_eq!(count_audit(&pool, &payment_id, "reconciliation_failed").await, 1);
    assert_eq!(count_unlocks(&pool, order.id).await, 0);
}

// ── gateway_outage_is_reported_not_applied ─────────────────────────────────

#[tokio::test]
async fn gateway_outage_is_reported_not_applied() {
    let Some(pool) = setup_pool(DB).await else { return };
    let gateway = FakeGateway::default();
    gateway.set_unavailable(true);

    let err = handle_payment_event(&pool, &gateway, &payment("31337"))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Gateway(_)));
}

// ── invoice_quote_adds_fees_and_late_interest ──────────────────────────────
// Current cycle 12.00 (on time: +10%) plus a 30.00 invoice 4 days late
// (+10% fee, +10% interest).

#[tokio::test]
async fn invoice_quote_adds_fees_and_late_interest() {
    let Some(pool) = setup_pool(DB).await else { return };
    let fx = seed(&pool, 0, 10_000).await;
    sqlx::query("UPDATE users SET credit_used_cents = 1200, credit_due_day = 10 WHERE id = $1")
        .bind(fx.user_id)
        .execute(&pool)
        .await
        .unwrap();
    let today = chrono::NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
    let due = chrono::NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    insert_invoice(&pool, fx.user_id, 3000, due, "late").await;

    let quote = billing::quote_invoice(&pool, fx.user_id, today, InvoiceRates::default())
        .await
        .unwrap();

    assert_eq!(quote.principal.cents(), 4200);
    assert_eq!(quote.service_fee.cents(), 420);
    assert_eq!(quote.interest.cents(), 300);
    assert_eq!(quote.total.cents(), 4920);

    let gateway = FakeGateway::default();
    let request = billing::request_invoice_payment(
        &pool,
        &gateway,
        fx.user_id,
        today,
        InvoiceRates::default(),
    )
    .await
    .unwrap();
    assert_eq!(request.charges.total.cents(), 4920);
    let sent = gateway.pix_requests.lock().unwrap();
    assert!(
        sent[0]
            .external_reference
            .starts_with(&format!("credit_invoice_{}_", fx.user_id))
    );
}

// ── nothing_due_is_a_validation_error ──────────────────────────────────────

#[tokio::test]
async fn nothing_due_is_a_validation_error() {
    let Some(pool) = setup_pool(DB).await else { return };
    let fx = seed(&pool, 0, 10_000).await;
    let gateway = FakeGateway::default();
    let today = chrono::NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();

    let err = billing::request_invoice_payment(&pool, &gateway, fx.user_id, today, InvoiceRates::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Validation(_)));
    assert!(gateway.pix_requests.lock().unwrap().is_empty());
}

// ── deposit_request_uses_wallet_reference ──────────────────────────────────

#[tokio::test]
async fn deposit_request_uses_wallet_reference() {
    let Some(pool) = setup_pool(DB).await else { return };
    let fx = seed(&pool, 0, 0).await;
    let gateway = FakeGateway::default();

    billing::request_wallet_deposit(&pool, &gateway, fx.user_id, money(2500))
        .await
        .unwrap();
    assert!(matches!(
        billing::request_wallet_deposit(&pool, &gateway, fx.user_id, money(0)).await,
        Err(SettlementError::Validation(_))
    ));

    let sent = gateway.pix_requests.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].amount.cents(), 2500);
    assert!(
        sent[0]
            .external_reference
            .starts_with(&format!("wallet_deposit_{}_", fx.user_id))
    );
}
