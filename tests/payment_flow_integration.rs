//! Integration tests for the payment lifecycle.
//!
//! These tests drive the application handlers and the outbox worker over the
//! in-memory adapters:
//! 1. Intake stores a pending payment and enqueues a dispatch job
//! 2. The worker dispatches to the mock M-Pesa provider
//! 3. A provider callback completes or fails the payment
//! 4. The worker settles against the partner ledger and notifies the partner

mod common;

use rust_decimal_macros::dec;
use serde_json::json;

use common::{b2c_success, deposit, stk_cancelled, stk_success, withdrawal, Harness};
use pesa_bridge::adapters::mpesa::ProviderCall;
use pesa_bridge::application::{
    GetPaymentQuery, InitiatePaymentCommand, ReconcileCallbackCommand, ReconcileOutcome,
    RecordQueueTimeoutCommand,
};
use pesa_bridge::domain::foundation::Timestamp;
use pesa_bridge::domain::payment::{
    CallbackFlow, Payment, PaymentError, PaymentStatus, ProviderTransactionStatus, SettlementKind,
};
use pesa_bridge::ports::{PartnerError, ProviderError};

async fn payment(harness: &Harness, transaction_ref: &str) -> Payment {
    harness
        .services
        .get
        .handle(GetPaymentQuery {
            partner_id: "P1".to_string(),
            transaction_ref: transaction_ref.to_string(),
        })
        .await
        .expect("payment should exist")
}

fn callback(flow: CallbackFlow, payment_ref: &str, payload: serde_json::Value) -> ReconcileCallbackCommand {
    ReconcileCallbackCommand {
        flow,
        payment_ref: payment_ref.to_string(),
        token: None,
        payload,
    }
}

// =============================================================================
// End-to-end
// =============================================================================

#[tokio::test]
async fn deposit_is_dispatched_completed_and_credited_once() {
    let harness = Harness::new();

    let result = harness
        .services
        .initiate
        .handle(InitiatePaymentCommand::deposit(deposit("TX1")))
        .await
        .unwrap();
    assert_eq!(result.payment.status, PaymentStatus::Pending);
    assert!(!result.replayed);

    harness.drain().await;

    // Provider saw the local amount, not the ledger amount
    let calls = harness.provider.calls();
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], ProviderCall::StkPush(_)));
    assert_eq!(calls[0].amount(), dec!(1300));

    assert_eq!(payment(&harness, "TX1").await.status, PaymentStatus::Processing);
    let transactions = harness.store.transactions().await;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].status, ProviderTransactionStatus::Sent);
    assert_eq!(transactions[0].checkout_request_id.as_deref(), Some("ws_1"));

    let outcome = harness
        .services
        .reconcile
        .handle(callback(
            CallbackFlow::Stk,
            "TX1",
            stk_success("ws_1", dec!(1300), "QFT123"),
        ))
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Completed);

    harness.drain().await;

    let completed = payment(&harness, "TX1").await;
    assert_eq!(completed.status, PaymentStatus::Completed);
    assert_eq!(completed.provider_reference.as_deref(), Some("QFT123"));
    assert!(completed.partner_notified);

    let ledger = harness.ledger.calls();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].kind, SettlementKind::Credit);
    assert_eq!(ledger[0].request.amount, dec!(10.0));
    assert_eq!(ledger[0].request.currency, "USD");
    assert_eq!(ledger[0].request.external_ref, "QFT123");

    let delivered = harness.notifier.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].1.status, PaymentStatus::Completed);
}

// =============================================================================
// Idempotency
// =============================================================================

#[tokio::test]
async fn repeated_intake_yields_one_payment_and_one_dispatch() {
    let harness = Harness::new();

    let first = harness
        .services
        .initiate
        .handle(InitiatePaymentCommand::deposit(deposit("TX1")))
        .await
        .unwrap();
    let second = harness
        .services
        .initiate
        .handle(InitiatePaymentCommand::deposit(deposit("TX1")))
        .await
        .unwrap();

    assert!(second.replayed);
    assert_eq!(first.payment.id, second.payment.id);

    harness.drain().await;

    assert_eq!(harness.store.payment_count().await, 1);
    assert_eq!(harness.provider.call_count(), 1);
}

#[tokio::test]
async fn redelivered_success_callback_settles_once() {
    let harness = Harness::new();
    harness
        .services
        .initiate
        .handle(InitiatePaymentCommand::deposit(deposit("TX1")))
        .await
        .unwrap();
    harness.drain().await;

    let payload = stk_success("ws_1", dec!(1300), "QFT123");
    let first = harness
        .services
        .reconcile
        .handle(callback(CallbackFlow::Stk, "TX1", payload.clone()))
        .await
        .unwrap();
    let second = harness
        .services
        .reconcile
        .handle(callback(CallbackFlow::Stk, "TX1", payload))
        .await
        .unwrap();
    harness.drain().await;

    assert_eq!(first, ReconcileOutcome::Completed);
    assert_eq!(second, ReconcileOutcome::AlreadyFinal);
    assert_eq!(harness.ledger.calls().len(), 1);
    assert_eq!(harness.store.settlements().await.len(), 1);
}

// =============================================================================
// Correlation
// =============================================================================

#[tokio::test]
async fn callback_only_touches_the_payment_owning_the_key() {
    let harness = Harness::new();
    for reference in ["TX1", "TX2"] {
        harness
            .services
            .initiate
            .handle(InitiatePaymentCommand::deposit(deposit(reference)))
            .await
            .unwrap();
        harness.drain().await;
    }

    // ws_2 belongs to TX2, not TX1
    let cross = harness
        .services
        .reconcile
        .handle(callback(
            CallbackFlow::Stk,
            "TX1",
            stk_success("ws_2", dec!(1300), "QFT999"),
        ))
        .await;
    assert!(matches!(cross, Err(PaymentError::CallbackCorrelation { .. })));

    let unknown = harness
        .services
        .reconcile
        .handle(callback(
            CallbackFlow::Stk,
            "TX1",
            stk_success("ws_404", dec!(1300), "QFT404"),
        ))
        .await;
    assert!(matches!(unknown, Err(PaymentError::CallbackCorrelation { .. })));

    for reference in ["TX1", "TX2"] {
        let untouched = payment(&harness, reference).await;
        assert_eq!(untouched.status, PaymentStatus::Processing);
        assert!(!untouched.callback_received);
    }
    assert!(harness.ledger.calls().is_empty());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn cancelled_stk_fails_payment_and_notifies_without_settling() {
    let harness = Harness::new();
    harness
        .services
        .initiate
        .handle(InitiatePaymentCommand::deposit(deposit("TX1")))
        .await
        .unwrap();
    harness.drain().await;

    let outcome = harness
        .services
        .reconcile
        .handle(callback(CallbackFlow::Stk, "TX1", stk_cancelled("ws_1")))
        .await
        .unwrap();
    harness.drain().await;

    assert_eq!(outcome, ReconcileOutcome::Failed);
    let failed = payment(&harness, "TX1").await;
    assert_eq!(failed.status, PaymentStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("Request cancelled by user"));
    assert!(harness.ledger.calls().is_empty());
    assert_eq!(harness.notifier.delivered()[0].1.status, PaymentStatus::Failed);
}

#[tokio::test]
async fn transport_failure_fails_payment_without_provider_transaction() {
    let harness = Harness::new();
    harness
        .provider
        .fail_next(ProviderError::timeout("no response from Daraja"));

    harness
        .services
        .initiate
        .handle(InitiatePaymentCommand::deposit(deposit("TX1")))
        .await
        .unwrap();
    harness.drain().await;

    let failed = payment(&harness, "TX1").await;
    assert_eq!(failed.status, PaymentStatus::Failed);
    assert!(harness.store.transactions().await.is_empty());
    assert_eq!(harness.notifier.delivered().len(), 1);
}

#[tokio::test]
async fn partner_notification_is_retried_after_backoff() {
    let harness = Harness::new();
    harness
        .notifier
        .fail_next(PartnerError::Transport("connection reset".into()));
    harness
        .services
        .initiate
        .handle(InitiatePaymentCommand::deposit(deposit("TX1")))
        .await
        .unwrap();
    harness.drain().await;
    harness
        .services
        .reconcile
        .handle(callback(
            CallbackFlow::Stk,
            "TX1",
            stk_success("ws_1", dec!(1300), "QFT123"),
        ))
        .await
        .unwrap();

    harness.drain().await;
    assert!(harness.notifier.delivered().is_empty());
    assert!(!payment(&harness, "TX1").await.partner_notified);

    harness.outbox.make_all_due().await;
    harness.drain().await;

    assert_eq!(harness.notifier.delivered().len(), 1);
    assert_eq!(harness.notifier.attempts(), 2);
    assert!(payment(&harness, "TX1").await.partner_notified);
}

// =============================================================================
// Withdrawals
// =============================================================================

#[tokio::test]
async fn b2c_withdrawal_is_debited_with_receipt() {
    let harness = Harness::new();
    harness
        .services
        .initiate
        .handle(InitiatePaymentCommand::withdrawal(withdrawal("WD1", None)))
        .await
        .unwrap();
    harness.drain().await;

    let calls = harness.provider.calls();
    assert!(matches!(calls[0], ProviderCall::B2c(_)));
    assert_eq!(calls[0].amount(), dec!(1300));

    harness
        .services
        .reconcile
        .handle(callback(CallbackFlow::B2c, "WD1", b2c_success("ws_1", "NLJ41HAY6Q")))
        .await
        .unwrap();
    harness.drain().await;

    let ledger = harness.ledger.calls();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].kind, SettlementKind::Debit);
    assert_eq!(ledger[0].request.external_ref, "NLJ41HAY6Q");
}

#[tokio::test]
async fn b2b_withdrawal_accepts_flat_result_payload() {
    let harness = Harness::new();
    harness
        .services
        .initiate
        .handle(InitiatePaymentCommand::withdrawal(withdrawal(
            "WD2",
            Some("600000"),
        )))
        .await
        .unwrap();
    harness.drain().await;

    match &harness.provider.calls()[0] {
        ProviderCall::B2b(request) => assert_eq!(request.receiver_shortcode, "600000"),
        other => panic!("expected B2B request, got {:?}", other),
    }

    let outcome = harness
        .services
        .reconcile
        .handle(callback(
            CallbackFlow::B2b,
            "WD2",
            json!({
                "ResultCode": 0,
                "ResultDesc": "ok",
                "ConversationID": "ws_1",
                "TransactionID": "QKA81LK5D0",
                "Amount": 1300
            }),
        ))
        .await
        .unwrap();
    harness.drain().await;

    assert_eq!(outcome, ReconcileOutcome::Completed);
    let completed = payment(&harness, "WD2").await;
    assert_eq!(completed.provider_reference.as_deref(), Some("QKA81LK5D0"));
    assert_eq!(harness.ledger.calls()[0].kind, SettlementKind::Debit);
}

#[tokio::test]
async fn b2b_result_keyed_by_originator_id_completes_payment() {
    let harness = Harness::new();
    harness
        .services
        .initiate
        .handle(InitiatePaymentCommand::withdrawal(withdrawal(
            "WD4",
            Some("600000"),
        )))
        .await
        .unwrap();
    harness.drain().await;

    // Dispatch stored ConversationID ws_1 and OriginatorConversationID oc_1
    let outcome = harness
        .services
        .reconcile
        .handle(callback(
            CallbackFlow::B2b,
            "WD4",
            json!({
                "Result": {
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "OriginatorConversationID": "oc_1",
                    "TransactionID": "QKA81LK5D1"
                }
            }),
        ))
        .await
        .unwrap();
    harness.drain().await;

    assert_eq!(outcome, ReconcileOutcome::Completed);
    let completed = payment(&harness, "WD4").await;
    assert_eq!(completed.status, PaymentStatus::Completed);
    assert_eq!(completed.provider_reference.as_deref(), Some("QKA81LK5D1"));
    assert_eq!(harness.ledger.calls()[0].kind, SettlementKind::Debit);
}

#[tokio::test]
async fn queue_timeout_is_recorded_without_status_change() {
    let harness = Harness::new();
    harness
        .services
        .initiate
        .handle(InitiatePaymentCommand::withdrawal(withdrawal("WD3", None)))
        .await
        .unwrap();
    harness.drain().await;

    harness
        .services
        .queue_timeout
        .handle(RecordQueueTimeoutCommand {
            payment_ref: "WD3".to_string(),
            token: None,
            payload: json!({"Result": {"ResultCode": 1, "ResultDesc": "Request timed out"}}),
        })
        .await
        .unwrap();

    let recorded = payment(&harness, "WD3").await;
    assert_eq!(recorded.status, PaymentStatus::Processing);
    assert!(recorded.callback_received);
}

// =============================================================================
// Recovery
// =============================================================================

#[tokio::test]
async fn sweep_redispatches_payment_left_pending() {
    let harness = Harness::new();
    let mut stale = Payment::create(deposit("TX1")).unwrap();
    stale.created_at = Timestamp::now().minus_secs(3600);
    harness.store.put_payment(stale).await;

    let report = harness.services.sweep.handle().await.unwrap();
    harness.drain().await;

    assert_eq!(report.dispatch_enqueued, 1);
    assert_eq!(harness.provider.call_count(), 1);
    assert_eq!(payment(&harness, "TX1").await.status, PaymentStatus::Processing);
}

#[tokio::test]
async fn sweep_notifies_final_payment_whose_notify_job_was_lost() {
    let harness = Harness::new();
    let mut failed = Payment::create(deposit("TX1")).unwrap();
    failed.start_processing().unwrap();
    failed.fail("Request cancelled by user").unwrap();
    failed.updated_at = Timestamp::now().minus_secs(3600);
    harness.store.put_payment(failed).await;

    let report = harness.services.sweep.handle().await.unwrap();
    harness.drain().await;

    assert_eq!(report.notify_enqueued, 1);
    let delivered = harness.notifier.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].1.status, PaymentStatus::Failed);
    assert!(payment(&harness, "TX1").await.partner_notified);

    // Already notified; nothing left to sweep
    let report = harness.services.sweep.handle().await.unwrap();
    assert_eq!(report.notify_enqueued, 0);
}
