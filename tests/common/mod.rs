//! Shared harness: every port backed by in-memory adapters, plus the worker
//! that drains the job outbox.

#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde_json::{json, Value};

use pesa_bridge::adapters::jobs::OutboxWorker;
use pesa_bridge::adapters::memory::{InMemoryJobOutbox, InMemoryPaymentStore};
use pesa_bridge::adapters::mpesa::{MockMobileMoneyProvider, MpesaCallbackParser};
use pesa_bridge::adapters::partner::{RecordingPartnerLedger, RecordingPartnerNotifier};
use pesa_bridge::application::{PaymentPorts, PaymentServices, ProviderRegistry};
use pesa_bridge::config::WorkerConfig;
use pesa_bridge::domain::payment::{CallbackUrls, NewPayment, PaymentType, Provider};

pub const CALLBACK_BASE: &str = "https://bridge.test";

pub struct Harness {
    pub store: Arc<InMemoryPaymentStore>,
    pub outbox: Arc<InMemoryJobOutbox>,
    pub provider: MockMobileMoneyProvider,
    pub ledger: RecordingPartnerLedger,
    pub notifier: RecordingPartnerNotifier,
    pub callback_urls: CallbackUrls,
    pub services: PaymentServices,
    pub worker: OutboxWorker,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Callback URLs carry an HMAC token signed with `secret`.
    pub fn with_callback_secret(secret: &str) -> Self {
        Self::build(Some(SecretString::new(secret.to_string())))
    }

    fn build(secret: Option<SecretString>) -> Self {
        let store = Arc::new(InMemoryPaymentStore::new());
        let outbox = Arc::new(InMemoryJobOutbox::new());
        let provider = MockMobileMoneyProvider::new();
        let ledger = RecordingPartnerLedger::new();
        let notifier = RecordingPartnerNotifier::new();
        let callback_urls = CallbackUrls::new(CALLBACK_BASE, secret);
        let worker_config = WorkerConfig::default();

        let ports = PaymentPorts {
            payments: store.clone(),
            transactions: store.clone(),
            settlements: store.clone(),
            outbox: outbox.clone(),
            providers: ProviderRegistry::new().with(Arc::new(provider.clone())),
            callback_parser: Arc::new(MpesaCallbackParser::new()),
            ledger: Arc::new(ledger.clone()),
            notifier: Arc::new(notifier.clone()),
            callback_urls: callback_urls.clone(),
        };
        let services = PaymentServices::new(ports, &worker_config);
        let worker = OutboxWorker::new(outbox.clone(), services.executor.clone(), worker_config);

        Self {
            store,
            outbox,
            provider,
            ledger,
            notifier,
            callback_urls,
            services,
            worker,
        }
    }

    /// Runs worker batches until no due job is left.
    pub async fn drain(&self) {
        for _ in 0..10 {
            let processed = self.worker.poll_once().await.expect("worker batch failed");
            if processed == 0 {
                return;
            }
        }
        panic!("outbox did not drain");
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Requests
// ════════════════════════════════════════════════════════════════════════════

pub fn conversion_metadata(original_amount: &str) -> Value {
    json!({
        "original_amount": original_amount,
        "original_currency": "KES",
        "exchange_rate": "130",
        "target_currency": "USD"
    })
}

/// TX1 / P1 deposit of 10.0 USD carrying 1300 KES.
pub fn deposit(transaction_ref: &str) -> NewPayment {
    NewPayment {
        transaction_ref: transaction_ref.to_string(),
        partner_id: "P1".to_string(),
        provider: Provider::Mpesa,
        payment_type: PaymentType::Deposit,
        user_id: "user-1".to_string(),
        phone_number: Some("0712345678".to_string()),
        account_number: None,
        amount: dec!(10.0),
        currency: "USD".to_string(),
        metadata: conversion_metadata("1300"),
    }
}

pub fn withdrawal(transaction_ref: &str, account_number: Option<&str>) -> NewPayment {
    NewPayment {
        payment_type: PaymentType::Withdrawal,
        account_number: account_number.map(str::to_string),
        ..deposit(transaction_ref)
    }
}

pub fn deposit_body(transaction_ref: &str) -> Value {
    json!({
        "transaction_ref": transaction_ref,
        "partner_id": "P1",
        "provider": "mpesa",
        "user_id": "user-1",
        "phone_number": "0712345678",
        "amount": "10.0",
        "currency": "USD",
        "metadata": conversion_metadata("1300")
    })
}

// ════════════════════════════════════════════════════════════════════════════
// Daraja callbacks
// ════════════════════════════════════════════════════════════════════════════

pub fn stk_success(checkout_request_id: &str, amount: Decimal, receipt: &str) -> Value {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": checkout_request_id,
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {
                    "Item": [
                        {"Name": "Amount", "Value": amount.to_string()},
                        {"Name": "MpesaReceiptNumber", "Value": receipt},
                        {"Name": "PhoneNumber", "Value": 254712345678u64}
                    ]
                }
            }
        }
    })
}

pub fn stk_cancelled(checkout_request_id: &str) -> Value {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": checkout_request_id,
                "ResultCode": 1032,
                "ResultDesc": "Request cancelled by user"
            }
        }
    })
}

pub fn b2c_success(conversation_id: &str, receipt: &str) -> Value {
    json!({
        "Result": {
            "ResultType": 0,
            "ResultCode": 0,
            "ResultDesc": "The service request is processed successfully.",
            "OriginatorConversationID": "10571-7910404-1",
            "ConversationID": conversation_id,
            "TransactionID": receipt,
            "ResultParameters": {
                "ResultParameter": [
                    {"Key": "TransactionAmount", "Value": 1300},
                    {"Key": "TransactionReceipt", "Value": receipt}
                ]
            }
        }
    })
}
