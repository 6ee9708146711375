//! Payment aggregate.
//!
//! A Payment is one partner-initiated money movement for one end user. It is
//! created once at intake and afterwards only mutated through status changes
//! and bookkeeping updates; it is never deleted.
//!
//! # Design Decisions
//!
//! - **Two amounts**: `amount`/`currency` is the ledger (settlement) amount;
//!   the provider is always sent the local amount carried in `metadata`.
//! - **payment_ref = partner transaction ref**: the callback URL addresses a
//!   payment by this value, so it is globally unique.
//! - **Monotonic status**: every change goes through [`StateMachine`].

use rust_decimal::prelude::RoundingStrategy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::{
    PartnerId, PaymentId, StateMachine, Timestamp, UserId, ValidationError,
};

use super::{
    normalize_msisdn, ErrorContext, PaymentMetadata, PaymentStatus, PaymentType, Provider,
    SettlementKind, TransactionType,
};

/// Validated-on-construction input for a new payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub transaction_ref: String,
    pub partner_id: String,
    pub provider: Provider,
    pub payment_type: PaymentType,
    pub user_id: String,
    pub phone_number: Option<String>,
    pub account_number: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub metadata: Value,
}

/// Amount and currency the provider is asked to move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAmount {
    pub amount: Decimal,
    pub currency: String,
    /// True when metadata lacked the original amount and the ledger amount
    /// was used instead.
    pub degraded: bool,
}

/// Payment aggregate.
///
/// # Invariants
///
/// - `(partner_id, partner_tx_ref)` is unique; `payment_ref == partner_tx_ref`
/// - `amount > 0`, `currency` is upper-case and non-empty
/// - `phone_number` is present and normalised for phone-addressed rails
/// - Status transitions follow [`PaymentStatus`] rules
/// - `provider_reference` is written at most once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,

    /// Canonical external reference; equals the partner's transaction ref.
    pub payment_ref: String,

    pub partner_id: PartnerId,
    pub partner_tx_ref: String,
    pub provider: Provider,
    pub payment_type: PaymentType,

    /// Ledger amount, in `currency`.
    pub amount: Decimal,
    pub currency: String,

    pub user_id: UserId,
    pub phone_number: Option<String>,
    pub account_number: Option<String>,
    pub status: PaymentStatus,

    /// Provider receipt (e.g. M-Pesa receipt number).
    pub provider_reference: Option<String>,

    /// Conversion metadata (`original_amount`, `original_currency`, ...).
    pub metadata: Value,

    pub callback_received: bool,
    pub callback_payload: Option<Value>,
    pub callback_received_at: Option<Timestamp>,

    pub partner_notified: bool,
    pub notification_attempts: i32,
    pub last_notified_at: Option<Timestamp>,

    pub error_message: Option<String>,
    pub retry_count: i32,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Payment {
    /// Validates the request and builds a pending payment.
    ///
    /// # Errors
    ///
    /// Returns the first failing field; nothing is persisted by this call.
    pub fn create(new: NewPayment) -> Result<Self, ValidationError> {
        let transaction_ref = required(&new.transaction_ref, "transaction_ref")?;
        let partner_id = PartnerId::new(new.partner_id.trim())?;
        let user_id = UserId::new(new.user_id.trim())?;

        if new.amount <= Decimal::ZERO {
            return Err(ValidationError::not_positive("amount", new.amount));
        }
        let currency = required(&new.currency, "currency")?.to_uppercase();

        let phone_number = match new.phone_number.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(normalize_msisdn(raw)?),
            _ if new.provider.requires_phone() => {
                return Err(ValidationError::empty_field("phone_number"))
            }
            _ => None,
        };
        let account_number = new
            .account_number
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        PaymentMetadata::validate(&new.metadata)?;

        let now = Timestamp::now();
        Ok(Self {
            id: PaymentId::new(),
            payment_ref: transaction_ref.clone(),
            partner_id,
            partner_tx_ref: transaction_ref,
            provider: new.provider,
            payment_type: new.payment_type,
            amount: new.amount,
            currency,
            user_id,
            phone_number,
            account_number,
            status: PaymentStatus::Pending,
            provider_reference: None,
            metadata: new.metadata,
            callback_received: false,
            callback_payload: None,
            callback_received_at: None,
            partner_notified: false,
            notification_attempts: 0,
            last_notified_at: None,
            error_message: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn context(&self) -> ErrorContext {
        ErrorContext::new(&self.payment_ref, self.partner_id.as_str(), self.provider)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Typed view over the conversion metadata.
    pub fn conversion(&self) -> PaymentMetadata {
        PaymentMetadata::from_value(&self.metadata)
    }

    /// Amount to send to the provider, rounded to whole units.
    ///
    /// Falls back to the ledger amount when metadata carries no usable
    /// original amount; callers must surface `degraded`.
    pub fn local_amount(&self) -> LocalAmount {
        let meta = self.conversion();
        match meta.original_amount.filter(|a| *a > Decimal::ZERO) {
            Some(original) => LocalAmount {
                amount: whole_units(original),
                currency: meta
                    .original_currency
                    .unwrap_or_else(|| self.currency.clone()),
                degraded: false,
            },
            None => LocalAmount {
                amount: whole_units(self.amount),
                currency: self.currency.clone(),
                degraded: true,
            },
        }
    }

    /// Provider flow this payment is routed through.
    ///
    /// Deposits use STK push; withdrawals go B2B when a business account
    /// is targeted, B2C otherwise.
    pub fn transaction_type(&self) -> TransactionType {
        match self.payment_type {
            PaymentType::Deposit => TransactionType::StkPush,
            PaymentType::Withdrawal if self.account_number.is_some() => TransactionType::B2b,
            PaymentType::Withdrawal => TransactionType::B2c,
        }
    }

    pub fn settlement_kind(&self) -> SettlementKind {
        SettlementKind::for_payment_type(self.payment_type)
    }

    /// Reference handed to the partner ledger: provider receipt, or our own
    /// ref when the provider gave none.
    pub fn external_ref(&self) -> &str {
        self.provider_reference
            .as_deref()
            .unwrap_or(&self.payment_ref)
    }

    /// Moves pending -> processing before the provider is called.
    pub fn start_processing(&mut self) -> Result<(), ValidationError> {
        self.transition(PaymentStatus::Processing)
    }

    pub fn complete(&mut self) -> Result<(), ValidationError> {
        self.transition(PaymentStatus::Completed)
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), ValidationError> {
        self.transition(PaymentStatus::Failed)?;
        self.error_message = Some(reason.into());
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), ValidationError> {
        self.transition(PaymentStatus::Cancelled)
    }

    /// Records an error against the payment.
    ///
    /// A non-terminal payment is failed; a terminal one keeps its status
    /// and is only annotated. Returns whether the status changed.
    pub fn set_error(&mut self, message: impl Into<String>) -> bool {
        self.error_message = Some(message.into());
        self.retry_count += 1;
        let failed = self.transition(PaymentStatus::Failed).is_ok();
        self.updated_at = Timestamp::now();
        failed
    }

    /// Stores the raw webhook body. The provider reference keeps its first
    /// value.
    pub fn record_callback(&mut self, payload: Value, provider_reference: Option<String>) {
        self.callback_received = true;
        self.callback_payload = Some(payload);
        self.callback_received_at = Some(Timestamp::now());
        if self.provider_reference.is_none() {
            self.provider_reference = provider_reference;
        }
        self.updated_at = Timestamp::now();
    }

    pub fn mark_partner_notified(&mut self) {
        self.partner_notified = true;
        self.notification_attempts += 1;
        self.last_notified_at = Some(Timestamp::now());
        self.updated_at = Timestamp::now();
    }

    fn transition(&mut self, target: PaymentStatus) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(target)?;
        self.updated_at = Timestamp::now();
        Ok(())
    }
}

fn required(value: &str, field: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::empty_field(field));
    }
    Ok(trimmed.to_string())
}

fn whole_units(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}
