//! Provider-agnostic payment types
//!
//! Common types shared by the dispatch layer, the provider adapters and the
//! embedded-browser bridge.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::PaymentError;
use crate::payments::traits::ProviderAdapter;

/// Supported checkout providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Paystack,
    Flutterwave,
    Monnify,
    Remita,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Paystack,
        Provider::Flutterwave,
        Provider::Monnify,
        Provider::Remita,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Paystack => "paystack",
            Provider::Flutterwave => "flutterwave",
            Provider::Monnify => "monnify",
            Provider::Remita => "remita",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paystack" => Ok(Provider::Paystack),
            "flutterwave" => Ok(Provider::Flutterwave),
            "monnify" => Ok(Provider::Monnify),
            "remita" => Ok(Provider::Remita),
            other => Err(format!("Unknown payment provider: {}", other)),
        }
    }
}

/// Currencies accepted across the supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    NGN,
    USD,
    GHS,
    KES,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::NGN => "NGN",
            Currency::USD => "USD",
            Currency::GHS => "GHS",
            Currency::KES => "KES",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized outcome of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Cancelled,
}

/// Customer details attached to a payment intent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Customer {
    /// Customer email address (required by every provider)
    pub email: String,
    /// Customer display name (required by Monnify and Remita)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Customer phone number (Flutterwave wants one for some channels)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Open key-value mapping passed through to the provider and echoed back in
/// the response. The core never inspects it beyond pass-through.
pub type Metadata = serde_json::Map<String, Value>;

pub type SuccessHandler = Box<dyn FnOnce(PaymentResponse) + Send + 'static>;
pub type CloseHandler = Box<dyn FnOnce() + Send + 'static>;
pub type ErrorHandler = Box<dyn FnOnce(PaymentError) + Send + 'static>;

/// Options handed to an adapter's `load_script`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Sandbox vs production script URL, where the provider differentiates
    /// (Remita does; the others ship one URL for both modes).
    pub test_mode: bool,
}

/// A caller-supplied description of one payment attempt.
///
/// `amount` is always in the smallest currency unit (kobo/cents); adapters
/// convert to whatever unit their provider expects. Construct a fresh intent
/// per attempt — the callbacks are single-shot.
pub struct PaymentIntent {
    pub provider: Provider,
    /// Amount in the smallest currency unit (e.g. kobo for NGN)
    pub amount: u64,
    pub currency: Currency,
    /// Caller-chosen idempotency/tracking reference, stable per attempt
    pub reference: String,
    /// Provider credential (public/API key)
    pub public_key: String,
    pub customer: Customer,
    pub metadata: Option<Metadata>,
    /// Monnify contract code
    pub contract_code: Option<String>,
    /// Remita merchant id
    pub merchant_id: Option<String>,
    /// Remita service type id
    pub service_type_id: Option<String>,
    /// Paystack payment channels (card, bank, ussd, ...)
    pub channels: Option<Vec<String>>,
    /// Flutterwave payment options override
    pub payment_options: Option<String>,
    pub test_mode: bool,
    pub on_success: Option<SuccessHandler>,
    pub on_close: Option<CloseHandler>,
    pub on_error: Option<ErrorHandler>,
    /// Escape hatch: use this adapter instead of the built-in registry
    pub adapter: Option<Arc<dyn ProviderAdapter>>,
}

impl PaymentIntent {
    pub fn new(
        provider: Provider,
        amount: u64,
        currency: Currency,
        reference: impl Into<String>,
        public_key: impl Into<String>,
        customer: Customer,
    ) -> Self {
        Self {
            provider,
            amount,
            currency,
            reference: reference.into(),
            public_key: public_key.into(),
            customer,
            metadata: None,
            contract_code: None,
            merchant_id: None,
            service_type_id: None,
            channels: None,
            payment_options: None,
            test_mode: false,
            on_success: None,
            on_close: None,
            on_error: None,
            adapter: None,
        }
    }
}

/// The intent's data fields after sanitization, with the callbacks replaced
/// by a mandatory outcome sink. Built by the dispatcher immediately before
/// calling an adapter and discarded when the call returns.
pub struct AdapterConfig {
    pub provider: Provider,
    pub amount: u64,
    pub currency: Currency,
    pub reference: String,
    pub public_key: String,
    pub customer: Customer,
    pub metadata: Option<Metadata>,
    pub contract_code: Option<String>,
    pub merchant_id: Option<String>,
    pub service_type_id: Option<String>,
    pub channels: Option<Vec<String>>,
    pub payment_options: Option<String>,
    pub test_mode: bool,
    pub outcome: Arc<OutcomeSink>,
}

/// Normalized response delivered to the caller's success handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub status: PaymentStatus,
    /// Human-readable summary
    pub message: String,
    /// The caller's reference, echoed unchanged
    pub reference: String,
    /// Provider-assigned transaction id, absent on some failure paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Echoed from the intent, never re-derived from the provider
    pub amount: u64,
    pub currency: Currency,
    /// RFC 3339 timestamp assigned at normalization time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<String>,
    pub customer: Customer,
    pub provider: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// The provider's unmodified callback payload
    pub raw: Value,
}

/// The intent fields every normalized response echoes back, snapshotted so
/// the vendor hooks can build responses after the config has been consumed.
#[derive(Clone)]
pub struct ResponseBase {
    pub provider: Provider,
    pub amount: u64,
    pub currency: Currency,
    pub reference: String,
    pub customer: Customer,
    pub metadata: Option<Metadata>,
}

impl ResponseBase {
    pub fn from_config(config: &AdapterConfig) -> Self {
        Self {
            provider: config.provider,
            amount: config.amount,
            currency: config.currency,
            reference: config.reference.clone(),
            customer: config.customer.clone(),
            metadata: config.metadata.clone(),
        }
    }

    /// Build a success response, stamping `paid_at` now. `raw` is kept
    /// untouched for auditing.
    pub fn success(&self, transaction_id: Option<String>, raw: Value) -> PaymentResponse {
        PaymentResponse {
            status: PaymentStatus::Success,
            message: "Payment completed successfully".to_string(),
            reference: self.reference.clone(),
            transaction_id,
            amount: self.amount,
            currency: self.currency,
            paid_at: Some(chrono::Utc::now().to_rfc3339()),
            customer: self.customer.clone(),
            provider: self.provider,
            metadata: self.metadata.clone(),
            raw,
        }
    }
}

struct OutcomeHandlers {
    on_success: SuccessHandler,
    on_close: CloseHandler,
    on_error: ErrorHandler,
}

/// Single-shot result channel for one payment attempt.
///
/// Exactly one of success/close/error settles the sink; every later call is
/// a warn-logged no-op. This is what guarantees a completed payment never
/// also reports a close, regardless of how the vendor widget fires its
/// hooks.
pub struct OutcomeSink {
    provider: Provider,
    handlers: Mutex<Option<OutcomeHandlers>>,
}

impl OutcomeSink {
    pub fn new(
        provider: Provider,
        on_success: SuccessHandler,
        on_close: CloseHandler,
        on_error: ErrorHandler,
    ) -> Arc<Self> {
        Arc::new(Self {
            provider,
            handlers: Mutex::new(Some(OutcomeHandlers {
                on_success,
                on_close,
                on_error,
            })),
        })
    }

    fn take(&self, outcome: &str) -> Option<OutcomeHandlers> {
        let taken = self.handlers.lock().unwrap().take();
        if taken.is_none() {
            warn!(
                provider = %self.provider,
                outcome = outcome,
                "Payment outcome already settled, ignoring"
            );
        }
        taken
    }

    /// Deliver a success response. Returns false if the attempt had already
    /// settled.
    pub fn success(&self, response: PaymentResponse) -> bool {
        match self.take("success") {
            Some(handlers) => {
                (handlers.on_success)(response);
                true
            }
            None => false,
        }
    }

    /// The user dismissed the payment surface without completing.
    pub fn close(&self) -> bool {
        match self.take("close") {
            Some(handlers) => {
                (handlers.on_close)();
                true
            }
            None => false,
        }
    }

    /// Deliver a taxonomy error.
    pub fn error(&self, error: PaymentError) -> bool {
        match self.take("error") {
            Some(handlers) => {
                (handlers.on_error)(error);
                true
            }
            None => false,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.handlers.lock().unwrap().is_none()
    }
}
