//! Monnify payment provider implementation
//!
//! Web SDK checkout via the `MonnifySDK` global. Monnify signals the result
//! through a status string on its `onComplete` payload rather than a
//! boolean: anything other than `PAID`/`SUCCESS` means the transaction did
//! not go through and must not be reported as a success.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::{PaymentError, PaymentResult};
use crate::loader::ScriptLoader;
use crate::payments::providers::{metadata_text, string_field, to_major_units};
use crate::payments::traits::{
    CheckoutRuntime, ProviderAdapter, WidgetCall, WidgetHandle, WidgetHooks,
};
use crate::payments::types::{AdapterConfig, LoadOptions, Provider, ResponseBase};

/// Same URL for test and live.
pub const MONNIFY_SCRIPT_URL: &str = "https://sdk.monnify.com/plugin/monnify.js";

const PAID_STATUSES: [&str; 2] = ["PAID", "SUCCESS"];

pub struct MonnifyAdapter {
    loader: Arc<ScriptLoader>,
    runtime: Arc<dyn CheckoutRuntime>,
    instance: Mutex<Option<WidgetHandle>>,
}

impl MonnifyAdapter {
    pub fn new(loader: Arc<ScriptLoader>, runtime: Arc<dyn CheckoutRuntime>) -> Self {
        Self {
            loader,
            runtime,
            instance: Mutex::new(None),
        }
    }

    /// Fail fast on the fields Monnify rejects at its own gate.
    pub(crate) fn check_required(config: &AdapterConfig) -> PaymentResult<()> {
        if config.contract_code.as_deref().unwrap_or("").is_empty() {
            return Err(PaymentError::validation(
                "Contract Code is required for Monnify",
                "Please provide your Monnify contract code",
            ));
        }
        if config.customer.name.as_deref().unwrap_or("").is_empty() {
            return Err(PaymentError::validation(
                "Customer name is required for Monnify",
                "Please provide the customer name",
            ));
        }
        Ok(())
    }

    pub(crate) fn native_payload(config: &AdapterConfig) -> Value {
        let mut payload = json!({
            "amount": to_major_units(config.amount),
            "currency": config.currency.as_str(),
            "reference": config.reference,
            "customerName": config.customer.name,
            "customerEmail": config.customer.email,
            "apiKey": config.public_key,
            "contractCode": config.contract_code,
            "paymentDescription": metadata_text(&config.metadata, "description", "Payment"),
        });
        if let Some(metadata) = &config.metadata {
            payload["metadata"] = Value::Object(metadata.clone());
        }
        payload
    }

    /// Whether a Monnify `onComplete` payload actually represents a paid
    /// transaction.
    pub(crate) fn is_paid(raw: &Value) -> bool {
        raw.get("status")
            .and_then(Value::as_str)
            .map(|status| PAID_STATUSES.contains(&status))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ProviderAdapter for MonnifyAdapter {
    fn provider(&self) -> Provider {
        Provider::Monnify
    }

    async fn load_script(&self, _options: &LoadOptions) -> PaymentResult<()> {
        self.loader
            .ensure_loaded(MONNIFY_SCRIPT_URL)
            .await
            .map_err(|e| PaymentError::network(e.to_string(), Some(Provider::Monnify)))
    }

    fn initialize(&self, config: AdapterConfig) -> PaymentResult<()> {
        Self::check_required(&config)?;

        let payload = Self::native_payload(&config);
        let base = ResponseBase::from_config(&config);
        let outcome = config.outcome.clone();
        let close_outcome = config.outcome.clone();

        let hooks = WidgetHooks {
            on_complete: Box::new(move |raw: Value| {
                if !Self::is_paid(&raw) {
                    // unpaid completions stay silent; on_success must never
                    // fire for an unpaid transaction
                    warn!(
                        provider = %Provider::Monnify,
                        status = raw.get("status").and_then(serde_json::Value::as_str).unwrap_or("<missing>"),
                        "Ignoring unpaid checkout completion"
                    );
                    return;
                }
                let transaction_id = string_field(&raw, &["transactionReference"]);
                outcome.success(base.success(transaction_id, raw));
            }),
            on_close: Box::new(move || {
                close_outcome.close();
            }),
            on_error: None,
        };

        let handle = self.runtime.open_widget(WidgetCall {
            provider: Provider::Monnify,
            entry_point: "MonnifySDK.initialize",
            payload,
            hooks,
        })?;
        *self.instance.lock().unwrap() = Some(handle);
        Ok(())
    }

    fn instance(&self) -> Option<WidgetHandle> {
        self.instance.lock().unwrap().clone()
    }
}
