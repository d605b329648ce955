//! Paystack payment provider implementation
//!
//! Inline checkout through Paystack's `PaystackPop` widget. Paystack takes
//! the amount in the smallest denomination, so this is the one adapter that
//! performs no unit conversion.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{PaymentError, PaymentResult};
use crate::loader::ScriptLoader;
use crate::payments::providers::string_field;
use crate::payments::traits::{
    CheckoutRuntime, ProviderAdapter, WidgetCall, WidgetHandle, WidgetHooks,
};
use crate::payments::types::{AdapterConfig, LoadOptions, Provider, ResponseBase};

/// Same URL for test and live.
pub const PAYSTACK_SCRIPT_URL: &str = "https://js.paystack.co/v1/inline.js";

pub struct PaystackAdapter {
    loader: Arc<ScriptLoader>,
    runtime: Arc<dyn CheckoutRuntime>,
    instance: Mutex<Option<WidgetHandle>>,
}

impl PaystackAdapter {
    pub fn new(loader: Arc<ScriptLoader>, runtime: Arc<dyn CheckoutRuntime>) -> Self {
        Self {
            loader,
            runtime,
            instance: Mutex::new(None),
        }
    }

    /// Paystack's native initialization payload. The field names are part of
    /// the vendor contract.
    pub(crate) fn native_payload(config: &AdapterConfig) -> Value {
        let mut payload = json!({
            "key": config.public_key,
            "email": config.customer.email,
            "amount": config.amount,
            "currency": config.currency.as_str(),
            "ref": config.reference,
        });
        if let Some(metadata) = &config.metadata {
            payload["metadata"] = Value::Object(metadata.clone());
        }
        if let Some(channels) = &config.channels {
            payload["channels"] = json!(channels);
        }
        payload
    }
}

#[async_trait]
impl ProviderAdapter for PaystackAdapter {
    fn provider(&self) -> Provider {
        Provider::Paystack
    }

    async fn load_script(&self, _options: &LoadOptions) -> PaymentResult<()> {
        self.loader
            .ensure_loaded(PAYSTACK_SCRIPT_URL)
            .await
            .map_err(|e| PaymentError::network(e.to_string(), Some(Provider::Paystack)))
    }

    fn initialize(&self, config: AdapterConfig) -> PaymentResult<()> {
        let payload = Self::native_payload(&config);
        let base = ResponseBase::from_config(&config);
        let outcome = config.outcome.clone();
        let close_outcome = config.outcome.clone();

        let hooks = WidgetHooks {
            on_complete: Box::new(move |raw: Value| {
                // Paystack is inconsistent about the id field across widget
                // versions
                let transaction_id = string_field(&raw, &["trans", "transaction"]);
                debug!(
                    provider = %Provider::Paystack,
                    transaction_id = ?transaction_id,
                    "Checkout completed"
                );
                outcome.success(base.success(transaction_id, raw));
            }),
            on_close: Box::new(move || {
                close_outcome.close();
            }),
            on_error: None,
        };

        let handle = self.runtime.open_widget(WidgetCall {
            provider: Provider::Paystack,
            entry_point: "PaystackPop.setup",
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
