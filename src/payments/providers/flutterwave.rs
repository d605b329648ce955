//! Flutterwave payment provider implementation
//!
//! Checkout v3 via the `FlutterwaveCheckout` global. Flutterwave expects the
//! amount in the major denomination and only reports a transaction when its
//! status is `successful`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{PaymentError, PaymentResult};
use crate::loader::ScriptLoader;
use crate::payments::providers::{metadata_text, string_field, to_major_units};
use crate::payments::traits::{
    CheckoutRuntime, ProviderAdapter, WidgetCall, WidgetHandle, WidgetHooks,
};
use crate::payments::types::{AdapterConfig, LoadOptions, Provider, ResponseBase};

pub const FLUTTERWAVE_SCRIPT_URL: &str = "https://checkout.flutterwave.com/v3.js";

const DEFAULT_PAYMENT_OPTIONS: &str = "card,mobilemoney,ussd";

pub struct FlutterwaveAdapter {
    loader: Arc<ScriptLoader>,
    runtime: Arc<dyn CheckoutRuntime>,
    instance: Mutex<Option<WidgetHandle>>,
}

impl FlutterwaveAdapter {
    pub fn new(loader: Arc<ScriptLoader>, runtime: Arc<dyn CheckoutRuntime>) -> Self {
        Self {
            loader,
            runtime,
            instance: Mutex::new(None),
        }
    }

    pub(crate) fn native_payload(config: &AdapterConfig) -> Value {
        let mut payload = json!({
            "public_key": config.public_key,
            "tx_ref": config.reference,
            "amount": to_major_units(config.amount),
            "currency": config.currency.as_str(),
            "payment_options": config
                .payment_options
                .as_deref()
                .unwrap_or(DEFAULT_PAYMENT_OPTIONS),
            "customer": {
                "email": config.customer.email,
                "phone_number": config.customer.phone,
                "name": config.customer.name,
            },
            "customizations": {
                "title": metadata_text(&config.metadata, "title", "Payment"),
                "description": metadata_text(&config.metadata, "description", "Payment"),
            },
        });
        if let Some(metadata) = &config.metadata {
            if let Some(logo) = metadata.get("logo").and_then(Value::as_str) {
                payload["customizations"]["logo"] = json!(logo);
            }
            payload["meta"] = Value::Object(metadata.clone());
        }
        payload
    }
}

#[async_trait]
impl ProviderAdapter for FlutterwaveAdapter {
    fn provider(&self) -> Provider {
        Provider::Flutterwave
    }

    async fn load_script(&self, _options: &LoadOptions) -> PaymentResult<()> {
        self.loader
            .ensure_loaded(FLUTTERWAVE_SCRIPT_URL)
            .await
            .map_err(|e| PaymentError::network(e.to_string(), Some(Provider::Flutterwave)))
    }

    fn initialize(&self, config: AdapterConfig) -> PaymentResult<()> {
        if config.customer.phone.is_none() {
            // a missing phone number degrades some payment methods but is
            // not a hard failure
            warn!(
                provider = %Provider::Flutterwave,
                "Flutterwave requires a phone number for some payment methods"
            );
        }

        let payload = Self::native_payload(&config);
        let base = ResponseBase::from_config(&config);
        let outcome = config.outcome.clone();
        let close_outcome = config.outcome.clone();

        let hooks = WidgetHooks {
            on_complete: Box::new(move |raw: Value| {
                let status = raw.get("status").and_then(Value::as_str).unwrap_or("");
                if status != "successful" {
                    debug!(
                        provider = %Provider::Flutterwave,
                        status = status,
                        "Ignoring non-successful checkout callback"
                    );
                    return;
                }
                let transaction_id = string_field(&raw, &["transaction_id"]);
                outcome.success(base.success(transaction_id, raw));
            }),
            on_close: Box::new(move || {
                close_outcome.close();
            }),
            on_error: None,
        };

        let handle = self.runtime.open_widget(WidgetCall {
            provider: Provider::Flutterwave,
            entry_point: "FlutterwaveCheckout",
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
