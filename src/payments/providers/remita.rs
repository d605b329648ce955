//! Remita payment provider implementation
//!
//! Inline bundle checkout via `RmPaymentEngine`. Remita is the one provider
//! that ships distinct demo and production script hosts, and the one that
//! exposes an explicit error hook on its widget.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::error;

use crate::error::{PaymentError, PaymentResult};
use crate::loader::ScriptLoader;
use crate::payments::providers::{metadata_text, string_field, to_major_units};
use crate::payments::traits::{
    CheckoutRuntime, ProviderAdapter, WidgetCall, WidgetHandle, WidgetHooks,
};
use crate::payments::types::{AdapterConfig, LoadOptions, Provider, ResponseBase};
use crate::sanitize::redact_secrets;

pub const REMITA_DEMO_SCRIPT_URL: &str =
    "https://remitademo.net/payment/v1/remita-pay-inline.bundle.js";
pub const REMITA_LIVE_SCRIPT_URL: &str =
    "https://login.remita.net/payment/v1/remita-pay-inline.bundle.js";

pub struct RemitaAdapter {
    loader: Arc<ScriptLoader>,
    runtime: Arc<dyn CheckoutRuntime>,
    instance: Mutex<Option<WidgetHandle>>,
}

impl RemitaAdapter {
    pub fn new(loader: Arc<ScriptLoader>, runtime: Arc<dyn CheckoutRuntime>) -> Self {
        Self {
            loader,
            runtime,
            instance: Mutex::new(None),
        }
    }

    pub(crate) fn script_url(test_mode: bool) -> &'static str {
        if test_mode {
            REMITA_DEMO_SCRIPT_URL
        } else {
            REMITA_LIVE_SCRIPT_URL
        }
    }

    pub(crate) fn check_required(config: &AdapterConfig) -> PaymentResult<()> {
        if config.merchant_id.as_deref().unwrap_or("").is_empty() {
            return Err(PaymentError::validation(
                "Merchant ID is required for Remita",
                "Please provide your Remita merchant ID",
            ));
        }
        if config.service_type_id.as_deref().unwrap_or("").is_empty() {
            return Err(PaymentError::validation(
                "Service Type ID is required for Remita",
                "Please provide your Remita service type ID",
            ));
        }
        if config.customer.name.as_deref().unwrap_or("").is_empty() {
            return Err(PaymentError::validation(
                "Customer name is required for Remita",
                "Please provide the customer name",
            ));
        }
        Ok(())
    }

    pub(crate) fn native_payload(config: &AdapterConfig) -> Value {
        // Remita wants the name split; everything after the first token is
        // the last name
        let name = config.customer.name.clone().unwrap_or_default();
        let mut parts = name.split_whitespace();
        let first_name = parts.next().unwrap_or("").to_string();
        let last_name = parts.collect::<Vec<_>>().join(" ");

        json!({
            "key": config.public_key,
            "merchantId": config.merchant_id,
            "serviceTypeId": config.service_type_id,
            "amount": to_major_units(config.amount),
            "currency": config.currency.as_str(),
            "transactionId": config.reference,
            "customerId": config.customer.email,
            "firstName": first_name,
            "lastName": last_name,
            "email": config.customer.email,
            "narration": metadata_text(&config.metadata, "description", "Payment"),
        })
    }
}

#[async_trait]
impl ProviderAdapter for RemitaAdapter {
    fn provider(&self) -> Provider {
        Provider::Remita
    }

    async fn load_script(&self, options: &LoadOptions) -> PaymentResult<()> {
        self.loader
            .ensure_loaded(Self::script_url(options.test_mode))
            .await
            .map_err(|e| PaymentError::network(e.to_string(), Some(Provider::Remita)))
    }

    fn initialize(&self, config: AdapterConfig) -> PaymentResult<()> {
        Self::check_required(&config)?;

        let payload = Self::native_payload(&config);
        let base = ResponseBase::from_config(&config);
        let outcome = config.outcome.clone();
        let close_outcome = config.outcome.clone();

        let hooks = WidgetHooks {
            on_complete: Box::new(move |raw: Value| {
                // the engine reports either `transactionId` or the RRR,
                // depending on the channel
                let transaction_id = string_field(&raw, &["transactionId", "RRR"]);
                outcome.success(base.success(transaction_id, raw));
            }),
            on_close: Box::new(move || {
                close_outcome.close();
            }),
            // surfaced to logging only; error propagation stays with the
            // dispatcher
            on_error: Some(Box::new(|raw: Value| {
                error!(
                    provider = %Provider::Remita,
                    response = %redact_secrets(&raw.to_string()),
                    "Payment engine reported an error"
                );
            })),
        };

        let handle = self.runtime.open_widget(WidgetCall {
            provider: Provider::Remita,
            entry_point: "RmPaymentEngine.init",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::testutil::{config_for, CountingDelivery, FakeRuntime, OutcomeProbe};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn create_test_adapter(
        runtime: Arc<FakeRuntime>,
    ) -> (RemitaAdapter, Arc<CountingDelivery>, Arc<ScriptLoader>) {
        let delivery = CountingDelivery::new(0);
        let loader = Arc::new(ScriptLoader::new(delivery.clone()));
        (
            RemitaAdapter::new(loader.clone(), runtime),
            delivery,
            loader,
        )
    }

    #[test]
    fn test_script_url_varies_by_mode() {
        assert_eq!(RemitaAdapter::script_url(true), REMITA_DEMO_SCRIPT_URL);
        assert_eq!(RemitaAdapter::script_url(false), REMITA_LIVE_SCRIPT_URL);
    }

    #[tokio::test]
    async fn test_load_script_uses_demo_host_in_test_mode() {
        let runtime = FakeRuntime::new();
        let (adapter, delivery, loader) = create_test_adapter(runtime);

        adapter
            .load_script(&LoadOptions { test_mode: true })
            .await
            .unwrap();
        assert_eq!(delivery.calls.load(Ordering::SeqCst), 1);
        assert!(loader.is_loaded(REMITA_DEMO_SCRIPT_URL));
        assert!(!loader.is_loaded(REMITA_LIVE_SCRIPT_URL));
    }

    #[test]
    fn test_missing_merchant_id_fails_before_widget() {
        let runtime = FakeRuntime::new();
        let (adapter, delivery, _) = create_test_adapter(runtime.clone());
        let probe = OutcomeProbe::new();

        let mut config = config_for(Provider::Remita, probe.sink(Provider::Remita));
        config.merchant_id = None;

        let err = adapter.initialize(config).unwrap_err();
        assert_eq!(err.code(), crate::error::VALIDATION_ERROR);
        assert_eq!(runtime.open_count(), 0);
        assert_eq!(delivery.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_service_type_id_fails_before_widget() {
        let runtime = FakeRuntime::new();
        let (adapter, _, _) = create_test_adapter(runtime.clone());
        let probe = OutcomeProbe::new();

        let mut config = config_for(Provider::Remita, probe.sink(Provider::Remita));
        config.service_type_id = Some(String::new());

        assert!(adapter.initialize(config).is_err());
        assert_eq!(runtime.open_count(), 0);
    }

    #[test]
    fn test_payload_maps_remita_field_names() {
        let runtime = FakeRuntime::new();
        let (adapter, _, _) = create_test_adapter(runtime.clone());
        let probe = OutcomeProbe::new();

        adapter
            .initialize(config_for(Provider::Remita, probe.sink(Provider::Remita)))
            .unwrap();

        let payload = runtime.last_payload();
        assert_eq!(payload["amount"], json!(1500));
        assert_eq!(payload["merchantId"], "2547916");
        assert_eq!(payload["serviceTypeId"], "4430731");
        assert_eq!(payload["transactionId"], "tx_1");
        assert_eq!(payload["customerId"], "ada@example.com");
        assert_eq!(payload["firstName"], "Ada");
        assert_eq!(payload["lastName"], "Obi");
        assert_eq!(payload["narration"], "Payment");
        assert_eq!(runtime.last_entry_point(), "RmPaymentEngine.init");
    }

    #[test]
    fn test_transaction_id_falls_back_to_rrr() {
        let runtime = FakeRuntime::new();
        let (adapter, _, _) = create_test_adapter(runtime.clone());
        let probe = OutcomeProbe::new();

        adapter
            .initialize(config_for(Provider::Remita, probe.sink(Provider::Remita)))
            .unwrap();
        runtime.fire_complete(json!({ "RRR": "110007734963" }));

        let successes = probe.successes.lock().unwrap();
        assert_eq!(successes[0].transaction_id.as_deref(), Some("110007734963"));
        assert_eq!(successes[0].reference, "tx_1");
    }

    #[test]
    fn test_error_hook_logs_without_settling() {
        let runtime = FakeRuntime::new();
        let (adapter, _, _) = create_test_adapter(runtime.clone());
        let probe = OutcomeProbe::new();
        let sink = probe.sink(Provider::Remita);

        adapter
            .initialize(config_for(Provider::Remita, sink.clone()))
            .unwrap();
        assert!(runtime.fire_error(json!({ "responseCode": "02", "responseMsg": "declined" })));

        // the vendor error hook never settles the outcome itself
        assert!(!sink.is_settled());
        assert_eq!(probe.error_count(), 0);
        assert_eq!(probe.success_count(), 0);
    }
}
