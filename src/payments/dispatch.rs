//! Payment dispatch
//!
//! `CheckoutSession` owns the transient per-attempt state (loading flag,
//! last error, cached adapter) and drives each attempt through
//! sanitize → validate → load script → initialize, mapping every failure
//! into the payment error taxonomy. Results are delivered exclusively
//! through the intent's callbacks; nothing escapes `initialize_payment`.

use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use crate::error::{PaymentError, PaymentResult};
use crate::loader::{ScriptDelivery, ScriptLoader};
use crate::payments::providers::{AdapterRegistry, MonnifyAdapter, RemitaAdapter};
use crate::payments::traits::{CheckoutRuntime, ProviderAdapter, WidgetHandle};
use crate::payments::types::{
    AdapterConfig, Customer, LoadOptions, OutcomeSink, PaymentIntent, Provider,
};
use crate::sanitize;

struct SessionState {
    loading: bool,
    error: Option<PaymentError>,
    adapter: Option<Arc<dyn ProviderAdapter>>,
}

/// One payment session: transient request state plus the adapter registry.
///
/// Sessions are independent; a process may run several concurrently. The
/// cached adapter survives across attempts (for `provider_instance`), the
/// loading and error state reset on each new attempt or explicit `reset`.
pub struct CheckoutSession {
    registry: AdapterRegistry,
    state: Arc<Mutex<SessionState>>,
}

impl CheckoutSession {
    pub fn new(delivery: Arc<dyn ScriptDelivery>, runtime: Arc<dyn CheckoutRuntime>) -> Self {
        let loader = Arc::new(ScriptLoader::new(delivery));
        Self {
            registry: AdapterRegistry::new(loader, runtime),
            state: Arc::new(Mutex::new(SessionState {
                loading: false,
                error: None,
                adapter: None,
            })),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().unwrap().loading
    }

    pub fn last_error(&self) -> Option<PaymentError> {
        self.state.lock().unwrap().error.clone()
    }

    /// Clear loading and error state. The cached adapter is kept so
    /// `provider_instance` keeps working between attempts.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.loading = false;
        state.error = None;
    }

    /// Raw vendor SDK handle from the most recently used adapter.
    pub fn provider_instance(&self) -> Option<WidgetHandle> {
        let state = self.state.lock().unwrap();
        state.adapter.as_ref().and_then(|a| a.instance())
    }

    /// Run one payment attempt. Fire-and-forget: the result arrives through
    /// the intent's callbacks, and exactly one of them fires exactly once.
    pub async fn initialize_payment(&self, intent: PaymentIntent) {
        let provider = intent.provider;

        {
            let mut state = self.state.lock().unwrap();
            state.loading = true;
            state.error = None;
        }

        let PaymentIntent {
            provider: _,
            amount,
            currency,
            reference,
            public_key,
            customer,
            metadata,
            contract_code,
            merchant_id,
            service_type_id,
            channels,
            payment_options,
            test_mode,
            on_success,
            on_close,
            on_error,
            adapter,
        } = intent;

        // wrap the caller's callbacks so every terminal outcome clears the
        // loading flag and errors land in session state before the caller
        // sees them
        let caller_success = on_success.unwrap_or_else(|| Box::new(|_| {}));
        let caller_close = on_close.unwrap_or_else(|| Box::new(|| {}));
        let caller_error = on_error.unwrap_or_else(|| Box::new(|_| {}));

        let success_state = self.state.clone();
        let close_state = self.state.clone();
        let error_state = self.state.clone();

        let outcome = OutcomeSink::new(
            provider,
            Box::new(move |response| {
                success_state.lock().unwrap().loading = false;
                caller_success(response);
            }),
            Box::new(move || {
                close_state.lock().unwrap().loading = false;
                caller_close();
            }),
            Box::new(move |err: PaymentError| {
                {
                    let mut state = error_state.lock().unwrap();
                    state.loading = false;
                    state.error = Some(err.clone());
                }
                error!(
                    provider = %provider,
                    code = err.code(),
                    error = %sanitize::redact_secrets(&err.to_string()),
                    "Payment attempt failed"
                );
                caller_error(err);
            }),
        );

        let resolved = adapter
            .or_else(|| self.registry.get(provider))
            .or_else(|| self.state.lock().unwrap().adapter.clone());
        let resolved = match resolved {
            Some(adapter) => adapter,
            None => {
                outcome.error(PaymentError::validation(
                    format!("Invalid provider: {}", provider),
                    "Please use one of: paystack, flutterwave, monnify, remita",
                ));
                return;
            }
        };
        self.state.lock().unwrap().adapter = Some(resolved.clone());

        // sanitize before validating, so validation sees cleaned data
        let config = AdapterConfig {
            provider,
            amount,
            currency,
            reference: sanitize::clean_reference(&reference),
            public_key,
            customer: Customer {
                email: sanitize::clean_email(&customer.email),
                name: customer
                    .name
                    .as_deref()
                    .map(sanitize::clean_name)
                    .filter(|n| !n.is_empty()),
                phone: customer
                    .phone
                    .as_deref()
                    .map(sanitize::clean_phone)
                    .filter(|p| !p.is_empty()),
            },
            metadata: metadata.map(sanitize::clean_metadata),
            contract_code,
            merchant_id,
            service_type_id,
            channels,
            payment_options,
            test_mode,
            outcome: outcome.clone(),
        };

        if let Err(err) = self.try_initialize(resolved, config).await {
            outcome.error(Self::map_failure(err, provider));
        }
    }

    async fn try_initialize(
        &self,
        adapter: Arc<dyn ProviderAdapter>,
        config: AdapterConfig,
    ) -> PaymentResult<()> {
        Self::validate_config(&config)?;

        info!(
            provider = %config.provider,
            reference = %config.reference,
            amount = config.amount,
            currency = %config.currency,
            "Initializing payment"
        );

        adapter
            .load_script(&LoadOptions {
                test_mode: config.test_mode,
            })
            .await?;
        adapter.initialize(config)
    }

    /// Common checks, then the provider-specific ones — the same checks the
    /// adapters run, performed early so the caller gets a single consistent
    /// error path and no script is fetched for an invalid intent.
    fn validate_config(config: &AdapterConfig) -> PaymentResult<()> {
        if config.public_key.trim().is_empty() {
            return Err(PaymentError::validation(
                "Public key is required",
                "Please provide your payment provider public key",
            ));
        }
        if config.customer.email.is_empty() {
            return Err(PaymentError::validation(
                "Customer email is required",
                "Please provide a valid customer email address",
            ));
        }
        if config.amount == 0 {
            return Err(PaymentError::validation(
                "Amount must be greater than 0",
                "Please provide a valid payment amount",
            ));
        }
        if config.reference.is_empty() {
            return Err(PaymentError::validation(
                "Payment reference is required",
                "Please provide a unique transaction reference",
            ));
        }

        match config.provider {
            Provider::Monnify => MonnifyAdapter::check_required(config),
            Provider::Remita => RemitaAdapter::check_required(config),
            Provider::Flutterwave => {
                if config.customer.phone.is_none() {
                    warn!(
                        provider = %Provider::Flutterwave,
                        "Phone number missing; some Flutterwave payment methods need one"
                    );
                }
                Ok(())
            }
            Provider::Paystack => Ok(()),
        }
    }

    /// Taxonomy mapping policy: typed errors pass through; unclassified
    /// failures that smell like a script delivery problem become network
    /// errors, everything else stays the generic fallback with its message
    /// redacted.
    fn map_failure(err: PaymentError, provider: Provider) -> PaymentError {
        match err {
            PaymentError::Unknown { message, .. } => {
                if message.contains("Failed to load script") || message.contains("timed out") {
                    PaymentError::network(message, Some(provider))
                } else {
                    PaymentError::unknown(sanitize::redact_secrets(&message), Some(provider))
                }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NETWORK_ERROR, UNKNOWN_ERROR, VALIDATION_ERROR};
    use crate::payments::testutil::{intent_for, CountingDelivery, FakeRuntime, OutcomeProbe};
    use serde_json::json;

    fn create_session() -> (CheckoutSession, Arc<CountingDelivery>, Arc<FakeRuntime>) {
        let delivery = CountingDelivery::new(0);
        let runtime = FakeRuntime::new();
        (
            CheckoutSession::new(delivery.clone(), runtime.clone()),
            delivery,
            runtime,
        )
    }

    #[tokio::test]
    async fn test_success_flow_clears_loading() {
        let (session, delivery, runtime) = create_session();
        let probe = OutcomeProbe::new();

        session
            .initialize_payment(intent_for(Provider::Paystack, &probe))
            .await;
        assert!(session.is_loading());
        assert_eq!(delivery.call_count(), 1);

        runtime.fire_complete(json!({ "trans": "12345", "status": "success" }));

        assert!(!session.is_loading());
        assert!(session.last_error().is_none());
        assert_eq!(probe.success_count(), 1);
        assert_eq!(probe.close_count(), 0);
    }

    #[tokio::test]
    async fn test_close_flow_clears_loading() {
        let (session, _, runtime) = create_session();
        let probe = OutcomeProbe::new();

        session
            .initialize_payment(intent_for(Provider::Flutterwave, &probe))
            .await;
        runtime.fire_close();

        assert!(!session.is_loading());
        assert_eq!(probe.close_count(), 1);
        assert_eq!(probe.success_count(), 0);
    }

    #[tokio::test]
    async fn test_validation_failure_skips_script_load() {
        let (session, delivery, runtime) = create_session();
        let probe = OutcomeProbe::new();

        let mut intent = intent_for(Provider::Monnify, &probe);
        intent.contract_code = None;
        session.initialize_payment(intent).await;

        assert_eq!(delivery.call_count(), 0);
        assert_eq!(runtime.open_count(), 0);
        assert_eq!(probe.error_count(), 1);
        assert!(!session.is_loading());

        let err = session.last_error().unwrap();
        assert_eq!(err.code(), VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn test_empty_public_key_fails_validation() {
        let (session, delivery, _) = create_session();
        let probe = OutcomeProbe::new();

        let mut intent = intent_for(Provider::Paystack, &probe);
        intent.public_key = String::new();
        session.initialize_payment(intent).await;

        assert_eq!(delivery.call_count(), 0);
        assert_eq!(session.last_error().unwrap().code(), VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn test_script_failure_maps_to_network_error_and_is_retryable() {
        let delivery = CountingDelivery::new(1);
        let runtime = FakeRuntime::new();
        let session = CheckoutSession::new(delivery.clone(), runtime.clone());

        let probe = OutcomeProbe::new();
        session
            .initialize_payment(intent_for(Provider::Paystack, &probe))
            .await;

        let err = session.last_error().unwrap();
        assert_eq!(err.code(), NETWORK_ERROR);
        assert!(err.is_retryable());
        assert!(!session.is_loading());
        assert_eq!(probe.error_count(), 1);

        // the failed URL was evicted, so a fresh attempt re-fetches and wins
        let retry = OutcomeProbe::new();
        session
            .initialize_payment(intent_for(Provider::Paystack, &retry))
            .await;
        runtime.fire_complete(json!({ "trans": "12345" }));

        assert_eq!(delivery.call_count(), 2);
        assert_eq!(retry.success_count(), 1);
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_intent_fields_are_sanitized_before_the_adapter() {
        let (session, _, runtime) = create_session();
        let probe = OutcomeProbe::new();

        let mut intent = intent_for(Provider::Paystack, &probe);
        intent.customer.email = "  Ada@Example.COM ".to_string();
        intent.reference = " tx 1;drop ".to_string();
        session.initialize_payment(intent).await;

        let payload = runtime.last_payload();
        assert_eq!(payload["email"], "ada@example.com");
        assert_eq!(payload["ref"], "tx1drop");
    }

    #[tokio::test]
    async fn test_reset_clears_error_state() {
        let (session, _, _) = create_session();
        let probe = OutcomeProbe::new();

        let mut intent = intent_for(Provider::Remita, &probe);
        intent.merchant_id = None;
        session.initialize_payment(intent).await;
        assert!(session.last_error().is_some());

        session.reset();
        assert!(session.last_error().is_none());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_provider_instance_after_initialize() {
        let (session, _, runtime) = create_session();
        let probe = OutcomeProbe::new();

        assert!(session.provider_instance().is_none());
        session
            .initialize_payment(intent_for(Provider::Monnify, &probe))
            .await;
        assert_eq!(runtime.open_count(), 1);
        assert!(session.provider_instance().is_some());
    }

    #[test]
    fn test_map_failure_reclassifies_script_failures() {
        let err = PaymentError::unknown(
            "Failed to load script: https://js.paystack.co/v1/inline.js",
            None,
        );
        let mapped = CheckoutSession::map_failure(err, Provider::Paystack);
        assert_eq!(mapped.code(), NETWORK_ERROR);
        assert_eq!(mapped.provider(), Some(Provider::Paystack));
    }

    #[test]
    fn test_map_failure_redacts_unknown_messages() {
        let err = PaymentError::unknown("widget blew up with key sk_live_8f2a91bcd0", None);
        let mapped = CheckoutSession::map_failure(err, Provider::Paystack);
        assert_eq!(mapped.code(), UNKNOWN_ERROR);
        assert!(!mapped.to_string().contains("sk_live_8f2a91bcd0"));
    }

    #[test]
    fn test_map_failure_passes_taxonomy_through() {
        let err = PaymentError::validation("Amount must be greater than 0", "fix it");
        let mapped = CheckoutSession::map_failure(err.clone(), Provider::Monnify);
        assert_eq!(mapped.code(), VALIDATION_ERROR);
        assert_eq!(mapped.to_string(), err.to_string());
    }
}
