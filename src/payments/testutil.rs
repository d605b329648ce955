//! Test doubles shared by the payment unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{PaymentError, PaymentResult};
use crate::loader::{ScriptDelivery, ScriptLoadError};
use crate::payments::traits::{CheckoutRuntime, WidgetCall, WidgetHandle};
use crate::payments::types::{
    AdapterConfig, CloseHandler, Currency, Customer, ErrorHandler, OutcomeSink, PaymentIntent,
    PaymentResponse, Provider, SuccessHandler,
};

/// Captures widget invocations and lets tests drive the vendor hooks.
pub(crate) struct FakeRuntime {
    pub opened: Mutex<Vec<WidgetCall>>,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn last_payload(&self) -> Value {
        self.opened
            .lock()
            .unwrap()
            .last()
            .expect("no widget was opened")
            .payload
            .clone()
    }

    pub fn last_entry_point(&self) -> &'static str {
        self.opened
            .lock()
            .unwrap()
            .last()
            .expect("no widget was opened")
            .entry_point
    }

    fn with_last<R>(&self, f: impl FnOnce(&WidgetCall) -> R) -> R {
        let opened = self.opened.lock().unwrap();
        f(opened.last().expect("no widget was opened"))
    }

    /// Fire the vendor's success/complete hook with `raw`.
    pub fn fire_complete(&self, raw: Value) {
        self.with_last(|call| (call.hooks.on_complete)(raw));
    }

    /// Fire the vendor's close/cancel hook.
    pub fn fire_close(&self) {
        self.with_last(|call| (call.hooks.on_close)());
    }

    /// Fire the vendor's error hook, if the adapter registered one.
    pub fn fire_error(&self, raw: Value) -> bool {
        self.with_last(|call| match &call.hooks.on_error {
            Some(hook) => {
                hook(raw);
                true
            }
            None => false,
        })
    }
}

impl CheckoutRuntime for FakeRuntime {
    fn open_widget(&self, call: WidgetCall) -> PaymentResult<WidgetHandle> {
        let handle: WidgetHandle = Arc::new(call.entry_point);
        self.opened.lock().unwrap().push(call);
        Ok(handle)
    }
}

/// Delivery double that counts calls and optionally fails the first N.
pub(crate) struct CountingDelivery {
    pub calls: AtomicUsize,
    failures_remaining: AtomicUsize,
}

impl CountingDelivery {
    pub fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(failures),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScriptDelivery for CountingDelivery {
    async fn deliver(&self, url: &str) -> Result<(), ScriptLoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ScriptLoadError::Failed {
                url: url.to_string(),
                message: "connection reset".to_string(),
            });
        }
        Ok(())
    }
}

/// Records which outcome callbacks fired, and how often.
#[derive(Default)]
pub(crate) struct OutcomeProbe {
    pub successes: Mutex<Vec<PaymentResponse>>,
    pub closes: AtomicUsize,
    pub errors: Mutex<Vec<PaymentError>>,
}

impl OutcomeProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sink(self: &Arc<Self>, provider: Provider) -> Arc<OutcomeSink> {
        let on_success = self.clone();
        let on_close = self.clone();
        let on_error = self.clone();
        OutcomeSink::new(
            provider,
            Box::new(move |response| {
                on_success.successes.lock().unwrap().push(response);
            }),
            Box::new(move || {
                on_close.closes.fetch_add(1, Ordering::SeqCst);
            }),
            Box::new(move |error| {
                on_error.errors.lock().unwrap().push(error);
            }),
        )
    }

    /// The same recording handlers as loose callbacks, for wiring straight
    /// into a `PaymentIntent`.
    pub fn callbacks(self: &Arc<Self>) -> (SuccessHandler, CloseHandler, ErrorHandler) {
        let on_success = self.clone();
        let on_close = self.clone();
        let on_error = self.clone();
        (
            Box::new(move |response| {
                on_success.successes.lock().unwrap().push(response);
            }),
            Box::new(move || {
                on_close.closes.fetch_add(1, Ordering::SeqCst);
            }),
            Box::new(move |error| {
                on_error.errors.lock().unwrap().push(error);
            }),
        )
    }

    pub fn success_count(&self) -> usize {
        self.successes.lock().unwrap().len()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

/// A fully-populated intent for `provider`, callbacks wired to `probe`.
pub(crate) fn intent_for(provider: Provider, probe: &Arc<OutcomeProbe>) -> PaymentIntent {
    let (on_success, on_close, on_error) = probe.callbacks();
    let mut intent = PaymentIntent::new(
        provider,
        150_000,
        Currency::NGN,
        "tx_1",
        "pk_test_abc123",
        Customer {
            email: "ada@example.com".to_string(),
            name: Some("Ada Obi".to_string()),
            phone: Some("+2348012345678".to_string()),
        },
    );
    intent.contract_code = (provider == Provider::Monnify).then(|| "594502".to_string());
    intent.merchant_id = (provider == Provider::Remita).then(|| "2547916".to_string());
    intent.service_type_id = (provider == Provider::Remita).then(|| "4430731".to_string());
    intent.on_success = Some(on_success);
    intent.on_close = Some(on_close);
    intent.on_error = Some(on_error);
    intent
}

/// A fully-populated adapter config for `provider`, with the
/// provider-specific credentials filled in.
pub(crate) fn config_for(provider: Provider, outcome: Arc<OutcomeSink>) -> AdapterConfig {
    AdapterConfig {
        provider,
        amount: 150_000,
        currency: Currency::NGN,
        reference: "tx_1".to_string(),
        public_key: "pk_test_abc123".to_string(),
        customer: Customer {
            email: "ada@example.com".to_string(),
            name: Some("Ada Obi".to_string()),
            phone: Some("+2348012345678".to_string()),
        },
        metadata: None,
        contract_code: (provider == Provider::Monnify).then(|| "594502".to_string()),
        merchant_id: (provider == Provider::Remita).then(|| "2547916".to_string()),
        service_type_id: (provider == Provider::Remita).then(|| "4430731".to_string()),
        channels: None,
        payment_options: None,
        test_mode: false,
        outcome,
    }
}
