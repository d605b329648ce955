//! africapay — a unifying client-side facade over African payment checkout
//! widgets (Paystack, Flutterwave, Monnify, Remita).
//!
//! A host application describes a payment once, as a provider-agnostic
//! [`PaymentIntent`]; the facade loads the right vendor script, translates
//! the intent into that vendor's native initialization call, and normalizes
//! the vendor's asynchronous callback into one common [`PaymentResponse`].
//! Exactly one of the intent's success/close/error callbacks fires per
//! attempt.
//!
//! The vendor widgets themselves are external collaborators: the embedding
//! application supplies a [`CheckoutRuntime`] (and a [`ScriptDelivery`])
//! through which scripts are executed and widgets opened. Mobile hosts
//! without a direct widget binding can use the `bridge` module instead.

pub mod config;
pub mod error;
pub mod loader;
pub mod payments;
pub mod sanitize;

#[cfg(feature = "bridge")]
pub mod bridge;

pub use config::{Environment, GatewayConfig};
pub use error::{PaymentError, PaymentResult};
pub use loader::{HttpDelivery, ScriptDelivery, ScriptLoadError, ScriptLoader};
pub use payments::dispatch::CheckoutSession;
pub use payments::traits::{
    CheckoutRuntime, ProviderAdapter, WidgetCall, WidgetHandle, WidgetHooks,
};
pub use payments::types::{
    AdapterConfig, Currency, Customer, LoadOptions, Metadata, OutcomeSink, PaymentIntent,
    PaymentResponse, PaymentStatus, Provider,
};

#[cfg(feature = "bridge")]
pub use bridge::WebViewBridge;
