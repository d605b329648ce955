//! Payment adapter trait definitions
//!
//! Defines the common capability set every provider adapter implements, and
//! the host-supplied runtime seam through which the vendor widgets are
//! reached.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PaymentResult;
use crate::payments::types::{AdapterConfig, LoadOptions, Provider};

/// Opaque handle to the raw vendor SDK object, as surfaced by the host
/// runtime. Kept only as an escape hatch for callers needing advanced
/// provider features.
pub type WidgetHandle = Arc<dyn Any + Send + Sync>;

/// Hooks an adapter registers with the vendor widget. The vendor drives
/// these; the adapter's closures translate them into the normalized outcome.
pub struct WidgetHooks {
    /// Fired when the vendor reports a completed transaction. Receives the
    /// vendor's raw callback payload.
    pub on_complete: Box<dyn Fn(Value) + Send + Sync>,
    /// Fired when the user dismisses the payment surface.
    pub on_close: Box<dyn Fn() + Send + Sync>,
    /// Fired by vendors that expose an explicit error hook (Remita).
    pub on_error: Option<Box<dyn Fn(Value) + Send + Sync>>,
}

/// One provider-native widget invocation: the vendor entry point, the
/// payload mapped into that vendor's field names, and the callback hooks.
pub struct WidgetCall {
    pub provider: Provider,
    /// The vendor global the host must call, e.g. `PaystackPop.setup`
    pub entry_point: &'static str,
    pub payload: Value,
    pub hooks: WidgetHooks,
}

/// Host-side surface that executes vendor widgets.
///
/// The facade never talks to a vendor SDK directly; the embedding
/// application (browser shell, web view, test double) implements this and
/// fires the hooks when the vendor does.
pub trait CheckoutRuntime: Send + Sync {
    fn open_widget(&self, call: WidgetCall) -> PaymentResult<WidgetHandle>;
}

/// Uniform capability set implemented once per provider.
///
/// `load_script` always settles before `initialize` is invoked for a given
/// attempt; `initialize` performs its required-field checks synchronously,
/// before any widget call.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which provider this adapter drives.
    fn provider(&self) -> Provider;

    /// Resolve the provider's script URL (test/live variants where the
    /// provider differentiates) and ensure it is loaded.
    async fn load_script(&self, options: &LoadOptions) -> PaymentResult<()>;

    /// Translate the normalized config into the provider's native
    /// initialization call and register the outcome hooks.
    fn initialize(&self, config: AdapterConfig) -> PaymentResult<()>;

    /// The raw vendor SDK handle, `None` until a successful `initialize`.
    fn instance(&self) -> Option<WidgetHandle>;
}
