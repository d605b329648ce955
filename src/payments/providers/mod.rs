//! Provider adapter implementations
//!
//! One concrete adapter per supported provider, plus the registry the
//! dispatcher resolves them from.

pub mod flutterwave;
pub mod monnify;
pub mod paystack;
pub mod remita;

pub use flutterwave::FlutterwaveAdapter;
pub use monnify::MonnifyAdapter;
pub use paystack::PaystackAdapter;
pub use remita::RemitaAdapter;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::loader::ScriptLoader;
use crate::payments::traits::{CheckoutRuntime, ProviderAdapter};
use crate::payments::types::{Metadata, Provider};

/// Built-in adapter registry keyed by provider.
pub struct AdapterRegistry {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    pub fn new(loader: Arc<ScriptLoader>, runtime: Arc<dyn CheckoutRuntime>) -> Self {
        let mut adapters: HashMap<Provider, Arc<dyn ProviderAdapter>> = HashMap::new();
        adapters.insert(
            Provider::Paystack,
            Arc::new(PaystackAdapter::new(loader.clone(), runtime.clone())),
        );
        adapters.insert(
            Provider::Flutterwave,
            Arc::new(FlutterwaveAdapter::new(loader.clone(), runtime.clone())),
        );
        adapters.insert(
            Provider::Monnify,
            Arc::new(MonnifyAdapter::new(loader.clone(), runtime.clone())),
        );
        adapters.insert(
            Provider::Remita,
            Arc::new(RemitaAdapter::new(loader, runtime)),
        );
        Self { adapters }
    }

    pub fn get(&self, provider: Provider) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }
}

/// First non-empty string (or stringified number) among the candidate keys.
/// Providers are inconsistent about where they put their transaction id, so
/// every adapter probes an ordered candidate list.
pub(crate) fn string_field(raw: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match raw.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// Convert a minor-unit amount (kobo/cents) to the major unit some vendors
/// expect. Whole amounts stay integral so the vendor payload carries `1500`,
/// not `1500.0`.
pub(crate) fn to_major_units(minor: u64) -> Value {
    if minor % 100 == 0 {
        Value::from(minor / 100)
    } else {
        Value::from(minor as f64 / 100.0)
    }
}

/// Pull a display string out of the caller metadata, with a vendor-facing
/// default.
pub(crate) fn metadata_text(metadata: &Option<Metadata>, key: &str, default: &str) -> String {
    metadata
        .as_ref()
        .and_then(|m| m.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_field_probes_candidates_in_order() {
        let raw = json!({ "transaction": "t2", "trans": "t1" });
        assert_eq!(
            string_field(&raw, &["trans", "transaction"]),
            Some("t1".to_string())
        );
        assert_eq!(
            string_field(&raw, &["missing", "transaction"]),
            Some("t2".to_string())
        );
        assert_eq!(string_field(&raw, &["missing"]), None);
    }

    #[test]
    fn test_string_field_stringifies_numbers() {
        let raw = json!({ "transaction_id": 285959875 });
        assert_eq!(
            string_field(&raw, &["transaction_id"]),
            Some("285959875".to_string())
        );
    }

    #[test]
    fn test_string_field_skips_empty_strings() {
        let raw = json!({ "transactionId": "", "RRR": "110007734963" });
        assert_eq!(
            string_field(&raw, &["transactionId", "RRR"]),
            Some("110007734963".to_string())
        );
    }

    #[test]
    fn test_to_major_units() {
        assert_eq!(to_major_units(150_000), json!(1500));
        assert_eq!(to_major_units(150_050), json!(1500.5));
        assert_eq!(to_major_units(99), json!(0.99));
    }

    #[test]
    fn test_metadata_text_default() {
        assert_eq!(metadata_text(&None, "description", "Payment"), "Payment");

        let metadata = match json!({ "description": "Order 42" }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert_eq!(
            metadata_text(&Some(metadata), "description", "Payment"),
            "Order 42"
        );
    }
}
