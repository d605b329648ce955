//! Embedded-browser bridge
//!
//! Mobile web views have no direct host-callable vendor widget, so Monnify
//! and Remita payments run inside a self-contained HTML document and report
//! back over a one-way string channel. The host side deserializes the
//! channel messages and performs the same normalization as the in-process
//! adapters. The channel is untrusted input: malformed messages are logged
//! and dropped, never propagated.

use serde::Deserialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::error::{PaymentError, PaymentResult};
use crate::payments::providers::monnify::{MonnifyAdapter, MONNIFY_SCRIPT_URL};
use crate::payments::providers::remita::RemitaAdapter;
use crate::payments::providers::string_field;
use crate::payments::types::{AdapterConfig, Provider, ResponseBase};

/// The message object react-native web views expose to embedded pages.
pub const DEFAULT_MESSAGE_CHANNEL: &str = "window.ReactNativeWebView";

pub type DismissHandler = Box<dyn Fn() + Send + Sync>;

#[derive(Clone, Copy)]
enum BridgeVendor {
    Monnify,
    Remita,
}

/// Tagged message posted by the inline script.
#[derive(Debug, Deserialize)]
struct BridgeMessage {
    #[serde(rename = "type")]
    kind: MessageKind,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum MessageKind {
    Success,
    Close,
    Error,
}

/// One web-view payment: generates the hosted document and handles its
/// messages. `dismiss` tears down the hosting view once an outcome (or a
/// vendor error) has been delivered.
pub struct WebViewBridge {
    vendor: BridgeVendor,
    config: AdapterConfig,
    channel: String,
    dismiss: DismissHandler,
}

impl WebViewBridge {
    pub fn new(config: AdapterConfig, dismiss: DismissHandler) -> PaymentResult<Self> {
        let vendor = match config.provider {
            Provider::Monnify => {
                MonnifyAdapter::check_required(&config)?;
                BridgeVendor::Monnify
            }
            Provider::Remita => {
                RemitaAdapter::check_required(&config)?;
                BridgeVendor::Remita
            }
            other => {
                return Err(PaymentError::validation(
                    format!(
                        "{} is not routed through the embedded-browser bridge",
                        other
                    ),
                    "Use the in-process adapter for this provider",
                ));
            }
        };

        Ok(Self {
            vendor,
            config,
            channel: DEFAULT_MESSAGE_CHANNEL.to_string(),
            dismiss,
        })
    }

    /// Override the message object the inline script posts through.
    pub fn with_message_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// The self-contained document to load into the web view.
    pub fn payment_html(&self) -> String {
        match self.vendor {
            BridgeVendor::Monnify => self.monnify_html(),
            BridgeVendor::Remita => self.remita_html(),
        }
    }

    fn monnify_html(&self) -> String {
        let payload = inline_json(&MonnifyAdapter::native_payload(&self.config));
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <script src="{script}"></script>
</head>
<body>
  <div id="status">Initializing payment...</div>
  <script>
    window.MonnifySDK.initialize(Object.assign({payload}, {{
      onComplete: function (response) {{
        {channel}.postMessage(JSON.stringify({{ type: 'success', data: response }}));
      }},
      onClose: function () {{
        {channel}.postMessage(JSON.stringify({{ type: 'close' }}));
      }}
    }}));
  </script>
</body>
</html>
"#,
            script = MONNIFY_SCRIPT_URL,
            payload = payload,
            channel = self.channel,
        )
    }

    fn remita_html(&self) -> String {
        let payload = inline_json(&RemitaAdapter::native_payload(&self.config));
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <script src="{script}"></script>
</head>
<body>
  <div id="status">Initializing payment...</div>
  <script>
    var paymentEngine = window.RmPaymentEngine.init(Object.assign({payload}, {{
      onSuccess: function (response) {{
        {channel}.postMessage(JSON.stringify({{ type: 'success', data: response }}));
      }},
      onError: function (response) {{
        {channel}.postMessage(JSON.stringify({{ type: 'error', data: response }}));
      }},
      onClose: function () {{
        {channel}.postMessage(JSON.stringify({{ type: 'close' }}));
      }}
    }}));
    paymentEngine.showPaymentWidget();
  </script>
</body>
</html>
"#,
            script = RemitaAdapter::script_url(self.config.test_mode),
            payload = payload,
            channel = self.channel,
        )
    }

    /// Handle one raw message off the channel. Never panics: anything that
    /// does not parse as a tagged message is logged and discarded without
    /// firing an outcome.
    pub fn handle_message(&self, raw: &str) {
        let message: BridgeMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(e) => {
                error!(
                    provider = %self.config.provider,
                    error = %e,
                    "Discarding malformed bridge message"
                );
                return;
            }
        };

        match message.kind {
            MessageKind::Success => {
                if matches!(self.vendor, BridgeVendor::Monnify)
                    && !MonnifyAdapter::is_paid(&message.data)
                {
                    warn!(
                        provider = %self.config.provider,
                        "Ignoring unpaid checkout completion from web view"
                    );
                    return;
                }
                let transaction_id = string_field(
                    &message.data,
                    &["transactionReference", "transactionId", "RRR"],
                );
                let base = ResponseBase::from_config(&self.config);
                self.config
                    .outcome
                    .success(base.success(transaction_id, message.data));
                (self.dismiss)();
            }
            MessageKind::Close => {
                self.config.outcome.close();
                (self.dismiss)();
            }
            MessageKind::Error => {
                self.config.outcome.error(PaymentError::provider_failure(
                    "Payment failed",
                    self.config.provider,
                    Some(message.data),
                ));
                (self.dismiss)();
            }
        }
    }
}

/// Serialize a payload for splicing into an inline `<script>` block. `</` is
/// escaped so payload content can never terminate the surrounding script
/// element.
fn inline_json(payload: &Value) -> String {
    serde_json::to_string(payload)
        .unwrap_or_default()
        .replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::testutil::{config_for, OutcomeProbe};
    use crate::payments::types::PaymentStatus;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn create_bridge(provider: Provider, probe: &Arc<OutcomeProbe>) -> (WebViewBridge, Arc<AtomicUsize>) {
        let dismissals = Arc::new(AtomicUsize::new(0));
        let counter = dismissals.clone();
        let bridge = WebViewBridge::new(
            config_for(provider, probe.sink(provider)),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
        (bridge, dismissals)
    }

    #[test]
    fn test_rejects_providers_with_direct_widgets() {
        let probe = OutcomeProbe::new();
        let result = WebViewBridge::new(
            config_for(Provider::Paystack, probe.sink(Provider::Paystack)),
            Box::new(|| {}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_monnify_html_embeds_mapped_payload() {
        let probe = OutcomeProbe::new();
        let (bridge, _) = create_bridge(Provider::Monnify, &probe);

        let html = bridge.payment_html();
        assert!(html.contains(MONNIFY_SCRIPT_URL));
        assert!(html.contains("window.MonnifySDK.initialize"));
        assert!(html.contains(r#""amount":1500"#));
        assert!(html.contains(r#""contractCode":"594502""#));
        assert!(html.contains("window.ReactNativeWebView.postMessage"));
    }

    #[test]
    fn test_remita_html_selects_script_by_mode() {
        let probe = OutcomeProbe::new();
        let mut config = config_for(Provider::Remita, probe.sink(Provider::Remita));
        config.test_mode = true;
        let bridge = WebViewBridge::new(config, Box::new(|| {})).unwrap();

        let html = bridge.payment_html();
        assert!(html.contains("remitademo.net"));
        assert!(html.contains("paymentEngine.showPaymentWidget()"));
        assert!(html.contains(r#""transactionId":"tx_1""#));
    }

    #[test]
    fn test_payload_cannot_break_out_of_the_script_element() {
        let probe = OutcomeProbe::new();
        let mut config = config_for(Provider::Monnify, probe.sink(Provider::Monnify));
        let metadata = match json!({ "description": "a</b" }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        config.metadata = Some(metadata);
        let bridge = WebViewBridge::new(config, Box::new(|| {})).unwrap();

        let html = bridge.payment_html();
        assert!(html.contains(r#"a<\/b"#));
        assert!(!html.contains("a</b"));
    }

    #[test]
    fn test_custom_message_channel() {
        let probe = OutcomeProbe::new();
        let (bridge, _) = create_bridge(Provider::Remita, &probe);
        let html = bridge.with_message_channel("window.chrome.webview").payment_html();
        assert!(html.contains("window.chrome.webview.postMessage"));
        assert!(!html.contains("ReactNativeWebView"));
    }

    #[test]
    fn test_malformed_message_is_dropped() {
        let probe = OutcomeProbe::new();
        let (bridge, dismissals) = create_bridge(Provider::Remita, &probe);

        bridge.handle_message("definitely not json");
        bridge.handle_message("{\"type\": \"launch-missiles\"}");
        bridge.handle_message("");

        assert_eq!(probe.success_count(), 0);
        assert_eq!(probe.close_count(), 0);
        assert_eq!(probe.error_count(), 0);
        assert_eq!(dismissals.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_success_message_normalizes_and_dismisses() {
        let probe = OutcomeProbe::new();
        let (bridge, dismissals) = create_bridge(Provider::Monnify, &probe);

        bridge.handle_message(
            &json!({
                "type": "success",
                "data": {
                    "status": "PAID",
                    "paymentReference": "tx_1",
                    "transactionReference": "TRX99"
                }
            })
            .to_string(),
        );

        let successes = probe.successes.lock().unwrap();
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0].status, PaymentStatus::Success);
        assert_eq!(successes[0].reference, "tx_1");
        assert_eq!(successes[0].transaction_id.as_deref(), Some("TRX99"));
        assert_eq!(successes[0].provider, Provider::Monnify);
        assert_eq!(dismissals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unpaid_monnify_message_stays_silent() {
        let probe = OutcomeProbe::new();
        let (bridge, dismissals) = create_bridge(Provider::Monnify, &probe);

        bridge.handle_message(
            &json!({ "type": "success", "data": { "status": "FAILED" } }).to_string(),
        );

        assert_eq!(probe.success_count(), 0);
        assert_eq!(dismissals.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remita_success_uses_rrr_fallback() {
        let probe = OutcomeProbe::new();
        let (bridge, _) = create_bridge(Provider::Remita, &probe);

        bridge.handle_message(
            &json!({ "type": "success", "data": { "RRR": "110007734963" } }).to_string(),
        );

        let successes = probe.successes.lock().unwrap();
        assert_eq!(successes[0].transaction_id.as_deref(), Some("110007734963"));
    }

    #[test]
    fn test_close_message_dismisses() {
        let probe = OutcomeProbe::new();
        let (bridge, dismissals) = create_bridge(Provider::Remita, &probe);

        bridge.handle_message(r#"{ "type": "close" }"#);

        assert_eq!(probe.close_count(), 1);
        assert_eq!(dismissals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_message_carries_raw_payload() {
        let probe = OutcomeProbe::new();
        let (bridge, dismissals) = create_bridge(Provider::Remita, &probe);

        bridge.handle_message(
            &json!({ "type": "error", "data": { "responseCode": "02" } }).to_string(),
        );

        let errors = probe.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), crate::error::PROVIDER_ERROR);
        assert_eq!(errors[0].raw().unwrap()["responseCode"], "02");
        assert_eq!(dismissals.load(Ordering::SeqCst), 1);
    }
}
