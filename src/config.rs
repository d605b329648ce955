use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;

use crate::error::{PaymentError, PaymentResult};
use crate::payments::types::{Currency, Customer, PaymentIntent, Provider};

/// Which vendor environment the host application targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Test,
    Live,
}

impl Environment {
    pub fn is_test(&self) -> bool {
        matches!(self, Environment::Test)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonnifyCredentials {
    pub api_key: String,
    pub contract_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemitaCredentials {
    pub public_key: String,
    pub merchant_id: String,
    pub service_type_id: String,
}

/// Optional convenience for host applications: provider credentials loaded
/// once, then stamped onto intents with `PaymentIntent::from_config`. The
/// core contract itself takes credentials on each intent.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub paystack_public_key: Option<String>,
    pub flutterwave_public_key: Option<String>,
    pub monnify: Option<MonnifyCredentials>,
    pub remita: Option<RemitaCredentials>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let environment = match env::var("AFRICAPAY_ENV")
            .unwrap_or_else(|_| "test".to_string())
            .to_lowercase()
            .as_str()
        {
            "test" => Environment::Test,
            "live" | "production" => Environment::Live,
            other => {
                return Err(anyhow!(
                    "AFRICAPAY_ENV must be 'test' or 'live', got {}",
                    other
                ))
            }
        };

        let monnify = match (
            env::var("MONNIFY_API_KEY").ok(),
            env::var("MONNIFY_CONTRACT_CODE").ok(),
        ) {
            (Some(api_key), Some(contract_code)) => Some(MonnifyCredentials {
                api_key,
                contract_code,
            }),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "MONNIFY_API_KEY and MONNIFY_CONTRACT_CODE must be set together"
                ))
            }
        };

        let remita = match (
            env::var("REMITA_PUBLIC_KEY").ok(),
            env::var("REMITA_MERCHANT_ID").ok(),
            env::var("REMITA_SERVICE_TYPE_ID").ok(),
        ) {
            (Some(public_key), Some(merchant_id), Some(service_type_id)) => {
                Some(RemitaCredentials {
                    public_key,
                    merchant_id,
                    service_type_id,
                })
            }
            (None, None, None) => None,
            _ => {
                return Err(anyhow!(
                    "REMITA_PUBLIC_KEY, REMITA_MERCHANT_ID and REMITA_SERVICE_TYPE_ID must be set together"
                ))
            }
        };

        let config = GatewayConfig {
            environment,
            paystack_public_key: env::var("PAYSTACK_PUBLIC_KEY").ok(),
            flutterwave_public_key: env::var("FLUTTERWAVE_PUBLIC_KEY").ok(),
            monnify,
            remita,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.paystack_public_key.is_none()
            && self.flutterwave_public_key.is_none()
            && self.monnify.is_none()
            && self.remita.is_none()
        {
            return Err(anyhow!("At least one payment provider must be configured"));
        }

        if let Some(key) = &self.paystack_public_key {
            if key.trim().is_empty() {
                return Err(anyhow!("PAYSTACK_PUBLIC_KEY cannot be empty"));
            }
        }

        if let Some(key) = &self.flutterwave_public_key {
            if key.trim().is_empty() {
                return Err(anyhow!("FLUTTERWAVE_PUBLIC_KEY cannot be empty"));
            }
        }

        if let Some(monnify) = &self.monnify {
            if monnify.api_key.trim().is_empty() || monnify.contract_code.trim().is_empty() {
                return Err(anyhow!("Monnify credentials cannot be empty"));
            }
        }

        if let Some(remita) = &self.remita {
            if remita.public_key.trim().is_empty()
                || remita.merchant_id.trim().is_empty()
                || remita.service_type_id.trim().is_empty()
            {
                return Err(anyhow!("Remita credentials cannot be empty"));
            }
        }

        Ok(())
    }

    /// The credential an intent's `public_key` field should carry for
    /// `provider`, if that provider is configured.
    pub fn public_key_for(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Paystack => self.paystack_public_key.as_deref(),
            Provider::Flutterwave => self.flutterwave_public_key.as_deref(),
            Provider::Monnify => self.monnify.as_ref().map(|m| m.api_key.as_str()),
            Provider::Remita => self.remita.as_ref().map(|r| r.public_key.as_str()),
        }
    }
}

impl PaymentIntent {
    /// Build an intent with the credentials and environment for `provider`
    /// taken from the gateway configuration.
    pub fn from_config(
        config: &GatewayConfig,
        provider: Provider,
        amount: u64,
        currency: Currency,
        reference: impl Into<String>,
        customer: Customer,
    ) -> PaymentResult<Self> {
        let public_key = config.public_key_for(provider).ok_or_else(|| {
            PaymentError::validation(
                format!("No credentials configured for {}", provider),
                "Add the provider's credentials to the gateway configuration",
            )
        })?;

        let mut intent =
            PaymentIntent::new(provider, amount, currency, reference, public_key, customer);
        intent.test_mode = config.environment.is_test();

        if provider == Provider::Monnify {
            if let Some(monnify) = &config.monnify {
                intent.contract_code = Some(monnify.contract_code.clone());
            }
        }
        if provider == Provider::Remita {
            if let Some(remita) = &config.remita {
                intent.merchant_id = Some(remita.merchant_id.clone());
                intent.service_type_id = Some(remita.service_type_id.clone());
            }
        }

        Ok(intent)
    }
}
