use crate::domain::payment::Currency;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Sandbox
        }
    }
}

/// Credential blob stored per configuration, with one value per environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigJson {
    pub sandbox_base_url: String,
    pub production_base_url: String,
    pub sandbox_merchant_id: String,
    pub production_merchant_id: String,
    pub sandbox_merchant_code: String,
    pub production_merchant_code: String,
    pub sandbox_merchant_name: String,
    pub production_merchant_name: String,
    pub sandbox_api_key: String,
    pub production_api_key: String,
    pub sandbox_server_key: String,
    pub production_server_key: String,
    pub sandbox_secret_key: String,
    pub production_secret_key: String,
    pub sandbox_signature_key: String,
    pub production_signature_key: String,
    pub sandbox_credential_password: String,
    pub production_credential_password: String,
    pub public_key: String,
    pub private_key: String,
    pub return_url: String,
}

/// One aggregator's credentials for a platform and currency.
#[derive(Debug, Clone)]
pub struct GatewayConfiguration {
    pub id: i64,
    pub platform_id: i64,
    pub aggregator_id: i64,
    pub aggregator_slug: String,
    pub aggregator_name: String,
    pub currency: Currency,
    pub environment: Environment,
    pub config_json: ConfigJson,
    pub is_active: bool,
}

/// Immutable credentials for one attempt, resolved for the configured
/// environment. Adapters receive this by reference and never store it.
#[derive(Debug, Clone, Default)]
pub struct GatewayCredentials {
    pub base_url: String,
    pub merchant_id: String,
    pub merchant_code: String,
    pub merchant_name: String,
    pub api_key: String,
    pub server_key: String,
    pub secret_key: String,
    pub signature_key: String,
    pub credential_password: String,
    pub private_key: String,
    pub public_key: String,
    pub return_url: String,
}

impl GatewayConfiguration {
    pub fn credentials(&self) -> GatewayCredentials {
        let c = &self.config_json;
        let pick = |sandbox: &str, production: &str| match self.environment {
            Environment::Sandbox => sandbox.to_string(),
            Environment::Production => production.to_string(),
        };
        GatewayCredentials {
            base_url: pick(&c.sandbox_base_url, &c.production_base_url)
                .trim_end_matches('/')
                .to_string(),
            merchant_id: pick(&c.sandbox_merchant_id, &c.production_merchant_id),
            merchant_code: pick(&c.sandbox_merchant_code, &c.production_merchant_code),
            merchant_name: pick(&c.sandbox_merchant_name, &c.production_merchant_name),
            api_key: pick(&c.sandbox_api_key, &c.production_api_key),
            server_key: pick(&c.sandbox_server_key, &c.production_server_key),
            secret_key: pick(&c.sandbox_secret_key, &c.production_secret_key),
            signature_key: pick(&c.sandbox_signature_key, &c.production_signature_key),
            credential_password: pick(
                &c.sandbox_credential_password,
                &c.production_credential_password,
            ),
            private_key: c.private_key.clone(),
            public_key: c.public_key.clone(),
            return_url: c.return_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_credentials_are_selected_by_environment() {
        let cfg = GatewayConfiguration {
            id: 1,
            platform_id: 1,
            aggregator_id: 2,
            aggregator_slug: "midtrans".to_string(),
            aggregator_name: "Midtrans".to_string(),
            currency: Currency::Idr,
            environment: Environment::Production,
            config_json: ConfigJson {
                sandbox_base_url: "https://api.sandbox.midtrans.com/".to_string(),
                production_base_url: "https://api.midtrans.com/".to_string(),
                sandbox_server_key: "SB-key".to_string(),
                production_server_key: "PRD-key".to_string(),
                ..Default::default()
            },
            is_active: true,
        };
        let creds = cfg.credentials();
        assert_eq!(creds.base_url, "https://api.midtrans.com");
        assert_eq!(creds.server_key, "PRD-key");
    }
}
