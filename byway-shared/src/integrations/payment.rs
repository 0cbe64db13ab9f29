/// Payment intents on Stripe
///
/// Talks to the REST API directly with form-encoded bodies.

use async_trait::async_trait;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use thiserror::Error;

const API_BASE: &str = "https://api.stripe.com/v1";

/// Currency every intent is created in
pub const CURRENCY: &str = "NGN";

/// Merchant label attached to every intent
pub const COMPANY: &str = "ByWay E-Learning Management System";

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Invalid payment configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Payment request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub publishable_key: String,
}

impl StripeConfig {
    /// Reads `STRIPE_SECRET_KEY` and `STRIPE_PUBLISHABLE_KEY`
    pub fn from_env() -> Result<Self, PaymentError> {
        let required = |key: &str| {
            env::var(key)
                .map_err(|_| PaymentError::InvalidConfiguration(format!("{} is not set", key)))
        };

        Ok(Self {
            secret_key: required("STRIPE_SECRET_KEY")?,
            publishable_key: required("STRIPE_PUBLISHABLE_KEY")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    pub client_secret: Option<String>,
}

impl PaymentIntent {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError>;

    /// Creates an intent for `amount` in the smallest currency unit
    async fn create_intent(&self, amount: i64) -> Result<PaymentIntent, PaymentError>;

    /// Key the browser uses to confirm payments
    fn publishable_key(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

pub struct StripeGateway {
    http: reqwest::Client,
    config: StripeConfig,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, config })
    }

    async fn parse(response: reqwest::Response) -> Result<PaymentIntent, PaymentError> {
        if response.status().is_success() {
            return Ok(response.json().await?);
        }

        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => Err(PaymentError::Rejected(body.error.message)),
            Err(_) => Err(PaymentError::Rejected(format!("status {}", status))),
        }
    }
}

/// Form fields for a new intent
pub fn intent_form(amount: i64) -> Vec<(&'static str, String)> {
    vec![
        ("amount", amount.to_string()),
        ("currency", CURRENCY.to_lowercase()),
        ("metadata[company]", COMPANY.to_string()),
        ("automatic_payment_methods[enabled]", "true".to_string()),
    ]
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        let response = self
            .http
            .get(format!("{}/payment_intents/{}", API_BASE, intent_id))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;

        Self::parse(response).await
    }

    async fn create_intent(&self, amount: i64) -> Result<PaymentIntent, PaymentError> {
        let response = self
            .http
            .post(format!("{}/payment_intents", API_BASE))
            .bearer_auth(&self.config.secret_key)
            .form(&intent_form(amount))
            .send()
            .await?;

        let intent = Self::parse(response).await?;
        tracing::info!(intent_id = %intent.id, amount, "Payment intent created");
        Ok(intent)
    }

    fn publishable_key(&self) -> &str {
        &self.config.publishable_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_form_fields() {
        let form = intent_form(5000);
        assert!(form.contains(&("amount", "5000".to_string())));
        assert!(form.contains(&("currency", "ngn".to_string())));
        assert!(form.contains(&("automatic_payment_methods[enabled]", "true".to_string())));
        assert!(form.contains(&("metadata[company]", COMPANY.to_string())));
    }

    #[test]
    fn test_intent_status() {
        let intent: PaymentIntent = serde_json::from_str(
            r#"{"id": "pi_1", "status": "succeeded", "client_secret": "pi_1_secret"}"#,
        )
        .unwrap();
        assert!(intent.succeeded());

        let pending = PaymentIntent {
            status: "requires_payment_method".into(),
            ..intent
        };
        assert!(!pending.succeeded());
    }
}
