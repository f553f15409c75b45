//! Payment gateway abstraction.
//!
//! The subscription flow only talks to Iugu through [`BillingGateway`], so
//! tests and alternative transports can stand in for the HTTP client.

pub mod iugu;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{BillingError, Result};
use crate::subscription::payload::SubscriptionPayload;

pub use iugu::IuguClient;

/// The raw `errors` payload of a rejected gateway call, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GatewayErrors(pub Value);

/// Result of a gateway call that reached the gateway and got an answer.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome<T> {
    Accepted(T),
    Rejected(GatewayErrors),
}

impl<T: DeserializeOwned> GatewayOutcome<T> {
    /// Interprets a response body. A non-null `errors` field is the only
    /// rejection signal; anything else must decode as `T`.
    pub fn from_body(body: Value) -> Result<Self> {
        if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
            return Ok(GatewayOutcome::Rejected(GatewayErrors(errors.clone())));
        }
        serde_json::from_value(body)
            .map(GatewayOutcome::Accepted)
            .map_err(|e| BillingError::Gateway(format!("Unexpected response shape: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub default_payment_method_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSubscription {
    pub id: String,
    #[serde(default)]
    pub plan_identifier: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub suspended: bool,
}

/// Body for a first-time customer registration.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRequest {
    pub email: String,
    pub name: Option<String>,
    /// Caller-supplied attributes; they override `email`/`name` on collision.
    pub options: Map<String, Value>,
}

impl CustomerRequest {
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("email".to_string(), Value::String(self.email.clone()));
        if let Some(name) = &self.name {
            body.insert("name".to_string(), Value::String(name.clone()));
        }
        for (key, value) in &self.options {
            body.insert(key.clone(), value.clone());
        }
        body.retain(|_, value| !is_blank(value));
        Value::Object(body)
    }
}

/// Empty strings, `false`, `null` and empty collections are left out of gateway bodies.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(_) => false,
    }
}

#[async_trait]
pub trait BillingGateway: Send + Sync {
    async fn create_customer(&self, request: &CustomerRequest) -> Result<GatewayOutcome<Customer>>;

    async fn fetch_customer(&self, customer_id: &str) -> Result<GatewayOutcome<Customer>>;

    /// Stores `token` as the customer's default card.
    async fn update_card(
        &self,
        customer_id: &str,
        token: &str,
    ) -> Result<GatewayOutcome<PaymentMethod>>;

    async fn create_subscription(
        &self,
        payload: &SubscriptionPayload,
    ) -> Result<GatewayOutcome<RemoteSubscription>>;
}
