//! HTTP client for the Iugu REST API.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use tracing::debug;
use url::Url;

use super::{
    BillingGateway, Customer, CustomerRequest, GatewayOutcome, PaymentMethod, RemoteSubscription,
};
use crate::errors::{BillingError, Result};
use crate::subscription::payload::SubscriptionPayload;

const CARD_DESCRIPTION: &str = "Cartão de crédito";

#[derive(Clone)]
pub struct IuguClient {
    http: Client,
    base_url: Url,
    api_token: String,
}

impl fmt::Debug for IuguClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IuguClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl IuguClient {
    pub fn new(api_token: impl Into<String>, base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
            api_token: api_token.into(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<GatewayOutcome<T>> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| BillingError::Config(format!("Invalid Iugu path '{}': {}", path, e)))?;

        debug!(method = %method, url = %url, "Calling Iugu");

        let mut request = self
            .http
            .request(method, url)
            .basic_auth(&self.api_token, Some(""));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let parsed: Value = serde_json::from_str(&text).map_err(|e| {
            BillingError::Gateway(format!("Iugu answered {} with a non-JSON body: {}", status, e))
        })?;

        debug!(status = %status, "Iugu responded");
        GatewayOutcome::from_body(parsed)
    }
}

#[async_trait]
impl BillingGateway for IuguClient {
    async fn create_customer(&self, request: &CustomerRequest) -> Result<GatewayOutcome<Customer>> {
        self.call(Method::POST, "customers", Some(request.to_body())).await
    }

    async fn fetch_customer(&self, customer_id: &str) -> Result<GatewayOutcome<Customer>> {
        self.call(Method::GET, &format!("customers/{}", customer_id), None).await
    }

    async fn update_card(
        &self,
        customer_id: &str,
        token: &str,
    ) -> Result<GatewayOutcome<PaymentMethod>> {
        let body = json!({
            "description": CARD_DESCRIPTION,
            "token": token,
            "set_as_default": true
        });
        self.call(
            Method::POST,
            &format!("customers/{}/payment_methods", customer_id),
            Some(body),
        )
        .await
    }

    async fn create_subscription(
        &self,
        payload: &SubscriptionPayload,
    ) -> Result<GatewayOutcome<RemoteSubscription>> {
        self.call(Method::POST, "subscriptions", Some(payload.to_body())).await
    }
}
