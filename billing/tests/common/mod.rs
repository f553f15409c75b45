#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use uuid::Uuid;

use iugu_billing::gateway::{Customer, CustomerRequest, PaymentMethod, RemoteSubscription};
use iugu_billing::subscription::SubscriptionPayload;
use iugu_billing::{BillableUser, BillingGateway, GatewayOutcome, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateCustomer(Value),
    FetchCustomer(String),
    UpdateCard { customer_id: String, token: String },
    CreateSubscription(SubscriptionPayload),
}

/// Gateway double answering with scripted JSON bodies and recording every call.
pub struct ScriptedGateway {
    customer: Mutex<Value>,
    card: Mutex<Value>,
    subscription: Mutex<Value>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            customer: Mutex::new(json!({ "id": "CUS_NEW", "email": "ana@example.com" })),
            card: Mutex::new(json!({ "id": "PM_1", "description": "Cartão de crédito" })),
            subscription: Mutex::new(json!({ "id": "SUB_1", "plan_identifier": "gold" })),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reject_customer(self, errors: Value) -> Self {
        *self.customer.lock() = json!({ "errors": errors });
        self
    }

    pub fn reject_card(self, errors: Value) -> Self {
        *self.card.lock() = json!({ "errors": errors });
        self
    }

    pub fn reject_subscription(self, errors: Value) -> Self {
        *self.subscription.lock() = json!({ "errors": errors });
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn subscription_payloads(&self) -> Vec<SubscriptionPayload> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateSubscription(payload) => Some(payload),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl BillingGateway for ScriptedGateway {
    async fn create_customer(&self, request: &CustomerRequest) -> Result<GatewayOutcome<Customer>> {
        self.calls.lock().push(Call::CreateCustomer(request.to_body()));
        GatewayOutcome::from_body(self.customer.lock().clone())
    }

    async fn fetch_customer(&self, customer_id: &str) -> Result<GatewayOutcome<Customer>> {
        self.calls.lock().push(Call::FetchCustomer(customer_id.to_string()));
        let mut body = self.customer.lock().clone();
        if body.get("errors").is_none() {
            body["id"] = Value::String(customer_id.to_string());
        }
        GatewayOutcome::from_body(body)
    }

    async fn update_card(
        &self,
        customer_id: &str,
        token: &str,
    ) -> Result<GatewayOutcome<PaymentMethod>> {
        self.calls.lock().push(Call::UpdateCard {
            customer_id: customer_id.to_string(),
            token: token.to_string(),
        });
        GatewayOutcome::from_body(self.card.lock().clone())
    }

    async fn create_subscription(
        &self,
        payload: &SubscriptionPayload,
    ) -> Result<GatewayOutcome<RemoteSubscription>> {
        self.calls.lock().push(Call::CreateSubscription(payload.clone()));
        GatewayOutcome::from_body(self.subscription.lock().clone())
    }
}

pub fn new_user() -> BillableUser {
    BillableUser {
        id: Uuid::new_v4(),
        email: "ana@example.com".to_string(),
        name: Some("Ana Souza".to_string()),
        iugu_id: None,
    }
}

pub fn existing_user(customer_id: &str) -> BillableUser {
    BillableUser {
        iugu_id: Some(customer_id.to_string()),
        ..new_user()
    }
}
