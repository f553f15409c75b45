use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::builder::SubscriptionRequest;
use crate::errors::Result;
use crate::gateway::{BillingGateway, Customer, CustomerRequest, GatewayErrors, GatewayOutcome};
use crate::models::{NewSubscription, SubscriptionRecord};
use crate::store::SubscriptionStore;

/// Step of the flow at which the gateway refused the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Customer,
    Card,
    Subscription,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionOutcome {
    Created(SubscriptionRecord),
    /// Nothing was stored locally. Earlier gateway calls are not undone.
    Rejected { stage: Stage, errors: GatewayErrors },
}

impl SubscriptionOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, SubscriptionOutcome::Created(_))
    }

    pub fn record(&self) -> Option<&SubscriptionRecord> {
        match self {
            SubscriptionOutcome::Created(record) => Some(record),
            SubscriptionOutcome::Rejected { .. } => None,
        }
    }

    pub fn into_record(self) -> Option<SubscriptionRecord> {
        match self {
            SubscriptionOutcome::Created(record) => Some(record),
            SubscriptionOutcome::Rejected { .. } => None,
        }
    }

    /// Errors payload reported by the gateway, if the request was refused.
    pub fn last_error(&self) -> Option<&GatewayErrors> {
        match self {
            SubscriptionOutcome::Created(_) => None,
            SubscriptionOutcome::Rejected { errors, .. } => Some(errors),
        }
    }
}

type CustomerResolution = std::result::Result<Customer, (Stage, GatewayErrors)>;

/// Runs subscription requests against the gateway and the local store.
#[derive(Clone)]
pub struct SubscriptionCreator {
    gateway: Arc<dyn BillingGateway>,
    store: Arc<dyn SubscriptionStore>,
}

impl SubscriptionCreator {
    pub fn new(gateway: Arc<dyn BillingGateway>, store: Arc<dyn SubscriptionStore>) -> Self {
        Self { gateway, store }
    }

    pub fn store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.store
    }

    /// Subscribes without touching the owner's card.
    pub async fn add(
        &self,
        request: SubscriptionRequest<'_>,
        options: Map<String, Value>,
    ) -> Result<SubscriptionOutcome> {
        self.create(request, None, options).await
    }

    pub async fn create(
        &self,
        request: SubscriptionRequest<'_>,
        token: Option<&str>,
        options: Map<String, Value>,
    ) -> Result<SubscriptionOutcome> {
        self.create_at(request, token, options, Utc::now()).await
    }

    /// Same as [`Self::create`] with an explicit clock reading for trial dates.
    pub async fn create_at(
        &self,
        request: SubscriptionRequest<'_>,
        token: Option<&str>,
        options: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionOutcome> {
        let owner = request.owner();
        info!(
            user_id = %owner.billable_id(),
            name = %request.name(),
            plan = %request.plan(),
            "Creating Iugu subscription"
        );

        // Reject unusable trial lengths before anything reaches the gateway.
        let window = request.trial_window(now)?;

        let customer = match self.resolve_customer(&request, token, options).await? {
            Ok(customer) => customer,
            Err((stage, errors)) => {
                warn!(user_id = %owner.billable_id(), stage = ?stage, "Iugu rejected customer");
                return Ok(SubscriptionOutcome::Rejected { stage, errors });
            }
        };

        let payload = request.payload(&customer.id, now)?;
        let remote = match self.gateway.create_subscription(&payload).await? {
            GatewayOutcome::Accepted(remote) => remote,
            GatewayOutcome::Rejected(errors) => {
                warn!(
                    user_id = %owner.billable_id(),
                    customer_id = %customer.id,
                    "Iugu rejected subscription"
                );
                return Ok(SubscriptionOutcome::Rejected {
                    stage: Stage::Subscription,
                    errors,
                });
            }
        };

        let mut subscription = NewSubscription {
            user_id: owner.billable_id(),
            name: request.name().to_string(),
            gateway_id: remote.id.clone(),
            plan: request.plan().to_string(),
            trial_ends_at: window.trial_ends_at,
            ends_at: None,
            extra: BTreeMap::new(),
        };
        self.apply_additional_data(&mut subscription, request.additional_data());

        let record = self.store.save_subscription(subscription).await?;
        info!(
            user_id = %record.user_id,
            subscription_id = %record.id,
            iugu_subscription_id = %record.gateway_id,
            "Subscription created"
        );

        Ok(SubscriptionOutcome::Created(record))
    }

    async fn resolve_customer(
        &self,
        request: &SubscriptionRequest<'_>,
        token: Option<&str>,
        mut options: Map<String, Value>,
    ) -> Result<CustomerResolution> {
        let owner = request.owner();

        let customer = match owner.iugu_id() {
            None => {
                if let Some(coupon) = request.coupon() {
                    options.insert("coupon".to_string(), Value::String(coupon.to_string()));
                }
                let customer_request = CustomerRequest {
                    email: owner.email().to_string(),
                    name: owner.display_name().map(str::to_string),
                    options,
                };

                match self.gateway.create_customer(&customer_request).await? {
                    GatewayOutcome::Accepted(customer) => {
                        self.store
                            .link_customer(owner.billable_id(), &customer.id)
                            .await?;
                        info!(
                            user_id = %owner.billable_id(),
                            customer_id = %customer.id,
                            "Iugu customer created"
                        );
                        customer
                    }
                    GatewayOutcome::Rejected(errors) => {
                        return Ok(Err((Stage::Customer, errors)))
                    }
                }
            }
            Some(customer_id) => match self.gateway.fetch_customer(customer_id).await? {
                GatewayOutcome::Accepted(customer) => customer,
                GatewayOutcome::Rejected(errors) => return Ok(Err((Stage::Customer, errors))),
            },
        };

        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let card = self.gateway.update_card(&customer.id, token).await?;
            if let GatewayOutcome::Rejected(errors) = card {
                return Ok(Err((Stage::Card, errors)));
            }
            debug!(customer_id = %customer.id, "Default card updated");
        }

        Ok(Ok(customer))
    }

    /// Copies additional data onto the row for every key the table has a
    /// column for. `name`, `trial_ends_at` and `ends_at` replace the values
    /// computed above; the row id, owner and gateway columns are never
    /// overwritten.
    fn apply_additional_data(
        &self,
        subscription: &mut NewSubscription,
        data: &BTreeMap<String, Value>,
    ) {
        let schema = self.store.subscription_columns();
        let columns = self.store.columns();

        for (key, value) in data {
            if !schema.accepts_extra(key, columns) {
                debug!(key = %key, "Additional data has no writable column; not stored");
                continue;
            }

            match key.as_str() {
                "name" => match value.as_str() {
                    Some(name) => subscription.name = name.to_string(),
                    None => debug!("Ignoring non-string subscription name"),
                },
                "trial_ends_at" => match timestamp_override(value) {
                    Some(at) => subscription.trial_ends_at = at,
                    None => debug!("Ignoring unparseable trial_ends_at"),
                },
                "ends_at" => match timestamp_override(value) {
                    Some(at) => subscription.ends_at = at,
                    None => debug!("Ignoring unparseable ends_at"),
                },
                _ => {
                    subscription.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// `null` clears the timestamp, an RFC 3339 string sets it.
fn timestamp_override(value: &Value) -> Option<Option<DateTime<Utc>>> {
    match value {
        Value::Null => Some(None),
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|at| Some(at.with_timezone(&Utc))),
        _ => None,
    }
}
