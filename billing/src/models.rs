use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A local account that can hold gateway subscriptions.
pub trait Billable: Send + Sync {
    fn billable_id(&self) -> Uuid;

    /// Gateway customer id, when the account was already registered with Iugu.
    fn iugu_id(&self) -> Option<&str>;

    fn email(&self) -> &str;

    fn display_name(&self) -> Option<&str>;
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct BillableUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub iugu_id: Option<String>,
}

impl Billable for BillableUser {
    fn billable_id(&self) -> Uuid {
        self.id
    }

    fn iugu_id(&self) -> Option<&str> {
        self.iugu_id.as_deref().filter(|id| !id.is_empty())
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn display_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// A subscription row about to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubscription {
    pub user_id: Uuid,
    pub name: String,
    pub gateway_id: String,
    pub plan: String,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    /// Additional data already narrowed to columns the table actually has.
    pub extra: BTreeMap<String, Value>,
}

/// A persisted local subscription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub gateway_id: String,
    pub plan: String,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    pub fn from_new(id: Uuid, created_at: DateTime<Utc>, new: NewSubscription) -> Self {
        Self {
            id,
            user_id: new.user_id,
            name: new.name,
            gateway_id: new.gateway_id,
            plan: new.plan,
            trial_ends_at: new.trial_ends_at,
            ends_at: new.ends_at,
            extra: new.extra,
            created_at,
        }
    }

    pub fn on_trial(&self, now: DateTime<Utc>) -> bool {
        self.trial_ends_at.map_or(false, |ends| now < ends)
    }

    pub fn cancelled(&self) -> bool {
        self.ends_at.is_some()
    }

    /// Cancelled, but the paid period has not run out yet.
    pub fn on_grace_period(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.map_or(false, |ends| now < ends)
    }

    pub fn ended(&self, now: DateTime<Utc>) -> bool {
        self.cancelled() && !self.on_grace_period(now)
    }

    pub fn active(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_none() || self.on_grace_period(now)
    }

    pub fn valid(&self, now: DateTime<Utc>) -> bool {
        self.active(now) || self.on_trial(now)
    }
}
