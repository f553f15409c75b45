use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use super::{ColumnSet, SubscriptionStore};
use crate::config::SubscriptionColumns;
use crate::errors::{BillingError, Result};
use crate::models::{BillableUser, NewSubscription, SubscriptionRecord};

/// In-memory store for tests and local runs without Postgres.
pub struct MemorySubscriptionStore {
    columns: SubscriptionColumns,
    schema: ColumnSet,
    owners: Mutex<HashMap<Uuid, BillableUser>>,
    subscriptions: Mutex<Vec<SubscriptionRecord>>,
}

impl MemorySubscriptionStore {
    /// `extra_columns` lists the additional-data keys the table accepts.
    pub fn new<I, S>(columns: SubscriptionColumns, extra_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = extra_columns.into_iter().map(Into::into).collect();
        names.extend(
            [
                "id",
                "user_id",
                "name",
                columns.id_column.as_str(),
                columns.plan_column.as_str(),
                "trial_ends_at",
                "ends_at",
                "created_at",
            ]
            .iter()
            .map(|s| s.to_string()),
        );

        Self {
            schema: ColumnSet::from_names(names),
            columns,
            owners: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn with_owner(self, owner: BillableUser) -> Self {
        self.insert_owner(owner);
        self
    }

    pub fn insert_owner(&self, owner: BillableUser) {
        self.owners.lock().insert(owner.id, owner);
    }

    pub fn owner(&self, user_id: Uuid) -> Option<BillableUser> {
        self.owners.lock().get(&user_id).cloned()
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionRecord> {
        self.subscriptions.lock().clone()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    fn columns(&self) -> &SubscriptionColumns {
        &self.columns
    }

    fn subscription_columns(&self) -> &ColumnSet {
        &self.schema
    }

    async fn find_owner(&self, user_id: Uuid) -> Result<Option<BillableUser>> {
        Ok(self.owner(user_id))
    }

    async fn link_customer(&self, user_id: Uuid, customer_id: &str) -> Result<()> {
        let mut owners = self.owners.lock();
        let owner = owners
            .get_mut(&user_id)
            .ok_or_else(|| BillingError::NotFound(format!("User {} not found", user_id)))?;
        owner.iugu_id = Some(customer_id.to_string());
        Ok(())
    }

    async fn save_subscription(&self, subscription: NewSubscription) -> Result<SubscriptionRecord> {
        let record = SubscriptionRecord::from_new(Uuid::new_v4(), Utc::now(), subscription);
        self.subscriptions.lock().push(record.clone());
        Ok(record)
    }
}
