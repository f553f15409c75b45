//! Local persistence for subscriptions and their owners.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::SubscriptionColumns;
use crate::errors::Result;
use crate::models::{BillableUser, NewSubscription, SubscriptionRecord};

pub use memory::MemorySubscriptionStore;
pub use postgres::PgSubscriptionStore;

pub const SUBSCRIPTIONS_TABLE: &str = "subscriptions";
pub const USERS_TABLE: &str = "users";

/// Row identity and ownership; additional data never overrides them.
const PROTECTED_COLUMNS: &[&str] = &["id", "user_id"];

/// Columns of the subscriptions table, by name, with their storage type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    columns: HashMap<String, String>,
}

impl ColumnSet {
    pub fn new(columns: HashMap<String, String>) -> Self {
        Self { columns }
    }

    /// Allow-list with untyped (text) columns.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: names
                .into_iter()
                .map(|name| (name.into(), "text".to_string()))
                .collect(),
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn data_type(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Whether an additional-data key can be copied onto a subscription row.
    /// The gateway id and plan columns always keep the gateway's values.
    pub fn accepts_extra(&self, key: &str, columns: &SubscriptionColumns) -> bool {
        self.contains(key)
            && !PROTECTED_COLUMNS.contains(&key)
            && key != columns.id_column
            && key != columns.plan_column
    }
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Gateway-linked column names this store writes to.
    fn columns(&self) -> &SubscriptionColumns;

    /// Schema of the subscriptions table, resolved when the store was built.
    fn subscription_columns(&self) -> &ColumnSet;

    async fn find_owner(&self, user_id: Uuid) -> Result<Option<BillableUser>>;

    /// Records the gateway customer id on the owner.
    async fn link_customer(&self, user_id: Uuid, customer_id: &str) -> Result<()>;

    async fn save_subscription(&self, subscription: NewSubscription) -> Result<SubscriptionRecord>;
}
