use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::{error, info};
use uuid::Uuid;

use super::{ColumnSet, SubscriptionStore, SUBSCRIPTIONS_TABLE, USERS_TABLE};
use crate::config::SubscriptionColumns;
use crate::errors::{BillingError, Result};
use crate::models::{BillableUser, NewSubscription, SubscriptionRecord};

pub struct PgSubscriptionStore {
    pool: PgPool,
    columns: SubscriptionColumns,
    schema: ColumnSet,
}

impl PgSubscriptionStore {
    /// Reads the subscriptions table schema once and keeps it for every insert.
    pub async fn connect(pool: PgPool, columns: SubscriptionColumns) -> Result<Self> {
        let schema = load_columns(&pool, SUBSCRIPTIONS_TABLE).await?;
        if schema.is_empty() {
            return Err(BillingError::Config(format!(
                "Table '{}' not found in the current schema",
                SUBSCRIPTIONS_TABLE
            )));
        }

        for required in [&columns.id_column, &columns.plan_column] {
            if !schema.contains(required) {
                return Err(BillingError::Config(format!(
                    "Table '{}' has no column '{}'",
                    SUBSCRIPTIONS_TABLE, required
                )));
            }
        }

        info!(
            table = SUBSCRIPTIONS_TABLE,
            columns = schema.len(),
            id_column = %columns.id_column,
            plan_column = %columns.plan_column,
            "Subscription schema loaded"
        );

        Ok(Self { pool, columns, schema })
    }
}

async fn load_columns(pool: &PgPool, table: &str) -> Result<ColumnSet> {
    let rows = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT column_name::text, udt_name::text
        FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name = $1
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        error!("Failed to read columns of {}: {}", table, e);
        BillingError::DatabaseError(e)
    })?;

    Ok(ColumnSet::new(rows.into_iter().collect::<HashMap<_, _>>()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Text form of an additional-data value, cast to `data_type` by Postgres.
/// JSON columns get the serialized value so strings keep their quotes.
fn as_text(value: &Value, data_type: &str) -> Option<String> {
    match value {
        Value::Null => None,
        other if matches!(data_type, "json" | "jsonb") => Some(other.to_string()),
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    fn columns(&self) -> &SubscriptionColumns {
        &self.columns
    }

    fn subscription_columns(&self) -> &ColumnSet {
        &self.schema
    }

    async fn find_owner(&self, user_id: Uuid) -> Result<Option<BillableUser>> {
        let query = format!("SELECT id, email, name, iugu_id FROM {} WHERE id = $1", USERS_TABLE);
        let user = sqlx::query_as::<_, BillableUser>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to fetch billable user: {}", e);
                BillingError::DatabaseError(e)
            })?;

        Ok(user)
    }

    async fn link_customer(&self, user_id: Uuid, customer_id: &str) -> Result<()> {
        let query = format!("UPDATE {} SET iugu_id = $1 WHERE id = $2", USERS_TABLE);
        let result = sqlx::query(&query)
            .bind(customer_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to link Iugu customer: {}", e);
                BillingError::DatabaseError(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(BillingError::NotFound(format!("User {} not found", user_id)));
        }

        Ok(())
    }

    async fn save_subscription(&self, subscription: NewSubscription) -> Result<SubscriptionRecord> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} (user_id, name, {}, {}, trial_ends_at, ends_at",
            SUBSCRIPTIONS_TABLE,
            quote_ident(&self.columns.id_column),
            quote_ident(&self.columns.plan_column),
        ));
        for key in subscription.extra.keys() {
            builder.push(", ").push(quote_ident(key));
        }

        builder.push(") VALUES (");
        {
            let mut values = builder.separated(", ");
            values.push_bind(subscription.user_id);
            values.push_bind(subscription.name.clone());
            values.push_bind(subscription.gateway_id.clone());
            values.push_bind(subscription.plan.clone());
            values.push_bind(subscription.trial_ends_at);
            values.push_bind(subscription.ends_at);
        }
        for (key, value) in &subscription.extra {
            let data_type = self.schema.data_type(key).unwrap_or("text");
            builder
                .push(", CAST(")
                .push_bind(as_text(value, data_type))
                .push(format!("::text AS {})", quote_ident(data_type)));
        }
        builder.push(") RETURNING id, created_at");

        let (id, created_at) = builder
            .build_query_as::<(Uuid, DateTime<Utc>)>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to save subscription: {}", e);
                BillingError::DatabaseError(e)
            })?;

        Ok(SubscriptionRecord::from_new(id, created_at, subscription))
    }
}
