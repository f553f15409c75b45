//! Recurring billing on Iugu.
//!
//! A [`SubscriptionBuilder`] collects plan, trial, coupon and payment options
//! into a frozen [`SubscriptionRequest`]. [`SubscriptionCreator`] then
//! registers or fetches the Iugu customer, creates the remote subscription
//! and stores the matching local record. Gateway refusals come back as
//! [`SubscriptionOutcome::Rejected`] with the raw `errors` payload; only
//! transport, database and configuration faults are returned as errors.

pub mod config;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod store;
pub mod subscription;
pub mod telemetry;

pub use config::{BillingConfig, ServicesConfig, SubscriptionColumns};
pub use errors::{BillingError, Result};
pub use gateway::{BillingGateway, GatewayErrors, GatewayOutcome, IuguClient};
pub use models::{Billable, BillableUser, NewSubscription, SubscriptionRecord};
pub use store::{ColumnSet, MemorySubscriptionStore, PgSubscriptionStore, SubscriptionStore};
pub use subscription::{
    PaymentMethodFilter, Stage, SubscriptionBuilder, SubscriptionCreator, SubscriptionOutcome,
    SubscriptionRequest, TrialWindow,
};
