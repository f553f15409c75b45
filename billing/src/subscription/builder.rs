use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use super::payload::{CustomVariable, PaymentMethodFilter, SubscriptionPayload};
use super::trial::TrialWindow;
use crate::errors::Result;
use crate::models::Billable;

/// Collects the options of a new subscription.
///
/// ```ignore
/// let request = SubscriptionBuilder::new(&user, "main", "gold", data)
///     .trial_days(7)
///     .with_coupon("SAVE10")
///     .build();
/// let outcome = creator.create(request, Some(token), options).await?;
/// ```
pub struct SubscriptionBuilder<'a> {
    owner: &'a dyn Billable,
    name: String,
    plan: String,
    additional_data: BTreeMap<String, Value>,
    trial_days: Option<u32>,
    skip_trial: bool,
    coupon: Option<String>,
    only_on_charge_success: bool,
    payable_with: Option<PaymentMethodFilter>,
}

impl<'a> SubscriptionBuilder<'a> {
    pub fn new(
        owner: &'a dyn Billable,
        name: impl Into<String>,
        plan: impl Into<String>,
        additional_data: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            owner,
            name: name.into(),
            plan: plan.into(),
            additional_data,
            trial_days: None,
            skip_trial: false,
            coupon: None,
            only_on_charge_success: false,
            payable_with: None,
        }
    }

    pub fn trial_days(mut self, days: u32) -> Self {
        self.trial_days = Some(days);
        self
    }

    /// End the trial immediately. Takes precedence over [`Self::trial_days`].
    pub fn skip_trial(mut self) -> Self {
        self.skip_trial = true;
        self
    }

    /// Coupon sent when the owner is registered with the gateway for the first time.
    pub fn with_coupon(mut self, coupon: impl Into<String>) -> Self {
        self.coupon = Some(coupon.into());
        self
    }

    pub fn charge_on_success(mut self) -> Self {
        self.only_on_charge_success = true;
        self
    }

    pub fn payable_with(mut self, filter: PaymentMethodFilter) -> Self {
        self.payable_with = Some(filter);
        self
    }

    pub fn build(self) -> SubscriptionRequest<'a> {
        SubscriptionRequest {
            owner: self.owner,
            name: self.name,
            plan: self.plan,
            additional_data: self.additional_data,
            trial_days: self.trial_days,
            skip_trial: self.skip_trial,
            coupon: self.coupon.filter(|c| !c.is_empty()),
            only_on_charge_success: self.only_on_charge_success,
            payable_with: self.payable_with.unwrap_or_default(),
        }
    }
}

/// A frozen subscription request, consumed by one `create` call.
pub struct SubscriptionRequest<'a> {
    owner: &'a dyn Billable,
    name: String,
    plan: String,
    additional_data: BTreeMap<String, Value>,
    trial_days: Option<u32>,
    skip_trial: bool,
    coupon: Option<String>,
    only_on_charge_success: bool,
    payable_with: PaymentMethodFilter,
}

impl<'a> SubscriptionRequest<'a> {
    pub fn owner(&self) -> &'a dyn Billable {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plan(&self) -> &str {
        &self.plan
    }

    pub fn additional_data(&self) -> &BTreeMap<String, Value> {
        &self.additional_data
    }

    pub fn trial_days(&self) -> Option<u32> {
        self.trial_days
    }

    pub fn skips_trial(&self) -> bool {
        self.skip_trial
    }

    pub fn coupon(&self) -> Option<&str> {
        self.coupon.as_deref()
    }

    pub fn only_on_charge_success(&self) -> bool {
        self.only_on_charge_success
    }

    pub fn payment_filter(&self) -> PaymentMethodFilter {
        self.payable_with
    }

    pub fn trial_window(&self, now: DateTime<Utc>) -> Result<TrialWindow> {
        TrialWindow::resolve(self.skip_trial, self.trial_days, now)
    }

    /// Gateway payload; custom variables carry every additional-data entry.
    pub fn payload(&self, customer_id: &str, now: DateTime<Utc>) -> Result<SubscriptionPayload> {
        Ok(SubscriptionPayload {
            plan_identifier: self.plan.clone(),
            expires_at: self.trial_window(now)?.expires_at,
            customer_id: customer_id.to_string(),
            only_on_charge_success: self.only_on_charge_success,
            custom_variables: CustomVariable::from_additional_data(&self.additional_data),
            payable_with: self.payable_with,
        })
    }
}
