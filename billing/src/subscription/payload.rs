use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::gateway::is_blank;

/// Which payment methods the gateway may charge for a subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodFilter {
    #[default]
    All,
    CreditCard,
    BankSlip,
    Pix,
}

impl PaymentMethodFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodFilter::All => "all",
            PaymentMethodFilter::CreditCard => "credit_card",
            PaymentMethodFilter::BankSlip => "bank_slip",
            PaymentMethodFilter::Pix => "pix",
        }
    }
}

impl fmt::Display for PaymentMethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethodFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(PaymentMethodFilter::All),
            "credit_card" => Ok(PaymentMethodFilter::CreditCard),
            "bank_slip" => Ok(PaymentMethodFilter::BankSlip),
            "pix" => Ok(PaymentMethodFilter::Pix),
            other => Err(format!("Unknown payment method filter: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomVariable {
    pub name: String,
    pub value: String,
}

impl CustomVariable {
    /// One variable per additional-data entry; non-string values are sent as JSON text.
    pub fn from_additional_data(data: &BTreeMap<String, Value>) -> Vec<Self> {
        data.iter()
            .map(|(name, value)| CustomVariable {
                name: name.clone(),
                value: match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            })
            .collect()
    }
}

/// Body of the gateway's subscription creation call.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionPayload {
    pub plan_identifier: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub customer_id: String,
    pub only_on_charge_success: bool,
    pub custom_variables: Vec<CustomVariable>,
    pub payable_with: PaymentMethodFilter,
}

impl SubscriptionPayload {
    /// JSON body with every blank top-level entry removed.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("plan_identifier".to_string(), Value::String(self.plan_identifier.clone()));
        body.insert(
            "expires_at".to_string(),
            self.expires_at
                .map(|at| Value::String(at.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
        );
        body.insert("customer_id".to_string(), Value::String(self.customer_id.clone()));
        body.insert("only_on_charge_success".to_string(), Value::Bool(self.only_on_charge_success));
        body.insert(
            "custom_variables".to_string(),
            serde_json::to_value(&self.custom_variables).unwrap_or(Value::Null),
        );
        body.insert("payable_with".to_string(), Value::String(self.payable_with.to_string()));

        body.retain(|_, value| !is_blank(value));
        Value::Object(body)
    }
}
