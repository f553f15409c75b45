use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use crate::errors::BillingError;
use crate::subscription::{
    PaymentMethodFilter, SubscriptionBuilder, SubscriptionCreator, SubscriptionOutcome,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubscriptionRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub plan: String,
    /// Zero means no trial.
    #[validate(range(max = 3650))]
    pub trial_days: Option<u32>,
    #[serde(default)]
    pub skip_trial: bool,
    pub coupon: Option<String>,
    #[serde(default)]
    pub only_on_charge_success: bool,
    pub payable_with: Option<PaymentMethodFilter>,
    pub token: Option<String>,
    #[serde(default)]
    pub additional_data: BTreeMap<String, Value>,
    /// Extra attributes for a first-time Iugu customer.
    #[serde(default)]
    pub customer: Map<String, Value>,
}

pub async fn create_subscription(
    creator: web::Data<SubscriptionCreator>,
    path: web::Path<Uuid>,
    request: web::Json<CreateSubscriptionRequest>,
) -> Result<HttpResponse, BillingError> {
    if let Err(validation_errors) = request.validate() {
        return Err(BillingError::ValidationError(validation_errors.to_string()));
    }

    let user_id = path.into_inner();
    let owner = creator
        .store()
        .find_owner(user_id)
        .await?
        .ok_or_else(|| BillingError::NotFound(format!("User {} not found", user_id)))?;

    let request = request.into_inner();
    let mut builder =
        SubscriptionBuilder::new(&owner, request.name, request.plan, request.additional_data);
    if let Some(days) = request.trial_days {
        builder = builder.trial_days(days);
    }
    if request.skip_trial {
        builder = builder.skip_trial();
    }
    if let Some(coupon) = request.coupon {
        builder = builder.with_coupon(coupon);
    }
    if request.only_on_charge_success {
        builder = builder.charge_on_success();
    }
    if let Some(filter) = request.payable_with {
        builder = builder.payable_with(filter);
    }

    let outcome = creator
        .create(builder.build(), request.token.as_deref(), request.customer)
        .await?;

    match outcome {
        SubscriptionOutcome::Created(record) => Ok(HttpResponse::Created().json(record)),
        SubscriptionOutcome::Rejected { stage, errors } => {
            Ok(HttpResponse::UnprocessableEntity().json(json!({
                "success": false,
                "stage": stage,
                "errors": errors
            })))
        }
    }
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "billing-service",
        "timestamp": chrono::Utc::now()
    }))
}

pub fn configure_subscription_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check)).service(
        web::scope("/users/{user_id}")
            .route("/subscriptions", web::post().to(create_subscription)),
    );
}
