mod common;

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use common::{existing_user, new_user, Call, ScriptedGateway};
use iugu_billing::{
    BillingError, GatewayErrors, MemorySubscriptionStore, Stage, SubscriptionBuilder,
    SubscriptionColumns, SubscriptionCreator, SubscriptionOutcome,
};

type Harness = (Arc<ScriptedGateway>, Arc<MemorySubscriptionStore>, SubscriptionCreator);

fn setup(gateway: ScriptedGateway, store: MemorySubscriptionStore) -> Harness {
    let gateway = Arc::new(gateway);
    let store = Arc::new(store);
    let creator = SubscriptionCreator::new(gateway.clone(), store.clone());
    (gateway, store, creator)
}

fn memory_store(extra_columns: &[&str]) -> MemorySubscriptionStore {
    MemorySubscriptionStore::new(SubscriptionColumns::default(), extra_columns.iter().copied())
}

fn data(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn test_new_customer_with_trial_and_coupon() {
    let user = new_user();
    let store = memory_store(&["source"]).with_owner(user.clone());
    let (gateway, store, creator) = setup(ScriptedGateway::new(), store);
    let now = Utc::now();

    let extra = data(&[("source", json!("web"))]);
    let request = SubscriptionBuilder::new(&user, "main", "gold", extra)
        .trial_days(7)
        .with_coupon("SAVE10")
        .build();
    let outcome = creator.create_at(request, None, Map::new(), now).await.unwrap();

    let record = outcome.record().expect("subscription should be created").clone();
    assert_eq!(record.name, "main");
    assert_eq!(record.plan, "gold");
    assert_eq!(record.gateway_id, "SUB_1");
    assert_eq!(record.trial_ends_at, Some(now + Duration::days(7)));
    assert_eq!(record.ends_at, None);
    assert_eq!(record.extra.get("source"), Some(&json!("web")));
    assert_eq!(outcome.last_error(), None);

    let calls = gateway.calls();
    assert_eq!(
        calls[0],
        Call::CreateCustomer(json!({
            "email": "ana@example.com",
            "name": "Ana Souza",
            "coupon": "SAVE10"
        }))
    );
    let payloads = gateway.subscription_payloads();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].customer_id, "CUS_NEW");
    assert_eq!(payloads[0].expires_at, Some(now + Duration::days(7)));

    assert_eq!(store.owner(user.id).unwrap().iugu_id.as_deref(), Some("CUS_NEW"));
    assert_eq!(store.subscriptions(), vec![record]);
}

#[tokio::test]
async fn test_existing_customer_with_token_and_skipped_trial() {
    let user = existing_user("CUS_OLD");
    let store = memory_store(&[]);
    let (gateway, store, creator) = setup(ScriptedGateway::new(), store);
    let now = Utc::now();

    let request = SubscriptionBuilder::new(&user, "main", "gold", BTreeMap::new())
        .trial_days(7)
        .with_coupon("SAVE10")
        .skip_trial()
        .build();
    let outcome = creator
        .create_at(request, Some("tok_123"), Map::new(), now)
        .await
        .unwrap();

    let record = outcome.into_record().expect("subscription should be created");
    assert_eq!(record.trial_ends_at, None);

    let calls = gateway.calls();
    assert_eq!(calls[0], Call::FetchCustomer("CUS_OLD".to_string()));
    assert_eq!(
        calls[1],
        Call::UpdateCard {
            customer_id: "CUS_OLD".to_string(),
            token: "tok_123".to_string()
        }
    );
    // the coupon only applies to first-time customers
    assert!(!calls.iter().any(|c| matches!(c, Call::CreateCustomer(_))));

    let payload = &gateway.subscription_payloads()[0];
    assert_eq!(payload.customer_id, "CUS_OLD");
    assert_eq!(payload.expires_at, Some(now));
    assert_eq!(store.subscriptions().len(), 1);
}

#[tokio::test]
async fn test_no_trial_leaves_dates_empty() {
    let user = existing_user("CUS_OLD");
    let store = memory_store(&[]);
    let (gateway, _store, creator) = setup(ScriptedGateway::new(), store);

    let request = SubscriptionBuilder::new(&user, "main", "gold", BTreeMap::new()).build();
    let record = creator.add(request, Map::new()).await.unwrap().into_record().unwrap();

    assert_eq!(record.trial_ends_at, None);
    assert_eq!(gateway.subscription_payloads()[0].expires_at, None);
    assert!(!gateway.calls().iter().any(|c| matches!(c, Call::UpdateCard { .. })));
}

#[tokio::test]
async fn test_new_customer_with_token_and_options() {
    let user = new_user();
    let store = memory_store(&[]).with_owner(user.clone());
    let (gateway, store, creator) = setup(ScriptedGateway::new(), store);

    let mut options = Map::new();
    options.insert("phone".to_string(), json!("11999990000"));
    options.insert("cpf_cnpj".to_string(), json!(""));
    options.insert("coupon".to_string(), json!("OLD"));

    let request = SubscriptionBuilder::new(&user, "main", "gold", BTreeMap::new())
        .with_coupon("SAVE10")
        .build();
    let outcome = creator.create(request, Some("tok_123"), options).await.unwrap();
    assert!(outcome.is_created());

    let calls = gateway.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(
        calls[0],
        Call::CreateCustomer(json!({
            "email": "ana@example.com",
            "name": "Ana Souza",
            "phone": "11999990000",
            "coupon": "SAVE10"
        }))
    );
    assert_eq!(
        calls[1],
        Call::UpdateCard {
            customer_id: "CUS_NEW".to_string(),
            token: "tok_123".to_string()
        }
    );
    match &calls[2] {
        Call::CreateSubscription(payload) => assert_eq!(payload.customer_id, "CUS_NEW"),
        other => panic!("expected subscription call, got {:?}", other),
    }
    assert_eq!(store.owner(user.id).unwrap().iugu_id.as_deref(), Some("CUS_NEW"));
}

#[tokio::test]
async fn test_oversized_trial_fails_before_any_gateway_call() {
    let user = new_user();
    let store = memory_store(&[]).with_owner(user.clone());
    let (gateway, store, creator) = setup(ScriptedGateway::new(), store);

    let request = SubscriptionBuilder::new(&user, "main", "gold", BTreeMap::new())
        .trial_days(u32::MAX)
        .build();
    let result = creator.create(request, Some("tok_123"), Map::new()).await;

    assert!(matches!(result, Err(BillingError::ValidationError(_))));
    assert!(gateway.calls().is_empty());
    assert!(store.subscriptions().is_empty());
    assert_eq!(store.owner(user.id).unwrap().iugu_id, None);
}

#[tokio::test]
async fn test_unknown_columns_are_dropped_but_still_sent() {
    let user = existing_user("CUS_OLD");
    let (gateway, _store, creator) = setup(ScriptedGateway::new(), memory_store(&["source"]));

    let extra = data(&[
        ("source", json!("web")),
        ("campaign", json!("spring")),
        ("iugu_plan", json!("silver")),
        ("iugu_id", json!("SUB_FAKE")),
        ("user_id", json!("someone-else")),
    ]);
    let request = SubscriptionBuilder::new(&user, "main", "gold", extra).build();
    let record = creator.add(request, Map::new()).await.unwrap().into_record().unwrap();

    assert_eq!(record.extra.len(), 1);
    assert_eq!(record.extra.get("source"), Some(&json!("web")));
    assert_eq!(record.plan, "gold");
    assert_eq!(record.gateway_id, "SUB_1");
    assert_eq!(record.user_id, user.id);

    let names: Vec<String> = gateway.subscription_payloads()[0]
        .custom_variables
        .iter()
        .map(|v| v.name.clone())
        .collect();
    assert_eq!(names, vec!["campaign", "iugu_id", "iugu_plan", "source", "user_id"]);
}

#[tokio::test]
async fn test_additional_data_overrides_record_columns() {
    let user = existing_user("CUS_OLD");
    let (_gateway, _store, creator) = setup(ScriptedGateway::new(), memory_store(&["updated_at"]));
    let now = Utc::now();

    let extra = data(&[
        ("updated_at", json!("2026-10-01T12:00:00Z")),
        ("name", json!("premium")),
        ("ends_at", json!("2027-01-01T00:00:00Z")),
    ]);
    let request = SubscriptionBuilder::new(&user, "main", "gold", extra)
        .trial_days(7)
        .build();
    let record = creator
        .create_at(request, None, Map::new(), now)
        .await
        .unwrap()
        .into_record()
        .unwrap();

    assert_eq!(record.name, "premium");
    assert_eq!(record.ends_at.unwrap().to_rfc3339(), "2027-01-01T00:00:00+00:00");
    assert_eq!(record.trial_ends_at, Some(now + Duration::days(7)));
    assert_eq!(record.extra, data(&[("updated_at", json!("2026-10-01T12:00:00Z"))]));
}

#[tokio::test]
async fn test_null_trial_end_in_additional_data_clears_trial() {
    let user = existing_user("CUS_OLD");
    let (gateway, _store, creator) = setup(ScriptedGateway::new(), memory_store(&[]));
    let now = Utc::now();

    let extra = data(&[("trial_ends_at", Value::Null)]);
    let request = SubscriptionBuilder::new(&user, "main", "gold", extra)
        .trial_days(7)
        .build();
    let record = creator
        .create_at(request, None, Map::new(), now)
        .await
        .unwrap()
        .into_record()
        .unwrap();

    assert_eq!(record.trial_ends_at, None);
    // the gateway still gets the trial
    let payload = &gateway.subscription_payloads()[0];
    assert_eq!(payload.expires_at, Some(now + Duration::days(7)));
}

#[tokio::test]
async fn test_customer_rejection_stops_the_flow() {
    let user = new_user();
    let store = memory_store(&[]).with_owner(user.clone());
    let errors = json!({ "email": ["não é válido"] });
    let gateway = ScriptedGateway::new().reject_customer(errors.clone());
    let (gateway, store, creator) = setup(gateway, store);

    let request = SubscriptionBuilder::new(&user, "main", "gold", BTreeMap::new()).build();
    let outcome = creator.add(request, Map::new()).await.unwrap();

    assert!(!outcome.is_created());
    assert_eq!(outcome.last_error(), Some(&GatewayErrors(errors.clone())));
    assert_eq!(
        outcome,
        SubscriptionOutcome::Rejected {
            stage: Stage::Customer,
            errors: GatewayErrors(errors)
        }
    );
    assert!(gateway.subscription_payloads().is_empty());
    assert!(store.subscriptions().is_empty());
    assert_eq!(store.owner(user.id).unwrap().iugu_id, None);
}

#[tokio::test]
async fn test_card_rejection_stops_the_flow() {
    let user = existing_user("CUS_OLD");
    let store = memory_store(&[]);
    let errors = json!("Token inválido");
    let gateway = ScriptedGateway::new().reject_card(errors.clone());
    let (gateway, store, creator) = setup(gateway, store);

    let request = SubscriptionBuilder::new(&user, "main", "gold", BTreeMap::new()).build();
    let outcome = creator.create(request, Some("tok_bad"), Map::new()).await.unwrap();

    assert!(matches!(
        outcome,
        SubscriptionOutcome::Rejected { stage: Stage::Card, .. }
    ));
    assert_eq!(outcome.last_error(), Some(&GatewayErrors(errors)));
    assert!(gateway.subscription_payloads().is_empty());
    assert!(store.subscriptions().is_empty());
}

#[tokio::test]
async fn test_subscription_rejection_persists_nothing() {
    let user = new_user();
    let store = memory_store(&[]).with_owner(user.clone());
    let errors = json!({ "plan_identifier": ["não existe"] });
    let gateway = ScriptedGateway::new().reject_subscription(errors.clone());
    let (gateway, store, creator) = setup(gateway, store);

    let request = SubscriptionBuilder::new(&user, "main", "platinum", BTreeMap::new()).build();
    let outcome = creator.add(request, Map::new()).await.unwrap();

    assert!(matches!(
        outcome,
        SubscriptionOutcome::Rejected { stage: Stage::Subscription, .. }
    ));
    assert_eq!(outcome.last_error(), Some(&GatewayErrors(errors)));
    assert_eq!(gateway.subscription_payloads().len(), 1);
    assert!(store.subscriptions().is_empty());
    // the customer created on the way stays linked
    assert_eq!(store.owner(user.id).unwrap().iugu_id.as_deref(), Some("CUS_NEW"));
}

#[tokio::test]
async fn test_custom_columns_are_used() {
    let user = existing_user("CUS_OLD");
    let columns = SubscriptionColumns {
        id_column: "gateway_ref".to_string(),
        plan_column: "gateway_plan".to_string(),
    };
    let store = MemorySubscriptionStore::new(columns, ["iugu_id"]);
    let (_gateway, _store, creator) = setup(ScriptedGateway::new(), store);

    // with renamed columns, "iugu_id" is an ordinary column again
    let extra = data(&[("iugu_id", json!("legacy"))]);
    let request = SubscriptionBuilder::new(&user, "main", "gold", extra).build();
    let record = creator.add(request, Map::new()).await.unwrap().into_record().unwrap();

    assert_eq!(record.gateway_id, "SUB_1");
    assert_eq!(record.extra.get("iugu_id"), Some(&json!("legacy")));
}
