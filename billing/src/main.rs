use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

use iugu_billing::handlers::configure_subscription_routes;
use iugu_billing::telemetry::{init_tracing, TelemetryConfig};
use iugu_billing::{BillingConfig, IuguClient, PgSubscriptionStore, SubscriptionCreator};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing(TelemetryConfig::default());

    let config = BillingConfig::from_env()?;

    tracing::info!("📊 [Billing Service] Connecting to database...");
    // Disable server-side prepared statements for pgbouncer
    let connect_options =
        PgConnectOptions::from_str(&config.database_url)?.statement_cache_capacity(0);
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect_with(connect_options)
        .await?;

    if config.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("[Billing Service] Migrations applied");
    }
    tracing::info!("✅ [Billing Service] Database connection established");

    let store = PgSubscriptionStore::connect(pool, config.columns.clone()).await?;
    let gateway = IuguClient::new(config.iugu_api_token.clone(), config.iugu_api_url.clone());
    tracing::info!(url = %gateway.base_url(), "💳 [Billing Service] Iugu client configured");

    let creator = web::Data::new(SubscriptionCreator::new(Arc::new(gateway), Arc::new(store)));

    let port = config.port;
    tracing::info!("🚀 [Billing Service] Starting on port {}", port);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .app_data(creator.clone())
            .wrap(cors)
            .wrap(TracingLogger::default())
            .configure(configure_subscription_routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}
