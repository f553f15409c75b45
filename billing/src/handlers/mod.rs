pub mod subscriptions;

pub use subscriptions::configure_subscription_routes;
