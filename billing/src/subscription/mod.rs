//! Building and creating gateway subscriptions.

pub mod builder;
pub mod creator;
pub mod payload;
pub mod trial;

pub use builder::{SubscriptionBuilder, SubscriptionRequest};
pub use creator::{Stage, SubscriptionCreator, SubscriptionOutcome};
pub use payload::{CustomVariable, PaymentMethodFilter, SubscriptionPayload};
pub use trial::TrialWindow;
