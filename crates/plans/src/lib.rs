//! Plan catalog: the fixed table of subscription tiers.
//!
//! Pure data plus two pure functions (lookup and subscription window
//! computation). No IO.

pub mod catalog;

pub use catalog::{
    Plan, PlanId, SubscriptionWindow, all_plans, compute_subscription_window, lookup,
};
