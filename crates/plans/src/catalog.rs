use core::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use jobboard_core::{DomainError, ValueObject};

/// Identifier of a subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanId {
    Free,
    Paid3m,
    Paid6m,
    Paid12m,
}

impl PlanId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanId::Free => "free",
            PlanId::Paid3m => "paid3m",
            PlanId::Paid6m => "paid6m",
            PlanId::Paid12m => "paid12m",
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, PlanId::Free)
    }

    /// Catalog entry for this id. Every `PlanId` has one.
    pub fn plan(&self) -> &'static Plan {
        match self {
            PlanId::Free => &PLANS[0],
            PlanId::Paid3m => &PLANS[1],
            PlanId::Paid6m => &PLANS[2],
            PlanId::Paid12m => &PLANS[3],
        }
    }
}

impl core::fmt::Display for PlanId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "free" => Ok(PlanId::Free),
            "paid3m" => Ok(PlanId::Paid3m),
            "paid6m" => Ok(PlanId::Paid6m),
            "paid12m" => Ok(PlanId::Paid12m),
            other => Err(DomainError::invalid_plan(other)),
        }
    }
}

/// Immutable plan reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub id: PlanId,
    pub label: &'static str,
    /// 0 means the plan never expires.
    pub duration_days: u32,
    /// Maximum number of simultaneously active jobs.
    pub job_limit: u32,
    pub ads_enabled: bool,
    pub recommendations_enabled: bool,
    /// Price in minor currency units (paise).
    pub price_minor: u64,
    pub currency: &'static str,
}

impl ValueObject for Plan {}

impl Plan {
    pub fn is_paid(&self) -> bool {
        !self.id.is_free()
    }

    pub fn is_non_expiring(&self) -> bool {
        self.duration_days == 0
    }
}

static PLANS: [Plan; 4] = [
    Plan {
        id: PlanId::Free,
        label: "Free",
        duration_days: 0,
        job_limit: 3,
        ads_enabled: true,
        recommendations_enabled: false,
        price_minor: 0,
        currency: "INR",
    },
    Plan {
        id: PlanId::Paid3m,
        label: "3 Months",
        duration_days: 90,
        job_limit: 15,
        ads_enabled: false,
        recommendations_enabled: true,
        price_minor: 99_900,
        currency: "INR",
    },
    Plan {
        id: PlanId::Paid6m,
        label: "6 Months",
        duration_days: 180,
        job_limit: 20,
        ads_enabled: false,
        recommendations_enabled: true,
        price_minor: 179_900,
        currency: "INR",
    },
    Plan {
        id: PlanId::Paid12m,
        label: "12 Months",
        duration_days: 365,
        job_limit: 30,
        ads_enabled: false,
        recommendations_enabled: true,
        price_minor: 299_900,
        currency: "INR",
    },
];

/// All plans, cheapest first.
pub fn all_plans() -> &'static [Plan] {
    &PLANS
}

/// Look up a plan by its wire identifier. Unknown ids yield `None`.
pub fn lookup(plan_id: &str) -> Option<&'static Plan> {
    plan_id.parse::<PlanId>().ok().map(|id| id.plan())
}

/// Start and (optional) end of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionWindow {
    pub started_at: DateTime<Utc>,
    /// `None` for non-expiring plans.
    pub ends_at: Option<DateTime<Utc>>,
}

impl ValueObject for SubscriptionWindow {}

impl SubscriptionWindow {
    /// Window for a known plan starting at `start`.
    pub fn for_plan(start: DateTime<Utc>, plan: &Plan) -> Self {
        let ends_at = if plan.is_non_expiring() {
            None
        } else {
            Some(start + Duration::days(i64::from(plan.duration_days)))
        };
        Self {
            started_at: start,
            ends_at,
        }
    }
}

/// Compute the subscription window for `plan_id` starting at `start`.
///
/// Returns `None` when the plan id is not in the catalog.
pub fn compute_subscription_window(
    start: DateTime<Utc>,
    plan_id: &str,
) -> Option<SubscriptionWindow> {
    lookup(plan_id).map(|plan| SubscriptionWindow::for_plan(start, plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap()
    }

    #[test]
    fn catalog_has_four_fixed_plans() {
        let ids: Vec<&str> = all_plans().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["free", "paid3m", "paid6m", "paid12m"]);

        let free = lookup("free").unwrap();
        assert_eq!(free.job_limit, 3);
        assert_eq!(free.duration_days, 0);
        assert!(free.ads_enabled);
        assert!(!free.recommendations_enabled);

        let paid3m = lookup("paid3m").unwrap();
        assert_eq!(paid3m.label, "3 Months");
        assert_eq!(paid3m.job_limit, 15);
        assert_eq!(paid3m.duration_days, 90);
    }

    #[test]
    fn paid_tiers_grow_in_duration_and_limit() {
        let paid: Vec<&Plan> = all_plans().iter().filter(|p| p.is_paid()).collect();
        for pair in paid.windows(2) {
            assert!(pair[0].duration_days < pair[1].duration_days);
            assert!(pair[0].job_limit < pair[1].job_limit);
        }
    }

    #[test]
    fn unknown_plan_is_rejected() {
        assert!(lookup("gold").is_none());
        assert!(compute_subscription_window(test_time(), "gold").is_none());

        match "gold".parse::<PlanId>() {
            Err(DomainError::InvalidPlan(id)) if id == "gold" => {}
            other => panic!("Expected invalid plan, got {other:?}"),
        }
    }

    #[test]
    fn free_window_never_expires() {
        let window = compute_subscription_window(test_time(), "free").unwrap();
        assert_eq!(window.started_at, test_time());
        assert_eq!(window.ends_at, None);
    }

    #[test]
    fn serde_uses_lowercase_ids() {
        assert_eq!(PlanId::Paid12m.as_str(), "paid12m");
        assert_eq!(PlanId::Paid12m.to_string(), "paid12m");
        assert_eq!(PlanId::Paid6m.plan().id, PlanId::Paid6m);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: paid windows end exactly `duration_days` after the start,
        /// the free window never ends.
        #[test]
        fn window_end_is_start_plus_duration(
            offset_secs in 0i64..(20 * 365 * 86_400),
            plan_index in 0usize..4,
        ) {
            let start = test_time() + Duration::seconds(offset_secs);
            let plan = &all_plans()[plan_index];
            let window = compute_subscription_window(start, plan.id.as_str()).unwrap();

            prop_assert_eq!(window.started_at, start);
            if plan.id.is_free() {
                prop_assert_eq!(window.ends_at, None);
            } else {
                prop_assert_eq!(
                    window.ends_at,
                    Some(start + Duration::days(i64::from(plan.duration_days)))
                );
            }
        }
    }
}
