//! Payment reconciliation.
//!
//! Two channels confirm a payment: the browser callback after checkout and
//! the provider webhook. Both end in [`PaymentReconciler::activate_subscription`],
//! which must tolerate being called twice for the same payment.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use jobboard_companies::Company;
use jobboard_core::DomainError;
use jobboard_payments::{
    OrderHandle, OrderRequest, PaymentOrigin, parse_webhook, verify_callback, verify_webhook,
};
use jobboard_plans::{PlanId, SubscriptionWindow};

use super::{ServiceError, ServiceResult};
use crate::config::PaymentConfig;
use crate::notify::{Notification, NotificationDispatcher};
use crate::provider::PaymentProvider;
use crate::store::CompanyStore;

/// A repeat activation of the same plan whose window started within this
/// many minutes of `now` is treated as the same payment.
pub const ACTIVATION_DEDUPE_MINUTES: i64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRequest {
    pub email: String,
    pub plan_id: PlanId,
    pub origin: PaymentOrigin,
    pub payment_id: Option<String>,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated(Company),
    /// Duplicate confirmation; nothing was written or sent.
    AlreadyActive(Company),
}

impl ActivationOutcome {
    pub fn company(&self) -> &Company {
        match self {
            ActivationOutcome::Activated(company) | ActivationOutcome::AlreadyActive(company) => {
                company
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    /// Paid plan: the checkout widget takes it from here.
    Created {
        order: OrderHandle,
        email: String,
        plan_id: PlanId,
        key_id: String,
    },
    /// Free plan: activated on the spot.
    Activated(ActivationOutcome),
}

/// Fields the checkout widget hands back after a successful payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackVerification {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Activated { email: String, plan_id: PlanId },
    Duplicate { email: String, plan_id: PlanId },
    Ignored { event_type: String, reason: String },
}

#[derive(Clone)]
pub struct PaymentReconciler {
    companies: Arc<dyn CompanyStore>,
    provider: Arc<dyn PaymentProvider>,
    config: PaymentConfig,
    notifier: NotificationDispatcher,
}

impl PaymentReconciler {
    pub fn new(
        companies: Arc<dyn CompanyStore>,
        provider: Arc<dyn PaymentProvider>,
        config: PaymentConfig,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            companies,
            provider,
            config,
            notifier,
        }
    }

    /// Public key id for the checkout widget. Empty when unconfigured.
    pub fn key_id(&self) -> &str {
        self.provider.key_id()
    }

    pub async fn create_order(
        &self,
        email: &str,
        plan: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<OrderOutcome> {
        let plan_id: PlanId = plan.parse()?;
        let company = self.load(email).await?;

        if plan_id.is_free() {
            let outcome = self
                .activate_subscription(
                    ActivationRequest {
                        email: company.email().to_string(),
                        plan_id,
                        origin: PaymentOrigin::FreePlan,
                        payment_id: None,
                        order_id: None,
                    },
                    now,
                )
                .await?;
            return Ok(OrderOutcome::Activated(outcome));
        }

        let request = OrderRequest::for_plan(company.email(), plan_id.plan(), now);
        let order = self.provider.create_order(&request).await?;
        info!(
            company = %company.email(),
            plan = %plan_id,
            order_id = %order.order_id,
            amount = order.amount,
            "payment order created"
        );
        Ok(OrderOutcome::Created {
            order,
            email: company.email().to_string(),
            plan_id,
            key_id: self.provider.key_id().to_string(),
        })
    }

    /// Check the checkout callback signature. With a plan, a valid callback
    /// also activates it for `email`; without one it only verifies.
    pub async fn verify_client_callback(
        &self,
        callback: &CallbackVerification,
        email: &str,
        plan: Option<&str>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<ActivationOutcome>> {
        verify_callback(
            &self.config.key_secret,
            &callback.order_id,
            &callback.payment_id,
            &callback.signature,
        )?;

        let Some(plan) = plan.map(str::trim).filter(|p| !p.is_empty()) else {
            return Ok(None);
        };
        let plan_id: PlanId = plan.parse()?;
        let outcome = self
            .activate_subscription(
                ActivationRequest {
                    email: email.to_string(),
                    plan_id,
                    origin: PaymentOrigin::ClientVerify,
                    payment_id: Some(callback.payment_id.clone()),
                    order_id: Some(callback.order_id.clone()),
                },
                now,
            )
            .await?;
        Ok(Some(outcome))
    }

    /// Handle a raw webhook delivery.
    ///
    /// Signature problems are errors. Events that carry nothing actionable
    /// (other event types, missing notes, unknown plan or company) are
    /// acknowledged as ignored so the provider stops retrying.
    pub async fn handle_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> ServiceResult<WebhookOutcome> {
        let Some(secret) = self.config.webhook_secret.as_deref() else {
            return Err(ServiceError::NotConfigured("webhook"));
        };
        verify_webhook(secret, body, signature.unwrap_or_default())?;

        let event = parse_webhook(body)?;
        let event_type = event.event_type().to_string();
        let ignored = |reason: &str| -> ServiceResult<WebhookOutcome> {
            info!(event = %event_type, %reason, "webhook ignored");
            Ok(WebhookOutcome::Ignored {
                event_type: event_type.clone(),
                reason: reason.to_string(),
            })
        };

        let Some(notes) = event.activation_notes() else {
            return ignored("no activation notes");
        };
        let Ok(plan_id) = notes.plan.parse::<PlanId>() else {
            warn!(event = %event_type, plan = %notes.plan, "webhook names an unknown plan");
            return ignored("unknown plan");
        };

        let request = ActivationRequest {
            email: notes.email.clone(),
            plan_id,
            origin: PaymentOrigin::Webhook,
            payment_id: event.payment_id().map(str::to_string),
            order_id: event.order_id().map(str::to_string),
        };
        match self.activate_subscription(request, now).await {
            Ok(ActivationOutcome::Activated(company)) => Ok(WebhookOutcome::Activated {
                email: company.email().to_string(),
                plan_id,
            }),
            Ok(ActivationOutcome::AlreadyActive(company)) => Ok(WebhookOutcome::Duplicate {
                email: company.email().to_string(),
                plan_id,
            }),
            Err(ServiceError::Domain(DomainError::NotFound(_))) => {
                warn!(event = %event_type, company = %notes.email, "webhook for unknown company");
                ignored("unknown company")
            }
            Err(e) => Err(e),
        }
    }

    /// Write the plan's window onto the company and confirm by notification.
    pub async fn activate_subscription(
        &self,
        request: ActivationRequest,
        now: DateTime<Utc>,
    ) -> ServiceResult<ActivationOutcome> {
        let mut company = self.load(&request.email).await?;

        let sub = company.subscription();
        if sub.plan_id == request.plan_id
            && (now - sub.started_at).abs() <= Duration::minutes(ACTIVATION_DEDUPE_MINUTES)
        {
            info!(
                company = %company.email(),
                plan = %request.plan_id,
                origin = %request.origin,
                payment_id = request.payment_id.as_deref().unwrap_or("-"),
                "duplicate activation ignored"
            );
            return Ok(ActivationOutcome::AlreadyActive(company));
        }

        let plan = request.plan_id.plan();
        company.apply_subscription(plan, SubscriptionWindow::for_plan(now, plan), now);
        self.companies.save(&company).await?;

        info!(
            company = %company.email(),
            plan = %plan.id,
            origin = %request.origin,
            payment_id = request.payment_id.as_deref().unwrap_or("-"),
            order_id = request.order_id.as_deref().unwrap_or("-"),
            "subscription activated"
        );
        self.notifier.dispatch(
            company.email(),
            Notification::SubscriptionActivated {
                company_name: company.display_name().to_string(),
                plan_label: plan.label.to_string(),
                ends_at: company.subscription().ends_at,
                job_limit: plan.job_limit,
                origin: request.origin,
                payment_id: request.payment_id,
            },
        );
        Ok(ActivationOutcome::Activated(company))
    }

    async fn load(&self, email: &str) -> ServiceResult<Company> {
        self.companies
            .find_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::not_found("company"))
    }
}
