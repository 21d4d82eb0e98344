//! Company registration, vetting and messaging.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use jobboard_companies::{Company, CompanyMessage, NewCompany, Transition};
use jobboard_core::{AdminId, CompanyId};

use super::{ServiceError, ServiceResult};
use crate::audit::{AuditAction, AuditEntityType, AuditLogEntry, AuditRecorder};
use crate::config::FrontendLinks;
use crate::notify::{Notification, NotificationDispatcher};
use crate::store::{CompanyFilter, CompanyStore};

pub const MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// One page of a company's message thread, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessagePage {
    pub items: Vec<CompanyMessage>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
}

#[derive(Clone)]
pub struct CompanyLifecycle {
    companies: Arc<dyn CompanyStore>,
    audit: AuditRecorder,
    notifier: NotificationDispatcher,
    links: FrontendLinks,
}

impl CompanyLifecycle {
    pub fn new(
        companies: Arc<dyn CompanyStore>,
        audit: AuditRecorder,
        notifier: NotificationDispatcher,
        links: FrontendLinks,
    ) -> Self {
        Self {
            companies,
            audit,
            notifier,
            links,
        }
    }

    pub async fn register(&self, input: NewCompany, now: DateTime<Utc>) -> ServiceResult<Company> {
        let company = Company::register(CompanyId::new(), input, now)?;
        self.companies.insert(&company).await?;
        info!(company = %company.email(), handle = %company.handle(), "company registered");
        Ok(company)
    }

    pub async fn get(&self, id: CompanyId) -> ServiceResult<Company> {
        self.companies
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("company"))
    }

    pub async fn find_by_email(&self, email: &str) -> ServiceResult<Company> {
        self.companies
            .find_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::not_found("company"))
    }

    pub async fn list(&self, filter: &CompanyFilter) -> ServiceResult<Vec<Company>> {
        Ok(self.companies.list(filter).await?)
    }

    /// The company, if its approval status lets it sign in.
    pub async fn login_gate(&self, email: &str) -> ServiceResult<Company> {
        let company = self.find_by_email(email).await?;
        company.login_gate()?;
        Ok(company)
    }

    pub async fn approve(
        &self,
        admin: AdminId,
        id: CompanyId,
        now: DateTime<Utc>,
    ) -> ServiceResult<Company> {
        let mut company = self.get(id).await?;
        let transition = company.approve(now);
        if transition.changed() {
            self.companies.save(&company).await?;
            self.notifier.dispatch(
                company.email(),
                Notification::CompanyApproved {
                    company_name: company.display_name().to_string(),
                    contact_name: company.contact_name().map(str::to_string),
                    login_url: self.links.login_url(),
                },
            );
        }
        self.record(admin, AuditAction::ApproveCompany, &company, transition, None, now);
        Ok(company)
    }

    pub async fn hold(
        &self,
        admin: AdminId,
        id: CompanyId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<Company> {
        let mut company = self.get(id).await?;
        let transition = company.hold(reason, now)?;
        self.companies.save(&company).await?;

        self.notifier.dispatch(
            company.email(),
            Notification::CompanyOnHold {
                company_name: company.display_name().to_string(),
                reason: reason.trim().to_string(),
                messages_url: self.links.messages_url(),
            },
        );
        self.record(admin, AuditAction::HoldCompany, &company, transition, Some(reason), now);
        Ok(company)
    }

    pub async fn deny(
        &self,
        admin: AdminId,
        id: CompanyId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<Company> {
        let mut company = self.get(id).await?;
        let transition = company.deny(reason, now)?;
        self.companies.save(&company).await?;

        self.notifier.dispatch(
            company.email(),
            Notification::CompanyDenied {
                company_name: company.display_name().to_string(),
                reason: reason.trim().to_string(),
            },
        );
        self.record(admin, AuditAction::DenyCompany, &company, transition, Some(reason), now);
        Ok(company)
    }

    /// Send the company back to `pending`. No notification goes out.
    pub async fn revoke_access(
        &self,
        admin: AdminId,
        id: CompanyId,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Company> {
        let mut company = self.get(id).await?;
        let transition = company.revoke_access(reason, now);
        self.companies.save(&company).await?;
        self.record(
            admin,
            AuditAction::RevokeCompanyAccess,
            &company,
            transition,
            reason,
            now,
        );
        Ok(company)
    }

    pub async fn message_company(
        &self,
        admin: AdminId,
        id: CompanyId,
        text: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<CompanyMessage> {
        let mut company = self.get(id).await?;
        let message = company.post_admin_message(text, now)?.clone();
        self.companies.save(&company).await?;

        self.notifier.dispatch(
            company.email(),
            Notification::NewAdminMessage {
                company_name: company.display_name().to_string(),
                message: message.text.clone(),
                messages_url: self.links.messages_url(),
            },
        );
        self.audit.record(AuditLogEntry::new(
            admin,
            AuditAction::MessageCompany,
            AuditEntityType::Company,
            company.id_typed().to_string(),
            json!({ "email": company.email(), "length": message.text.chars().count() }),
            now,
        ));
        Ok(message)
    }

    pub async fn company_post_message(
        &self,
        email: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<CompanyMessage> {
        let mut company = self.find_by_email(email).await?;
        let message = company.post_company_message(text, now)?.clone();
        self.companies.save(&company).await?;
        Ok(message)
    }

    /// Page through the company's thread, newest first. Pages start at 1 and
    /// `limit` is clamped to `1..=MAX_PAGE_SIZE`.
    pub async fn messages(
        &self,
        email: &str,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> ServiceResult<MessagePage> {
        let company = self.find_by_email(email).await?;
        Ok(message_page(&company, page, limit))
    }

    /// Same paging as [`Self::messages`], for an administrator looking the
    /// company up by id.
    pub async fn messages_for(
        &self,
        id: CompanyId,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> ServiceResult<MessagePage> {
        let company = self.get(id).await?;
        Ok(message_page(&company, page, limit))
    }

    fn record(
        &self,
        admin: AdminId,
        action: AuditAction,
        company: &Company,
        transition: Transition,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) {
        info!(
            company = %company.email(),
            action = action.as_str(),
            from = %transition.from,
            to = %transition.to,
            "company status changed"
        );
        self.audit.record(AuditLogEntry::new(
            admin,
            action,
            AuditEntityType::Company,
            company.id_typed().to_string(),
            json!({
                "email": company.email(),
                "from": transition.from,
                "to": transition.to,
                "reason": reason.map(str::trim),
            }),
            now,
        ));
    }
}

fn message_page(company: &Company, page: Option<usize>, limit: Option<usize>) -> MessagePage {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    let total = company.messages().len();
    let items = company
        .messages()
        .iter()
        .rev()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .cloned()
        .collect();
    MessagePage {
        items,
        page,
        limit,
        total,
    }
}
