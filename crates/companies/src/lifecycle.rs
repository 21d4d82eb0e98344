//! Approval lifecycle transitions.
//!
//! Every state is reachable from every other state through an explicit
//! administrator action. No transition deletes the company.

use chrono::{DateTime, Utc};

use jobboard_core::{DomainError, DomainResult};

use crate::company::{ApprovalStatus, Company, CompanyMessage, MessageKind, MessageSender};

/// Outcome of a lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ApprovalStatus,
    pub to: ApprovalStatus,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

impl Company {
    /// Approve the company. Approving an approved company changes nothing.
    pub fn approve(&mut self, now: DateTime<Utc>) -> Transition {
        self.move_to(ApprovalStatus::Approved, now)
    }

    /// Put the company on hold. The reason is appended as a `hold` message.
    pub fn hold(&mut self, reason: &str, now: DateTime<Utc>) -> DomainResult<Transition> {
        let message = reason_message(MessageKind::Hold, reason, "hold", now)?;
        self.push_message(message);
        Ok(self.move_to(ApprovalStatus::Hold, now))
    }

    /// Deny the company. The reason is appended as a `deny` message.
    pub fn deny(&mut self, reason: &str, now: DateTime<Utc>) -> DomainResult<Transition> {
        let message = reason_message(MessageKind::Deny, reason, "deny", now)?;
        self.push_message(message);
        Ok(self.move_to(ApprovalStatus::Denied, now))
    }

    /// Revoke access: the company goes back to `pending`, not `hold`.
    pub fn revoke_access(&mut self, reason: Option<&str>, now: DateTime<Utc>) -> Transition {
        let text = match reason.map(str::trim).filter(|r| !r.is_empty()) {
            Some(reason) => format!("Access revoked: {reason}"),
            None => "Access revoked".to_string(),
        };
        if let Ok(message) =
            CompanyMessage::new(MessageKind::System, MessageSender::System, &text, now)
        {
            self.push_message(message);
        }
        self.move_to(ApprovalStatus::Pending, now)
    }

    /// Append an administrator `info` message.
    pub fn post_admin_message(
        &mut self,
        text: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<&CompanyMessage> {
        self.post_message(MessageSender::Admin, text, now)
    }

    /// Append a message written by the company itself.
    pub fn post_company_message(
        &mut self,
        text: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<&CompanyMessage> {
        self.post_message(MessageSender::Company, text, now)
    }

    /// Append a system note (downgrades and other automatic changes).
    pub fn post_system_message(&mut self, text: &str, now: DateTime<Utc>) -> DomainResult<()> {
        let message = CompanyMessage::new(MessageKind::System, MessageSender::System, text, now)?;
        self.push_message(message);
        Ok(())
    }

    fn post_message(
        &mut self,
        from: MessageSender,
        text: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<&CompanyMessage> {
        let message = CompanyMessage::new(MessageKind::Info, from, text, now)?;
        self.push_message(message);
        self.messages()
            .last()
            .ok_or_else(|| DomainError::not_found("message"))
    }

    fn move_to(&mut self, to: ApprovalStatus, now: DateTime<Utc>) -> Transition {
        let from = self.status();
        self.approval_mut().set(to);
        if from != to {
            self.touch(now);
        }
        Transition { from, to }
    }
}

fn reason_message(
    kind: MessageKind,
    reason: &str,
    action: &str,
    now: DateTime<Utc>,
) -> DomainResult<CompanyMessage> {
    if reason.trim().is_empty() {
        return Err(DomainError::validation(format!(
            "a reason is required to {action} a company"
        )));
    }
    CompanyMessage::new(kind, MessageSender::Admin, reason, now)
}
