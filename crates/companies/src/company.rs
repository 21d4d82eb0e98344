use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use jobboard_core::{CompanyId, DomainError, DomainResult, Entity, ValueObject};
use jobboard_plans::{Plan, PlanId, SubscriptionWindow};

/// Longest message body kept in a company's message log.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Company approval status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Hold,
    Denied,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Hold => "hold",
            ApprovalStatus::Denied => "denied",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s.trim() {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "hold" => Ok(ApprovalStatus::Hold),
            "denied" => Ok(ApprovalStatus::Denied),
            other => Err(DomainError::validation(format!(
                "unknown approval status '{other}'"
            ))),
        }
    }
}

impl core::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approval status together with the persisted `approved` flag.
///
/// Both are stored for older readers. They only change together through
/// [`Approval::set`], so `approved == (status == Approved)` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Approval {
    status: ApprovalStatus,
    approved: bool,
}

impl Approval {
    pub fn pending() -> Self {
        Self {
            status: ApprovalStatus::Pending,
            approved: false,
        }
    }

    /// Rebuild from stored fields.
    ///
    /// Older records were approved by flipping the flag only, leaving the
    /// status missing or `pending`. Those read as approved.
    pub fn from_persisted(status: Option<ApprovalStatus>, approved: bool) -> Self {
        let status = match status {
            Some(ApprovalStatus::Pending) | None if approved => ApprovalStatus::Approved,
            Some(status) => status,
            None => ApprovalStatus::Pending,
        };
        let mut approval = Self::pending();
        approval.set(status);
        approval
    }

    pub fn status(&self) -> ApprovalStatus {
        self.status
    }

    pub fn approved(&self) -> bool {
        self.approved
    }

    pub(crate) fn set(&mut self, status: ApprovalStatus) {
        self.status = status;
        self.approved = status == ApprovalStatus::Approved;
    }
}

/// Kind of a message-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Info,
    Hold,
    Deny,
    System,
}

/// Who wrote a message-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    Admin,
    Company,
    System,
}

/// One append-only entry in a company's message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyMessage {
    pub kind: MessageKind,
    pub from: MessageSender,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl CompanyMessage {
    /// Build a message, trimming surrounding whitespace and capping the body
    /// at [`MAX_MESSAGE_CHARS`].
    pub fn new(
        kind: MessageKind,
        from: MessageSender,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::validation("message text is required"));
        }
        Ok(Self {
            kind,
            from,
            text: text.chars().take(MAX_MESSAGE_CHARS).collect(),
            created_at,
        })
    }
}

/// Subscription snapshot stored on the company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub plan_id: PlanId,
    pub started_at: DateTime<Utc>,
    /// `None` means non-expiring.
    pub ends_at: Option<DateTime<Utc>>,
    pub job_limit: u32,
    /// Plan the company held before its last downgrade.
    pub downgraded_from_plan: Option<PlanId>,
}

impl ValueObject for Subscription {}

impl Subscription {
    /// The free plan starting at `now`.
    pub fn free(now: DateTime<Utc>) -> Self {
        let plan = PlanId::Free.plan();
        let window = SubscriptionWindow::for_plan(now, plan);
        Self {
            plan_id: plan.id,
            started_at: window.started_at,
            ends_at: window.ends_at,
            job_limit: plan.job_limit,
            downgraded_from_plan: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        !self.plan_id.is_free()
    }

    /// Expired means an end date exists and `now` is past it.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.ends_at, Some(ends_at) if now > ends_at)
    }

    /// Whole days left, rounded up. `None` for non-expiring plans.
    ///
    /// Anything inside the final 24 hours, including up to a day past the
    /// end, rounds to 0.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        let ends_at = self.ends_at?;
        let millis = (ends_at - now).num_milliseconds();
        let day = Duration::days(1).num_milliseconds();
        Some(if millis >= 0 {
            (millis + day - 1) / day
        } else {
            -(-millis / day)
        })
    }
}

/// Input for registering a new company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompany {
    pub email: String,
    pub handle: String,
    pub display_name: String,
    pub contact_name: Option<String>,
}

/// Stored shape of a company, used by persistence adapters to rebuild the
/// entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyRecord {
    pub id: CompanyId,
    pub email: String,
    pub handle: String,
    pub display_name: String,
    pub contact_name: Option<String>,
    pub status: Option<ApprovalStatus>,
    pub approved: bool,
    pub subscription: Subscription,
    pub active_job_count: Option<u32>,
    pub messages: Vec<CompanyMessage>,
    pub last_expiry_notice_sent: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entity: a registered company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Company {
    id: CompanyId,
    email: String,
    handle: String,
    display_name: String,
    contact_name: Option<String>,
    #[serde(flatten)]
    approval: Approval,
    subscription: Subscription,
    active_job_count: Option<u32>,
    messages: Vec<CompanyMessage>,
    last_expiry_notice_sent: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Company {
    /// Register a new company: status `pending`, free plan, no active jobs.
    pub fn register(id: CompanyId, input: NewCompany, now: DateTime<Utc>) -> DomainResult<Self> {
        let email = normalize_email(&input.email)?;
        let handle = input.handle.trim().to_string();
        if handle.is_empty() {
            return Err(DomainError::validation("company handle is required"));
        }
        let display_name = match input.display_name.trim() {
            "" => handle.clone(),
            name => name.to_string(),
        };

        Ok(Self {
            id,
            email,
            handle,
            display_name,
            contact_name: input
                .contact_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            approval: Approval::pending(),
            subscription: Subscription::free(now),
            active_job_count: Some(0),
            messages: Vec::new(),
            last_expiry_notice_sent: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild a company from storage, normalizing legacy approval fields.
    pub fn restore(record: CompanyRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            handle: record.handle,
            display_name: record.display_name,
            contact_name: record.contact_name,
            approval: Approval::from_persisted(record.status, record.approved),
            subscription: record.subscription,
            active_job_count: record.active_job_count,
            messages: record.messages,
            last_expiry_notice_sent: record.last_expiry_notice_sent,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn id_typed(&self) -> CompanyId {
        self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn contact_name(&self) -> Option<&str> {
        self.contact_name.as_deref()
    }

    pub fn status(&self) -> ApprovalStatus {
        self.approval.status()
    }

    pub fn approved(&self) -> bool {
        self.approval.approved()
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Cached active-job counter as stored. `None` when never initialized.
    pub fn cached_active_job_count(&self) -> Option<u32> {
        self.active_job_count
    }

    pub fn messages(&self) -> &[CompanyMessage] {
        &self.messages
    }

    pub fn last_expiry_notice_sent(&self) -> Option<DateTime<Utc>> {
        self.last_expiry_notice_sent
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether the company may sign in.
    ///
    /// Denied and pending companies are turned away; companies on hold keep
    /// access so they can read admin messages.
    pub fn login_gate(&self) -> DomainResult<()> {
        match self.status() {
            ApprovalStatus::Denied => Err(DomainError::forbidden("account denied")),
            ApprovalStatus::Pending => Err(DomainError::forbidden("account pending approval")),
            ApprovalStatus::Hold | ApprovalStatus::Approved => Ok(()),
        }
    }

    /// Case-insensitive match against email, handle and display name.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        needle.is_empty()
            || self.email.contains(&needle)
            || self.handle.to_lowercase().contains(&needle)
            || self.display_name.to_lowercase().contains(&needle)
    }

    /// Write a freshly computed subscription window onto the company.
    ///
    /// Resets the expiry-notice marker so the new window gets its own
    /// reminders. `downgraded_from_plan` is left as a breadcrumb.
    pub fn apply_subscription(
        &mut self,
        plan: &Plan,
        window: SubscriptionWindow,
        now: DateTime<Utc>,
    ) {
        self.subscription.plan_id = plan.id;
        self.subscription.started_at = window.started_at;
        self.subscription.ends_at = window.ends_at;
        self.subscription.job_limit = plan.job_limit;
        self.last_expiry_notice_sent = None;
        self.updated_at = now;
    }

    /// Move the company back to the free plan.
    ///
    /// Returns the plan it was downgraded from, or `None` when it already was
    /// on the free plan (nothing changes in that case).
    pub fn downgrade_to_free(&mut self, now: DateTime<Utc>) -> Option<PlanId> {
        let previous = self.subscription.plan_id;
        if previous.is_free() {
            return None;
        }
        let free = PlanId::Free.plan();
        self.subscription.downgraded_from_plan = Some(previous);
        self.subscription.plan_id = free.id;
        self.subscription.job_limit = free.job_limit;
        self.subscription.ends_at = None;
        self.updated_at = now;
        Some(previous)
    }

    pub fn set_cached_active_job_count(&mut self, count: u32) {
        self.active_job_count = Some(count);
    }

    /// Whether the notice for the `days_remaining` bucket already went out,
    /// i.e. the last notice was sent while the same number of days remained.
    pub fn expiry_notice_sent_for(&self, days_remaining: i64) -> bool {
        self.last_expiry_notice_sent
            .is_some_and(|sent| self.subscription.days_remaining(sent) == Some(days_remaining))
    }

    pub fn mark_expiry_notice_sent(&mut self, now: DateTime<Utc>) {
        self.last_expiry_notice_sent = Some(now);
        self.updated_at = now;
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub(crate) fn approval_mut(&mut self) -> &mut Approval {
        &mut self.approval
    }

    pub(crate) fn push_message(&mut self, message: CompanyMessage) {
        self.updated_at = message.created_at;
        self.messages.push(message);
    }
}

impl Entity for Company {
    type Id = CompanyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn normalize_email(raw: &str) -> DomainResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    };
    if !valid {
        return Err(DomainError::validation(format!("invalid email '{raw}'")));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn test_company() -> Company {
        Company::register(
            CompanyId::new(),
            NewCompany {
                email: "  Hiring@Acme.io ".to_string(),
                handle: "acme".to_string(),
                display_name: "Acme Corp".to_string(),
                contact_name: Some("Jo".to_string()),
            },
            test_time(),
        )
        .unwrap()
    }

    #[test]
    fn registration_starts_pending_on_free_plan() {
        let company = test_company();
        assert_eq!(company.email(), "hiring@acme.io");
        assert_eq!(company.status(), ApprovalStatus::Pending);
        assert!(!company.approved());
        assert_eq!(company.subscription().plan_id, PlanId::Free);
        assert_eq!(company.subscription().job_limit, 3);
        assert_eq!(company.subscription().ends_at, None);
        assert_eq!(company.cached_active_job_count(), Some(0));
    }

    #[test]
    fn registration_rejects_bad_email_and_empty_handle() {
        let err = Company::register(
            CompanyId::new(),
            NewCompany {
                email: "nobody".to_string(),
                handle: "x".to_string(),
                display_name: String::new(),
                contact_name: None,
            },
            test_time(),
        )
        .unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("email") => {}
            _ => panic!("Expected validation error for email"),
        }

        let err = Company::register(
            CompanyId::new(),
            NewCompany {
                email: "a@b.io".to_string(),
                handle: "   ".to_string(),
                display_name: String::new(),
                contact_name: None,
            },
            test_time(),
        )
        .unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("handle") => {}
            _ => panic!("Expected validation error for handle"),
        }
    }

    #[test]
    fn legacy_approved_flag_reads_as_approved() {
        let approval = Approval::from_persisted(None, true);
        assert_eq!(approval.status(), ApprovalStatus::Approved);
        assert!(approval.approved());

        let approval = Approval::from_persisted(Some(ApprovalStatus::Pending), true);
        assert_eq!(approval.status(), ApprovalStatus::Approved);

        // A stale `approved` flag never overrides an explicit non-pending status.
        let approval = Approval::from_persisted(Some(ApprovalStatus::Hold), true);
        assert_eq!(approval.status(), ApprovalStatus::Hold);
        assert!(!approval.approved());

        assert_eq!(
            Approval::from_persisted(None, false).status(),
            ApprovalStatus::Pending
        );
    }

    #[test]
    fn days_remaining_rounds_up() {
        let now = test_time();
        let mut sub = Subscription::free(now);
        assert_eq!(sub.days_remaining(now), None);
        assert!(!sub.is_expired(now));

        sub.ends_at = Some(now + Duration::days(7));
        assert_eq!(sub.days_remaining(now), Some(7));

        sub.ends_at = Some(now + Duration::days(6) + Duration::hours(1));
        assert_eq!(sub.days_remaining(now), Some(7));

        sub.ends_at = Some(now + Duration::hours(3));
        assert_eq!(sub.days_remaining(now), Some(1));

        sub.ends_at = Some(now);
        assert_eq!(sub.days_remaining(now), Some(0));
        assert!(!sub.is_expired(now));

        sub.ends_at = Some(now - Duration::hours(5));
        assert_eq!(sub.days_remaining(now), Some(0));
        assert!(sub.is_expired(now));

        sub.ends_at = Some(now - Duration::days(2));
        assert_eq!(sub.days_remaining(now), Some(-2));
    }

    #[test]
    fn downgrade_records_breadcrumb_and_clears_end() {
        let mut company = test_company();
        let now = test_time();
        let plan = PlanId::Paid3m.plan();
        company.apply_subscription(plan, SubscriptionWindow::for_plan(now, plan), now);
        assert_eq!(company.subscription().job_limit, 15);

        let previous = company.downgrade_to_free(now + Duration::days(100));
        assert_eq!(previous, Some(PlanId::Paid3m));
        let sub = company.subscription();
        assert_eq!(sub.plan_id, PlanId::Free);
        assert_eq!(sub.job_limit, 3);
        assert_eq!(sub.ends_at, None);
        assert_eq!(sub.downgraded_from_plan, Some(PlanId::Paid3m));

        assert_eq!(company.downgrade_to_free(now), None);
    }

    #[test]
    fn login_gate_follows_status() {
        let mut company = test_company();
        match company.login_gate() {
            Err(DomainError::Forbidden(reason)) if reason.contains("pending") => {}
            other => panic!("Expected pending company to be refused, got {other:?}"),
        }

        company.approval_mut().set(ApprovalStatus::Hold);
        assert!(company.login_gate().is_ok());

        company.approval_mut().set(ApprovalStatus::Denied);
        assert!(company.login_gate().is_err());
    }

    #[test]
    fn message_text_is_trimmed_and_capped() {
        let long = "x".repeat(MAX_MESSAGE_CHARS + 50);
        let msg =
            CompanyMessage::new(MessageKind::Info, MessageSender::Admin, &long, test_time())
                .unwrap();
        assert_eq!(msg.text.chars().count(), MAX_MESSAGE_CHARS);

        let err = CompanyMessage::new(MessageKind::Info, MessageSender::Admin, "  ", test_time())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn expiry_notice_is_tracked_per_reminder_bucket() {
        let mut company = test_company();
        let now = test_time();
        let plan = PlanId::Paid6m.plan();
        let ends_at = now + Duration::days(6) + Duration::hours(18);
        let start = ends_at - Duration::days(i64::from(plan.duration_days));
        company.apply_subscription(plan, SubscriptionWindow::for_plan(start, plan), now);
        assert_eq!(company.subscription().days_remaining(now), Some(7));

        assert!(!company.expiry_notice_sent_for(7));
        company.mark_expiry_notice_sent(now);
        assert!(company.expiry_notice_sent_for(7));

        // Past UTC midnight the same bucket is still covered.
        let after_midnight = now + Duration::hours(12);
        assert_eq!(company.subscription().days_remaining(after_midnight), Some(7));
        assert!(company.expiry_notice_sent_for(7));
        assert!(!company.expiry_notice_sent_for(0));
    }

    #[test]
    fn search_matches_any_identity_field() {
        let company = test_company();
        assert!(company.matches_search("ACME"));
        assert!(company.matches_search("hiring@"));
        assert!(company.matches_search("corp"));
        assert!(!company.matches_search("globex"));
        assert!(company.matches_search(""));
    }
}
