//! Companies domain module.
//!
//! Business rules for registered companies: the approval lifecycle, the
//! subscription snapshot and the message log. Pure domain logic (no IO, no
//! HTTP, no storage).

pub mod company;
pub mod lifecycle;

pub use company::{
    Approval, ApprovalStatus, Company, CompanyMessage, CompanyRecord, MAX_MESSAGE_CHARS,
    MessageKind, MessageSender, NewCompany, Subscription,
};
pub use lifecycle::Transition;
