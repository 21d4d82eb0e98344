//! Jobs domain module.
//!
//! Job postings with their active/inactive lifecycle, plus the pure quota
//! rules that decide whether a company may create or activate a job and
//! which jobs go when a quota shrinks.

pub mod job;
pub mod quota;

pub use job::{Job, JobContent, JobRecord, JobStatus};
pub use quota::{
    QuotaDenial, QuotaIntent, ShrinkPlan, can_create_or_activate, check_account, plan_shrink,
    trusted_cached_count,
};
