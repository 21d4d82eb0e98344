//! Infrastructure layer: stores, provider client, notifications, audit,
//! configuration and the application services built on top of them.

pub mod audit;
pub mod config;
pub mod notify;
pub mod provider;
pub mod services;
pub mod store;

pub use audit::{AuditAction, AuditEntityType, AuditLogEntry, AuditRecorder};
pub use config::{AppConfig, ConfigError, FrontendLinks, PaymentConfig};
pub use notify::{
    Notification, NotificationDispatcher, Notifier, NotifyError, RecordingNotifier,
    TracingNotifier,
};
pub use provider::{OfflinePaymentProvider, PaymentProvider, ProviderError, RazorpayClient};
pub use services::{ServiceError, ServiceResult};
