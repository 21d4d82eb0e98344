use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tracing::{info, warn};

use jobboard_infra::notify::{NotificationDispatcher, Notifier, TracingNotifier};
use jobboard_infra::services::{
    CompanyLifecycle, ExpirySweeper, JobBoard, LazyExpiryEnforcer, PaymentReconciler,
    QuotaEngine,
};
use jobboard_infra::store::{
    self, AuditStore, CompanyStore, InMemoryAuditStore, InMemoryCompanyStore, InMemoryJobStore,
    JobStore, PostgresAuditStore, PostgresCompanyStore, PostgresJobStore,
};
use jobboard_infra::{
    AppConfig, AuditRecorder, OfflinePaymentProvider, PaymentConfig, PaymentProvider,
    RazorpayClient,
};

/// Persistence handles shared by every service.
#[derive(Clone)]
pub struct Stores {
    pub companies: Arc<dyn CompanyStore>,
    pub jobs: Arc<dyn JobStore>,
    pub audit: Arc<dyn AuditStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            companies: Arc::new(InMemoryCompanyStore::new()),
            jobs: Arc::new(InMemoryJobStore::new()),
            audit: Arc::new(InMemoryAuditStore::new()),
        }
    }

    pub async fn postgres(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("failed to connect to Postgres")?;
        store::postgres::migrate(&pool)
            .await
            .context("failed to run migrations")?;

        Ok(Self {
            companies: Arc::new(PostgresCompanyStore::new(pool.clone())),
            jobs: Arc::new(PostgresJobStore::new(pool.clone())),
            audit: Arc::new(PostgresAuditStore::new(pool)),
        })
    }
}

/// Everything the HTTP handlers call into.
#[derive(Clone)]
pub struct AppServices {
    pub lifecycle: CompanyLifecycle,
    pub jobs: JobBoard,
    pub payments: PaymentReconciler,
    pub sweeper: ExpirySweeper,
    pub audit: AuditRecorder,
}

impl AppServices {
    pub fn wire(
        stores: Stores,
        provider: Arc<dyn PaymentProvider>,
        notifier: Arc<dyn Notifier>,
        config: &AppConfig,
    ) -> Self {
        let audit = AuditRecorder::new(stores.audit.clone());
        let dispatcher = NotificationDispatcher::new(notifier);
        let quota = QuotaEngine::new(stores.companies.clone(), stores.jobs.clone());
        let expiry = LazyExpiryEnforcer::new(stores.companies.clone(), stores.jobs.clone());

        Self {
            lifecycle: CompanyLifecycle::new(
                stores.companies.clone(),
                audit.clone(),
                dispatcher.clone(),
                config.frontend.clone(),
            ),
            jobs: JobBoard::new(
                stores.companies.clone(),
                stores.jobs.clone(),
                quota.clone(),
                expiry,
                audit.clone(),
            ),
            payments: PaymentReconciler::new(
                stores.companies.clone(),
                provider,
                config.payments.clone(),
                dispatcher.clone(),
            ),
            sweeper: ExpirySweeper::new(
                stores.companies,
                quota,
                dispatcher,
                config.frontend.clone(),
            ),
            audit,
        }
    }
}

/// Razorpay when credentials are configured, otherwise local order ids.
pub fn payment_provider(config: &PaymentConfig) -> anyhow::Result<Arc<dyn PaymentProvider>> {
    if config.has_credentials() {
        let client = RazorpayClient::new(&config.api_base, &config.key_id, &config.key_secret)
            .context("failed to build payment client")?;
        return Ok(Arc::new(client));
    }
    warn!("payment credentials not set; orders are issued offline");
    Ok(Arc::new(OfflinePaymentProvider::new(config.key_id.clone())))
}

/// Postgres when `DATABASE_URL` is set, in-memory otherwise.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let stores = match config.database_url.as_deref() {
        Some(url) => {
            info!("using Postgres stores");
            Stores::postgres(url).await?
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory stores");
            Stores::in_memory()
        }
    };
    let provider = payment_provider(&config.payments)?;

    Ok(AppServices::wire(
        stores,
        provider,
        Arc::new(TracingNotifier),
        config,
    ))
}
