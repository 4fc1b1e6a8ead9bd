//! Database module - AppState and persistence
//!
//! - `users` - Postgres account storage
//! - `audit` - Postgres generation history
//! - `memory` - in-process stores used without a database

mod audit;
mod memory;
mod users;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

pub use audit::PgAuditRepository;
pub use memory::{MemoryAuditRepository, MemoryUserRepository};
pub use users::PgUserRepository;

use crate::auth::accounts::{create_account, AccountError};
use crate::auth::{NewUser, PasswordHasher, Role, TokenService, User};
use crate::config::{AppConfig, BootstrapAccount};
use crate::generator::{DocumentGenerator, PackGenerator};
use crate::mailer::Mailer;
use crate::registry::{FsTemplateRepository, PackLibrary, TemplateRepository};
use crate::storage::OutputStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("'{0}' already exists")]
    Duplicate(String),
    #[error("'{0}' not found")]
    NotFound(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn count(&self) -> Result<i64, StoreError>;

    /// Lookup by already-normalised email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when the email is taken.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    /// All accounts, newest first.
    async fn list(&self) -> Result<Vec<User>, StoreError>;

    async fn update(
        &self,
        id: Uuid,
        active: Option<bool>,
        role: Option<Role>,
    ) -> Result<User, StoreError>;
}

/// A generated document as recorded in history.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub template_type: String,
    pub filename: String,
    #[serde(skip)]
    pub storage_path: String,
    pub email_sent: bool,
    pub email_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A generated pack archive as recorded in history.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PackRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pack_id: String,
    pub zip_name: String,
    #[serde(skip)]
    pub zip_path: String,
    pub email_sent: bool,
    pub email_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDocumentRecord {
    pub user_id: Uuid,
    pub template_type: String,
    pub filename: String,
    pub storage_path: String,
    pub email_sent: bool,
    pub email_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPackRecord {
    pub user_id: Uuid,
    pub pack_id: String,
    pub zip_name: String,
    pub zip_path: String,
    pub email_sent: bool,
    pub email_error: Option<String>,
}

/// Append-only generation history.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn record_document(&self, record: NewDocumentRecord) -> Result<DocumentRecord, StoreError>;

    async fn record_pack(&self, record: NewPackRecord) -> Result<PackRecord, StoreError>;

    /// Newest first.
    async fn documents_for_user(&self, user_id: Uuid) -> Result<Vec<DocumentRecord>, StoreError>;

    /// Newest first.
    async fn packs_for_user(&self, user_id: Uuid) -> Result<Vec<PackRecord>, StoreError>;

    /// Every user's documents, newest first.
    async fn all_documents(&self) -> Result<Vec<DocumentRecord>, StoreError>;
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub templates: Arc<dyn TemplateRepository>,
    pub output: OutputStore,
    pub documents: DocumentGenerator,
    pub packs: PackGenerator,
    pub mailer: Arc<Mailer>,
    pub tokens: TokenService,
    pub passwords: PasswordHasher,
}

impl AppState {
    /// Connect storage described by `config` and create bootstrap accounts.
    pub async fn new(config: AppConfig) -> Result<Self, StoreError> {
        let (users, audit): (Arc<dyn UserRepository>, Arc<dyn AuditRepository>) =
            match &config.database_url {
                Some(database_url) => {
                    let pool = sqlx::postgres::PgPoolOptions::new()
                        .max_connections(config.database_max_connections)
                        .acquire_timeout(Duration::from_secs(30))
                        .idle_timeout(Duration::from_secs(900))
                        .connect(database_url)
                        .await?;
                    sqlx::migrate!("./migrations").run(&pool).await?;
                    log::info!("Database connected and migrated");
                    (
                        Arc::new(PgUserRepository::new(pool.clone())),
                        Arc::new(PgAuditRepository::new(pool)),
                    )
                }
                None => {
                    log::warn!(
                        "DATABASE_URL not set; users and history are kept in memory and lost on restart"
                    );
                    (
                        Arc::new(MemoryUserRepository::new()),
                        Arc::new(MemoryAuditRepository::new()),
                    )
                }
            };

        let templates = Arc::new(FsTemplateRepository::new(&config.storage.template_root));
        let state = Self::with_repositories(config, users, audit, templates);
        if let Err(e) = state.output.ensure_dirs() {
            log::warn!(
                "Could not create output directories under {}: {}",
                state.output.root().display(),
                e
            );
        }
        state.bootstrap_accounts().await?;
        Ok(state)
    }

    /// State without a database: in-memory users and history, templates on disk.
    pub fn without_database(config: AppConfig) -> Self {
        let templates = Arc::new(FsTemplateRepository::new(&config.storage.template_root));
        Self::with_repositories(
            config,
            Arc::new(MemoryUserRepository::new()),
            Arc::new(MemoryAuditRepository::new()),
            templates,
        )
    }

    pub fn with_repositories(
        config: AppConfig,
        users: Arc<dyn UserRepository>,
        audit: Arc<dyn AuditRepository>,
        templates: Arc<dyn TemplateRepository>,
    ) -> Self {
        let output = OutputStore::new(&config.storage);
        let base_url = config.server.base_url.clone();
        let documents = DocumentGenerator::new(templates.clone(), output.clone(), &base_url);
        let packs = PackGenerator::new(
            PackLibrary::new(&config.storage.packs_root),
            output.clone(),
            &base_url,
        );
        let mailer = Arc::new(Mailer::new(config.smtp.clone()));
        let tokens = TokenService::new(&config.auth);
        let passwords = PasswordHasher::new(config.auth.bcrypt_cost);

        AppState {
            config: Arc::new(config),
            users,
            audit,
            templates,
            output,
            documents,
            packs,
            mailer,
            tokens,
            passwords,
        }
    }

    /// Create the configured admin and superadmin accounts if missing.
    pub async fn bootstrap_accounts(&self) -> Result<(), StoreError> {
        let accounts = [
            (self.config.admin_bootstrap.clone(), Role::Admin),
            (self.config.superadmin_bootstrap.clone(), Role::Superadmin),
        ];
        for (account, role) in accounts {
            let Some(account) = account else { continue };
            self.bootstrap_account(&account, role).await?;
        }
        Ok(())
    }

    async fn bootstrap_account(&self, account: &BootstrapAccount, role: Role) -> Result<(), StoreError> {
        if self.users.find_by_email(&account.email).await?.is_some() {
            return Ok(());
        }
        match create_account(self.users.as_ref(), &self.passwords, &account.email, &account.password, role).await {
            Ok(user) => {
                log::info!("Bootstrapped {} account {}", role, user.email);
                Ok(())
            }
            Err(AccountError::Store(e)) => Err(e),
            Err(e) => {
                log::error!("Bootstrap account {} rejected: {}", account.email, e);
                Ok(())
            }
        }
    }
}
