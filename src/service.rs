/// Service context and dependency injection
use crate::{
    account::AccountManager,
    config::AccountConfig,
    deletion::AccountDeletionManager,
    error::AccountResult,
    events::EventBus,
    hooks::{DefaultHookset, Hookset},
    mailer::Mailer,
    password::PasswordManager,
    signup::SignupCodeManager,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Aggregate context wiring configuration, store, hooks, and the event
/// bus into the four managers
#[derive(Clone)]
pub struct AccountService {
    pub config: Arc<AccountConfig>,
    pub db: SqlitePool,
    pub events: EventBus,
    pub accounts: Arc<AccountManager>,
    pub signup_codes: Arc<SignupCodeManager>,
    pub deletions: Arc<AccountDeletionManager>,
    pub passwords: Arc<PasswordManager>,
}

impl AccountService {
    /// Build a service around an explicit hook implementation
    pub fn new(
        config: AccountConfig,
        db: SqlitePool,
        hooks: Arc<dyn Hookset>,
    ) -> AccountResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let events = EventBus::default();

        let accounts = Arc::new(AccountManager::new(db.clone(), Arc::clone(&config)));
        let signup_codes = Arc::new(SignupCodeManager::new(
            db.clone(),
            Arc::clone(&config),
            Arc::clone(&hooks),
            events.clone(),
        ));
        let deletions = Arc::new(AccountDeletionManager::new(
            db.clone(),
            Arc::clone(&config),
            Arc::clone(&hooks),
        ));
        let passwords = Arc::new(PasswordManager::new(db.clone()));

        Ok(Self {
            config,
            db,
            events,
            accounts,
            signup_codes,
            deletions,
            passwords,
        })
    }

    /// Build a service with the default hookset: random tokens, SMTP
    /// delivery through the configured mailer, logged deletion hooks
    pub fn with_defaults(config: AccountConfig, db: SqlitePool) -> AccountResult<Self> {
        let mailer = Mailer::new(config.email.clone())?;
        let hooks: Arc<dyn Hookset> = Arc::new(DefaultHookset::new(mailer));
        Self::new(config, db, hooks)
    }
}
