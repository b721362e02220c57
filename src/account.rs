/// Per-user account settings and the request-scoped account view
use crate::{
    config::AccountConfig,
    db::models::Account,
    error::{AccountError, AccountResult},
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Minimal view of an authenticated user identity, owned by the host
/// application's auth subsystem
#[derive(Debug, Clone)]
pub struct UserRef {
    pub id: i64,
    pub email: String,
}

/// Request metadata the account module cares about
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// The authenticated user, when there is one
    pub user: Option<UserRef>,
    /// Raw Accept-Language header value, for locale negotiation
    pub accept_language: Option<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user: UserRef) -> Self {
        Self {
            user: Some(user),
            accept_language: None,
        }
    }
}

/// Stand-in account when no authenticated user (or no stored Account)
/// exists for a request
#[derive(Debug, Clone)]
pub struct AnonymousAccount {
    pub timezone: String,
    pub language: String,
}

/// The account resolved for a request: either a persisted row or an
/// anonymous stand-in. Callers must not assume a persisted identity.
#[derive(Debug, Clone)]
pub enum RequestAccount {
    Known(Account),
    Anonymous(AnonymousAccount),
}

impl RequestAccount {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            RequestAccount::Known(account) => Some(account.user_id),
            RequestAccount::Anonymous(_) => None,
        }
    }

    pub fn timezone(&self) -> &str {
        match self {
            RequestAccount::Known(account) => &account.timezone,
            RequestAccount::Anonymous(anon) => &anon.timezone,
        }
    }

    pub fn language(&self) -> &str {
        match self {
            RequestAccount::Known(account) => &account.language,
            RequestAccount::Anonymous(anon) => &anon.language,
        }
    }
}

/// Parameters for explicit account creation. There is no automatic
/// create-on-user-signup hook; the caller invokes this step.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: i64,
    /// The user's email, for the optional primary email-address record
    pub user_email: Option<String>,
    pub timezone: Option<String>,
    /// Derived from the request locale, then the configured default,
    /// when absent
    pub language: Option<String>,
    /// Create a primary email_address row for the user
    pub create_email: bool,
    /// Override whether that address starts out verified
    pub confirm_email: Option<bool>,
}

impl NewAccount {
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id,
            user_email: None,
            timezone: None,
            language: None,
            create_email: true,
            confirm_email: None,
        }
    }
}

/// Account settings manager
#[derive(Clone)]
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<AccountConfig>,
}

impl AccountManager {
    pub fn new(db: SqlitePool, config: Arc<AccountConfig>) -> Self {
        Self { db, config }
    }

    /// Resolve the account for a request: the authenticated user's stored
    /// Account when one exists, else an anonymous stand-in carrying the
    /// default timezone and a language negotiated from the request.
    pub async fn for_request(&self, ctx: &RequestContext) -> AccountResult<RequestAccount> {
        if let Some(user) = &ctx.user {
            if let Some(account) = self.get(user.id).await? {
                return Ok(RequestAccount::Known(account));
            }
        }

        Ok(RequestAccount::Anonymous(AnonymousAccount {
            timezone: self.config.default_timezone.clone(),
            language: self.negotiate_language(ctx.accept_language.as_deref()),
        }))
    }

    /// Fetch the stored account for a user
    pub async fn get(&self, user_id: i64) -> AccountResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM account WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(account)
    }

    /// Create and persist an account. At most one per user; a second
    /// creation surfaces as `AlreadyExists`.
    pub async fn create(
        &self,
        request: Option<&RequestContext>,
        params: NewAccount,
    ) -> AccountResult<Account> {
        let timezone = params.timezone.unwrap_or_default();
        if !timezone.is_empty() && timezone.parse::<Tz>().is_err() {
            return Err(AccountError::UnknownTimezone(timezone));
        }

        let language = match params.language {
            Some(language) => language,
            None => match request {
                Some(ctx) => self.negotiate_language(ctx.accept_language.as_deref()),
                None => self.config.default_language.clone(),
            },
        };

        let inserted = sqlx::query(
            "INSERT INTO account (user_id, timezone, language) VALUES (?1, ?2, ?3)",
        )
        .bind(params.user_id)
        .bind(&timezone)
        .bind(&language)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .map(|db_err| db_err.is_unique_violation())
                .unwrap_or(false)
            {
                AccountError::AlreadyExists
            } else {
                AccountError::Database(e)
            }
        })?;

        if params.create_email {
            if let Some(email) = &params.user_email {
                sqlx::query(
                    r#"
                    INSERT INTO email_address (user_id, email, is_primary, verified)
                    VALUES (?1, ?2, 1, ?3)
                    "#,
                )
                .bind(params.user_id)
                .bind(email)
                .bind(params.confirm_email.unwrap_or(false))
                .execute(&self.db)
                .await?;
            }
        }

        Ok(Account {
            id: inserted.last_insert_rowid(),
            user_id: params.user_id,
            timezone,
            language,
        })
    }

    /// The current instant in the account's timezone, falling back to the
    /// configured default zone when the account has not picked one
    pub fn now(&self, account: &Account) -> AccountResult<DateTime<Tz>> {
        let tz = self.zone_for(account)?;
        Ok(Utc::now().with_timezone(&tz))
    }

    /// Convert an instant into the account's timezone
    pub fn localtime(&self, account: &Account, value: DateTime<Utc>) -> AccountResult<DateTime<Tz>> {
        let tz = self.zone_for(account)?;
        Ok(value.with_timezone(&tz))
    }

    /// Convert a naive local time into the account's timezone, first
    /// interpreting it in the configured default zone
    pub fn localtime_naive(
        &self,
        account: &Account,
        value: NaiveDateTime,
    ) -> AccountResult<DateTime<Tz>> {
        let default_tz = self.parse_zone(&self.config.default_timezone)?;
        let localized = default_tz.from_local_datetime(&value).earliest().ok_or_else(|| {
            AccountError::Validation(format!("Nonexistent local time: {}", value))
        })?;

        self.localtime(account, localized.with_timezone(&Utc))
    }

    fn zone_for(&self, account: &Account) -> AccountResult<Tz> {
        if account.timezone.is_empty() {
            self.parse_zone(&self.config.default_timezone)
        } else {
            self.parse_zone(&account.timezone)
        }
    }

    fn parse_zone(&self, name: &str) -> AccountResult<Tz> {
        name.parse::<Tz>()
            .map_err(|_| AccountError::UnknownTimezone(name.to_string()))
    }

    /// Pick the best supported language for an Accept-Language header,
    /// falling back to the configured default
    fn negotiate_language(&self, accept_language: Option<&str>) -> String {
        let Some(header) = accept_language else {
            return self.config.default_language.clone();
        };

        let mut candidates: Vec<(String, f32)> = header
            .split(',')
            .filter_map(|item| {
                let mut parts = item.trim().split(';');
                let tag = parts.next()?.trim().to_lowercase();
                if tag.is_empty() || tag == "*" {
                    return None;
                }
                let quality = parts
                    .find_map(|p| p.trim().strip_prefix("q=").map(str::to_string))
                    .and_then(|q| q.parse::<f32>().ok())
                    .unwrap_or(1.0);
                Some((tag, quality))
            })
            .collect();
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        for (tag, _) in &candidates {
            // Exact match first, then primary-subtag match
            if let Some(code) = self
                .config
                .languages
                .iter()
                .find(|code| code.to_lowercase() == *tag)
            {
                return code.clone();
            }
            let primary = tag.split('-').next().unwrap_or(tag);
            if let Some(code) = self
                .config
                .languages
                .iter()
                .find(|code| code.split('-').next().unwrap_or(code).to_lowercase() == primary)
            {
                return code.clone();
            }
        }

        self.config.default_language.clone()
    }
}
