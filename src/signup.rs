/// Signup-code lifecycle: creation, validation, redemption, usage counting
use crate::{
    config::AccountConfig,
    db::models::{SignupCode, SignupCodeResult},
    error::{AccountError, AccountResult},
    events::{AccountEvent, EventBus},
    hooks::{Hookset, InvitationContext},
};
use chrono::{Duration, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

/// Parameters for building a new signup code
#[derive(Debug, Clone)]
pub struct NewSignupCode {
    /// Explicit token; generated through the hookset when absent
    pub code: Option<String>,
    /// Target email for the invitation
    pub email: Option<String>,
    /// 0 means unlimited
    pub max_uses: i64,
    /// Hours until expiry; the configured default when absent
    pub expiry_hours: Option<i64>,
    pub inviter_id: Option<i64>,
    pub notes: String,
    /// Reject creation when the code or email is already stored
    pub check_exists: bool,
}

impl Default for NewSignupCode {
    fn default() -> Self {
        Self {
            code: None,
            email: None,
            max_uses: 0,
            expiry_hours: None,
            inviter_id: None,
            notes: String::new(),
            check_exists: true,
        }
    }
}

/// Overrides for invitation delivery
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Replaces the default protocol://domain/path?code=... URL
    pub signup_url: Option<String>,
    /// Extra template context handed to the email hook
    pub extra: HashMap<String, String>,
}

/// Signup code manager
#[derive(Clone)]
pub struct SignupCodeManager {
    db: SqlitePool,
    config: Arc<AccountConfig>,
    hooks: Arc<dyn Hookset>,
    events: EventBus,
}

impl SignupCodeManager {
    pub fn new(
        db: SqlitePool,
        config: Arc<AccountConfig>,
        hooks: Arc<dyn Hookset>,
        events: EventBus,
    ) -> Self {
        Self {
            db,
            config,
            hooks,
            events,
        }
    }

    /// Build a new signup code. The returned row is not yet persisted;
    /// call [`save`](Self::save) to store it.
    pub async fn create(&self, params: NewSignupCode) -> AccountResult<SignupCode> {
        if params.check_exists
            && self
                .exists(params.code.as_deref(), params.email.as_deref())
                .await?
        {
            return Err(AccountError::AlreadyExists);
        }

        let now = Utc::now();
        let hours = params
            .expiry_hours
            .unwrap_or(self.config.signup_code_expiry_hours);
        let expiry = now + Duration::hours(hours);

        let code = match params.code {
            Some(code) => code,
            None => self
                .hooks
                .generate_signup_code_token(params.email.as_deref()),
        };

        Ok(SignupCode {
            id: 0,
            code,
            max_uses: params.max_uses,
            expiry: Some(expiry),
            inviter_id: params.inviter_id,
            email: params.email.unwrap_or_default(),
            notes: params.notes,
            sent: None,
            created: now,
            use_count: 0,
        })
    }

    /// Persist a signup code built by [`create`](Self::create)
    pub async fn save(&self, signup_code: &SignupCode) -> AccountResult<SignupCode> {
        let result = sqlx::query(
            r#"
            INSERT INTO signup_code (code, max_uses, expiry, inviter_id, email, notes, sent, created, use_count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&signup_code.code)
        .bind(signup_code.max_uses)
        .bind(signup_code.expiry)
        .bind(signup_code.inviter_id)
        .bind(&signup_code.email)
        .bind(&signup_code.notes)
        .bind(signup_code.sent)
        .bind(signup_code.created)
        .bind(signup_code.use_count)
        .execute(&self.db)
        .await?;

        Ok(SignupCode {
            id: result.last_insert_rowid(),
            ..signup_code.clone()
        })
    }

    /// True iff any stored code matches the given code or email.
    /// Neither given means false, without touching the store.
    pub async fn exists(&self, code: Option<&str>, email: Option<&str>) -> AccountResult<bool> {
        let row = match (code, email) {
            (None, None) => return Ok(false),
            (Some(code), None) => {
                sqlx::query("SELECT COUNT(*) AS n FROM signup_code WHERE code = ?1")
                    .bind(code)
                    .fetch_one(&self.db)
                    .await?
            }
            (None, Some(email)) => {
                sqlx::query("SELECT COUNT(*) AS n FROM signup_code WHERE email = ?1")
                    .bind(email)
                    .fetch_one(&self.db)
                    .await?
            }
            (Some(code), Some(email)) => {
                sqlx::query("SELECT COUNT(*) AS n FROM signup_code WHERE code = ?1 OR email = ?2")
                    .bind(code)
                    .bind(email)
                    .fetch_one(&self.db)
                    .await?
            }
        };

        let count: i64 = row.get("n");
        Ok(count > 0)
    }

    /// Validate a code: it must exist, have uses remaining, and be
    /// unexpired, checked in that order. All failures collapse into
    /// [`AccountError::InvalidCode`].
    pub async fn check_code(&self, code: &str) -> AccountResult<SignupCode> {
        let signup_code = sqlx::query_as::<_, SignupCode>(
            "SELECT * FROM signup_code WHERE code = ?1",
        )
        .bind(code)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AccountError::InvalidCode)?;

        if signup_code.max_uses > 0 && signup_code.use_count >= signup_code.max_uses {
            return Err(AccountError::InvalidCode);
        }

        if let Some(expiry) = signup_code.expiry {
            if Utc::now() > expiry {
                return Err(AccountError::InvalidCode);
            }
        }

        Ok(signup_code)
    }

    /// Redeem a code for the given user: record the result row, recount
    /// the parent's use_count, and emit a "code used" event.
    ///
    /// The recount is a second round-trip after the insert, not an atomic
    /// increment; two racing redemptions can both pass the max_uses check.
    pub async fn use_code(
        &self,
        signup_code: &SignupCode,
        user_id: i64,
    ) -> AccountResult<SignupCodeResult> {
        let now = Utc::now();

        let inserted = sqlx::query(
            r#"
            INSERT INTO signup_code_result (signup_code_id, user_id, timestamp)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(signup_code.id)
        .bind(user_id)
        .bind(now)
        .execute(&self.db)
        .await?;

        self.calculate_use_count(signup_code.id).await?;

        let result = SignupCodeResult {
            id: inserted.last_insert_rowid(),
            signup_code_id: signup_code.id,
            user_id,
            timestamp: now,
        };

        self.events.emit(AccountEvent::SignupCodeUsed {
            result: result.clone(),
        });

        Ok(result)
    }

    /// Recompute use_count from the result rows and persist it
    pub async fn calculate_use_count(&self, signup_code_id: i64) -> AccountResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM signup_code_result WHERE signup_code_id = ?1",
        )
        .bind(signup_code_id)
        .fetch_one(&self.db)
        .await?;
        let count: i64 = row.get("n");

        sqlx::query("UPDATE signup_code SET use_count = ?1 WHERE id = ?2")
            .bind(count)
            .bind(signup_code_id)
            .execute(&self.db)
            .await?;

        Ok(count)
    }

    /// Deliver the invitation email for a code, stamp its sent time, and
    /// emit a "code sent" event. Returns the updated row.
    pub async fn send(
        &self,
        signup_code: &SignupCode,
        options: SendOptions,
    ) -> AccountResult<SignupCode> {
        let signup_url = options.signup_url.unwrap_or_else(|| {
            format!(
                "{}://{}{}?code={}",
                self.config.http_protocol,
                self.config.site_domain,
                self.config.signup_path,
                urlencoding::encode(&signup_code.code),
            )
        });

        let ctx = InvitationContext {
            code: signup_code.code.clone(),
            site_domain: self.config.site_domain.clone(),
            signup_url,
            extra: options.extra,
        };

        self.hooks
            .send_invitation_email(&[signup_code.email.clone()], &ctx)
            .await?;
        tracing::info!("Sent invitation for {}", signup_code.label());

        let sent = Utc::now();
        sqlx::query("UPDATE signup_code SET sent = ?1 WHERE id = ?2")
            .bind(sent)
            .bind(signup_code.id)
            .execute(&self.db)
            .await?;

        let updated = SignupCode {
            sent: Some(sent),
            ..signup_code.clone()
        };

        self.events.emit(AccountEvent::SignupCodeSent {
            signup_code: updated.clone(),
        });

        Ok(updated)
    }

    /// Fetch a code row by its token
    pub async fn get(&self, code: &str) -> AccountResult<Option<SignupCode>> {
        let row = sqlx::query_as::<_, SignupCode>("SELECT * FROM signup_code WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.db)
            .await?;

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, hooks::DefaultHookset, mailer::Mailer};

    async fn manager() -> SignupCodeManager {
        let pool = db::memory_pool().await;
        let config = Arc::new(AccountConfig::default());
        let hooks = Arc::new(DefaultHookset::new(Mailer::new(None).unwrap()));
        SignupCodeManager::new(pool, config, hooks, EventBus::default())
    }

    #[tokio::test]
    async fn create_generates_token_when_absent() {
        let manager = manager().await;

        let code = manager
            .create(NewSignupCode {
                email: Some("a@example.com".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(code.code.len(), 20);
        assert_eq!(code.email, "a@example.com");
        assert!(code.expiry.is_some());
        // Unpersisted until save
        assert!(!manager.exists(Some(&code.code), None).await.unwrap());
    }

    #[tokio::test]
    async fn exists_reflects_persisted_codes() {
        let manager = manager().await;

        let code = manager
            .create(NewSignupCode {
                code: Some("X".to_string()),
                check_exists: false,
                ..Default::default()
            })
            .await
            .unwrap();
        manager.save(&code).await.unwrap();

        assert!(manager.exists(Some("X"), None).await.unwrap());
        assert!(!manager.exists(Some("unused"), None).await.unwrap());
        assert!(!manager.exists(None, None).await.unwrap());
    }

    #[tokio::test]
    async fn exists_matches_code_or_email() {
        let manager = manager().await;

        let code = manager
            .create(NewSignupCode {
                code: Some("friends2026".to_string()),
                email: Some("a@example.com".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        manager.save(&code).await.unwrap();

        assert!(manager
            .exists(Some("nope"), Some("a@example.com"))
            .await
            .unwrap());
        assert!(manager.exists(None, Some("a@example.com")).await.unwrap());
        assert!(!manager
            .exists(Some("nope"), Some("b@example.com"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn create_rejects_duplicates_when_checking() {
        let manager = manager().await;

        let code = manager
            .create(NewSignupCode {
                code: Some("dup".to_string()),
                email: Some("dup@example.com".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        manager.save(&code).await.unwrap();

        let err = manager
            .create(NewSignupCode {
                code: Some("dup".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::AlreadyExists));

        // Same email also collides
        let err = manager
            .create(NewSignupCode {
                email: Some("dup@example.com".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::AlreadyExists));

        // Opt-out skips the check
        manager
            .create(NewSignupCode {
                code: Some("dup".to_string()),
                check_exists: false,
                ..Default::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn check_code_rejects_unknown_codes() {
        let manager = manager().await;
        assert!(matches!(
            manager.check_code("missing").await,
            Err(AccountError::InvalidCode)
        ));
    }

    #[tokio::test]
    async fn unlimited_code_survives_redemptions() {
        let manager = manager().await;

        let code = manager
            .create(NewSignupCode {
                code: Some("open".to_string()),
                max_uses: 0,
                ..Default::default()
            })
            .await
            .unwrap();
        manager.save(&code).await.unwrap();

        for user_id in 1..=5 {
            let code = manager.check_code("open").await.unwrap();
            manager.use_code(&code, user_id).await.unwrap();
        }

        let code = manager.check_code("open").await.unwrap();
        assert_eq!(code.use_count, 5);
        assert_eq!(code.id, manager.get("open").await.unwrap().unwrap().id);
    }

    #[tokio::test]
    async fn limited_code_exhausts_after_max_uses() {
        let manager = manager().await;

        let code = manager
            .create(NewSignupCode {
                email: Some("a@example.com".to_string()),
                max_uses: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        let code = manager.save(&code).await.unwrap();

        manager.use_code(&code, 1).await.unwrap();
        assert_eq!(manager.get(&code.code).await.unwrap().unwrap().use_count, 1);

        // Second redemption without re-checking, then validation fails
        manager.use_code(&code, 2).await.unwrap();
        assert!(matches!(
            manager.check_code(&code.code).await,
            Err(AccountError::InvalidCode)
        ));
    }

    #[tokio::test]
    async fn expired_code_is_invalid_even_unused() {
        let manager = manager().await;

        let mut code = manager
            .create(NewSignupCode {
                code: Some("stale".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        code.expiry = Some(Utc::now() - Duration::hours(1));
        manager.save(&code).await.unwrap();

        assert!(matches!(
            manager.check_code("stale").await,
            Err(AccountError::InvalidCode)
        ));
    }

    #[tokio::test]
    async fn use_count_recomputed_from_result_rows() {
        let manager = manager().await;

        let code = manager
            .create(NewSignupCode {
                code: Some("tally".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let code = manager.save(&code).await.unwrap();

        manager.use_code(&code, 1).await.unwrap();
        manager.use_code(&code, 2).await.unwrap();
        assert_eq!(manager.calculate_use_count(code.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn redemption_emits_code_used_event() {
        let manager = manager().await;
        let mut rx = manager.events.subscribe();

        let code = manager
            .create(NewSignupCode {
                code: Some("observed".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let code = manager.save(&code).await.unwrap();
        manager.use_code(&code, 9).await.unwrap();

        match rx.recv().await.unwrap() {
            AccountEvent::SignupCodeUsed { result } => {
                assert_eq!(result.signup_code_id, code.id);
                assert_eq!(result.user_id, 9);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_stamps_sent_and_emits_event() {
        let manager = manager().await;
        let mut rx = manager.events.subscribe();

        let code = manager
            .create(NewSignupCode {
                code: Some("with space".to_string()),
                email: Some("a@example.com".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let code = manager.save(&code).await.unwrap();

        let sent = manager.send(&code, SendOptions::default()).await.unwrap();
        assert!(sent.sent.is_some());
        assert!(manager.get("with space").await.unwrap().unwrap().sent.is_some());

        match rx.recv().await.unwrap() {
            AccountEvent::SignupCodeSent { signup_code } => {
                assert_eq!(signup_code.id, code.id)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
