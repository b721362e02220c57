/// Pluggable behavior hooks
///
/// The original design resolved these through dynamic attribute lookup; here
/// the registry is an explicit trait with swappable implementations, injected
/// into the service at construction time.
use crate::{db::models::AccountDeletion, error::AccountResult, mailer::Mailer};
use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use std::collections::HashMap;

/// Template context handed to the invitation-email hook
#[derive(Debug, Clone)]
pub struct InvitationContext {
    pub code: String,
    pub site_domain: String,
    pub signup_url: String,
    pub extra: HashMap<String, String>,
}

/// Hook registry for pluggable behaviors
#[async_trait]
pub trait Hookset: Send + Sync {
    /// Produce a signup-code token. The target email is passed through so
    /// implementations may derive deterministic tokens from it.
    fn generate_signup_code_token(&self, email: Option<&str>) -> String;

    /// Deliver an invitation email to the given recipients
    async fn send_invitation_email(
        &self,
        recipients: &[String],
        ctx: &InvitationContext,
    ) -> AccountResult<()>;

    /// Called after a deletion request has been recorded
    async fn account_delete_mark(&self, deletion: &AccountDeletion) -> AccountResult<()>;

    /// Called for each deletion request being expunged, before it is
    /// stamped as processed
    async fn account_delete_expunge(&self, deletion: &AccountDeletion) -> AccountResult<()>;
}

/// Default hook implementations: random tokens, SMTP delivery, logged
/// no-ops for the deletion side effects
pub struct DefaultHookset {
    mailer: Mailer,
}

impl DefaultHookset {
    pub fn new(mailer: Mailer) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl Hookset for DefaultHookset {
    fn generate_signup_code_token(&self, _email: Option<&str>) -> String {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(20)
            .map(char::from)
            .collect();

        token.to_lowercase()
    }

    async fn send_invitation_email(
        &self,
        recipients: &[String],
        ctx: &InvitationContext,
    ) -> AccountResult<()> {
        self.mailer.send_invitation_email(recipients, ctx).await
    }

    async fn account_delete_mark(&self, deletion: &AccountDeletion) -> AccountResult<()> {
        tracing::info!("Account deletion requested for {}", deletion.email);
        Ok(())
    }

    async fn account_delete_expunge(&self, deletion: &AccountDeletion) -> AccountResult<()> {
        tracing::info!("Expunging account deletion request for {}", deletion.email);
        Ok(())
    }
}
