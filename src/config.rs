/// Configuration management for the account module
///
/// All tunables live in an explicit `AccountConfig` passed to the service
/// constructor; there are no process-wide settings.
use crate::error::{AccountError, AccountResult};
use serde::{Deserialize, Serialize};
use std::env;

/// Main account-module configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Default IANA timezone for accounts that have not picked one
    pub default_timezone: String,
    /// Default language code
    pub default_language: String,
    /// Language codes offered to accounts, in preference order
    pub languages: Vec<String>,
    /// Hours until a freshly created signup code expires
    pub signup_code_expiry_hours: i64,
    /// Grace period before a deletion request is expunged
    pub deletion_expunge_hours: i64,
    /// Protocol used when building absolute signup URLs
    pub http_protocol: String,
    /// Domain of the hosting site, for absolute signup URLs
    pub site_domain: String,
    /// Path of the signup page on the hosting site
    pub signup_path: String,
    /// SMTP delivery settings; `None` disables outgoing mail
    pub email: Option<EmailConfig>,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            default_timezone: "UTC".to_string(),
            default_language: "en-us".to_string(),
            languages: vec!["en-us".to_string()],
            signup_code_expiry_hours: 24,
            deletion_expunge_hours: 48,
            http_protocol: "http".to_string(),
            site_domain: "localhost".to_string(),
            signup_path: "/account/signup/".to_string(),
            email: None,
        }
    }
}

impl AccountConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AccountResult<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();

        let default_timezone =
            env::var("ACCOUNT_TIMEZONE").unwrap_or(defaults.default_timezone);
        let default_language =
            env::var("ACCOUNT_LANGUAGE").unwrap_or(defaults.default_language);
        let languages = env::var("ACCOUNT_LANGUAGES")
            .map(|raw| {
                raw.split(',')
                    .map(|code| code.trim().to_string())
                    .filter(|code| !code.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.languages);

        let signup_code_expiry_hours = env::var("ACCOUNT_SIGNUP_CODE_EXPIRY_HOURS")
            .unwrap_or_else(|_| defaults.signup_code_expiry_hours.to_string())
            .parse()
            .map_err(|_| {
                AccountError::Validation("Invalid signup code expiry hours".to_string())
            })?;
        let deletion_expunge_hours = env::var("ACCOUNT_DELETION_EXPUNGE_HOURS")
            .unwrap_or_else(|_| defaults.deletion_expunge_hours.to_string())
            .parse()
            .map_err(|_| {
                AccountError::Validation("Invalid deletion expunge hours".to_string())
            })?;

        let http_protocol =
            env::var("ACCOUNT_DEFAULT_HTTP_PROTOCOL").unwrap_or(defaults.http_protocol);
        let site_domain = env::var("ACCOUNT_SITE_DOMAIN").unwrap_or(defaults.site_domain);
        let signup_path = env::var("ACCOUNT_SIGNUP_PATH").unwrap_or(defaults.signup_path);

        let email = match env::var("ACCOUNT_SMTP_URL") {
            Ok(smtp_url) => Some(EmailConfig {
                smtp_url,
                from_address: env::var("ACCOUNT_EMAIL_FROM").map_err(|_| {
                    AccountError::Validation(
                        "ACCOUNT_EMAIL_FROM required when ACCOUNT_SMTP_URL is set".to_string(),
                    )
                })?,
            }),
            Err(_) => None,
        };

        let config = Self {
            default_timezone,
            default_language,
            languages,
            signup_code_expiry_hours,
            deletion_expunge_hours,
            http_protocol,
            site_domain,
            signup_path,
            email,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> AccountResult<()> {
        if self.default_timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(AccountError::UnknownTimezone(self.default_timezone.clone()));
        }
        if !self.languages.contains(&self.default_language) {
            return Err(AccountError::Validation(format!(
                "Default language {} is not among configured languages",
                self.default_language
            )));
        }
        if self.deletion_expunge_hours < 0 || self.signup_code_expiry_hours < 0 {
            return Err(AccountError::Validation(
                "Expiry and expunge hours must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
