/// Anteroom - pluggable user-account module
///
/// Manages per-user account settings (timezone, language), invitation and
/// signup codes, account-deletion requests, and password-history/expiry
/// tracking on top of a SQLite store. The host application supplies the
/// authentication identity, routing, and templates; this crate supplies
/// the behavior.

pub mod account;
pub mod config;
pub mod db;
pub mod deletion;
pub mod error;
pub mod events;
pub mod hooks;
pub mod jobs;
pub mod mailer;
pub mod password;
pub mod service;
pub mod signup;

pub use account::{AccountManager, AnonymousAccount, NewAccount, RequestAccount, RequestContext, UserRef};
pub use config::{AccountConfig, EmailConfig};
pub use db::models;
pub use deletion::AccountDeletionManager;
pub use error::{AccountError, AccountResult};
pub use events::{AccountEvent, EventBus};
pub use hooks::{DefaultHookset, Hookset, InvitationContext};
pub use password::PasswordManager;
pub use service::AccountService;
pub use signup::{NewSignupCode, SendOptions, SignupCodeManager};
