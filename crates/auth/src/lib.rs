//! `loginflow-auth`: pure login policy checks.
//!
//! This crate is intentionally decoupled from HTTP and from the identity
//! service: every function takes the snapshots it needs and returns a verdict.

pub mod login_name;
pub mod password;
pub mod redirect;
pub mod session_check;

pub use login_name::{LoginNameError, domain_suffix, matches_login_policy, validate_email};
pub use password::{PasswordRule, check_password};
pub use redirect::{RedirectError, RedirectPolicy, validate_redirect_uri};
pub use session_check::{SessionCheck, SessionPolicy, check_session};
