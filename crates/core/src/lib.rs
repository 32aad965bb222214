//! `loginflow-core`: building blocks shared by every login-flow crate.
//!
//! This crate contains **pure** types (no IO, no HTTP): the request-scoped
//! [`AuthContext`], identifier newtypes, the error taxonomy, and read-only
//! snapshots of what the identity service returns.

pub mod context;
pub mod error;
pub mod id;
pub mod session;
pub mod settings;
pub mod user;

pub use context::AuthContext;
pub use error::{LoginError, LoginResult};
pub use id::{AuthRequestId, IdpId, OrganizationId, SessionId, UserId};
pub use session::{Checks, Factors, Session, SessionHandle, UserCheck, UserFactor, VerifiedFactor, WebAuthnFactor};
pub use settings::{
    BrandingSettings, IdentityProvider, IdentityProviderType, LegalAndSupportSettings, LoginSettings,
    MultiFactorType, PasskeysType, PasswordComplexitySettings, PrivacyPolicy, SecondFactorType, Settings,
    SettingsKind,
};
pub use user::{
    AuthenticationMethodType, Email, HumanProfile, IdpIntent, NewHumanUser, Organization, Phone, User, UserState,
};
