//! `loginflow-flow`: the login step sequencing.
//!
//! The flow is a thin relay: every decision that matters (credential checks,
//! session lifecycle, policy) is made by the remote identity service behind
//! [`IdentityService`]. This crate decides which page to show next and how to
//! link to it.

pub mod discovery;
pub mod in_memory;
pub mod links;
pub mod port;
pub mod resolver;
pub mod settings;
pub mod step;
pub mod submit;

pub use discovery::LoginNameRouter;
pub use in_memory::{InMemoryIdentityService, SeedUser};
pub use links::LinkBuilder;
pub use port::{IdentityError, IdentityService, RpcCode};
pub use resolver::{StepData, StepResolver, StepView, resolve, resolve_page};
pub use settings::{RegistrationSettings, SettingsFetcher};
pub use step::Step;
pub use submit::{FormSubmissionAdapter, OtpMethod, RedisplayReason, StepResult, Transition, validate_registration};
