//! Infrastructure layer: configuration and the identity-service clients.

pub mod config;
pub mod http;
pub mod registry;

pub use config::{Config, ConfigError};
pub use http::HttpIdentityService;
pub use registry::ServiceRegistry;
