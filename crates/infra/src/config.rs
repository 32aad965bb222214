//! Process configuration, read once at start from `LOGIN_*` environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use loginflow_core::OrganizationId;

pub const SERVICE_URL: &str = "LOGIN_SERVICE_URL";
pub const SERVICE_TOKEN: &str = "LOGIN_SERVICE_TOKEN";
pub const DEFAULT_ORG_ID: &str = "LOGIN_DEFAULT_ORG_ID";
pub const BIND_ADDR: &str = "LOGIN_BIND_ADDR";
pub const BASE_PATH: &str = "LOGIN_BASE_PATH";
pub const EMAIL_VERIFICATION: &str = "LOGIN_EMAIL_VERIFICATION";
pub const ENFORCE_HTTPS: &str = "LOGIN_ENFORCE_HTTPS";
pub const PRODUCTION: &str = "LOGIN_PRODUCTION";
pub const TRUSTED_DOMAINS: &str = "LOGIN_TRUSTED_DOMAINS";
pub const RPC_TIMEOUT_SECS: &str = "LOGIN_RPC_TIMEOUT_SECS";
pub const USE_IN_MEMORY: &str = "LOGIN_USE_IN_MEMORY";
pub const INSTANCES: &str = "LOGIN_INSTANCES";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{var} is invalid: {message}")]
    Invalid { var: &'static str, message: String },
}

fn invalid(var: &'static str, message: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        message: message.to_string(),
    }
}

/// Where to reach the identity service.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub url: Url,
    pub token: String,
}

impl core::fmt::Debug for ServiceEndpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServiceEndpoint")
            .field("url", &self.url.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `None` only in in-memory mode.
    pub service: Option<ServiceEndpoint>,
    pub default_org_id: Option<OrganizationId>,
    pub bind_addr: SocketAddr,
    pub base_path: String,
    pub email_verification: bool,
    pub enforce_https: bool,
    pub production: bool,
    pub trusted_domains: Vec<String>,
    pub rpc_timeout: Duration,
    pub use_in_memory: bool,
    /// Extra instances by request host; they share the service token.
    pub instances: Vec<(String, Url)>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let use_in_memory = parse_bool(USE_IN_MEMORY, get(USE_IN_MEMORY), false)?;

        let service = match (get(SERVICE_URL), get(SERVICE_TOKEN)) {
            (Some(url), Some(token)) => Some(ServiceEndpoint {
                url: Url::parse(&url).map_err(|e| invalid(SERVICE_URL, e))?,
                token,
            }),
            _ if use_in_memory => None,
            (None, _) => return Err(ConfigError::Missing(SERVICE_URL)),
            (Some(_), None) => return Err(ConfigError::Missing(SERVICE_TOKEN)),
        };

        let default_org_id = get(DEFAULT_ORG_ID)
            .map(OrganizationId::new)
            .transpose()
            .map_err(|e| invalid(DEFAULT_ORG_ID, e))?;

        let bind_addr = get(BIND_ADDR)
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e| invalid(BIND_ADDR, e))?;

        let rpc_timeout = match get(RPC_TIMEOUT_SECS) {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|e| invalid(RPC_TIMEOUT_SECS, e))?;
                if secs == 0 {
                    return Err(invalid(RPC_TIMEOUT_SECS, "must be at least 1"));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(10),
        };

        let trusted_domains = get(TRUSTED_DOMAINS)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let instances = match get(INSTANCES) {
            Some(raw) => parse_instances(&raw)?,
            None => Vec::new(),
        };
        if !instances.is_empty() && service.is_none() {
            return Err(ConfigError::Missing(SERVICE_TOKEN));
        }

        Ok(Self {
            service,
            default_org_id,
            bind_addr,
            base_path: get(BASE_PATH).unwrap_or_default(),
            email_verification: parse_bool(EMAIL_VERIFICATION, get(EMAIL_VERIFICATION), false)?,
            enforce_https: parse_bool(ENFORCE_HTTPS, get(ENFORCE_HTTPS), true)?,
            production: parse_bool(PRODUCTION, get(PRODUCTION), false)?,
            trusted_domains,
            rpc_timeout,
            use_in_memory,
            instances,
        })
    }
}

fn parse_bool(var: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(invalid(var, format!("expected a boolean, got {other:?}"))),
    }
}

/// `host=url` pairs, comma-separated.
fn parse_instances(raw: &str) -> Result<Vec<(String, Url)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (host, url) = pair
                .split_once('=')
                .ok_or_else(|| invalid(INSTANCES, format!("expected host=url, got {pair:?}")))?;
            let host = host.trim().to_ascii_lowercase();
            if host.is_empty() {
                return Err(invalid(INSTANCES, "empty host"));
            }
            let url = Url::parse(url.trim()).map_err(|e| invalid(INSTANCES, e))?;
            Ok((host, url))
        })
        .collect()
}
