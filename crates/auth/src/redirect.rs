//! Redirect-URI validation (open-redirect protection).

use thiserror::Error;
use url::Url;

/// Where the flow may send the browser.
#[derive(Debug, Clone)]
pub struct RedirectPolicy {
    /// Reject plain `http` URIs in production.
    pub enforce_https: bool,
    pub production: bool,
    /// Allowed hosts; subdomains of an entry are allowed too. Empty allows all.
    pub trusted_domains: Vec<String>,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self {
            enforce_https: true,
            production: false,
            trusted_domains: Vec::new(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RedirectError {
    #[error("Invalid URL format")]
    InvalidFormat,

    #[error("Invalid protocol: {0}")]
    InvalidProtocol(String),

    #[error("HTTPS required in production environment")]
    HttpsRequired,

    #[error("Domain {0} not in trusted domains list")]
    UntrustedDomain(String),
}

pub fn validate_redirect_uri(uri: &str, policy: &RedirectPolicy) -> Result<Url, RedirectError> {
    let url = Url::parse(uri).map_err(|_| RedirectError::InvalidFormat)?;

    match url.scheme() {
        "https" => {}
        "http" => {
            if policy.production && policy.enforce_https {
                return Err(RedirectError::HttpsRequired);
            }
        }
        other => return Err(RedirectError::InvalidProtocol(format!("{other}:"))),
    }

    let trusted: Vec<String> = policy
        .trusted_domains
        .iter()
        .map(|d| d.trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect();

    if trusted.is_empty() {
        return Ok(url);
    }

    let host = url
        .host_str()
        .map(str::to_ascii_lowercase)
        .ok_or(RedirectError::InvalidFormat)?;

    let allowed = trusted
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")));

    if allowed {
        Ok(url)
    } else {
        Err(RedirectError::UntrustedDomain(host))
    }
}
