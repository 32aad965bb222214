//! Strongly-typed identifiers issued by the identity service.
//!
//! The service hands out opaque string ids; this layer never mints them.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::LoginError;

/// Identifier of a session (carried in the `sessionId` query parameter).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

/// Identifier of a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

/// Identifier of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrganizationId(String);

/// Correlates one login attempt across steps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AuthRequestId(String);

/// Identifier of an external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdpId(String);

macro_rules! impl_string_id {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a raw identifier. Empty strings are rejected.
            pub fn new(value: impl Into<String>) -> Result<Self, LoginError> {
                let value = value.into();
                if value.is_empty() {
                    return Err(LoginError::validation(concat!($name, " must not be empty")));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        // Deserializing goes through `new`, so empty ids never appear on the wire side.
        impl TryFrom<String> for $t {
            type Error = LoginError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$t> for String {
            fn from(id: $t) -> String {
                id.0
            }
        }

        impl FromStr for $t {
            type Err = LoginError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

impl_string_id!(SessionId, "SessionId");
impl_string_id!(UserId, "UserId");
impl_string_id!(OrganizationId, "OrganizationId");
impl_string_id!(AuthRequestId, "AuthRequestId");
impl_string_id!(IdpId, "IdpId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ids_are_rejected() {
        assert!(SessionId::new("").is_err());
        assert!("".parse::<UserId>().is_err());
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = SessionId::new("2893411").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"2893411\"");
        assert_eq!(id.to_string(), "2893411");
        assert_eq!(serde_json::from_str::<SessionId>("\"2893411\"").unwrap(), id);
    }

    #[test]
    fn empty_ids_are_rejected_when_deserializing() {
        assert!(serde_json::from_str::<OrganizationId>("\"\"").is_err());

        #[derive(Debug, Deserialize)]
        struct Body {
            #[serde(default)]
            organization: Option<OrganizationId>,
        }
        assert!(serde_json::from_str::<Body>(r#"{ "organization": "" }"#).is_err());
        assert!(serde_json::from_str::<Body>(r#"{}"#).unwrap().organization.is_none());
    }
}
