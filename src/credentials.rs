use std::fmt;
use std::path::PathBuf;

use crate::errors::{SnowflakeError, SnowflakeResult};

/// Every personal access token starts with this prefix
pub const PAT_PREFIX: &str = "sfp_";

/// How an SSO login is brokered
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Authenticator {
    /// Snowflake's own browser redirect flow
    #[default]
    ExternalBrowser,
    /// A third-party identity provider URL, e.g. `https://acme.okta.com`
    ///
    /// These parse and validate, but connecting with one fails with
    /// [`SnowflakeError::UnsupportedFeature`].
    IdentityProvider(String),
}

impl Authenticator {
    /// Parse the value usually found in an `AUTHENTICATOR` setting
    pub fn parse(value: &str) -> Authenticator {
        if value.trim().eq_ignore_ascii_case("externalbrowser") {
            Authenticator::ExternalBrowser
        } else {
            Authenticator::IdentityProvider(value.trim().to_owned())
        }
    }

    /// The value sent as `AUTHENTICATOR` in login requests
    pub fn wire_name(&self) -> &str {
        match self {
            Authenticator::ExternalBrowser => "EXTERNALBROWSER",
            Authenticator::IdentityProvider(url) => url,
        }
    }
}

/// The secret used to open a session. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Sso {
        authenticator: Authenticator,
    },
    KeyPair {
        private_key_path: PathBuf,
        passphrase: Option<String>,
    },
    PersonalAccessToken(String),
}

impl Credential {
    pub fn external_browser() -> Credential {
        Credential::Sso {
            authenticator: Authenticator::ExternalBrowser,
        }
    }

    pub fn key_pair(path: impl Into<PathBuf>, passphrase: Option<String>) -> Credential {
        Credential::KeyPair {
            private_key_path: path.into(),
            passphrase,
        }
    }

    pub fn personal_access_token(token: impl Into<String>) -> Credential {
        Credential::PersonalAccessToken(token.into())
    }

    /// Check everything that can be checked without touching the network
    pub fn validate(&self) -> SnowflakeResult<()> {
        match self {
            Credential::PersonalAccessToken(token) if !token.starts_with(PAT_PREFIX) => {
                Err(SnowflakeError::InvalidCredentialFormat(format!(
                    "personal access token must start with '{PAT_PREFIX}'"
                )))
            }
            Credential::PersonalAccessToken(token) if token.len() == PAT_PREFIX.len() => Err(
                SnowflakeError::InvalidCredentialFormat("personal access token is empty".into()),
            ),
            Credential::KeyPair {
                private_key_path, ..
            } if private_key_path.as_os_str().is_empty() => Err(
                SnowflakeError::InvalidCredentialFormat("private key path is empty".into()),
            ),
            Credential::Sso {
                authenticator: Authenticator::IdentityProvider(url),
            } if url.is_empty() => Err(SnowflakeError::InvalidCredentialFormat(
                "identity provider URL is empty".into(),
            )),
            _ => Ok(()),
        }
    }

    /// A short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Sso { .. } => "SSO",
            Credential::KeyPair { .. } => "Key-Pair",
            Credential::PersonalAccessToken(_) => "PAT",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Sso { authenticator } => f
                .debug_struct("Sso")
                .field("authenticator", authenticator)
                .finish(),
            Credential::KeyPair {
                private_key_path,
                passphrase,
            } => f
                .debug_struct("KeyPair")
                .field("private_key_path", private_key_path)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
            Credential::PersonalAccessToken(_) => {
                f.debug_tuple("PersonalAccessToken").field(&"<redacted>").finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pat_prefix_is_enforced() {
        let err = Credential::personal_access_token("abc123").validate().unwrap_err();
        assert!(matches!(err, SnowflakeError::InvalidCredentialFormat(_)));
        assert!(Credential::personal_access_token("sfp_abc123").validate().is_ok());
    }

    #[test]
    fn bare_prefix_is_not_a_token() {
        assert!(Credential::personal_access_token("sfp_").validate().is_err());
    }

    #[test]
    fn empty_key_path_is_rejected() {
        assert!(Credential::key_pair("", None).validate().is_err());
        assert!(Credential::key_pair("rsa_key.p8", None).validate().is_ok());
    }

    #[test]
    fn authenticator_parsing() {
        assert_eq!(Authenticator::parse("externalbrowser"), Authenticator::ExternalBrowser);
        assert_eq!(Authenticator::parse("EXTERNALBROWSER").wire_name(), "EXTERNALBROWSER");
        let okta = Authenticator::parse("https://acme.okta.com");
        assert_eq!(okta.wire_name(), "https://acme.okta.com");
    }

    #[test]
    fn debug_redacts_secrets() {
        let pat = format!("{:?}", Credential::personal_access_token("sfp_secret"));
        assert!(!pat.contains("secret"));
        let key = format!("{:?}", Credential::key_pair("k.p8", Some("hunter2".into())));
        assert!(!key.contains("hunter2"));
        assert!(key.contains("k.p8"));
    }
}
