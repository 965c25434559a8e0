//! Environment bootstrap for targets and credentials.
//!
//! Variables are grouped by a prefix so that the two sessions can be
//! configured side by side, e.g. `SNOWFLAKE_USER` for the dashboard and
//! `CORTEX_USER` for the assistant. The account falls back to
//! `SNOWFLAKE_ACCOUNT` because both sessions usually share one.

use crate::credentials::{Authenticator, Credential};
use crate::errors::{SnowflakeError, SnowflakeResult};
use crate::SnowflakeTarget;

const SHARED_PREFIX: &str = "SNOWFLAKE";

fn lookup_with<F>(lookup: &F, prefix: &str, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(&format!("{prefix}_{name}")).filter(|value| !value.trim().is_empty())
}

fn require_with<F>(lookup: &F, prefix: &str, name: &str) -> SnowflakeResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup_with(lookup, prefix, name)
        .ok_or_else(|| SnowflakeError::MissingConfig(format!("{prefix}_{name}")))
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl SnowflakeTarget {
    /// Read `{PREFIX}_ACCOUNT`, `_USER`, `_WAREHOUSE`, `_DATABASE`, `_SCHEMA` and `_ROLE`
    pub fn from_env(prefix: &str) -> SnowflakeResult<SnowflakeTarget> {
        SnowflakeTarget::from_lookup(prefix, env_var)
    }

    pub(crate) fn from_lookup<F>(prefix: &str, lookup: F) -> SnowflakeResult<SnowflakeTarget>
    where
        F: Fn(&str) -> Option<String>,
    {
        let account = match lookup_with(&lookup, prefix, "ACCOUNT") {
            Some(account) => account,
            None => require_with(&lookup, SHARED_PREFIX, "ACCOUNT")?,
        };
        Ok(SnowflakeTarget {
            account,
            user: require_with(&lookup, prefix, "USER")?,
            warehouse: require_with(&lookup, prefix, "WAREHOUSE")?,
            database: require_with(&lookup, prefix, "DATABASE")?,
            schema: require_with(&lookup, prefix, "SCHEMA")?,
            role: require_with(&lookup, prefix, "ROLE")?,
        })
    }
}

impl Credential {
    /// Pick a credential from the environment, in this order:
    ///
    /// 1. `{PREFIX}_PAT`
    /// 2. `{PREFIX}_PRIVATE_KEY_PATH` with optional `{PREFIX}_PRIVATE_KEY_PASSPHRASE`
    /// 3. `{PREFIX}_AUTHENTICATOR`
    /// 4. external-browser SSO
    pub fn from_env(prefix: &str) -> Credential {
        Credential::from_lookup(prefix, env_var)
    }

    pub(crate) fn from_lookup<F>(prefix: &str, lookup: F) -> Credential
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup_with(&lookup, prefix, "PAT") {
            return Credential::PersonalAccessToken(token);
        }
        if let Some(path) = lookup_with(&lookup, prefix, "PRIVATE_KEY_PATH") {
            return Credential::key_pair(
                path,
                lookup_with(&lookup, prefix, "PRIVATE_KEY_PASSPHRASE"),
            );
        }
        let authenticator = lookup_with(&lookup, prefix, "AUTHENTICATOR")
            .map(|value| Authenticator::parse(&value))
            .unwrap_or_default();
        Credential::Sso { authenticator }
    }
}
