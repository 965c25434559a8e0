//! A two-session Snowflake facade for dashboards and Cortex.
//!
//! [`ConnectionManager`] keeps two independent sessions:
//!
//! * **Dashboard**: analytical SQL, e.g. the registered KPI queries
//! * **Assistant**: Cortex `COMPLETE` and Cortex Search calls
//!
//! Sessions authenticate with SSO (external browser), a key pair, or a
//! personal access token. Free text sent to Cortex is always passed as bound
//! parameters, never spliced into SQL.
//!
//! Example usage:
//!
//! ```rust,no_run
//! use light_snowflake_cortex::{
//!     ConnectionManager, Credential, SessionRole, SnowflakeError, SnowflakeTarget, DEFAULT_MODEL,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SnowflakeError> {
//!     let mut manager = ConnectionManager::new();
//!     let target = SnowflakeTarget {
//!         account: "xy12345.us-east-1".into(),
//!         user: "CORTEX_USER".into(),
//!         warehouse: "CORTEX_WH".into(),
//!         database: "ANALYTICS_DB".into(),
//!         schema: "CORTEX".into(),
//!         role: "CORTEX_ROLE".into(),
//!     };
//!     manager
//!         .connect(
//!             SessionRole::Assistant,
//!             &Credential::personal_access_token("sfp_..."),
//!             &target,
//!         )
//!         .await?;
//!
//!     let answer = manager
//!         .query_assistant("What are the top 3 strategies to reduce delinquency?", DEFAULT_MODEL, None)
//!         .await?;
//!     println!("{}", answer);
//!
//!     // Each record is a serde_json::Map keyed by column name
//!     for hit in manager
//!         .search("servicing_docs", "foreclosure process", &["title", "content"], 5)
//!         .await?
//!     {
//!         println!("{}", hit["TITLE"]);
//!     }
//!
//!     manager.close_all().await
//! }
//! ```

mod auth;
mod bindings;
mod cells;
mod config;
mod connector;
mod credentials;
mod errors;
mod facade;
pub mod invocation;
pub mod kpi;
#[cfg(test)]
#[cfg(feature = "live-tests")]
mod live_tests;
mod result;
mod session;
mod sql_api;
mod sso;
mod statement;

pub use auth::{create_token, load_private_key, parse_private_key};
pub use bindings::Binding;
pub use cells::{Cell, RawCell};
pub use connector::{SnowflakeConnector, SnowflakeSession};
pub use credentials::{Authenticator, Credential, PAT_PREFIX};
pub use errors::{SnowflakeError, SnowflakeResult};
pub use facade::{
    Completion, ConnectionManager, DEFAULT_ASSISTANT_CONTEXT, DEFAULT_MODEL, DEFAULT_SEARCH_LIMIT,
    FALLBACK_RESPONSE,
};
pub use jwt_simple;
pub use result::{ColumnType, QueryResult, Record};
pub use session::{Connector, Session, SessionRole};
pub use sql_api::SqlApiSession;
pub use sso::BrowserSession;
pub use statement::Statement;

/// Where a session points: account, login, and the warehouse/database/schema/role it runs as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnowflakeTarget {
    /// Account identifier, optionally with a region, e.g. `xy12345.us-east-1`
    pub account: String,
    pub user: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    pub role: String,
}

impl SnowflakeTarget {
    pub(crate) fn host(&self) -> String {
        format!(
            "https://{}.snowflakecomputing.com",
            self.account.to_ascii_lowercase()
        )
    }

    /// The account locator without any region suffix, uppercased
    pub(crate) fn account_name(&self) -> String {
        self.account
            .split('.')
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase()
    }
}

pub(crate) fn http_client() -> SnowflakeResult<reqwest::Client> {
    use reqwest::header::*;
    let mut headers = HeaderMap::with_capacity(3);
    headers.append(CONTENT_TYPE, "application/json".parse()?);
    headers.append(ACCEPT, "application/json".parse()?);
    headers.append(
        USER_AGENT,
        concat!(env!("CARGO_PKG_NAME"), '/', env!("CARGO_PKG_VERSION")).parse()?,
    );
    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .gzip(true)
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_and_account_name() {
        let target = SnowflakeTarget {
            account: "XY12345.us-east-1".into(),
            user: "u".into(),
            warehouse: "w".into(),
            database: "d".into(),
            schema: "s".into(),
            role: "r".into(),
        };
        assert_eq!(target.host(), "https://xy12345.us-east-1.snowflakecomputing.com");
        assert_eq!(target.account_name(), "XY12345");
    }
}
