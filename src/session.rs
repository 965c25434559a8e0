use std::fmt;

use async_trait::async_trait;

use crate::credentials::Credential;
use crate::errors::SnowflakeResult;
use crate::result::QueryResult;
use crate::statement::Statement;
use crate::SnowflakeTarget;

/// Which of the two facade slots a session lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionRole {
    /// Analytical SQL against loan-portfolio data
    Dashboard,
    /// Cortex completion and search calls
    Assistant,
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionRole::Dashboard => f.write_str("Dashboard"),
            SessionRole::Assistant => f.write_str("Assistant"),
        }
    }
}

/// An authenticated handle that can run statements until it is closed
///
/// A session is not reentrant: callers run one statement at a time.
#[async_trait]
pub trait Session: Send + Sync + Sized {
    /// Run a statement and gather every row it returns
    async fn query(&self, statement: &Statement) -> SnowflakeResult<QueryResult>;

    /// End the session on the server side, if the session has server-side state
    async fn close(self) -> SnowflakeResult<()>;
}

/// Opens sessions. The facade owns one and calls it for every `connect`.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Session;

    async fn connect(
        &self,
        target: &SnowflakeTarget,
        credential: &Credential,
    ) -> SnowflakeResult<Self::Session>;
}
