use async_trait::async_trait;

use crate::auth::{load_private_key, BearerAuth};
use crate::credentials::Credential;
use crate::errors::SnowflakeResult;
use crate::result::QueryResult;
use crate::session::{Connector, Session};
use crate::sql_api::SqlApiSession;
use crate::sso::BrowserSession;
use crate::statement::Statement;
use crate::SnowflakeTarget;

/// Opens real Snowflake sessions
///
/// * SSO goes through the external-browser login and the query-request API
/// * Key-pair and PAT credentials use the SQL API with a bearer token
#[derive(Debug, Clone, Copy, Default)]
pub struct SnowflakeConnector;

/// A live session of either flavour
#[derive(Debug)]
pub enum SnowflakeSession {
    SqlApi(SqlApiSession),
    Browser(BrowserSession),
}

#[async_trait]
impl Session for SnowflakeSession {
    async fn query(&self, statement: &Statement) -> SnowflakeResult<QueryResult> {
        match self {
            SnowflakeSession::SqlApi(session) => session.query(statement).await,
            SnowflakeSession::Browser(session) => session.query(statement).await,
        }
    }

    async fn close(self) -> SnowflakeResult<()> {
        match self {
            SnowflakeSession::SqlApi(session) => session.close().await,
            SnowflakeSession::Browser(session) => session.close().await,
        }
    }
}

#[async_trait]
impl Connector for SnowflakeConnector {
    type Session = SnowflakeSession;

    async fn connect(
        &self,
        target: &SnowflakeTarget,
        credential: &Credential,
    ) -> SnowflakeResult<SnowflakeSession> {
        let auth = match credential {
            Credential::Sso { authenticator } => {
                let session = BrowserSession::login(target, authenticator).await?;
                return Ok(SnowflakeSession::Browser(session));
            }
            Credential::KeyPair {
                private_key_path,
                passphrase,
            } => BearerAuth::KeyPair {
                key_pair: load_private_key(private_key_path, passphrase.as_deref())?,
                account: target.account.clone(),
                user: target.user.clone(),
            },
            Credential::PersonalAccessToken(token) => {
                BearerAuth::ProgrammaticAccessToken(token.clone())
            }
        };
        let session = SqlApiSession::new(target, auth)?;
        // The SQL API has no login step, so make the server look at the credential now
        session.query(&Statement::new("SELECT 1")).await?;
        Ok(SnowflakeSession::SqlApi(session))
    }
}
