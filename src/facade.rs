use std::fmt;

use serde::Deserialize;

use crate::connector::SnowflakeConnector;
use crate::credentials::Credential;
use crate::errors::{SnowflakeError, SnowflakeResult};
use crate::invocation::{self, ChatMessage};
use crate::kpi;
use crate::result::Record;
use crate::session::{Connector, Session, SessionRole};
use crate::statement::Statement;
use crate::SnowflakeTarget;

/// Cortex model used when the caller has no preference
pub const DEFAULT_MODEL: &str = "snowflake-arctic";

/// Number of search results callers usually ask for
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// The system prompt used when a question comes without its own context
pub const DEFAULT_ASSISTANT_CONTEXT: &str = "You are DARA Agent, an AI assistant for mortgage servicing analytics. \
You have access to loan portfolio data and can answer questions about delinquency, \
foreclosures, escrow, payments, compliance, and customer service metrics.";

/// Shown in place of a completion when the model returned nothing
pub const FALLBACK_RESPONSE: &str = "I couldn't generate a response. Please try again.";

/// What the completion function produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Text(String),
    /// The call succeeded but returned no row
    Empty,
}

impl Completion {
    /// The generated text, or [`FALLBACK_RESPONSE`] when there was none
    pub fn text(&self) -> &str {
        match self {
            Completion::Text(text) => text,
            Completion::Empty => FALLBACK_RESPONSE,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Completion::Empty)
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[derive(Deserialize)]
struct CompletionPayload {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    messages: String,
}

/// Holds the dashboard and assistant sessions and runs queries against them
///
/// Queries borrow the manager immutably; only `connect` and `close_all`
/// need `&mut self`, so each slot has a single writer.
pub struct ConnectionManager<C: Connector = SnowflakeConnector> {
    connector: C,
    dashboard: Option<C::Session>,
    assistant: Option<C::Session>,
}

impl ConnectionManager<SnowflakeConnector> {
    pub fn new() -> Self {
        ConnectionManager::with_connector(SnowflakeConnector)
    }
}

impl Default for ConnectionManager<SnowflakeConnector> {
    fn default() -> Self {
        ConnectionManager::new()
    }
}

impl<C: Connector> ConnectionManager<C> {
    pub fn with_connector(connector: C) -> Self {
        ConnectionManager {
            connector,
            dashboard: None,
            assistant: None,
        }
    }

    fn slot_mut(&mut self, role: SessionRole) -> &mut Option<C::Session> {
        match role {
            SessionRole::Dashboard => &mut self.dashboard,
            SessionRole::Assistant => &mut self.assistant,
        }
    }

    pub fn session(&self, role: SessionRole) -> Option<&C::Session> {
        match role {
            SessionRole::Dashboard => self.dashboard.as_ref(),
            SessionRole::Assistant => self.assistant.as_ref(),
        }
    }

    pub fn is_connected(&self, role: SessionRole) -> bool {
        self.session(role).is_some()
    }

    fn require(&self, role: SessionRole) -> SnowflakeResult<&C::Session> {
        self.session(role).ok_or(SnowflakeError::NotConnected(role))
    }

    /// Open a session for `role`, replacing (and closing) any session already there
    ///
    /// The credential is checked locally before anything goes over the network.
    pub async fn connect(
        &mut self,
        role: SessionRole,
        credential: &Credential,
        target: &SnowflakeTarget,
    ) -> SnowflakeResult<&C::Session> {
        credential.validate()?;
        log::info!(
            "Connecting {} session ({}) as {}",
            role,
            credential.kind(),
            target.user
        );
        let session = self.connector.connect(target, credential).await?;
        if let Some(previous) = self.slot_mut(role).take() {
            if let Err(e) = previous.close().await {
                log::warn!("Closing replaced {} session failed: {}", role, e);
            }
        }
        log::info!("{} session established ({})", role, credential.kind());
        Ok(self.slot_mut(role).insert(session))
    }

    /// Run one of the registered KPI queries and return its first row
    pub async fn dashboard_kpi(&self, name: &str) -> SnowflakeResult<Record> {
        let session = self.require(SessionRole::Dashboard)?;
        let kpi = kpi::lookup(name)?;
        let result = session.query(&Statement::new(kpi.sql)).await?;
        Ok(result.first_record().unwrap_or_default())
    }

    /// Ask the completion function a question
    ///
    /// `context` becomes the system turn; without it the DARA persona is used.
    pub async fn query_assistant(
        &self,
        question: &str,
        model: &str,
        context: Option<&str>,
    ) -> SnowflakeResult<Completion> {
        let session = self.require(SessionRole::Assistant)?;
        let statement = invocation::complete(
            model,
            &[
                ChatMessage::system(context.unwrap_or(DEFAULT_ASSISTANT_CONTEXT)),
                ChatMessage::user(question),
            ],
        );
        let result = session.query(&statement).await?;
        let Some(response) = result
            .records()
            .into_iter()
            .next()
            .and_then(|record| record.into_iter().next().map(|(_, value)| value))
        else {
            return Ok(Completion::Empty);
        };
        let payload: CompletionPayload = match response {
            serde_json::Value::Null => return Ok(Completion::Empty),
            serde_json::Value::String(text) => serde_json::from_str(&text)?,
            value => serde_json::from_value(value)?,
        };
        payload
            .choices
            .into_iter()
            .next()
            .map(|choice| Completion::Text(choice.messages))
            .ok_or_else(|| SnowflakeError::MalformedResponse("completion without choices".into()))
    }

    /// Ask a question with the rows of `data_query` (run on the dashboard session) attached
    pub async fn query_assistant_with_data(
        &self,
        question: &str,
        model: &str,
        data_query: Option<&str>,
    ) -> SnowflakeResult<Completion> {
        let (Some(dashboard), Some(_)) = (&self.dashboard, &self.assistant) else {
            return Err(SnowflakeError::BothConnectionsRequired);
        };
        let mut enhanced = question.to_owned();
        if let Some(data_query) = data_query {
            let rows = dashboard.query(&Statement::new(data_query)).await?.records();
            log::debug!("Attaching {} rows of data context", rows.len());
            enhanced.push_str("\n\nHere is the relevant data:\n");
            enhanced.push_str(&serde_json::to_string_pretty(&rows)?);
        }
        self.query_assistant(&enhanced, model, None).await
    }

    /// Semantic search through a Cortex search service
    ///
    /// Rows come back in the service's relevance order, at most `limit` of them.
    pub async fn search(
        &self,
        service: &str,
        query: &str,
        columns: &[&str],
        limit: usize,
    ) -> SnowflakeResult<Vec<Record>> {
        let session = self.require(SessionRole::Assistant)?;
        let statement = invocation::search(service, query, columns, limit)?;
        let mut result = session.query(&statement).await?;
        result.truncate(limit);
        Ok(result.records())
    }

    /// Smoke-test a session, logging what happened instead of failing
    pub async fn test_connection(&self, role: SessionRole) -> bool {
        let Some(session) = self.session(role) else {
            log::warn!("{} connection test skipped: not connected", role);
            return false;
        };
        match smoke_test(session, role).await {
            Ok(summary) => {
                log::info!("{}: {}", role, summary);
                true
            }
            Err(e) => {
                log::warn!("{} connection test failed: {}", role, e);
                false
            }
        }
    }

    /// Close whichever sessions are open
    ///
    /// Both slots are emptied even if a close fails; the first failure is returned.
    pub async fn close_all(&mut self) -> SnowflakeResult<()> {
        let mut outcome = Ok(());
        for role in [SessionRole::Dashboard, SessionRole::Assistant] {
            let Some(session) = self.slot_mut(role).take() else {
                continue;
            };
            match session.close().await {
                Ok(()) => log::info!("{} session closed", role),
                Err(e) => {
                    log::warn!("Closing {} session failed: {}", role, e);
                    if outcome.is_ok() {
                        outcome = Err(e);
                    }
                }
            }
        }
        outcome
    }
}

async fn smoke_test<S: Session>(session: &S, role: SessionRole) -> SnowflakeResult<String> {
    let identity = match role {
        SessionRole::Dashboard => "SELECT CURRENT_USER(), CURRENT_ROLE(), CURRENT_WAREHOUSE()",
        SessionRole::Assistant => "SELECT CURRENT_USER(), CURRENT_ROLE()",
    };
    let result = session.query(&Statement::new(identity)).await?;
    let row = result
        .raw_cells()
        .first()
        .ok_or_else(|| SnowflakeError::MalformedResponse("identity check returned no row".into()))?;
    let field = |i: usize| row.get(i).cloned().flatten().unwrap_or_default();
    let mut summary = format!("User={}, Role={}", field(0), field(1));
    match role {
        SessionRole::Dashboard => summary.push_str(&format!(", Warehouse={}", field(2))),
        SessionRole::Assistant => {
            let probe = Statement::new(format!(
                "SELECT {}(?, 'Hello') AS TEST",
                invocation::COMPLETE_FUNCTION
            ))
            .add_binding(DEFAULT_MODEL);
            let result = session.query(&probe).await?;
            let reply = result
                .raw_cells()
                .first()
                .and_then(|row| row.first().cloned().flatten())
                .unwrap_or_default();
            let preview: String = reply.chars().take(50).collect();
            summary.push_str(&format!(", Cortex model test: {}...", preview));
        }
    }
    Ok(summary)
}
