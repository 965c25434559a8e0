//! Browser-based single sign-on and the session-token query API.
//!
//! The login dance:
//!
//! 1. listen on a loopback port,
//! 2. ask `/session/authenticator-request` for an SSO URL and a proof key,
//! 3. send the user to the SSO URL; the identity provider finally redirects
//!    the browser to `http://localhost:<port>/?token=...`,
//! 4. trade token + proof key at `/session/v1/login-request` for a session token.
//!
//! Statements then go to `/queries/v1/query-request` with
//! `Authorization: Snowflake Token="..."`, and closing the session deletes it
//! on the server.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::bindings::Binding;
use crate::credentials::Authenticator;
use crate::errors::{SnowflakeError, SnowflakeResult, WireEnvelope};
use crate::result::{ColumnType, QueryResult, StringTable};
use crate::session::Session;
use crate::statement::Statement;
use crate::SnowflakeTarget;

const CLIENT_APP_ID: &str = env!("CARGO_PKG_NAME");
const CLIENT_APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const SNOWFLAKE_ACCEPT: &str = "application/snowflake";

const SUCCESS_PAGE: &str = "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"/>\
<title>SAML Response for Snowflake</title></head><body>\
Your identity was confirmed and propagated to Snowflake. \
You can close this window now and go back where you started from.</body></html>";

pub struct BrowserSession {
    host: String,
    user: String,
    token: String,
    http: reqwest::Client,
    sequence: AtomicU64,
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession")
            .field("host", &self.host)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireAuthenticatorResponse {
    sso_url: String,
    proof_key: String,
}

#[derive(Deserialize, Debug)]
struct WireLoginResponse {
    token: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireQueryRequest<'a> {
    sql_text: &'a str,
    async_exec: bool,
    sequence_id: u64,
    #[serde(skip_serializing_if = "no_bindings")]
    bindings: &'a BTreeMap<String, Binding>,
}

fn no_bindings(bindings: &&BTreeMap<String, Binding>) -> bool {
    bindings.is_empty()
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireQueryData {
    #[serde(default)]
    rowtype: Vec<ColumnType>,
    #[serde(default)]
    rowset: StringTable,
    #[serde(default)]
    chunks: Vec<serde::de::IgnoredAny>,
    #[serde(default)]
    query_result_format: Option<String>,
}

impl WireQueryData {
    fn into_result(self) -> SnowflakeResult<QueryResult> {
        if matches!(self.query_result_format.as_deref(), Some(format) if !format.eq_ignore_ascii_case("json"))
        {
            return Err(SnowflakeError::UnsupportedFeature("Arrow-encoded query results"));
        }
        if !self.chunks.is_empty() {
            return Err(SnowflakeError::UnsupportedFeature("chunked query results"));
        }
        Ok(QueryResult::new(self.rowtype, self.rowset))
    }
}

impl BrowserSession {
    /// Run the external-browser login and open a session
    ///
    /// This waits until the identity provider redirects back, however long that takes.
    pub(crate) async fn login(
        target: &SnowflakeTarget,
        authenticator: &Authenticator,
    ) -> SnowflakeResult<BrowserSession> {
        if let Authenticator::IdentityProvider(url) = authenticator {
            log::warn!("Identity-provider login through {} is not supported", url);
            return Err(SnowflakeError::UnsupportedFeature(
                "identity-provider URL authenticators; use the external browser",
            ));
        }
        let host = target.host();
        let http = crate::http_client()?;
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();

        let sso: WireAuthenticatorResponse = http
            .post(format!("{}/session/authenticator-request", host))
            .json(&json!({
                "data": {
                    "ACCOUNT_NAME": target.account_name(),
                    "LOGIN_NAME": target.user,
                    "AUTHENTICATOR": Authenticator::ExternalBrowser.wire_name(),
                    "BROWSER_MODE_REDIRECT_PORT": port.to_string(),
                    "CLIENT_APP_ID": CLIENT_APP_ID,
                    "CLIENT_APP_VERSION": CLIENT_APP_VERSION,
                }
            }))
            .send()
            .await?
            .json::<WireEnvelope>()
            .await?
            .into_data()?;
        if sso.sso_url.is_empty() || sso.proof_key.is_empty() {
            return Err(SnowflakeError::BrowserLogin(
                "authenticator request returned no SSO URL".into(),
            ));
        }

        open_browser(&sso.sso_url);
        log::info!("Waiting for SSO redirect on port {}", port);
        let token = receive_redirect_token(&listener).await?;

        let login: WireLoginResponse = http
            .post(format!("{}/session/v1/login-request", host))
            .query(&[
                ("requestId", uuid::Uuid::new_v4().to_string()),
                ("warehouse", target.warehouse.to_ascii_uppercase()),
                ("databaseName", target.database.to_ascii_uppercase()),
                ("schemaName", target.schema.to_ascii_uppercase()),
                ("roleName", target.role.to_ascii_uppercase()),
            ])
            .header(ACCEPT, SNOWFLAKE_ACCEPT)
            .json(&json!({
                "data": {
                    "ACCOUNT_NAME": target.account_name(),
                    "LOGIN_NAME": target.user,
                    "AUTHENTICATOR": Authenticator::ExternalBrowser.wire_name(),
                    "TOKEN": token,
                    "PROOF_KEY": sso.proof_key,
                    "CLIENT_APP_ID": CLIENT_APP_ID,
                    "CLIENT_APP_VERSION": CLIENT_APP_VERSION,
                }
            }))
            .send()
            .await?
            .json::<WireEnvelope>()
            .await?
            .into_data()?;

        Ok(BrowserSession {
            host,
            user: target.user.clone(),
            token: login.token,
            http,
            sequence: AtomicU64::new(0),
        })
    }

    fn headers(&self) -> SnowflakeResult<HeaderMap> {
        let mut authorization: HeaderValue =
            format!("Snowflake Token=\"{}\"", self.token).parse()?;
        authorization.set_sensitive(true);
        let mut headers = HeaderMap::with_capacity(2);
        headers.append(AUTHORIZATION, authorization);
        headers.append(ACCEPT, SNOWFLAKE_ACCEPT.parse()?);
        Ok(headers)
    }
}

#[async_trait]
impl Session for BrowserSession {
    async fn query(&self, statement: &Statement) -> SnowflakeResult<QueryResult> {
        let request = WireQueryRequest {
            sql_text: statement.sql(),
            async_exec: false,
            sequence_id: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            bindings: statement.bindings(),
        };
        log::debug!(
            "Sending query request: {}",
            serde_json::to_string_pretty(&request).unwrap_or_default()
        );
        let mut http_request = self
            .http
            .post(format!("{}/queries/v1/query-request", self.host))
            .query(&[("requestId", uuid::Uuid::new_v4().to_string())])
            .headers(self.headers()?)
            .json(&request);
        if let Some(timeout) = statement.client_timeout() {
            http_request = http_request.timeout(timeout);
        }
        http_request
            .send()
            .await?
            .json::<WireEnvelope>()
            .await?
            .into_data::<WireQueryData>()?
            .into_result()
    }

    async fn close(self) -> SnowflakeResult<()> {
        log::debug!("Deleting SSO session for {}", self.user);
        let envelope = self
            .http
            .post(format!("{}/session", self.host))
            .query(&[("delete", "true")])
            .headers(self.headers()?)
            .send()
            .await?
            .json::<WireEnvelope>()
            .await?;
        if envelope.success {
            Ok(())
        } else {
            Err(SnowflakeError::ServerError {
                code: envelope.code.unwrap_or_default(),
                message: envelope.message.unwrap_or_default(),
            })
        }
    }
}

/// Send the user to the SSO page, or ask them to go there themselves
fn open_browser(sso_url: &str) {
    log::info!("Opening a browser for SSO login");
    if let Err(e) = webbrowser::open(sso_url) {
        log::warn!(
            "Could not open a browser ({}). Open this URL to continue the login: {}",
            e,
            sso_url
        );
    }
}

/// Accept loopback connections until one carries the SSO `token`
async fn receive_redirect_token(listener: &TcpListener) -> SnowflakeResult<String> {
    loop {
        let (mut stream, peer) = listener.accept().await?;
        let request = read_request_head(&mut stream).await?;
        match redirect_token(&request) {
            Some(token) => {
                respond(&mut stream, "200 OK", SUCCESS_PAGE).await?;
                return Ok(token);
            }
            None => {
                log::debug!("Ignoring loopback request from {} without a token", peer);
                respond(&mut stream, "400 Bad Request", "").await?;
            }
        }
    }
}

async fn read_request_head(stream: &mut TcpStream) -> SnowflakeResult<String> {
    let mut buffer = Vec::with_capacity(4096);
    let mut chunk = [0u8; 1024];
    loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() > 64 * 1024 {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> SnowflakeResult<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Pull `token` out of a request line like `GET /?token=abc HTTP/1.1`
fn redirect_token(request: &str) -> Option<String> {
    let target = request.lines().next()?.split_whitespace().nth(1)?;
    let url = reqwest::Url::parse("http://localhost").ok()?.join(target).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}
