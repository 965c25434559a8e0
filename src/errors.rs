use serde::de::DeserializeOwned;

use crate::session::SessionRole;

#[derive(thiserror::Error, Debug)]
pub enum SnowflakeError {
    #[error(transparent)]
    Token(#[from] jwt_simple::Error),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("Snowflake server error: {code}: {message}")]
    ServerError { code: String, message: String },
    #[error(transparent)]
    JSONError(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(&'static str),
    #[error(transparent)]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
    #[error("{0} session is not connected")]
    NotConnected(SessionRole),
    #[error("Both dashboard and assistant sessions are required")]
    BothConnectionsRequired,
    #[error("Invalid credential format: {0}")]
    InvalidCredentialFormat(String),
    #[error("Failed to load private key: {0}")]
    KeyLoad(String),
    #[error("Unknown KPI: {0}")]
    UnknownKpi(String),
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("Missing configuration: {0}")]
    MissingConfig(String),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Browser login failed: {0}")]
    BrowserLogin(String),
}

pub type SnowflakeResult<T> = Result<T, SnowflakeError>;

/// Body of a SQL API v2 response, which is either the payload or an error object
#[derive(serde::Deserialize, Debug)]
#[serde(untagged)]
pub enum SnowflakeWireResult<T> {
    Ok(T),
    Error { code: String, message: String },
}

impl<T> SnowflakeWireResult<T> {
    /// Convert from the custom wire format to a standard result
    pub fn into_result(self) -> SnowflakeResult<T> {
        match self {
            SnowflakeWireResult::Error { code, message } => {
                Err(SnowflakeError::ServerError { code, message })
            }
            SnowflakeWireResult::Ok(t) => Ok(t),
        }
    }
}

/// The `{data, success, message, code}` envelope used by the session
/// login and query-request endpoints.
///
/// `data` is kept untyped because failed responses put something else there.
#[derive(serde::Deserialize, Debug)]
pub struct WireEnvelope {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl WireEnvelope {
    pub fn into_data<T: DeserializeOwned>(self) -> SnowflakeResult<T> {
        if !self.success {
            return Err(SnowflakeError::ServerError {
                code: self.code.unwrap_or_default(),
                message: self.message.unwrap_or_default(),
            });
        }
        let data = self.data.ok_or_else(|| {
            SnowflakeError::MalformedResponse("successful response without data".into())
        })?;
        Ok(serde_json::from_value(data)?)
    }
}
