//! Statements that call Cortex functions.
//!
//! Every free-text value (model name, prompts, search text, limits) is passed
//! as a bound parameter. Names that cannot be bound (search service, columns)
//! must be valid Snowflake identifiers and are checked before anything is sent.

use crate::errors::{SnowflakeError, SnowflakeResult};
use crate::statement::Statement;

pub const COMPLETE_FUNCTION: &str = "SNOWFLAKE.CORTEX.COMPLETE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One turn of a chat transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> ChatMessage {
        ChatMessage {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> ChatMessage {
        ChatMessage {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// `SELECT SNOWFLAKE.CORTEX.COMPLETE(model, [messages...]) AS RESPONSE`
///
/// The result is one VARCHAR row holding `{"choices": [{"messages": "..."}], ...}`.
pub fn complete(model: &str, messages: &[ChatMessage]) -> Statement {
    let objects = vec!["OBJECT_CONSTRUCT('role', ?, 'content', ?)"; messages.len()].join(", ");
    let sql = format!("SELECT {COMPLETE_FUNCTION}(?, ARRAY_CONSTRUCT({objects})) AS RESPONSE");
    messages.iter().fold(
        Statement::new(sql).add_binding(model),
        |statement, message| {
            statement
                .add_binding(message.role.as_str())
                .add_binding(message.content.as_str())
        },
    )
}

/// `SELECT 'columns' FROM TABLE(service.SEARCH(query, LIMIT => limit))`
///
/// An empty column list projects every column.
pub fn search(
    service: &str,
    query: &str,
    columns: &[&str],
    limit: usize,
) -> SnowflakeResult<Statement> {
    let service = quote_identifier(service)?;
    let projection = if columns.is_empty() {
        "*".to_owned()
    } else {
        columns
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<SnowflakeResult<Vec<_>>>()?
            .join(", ")
    };
    Ok(Statement::new(format!(
        "SELECT {projection} FROM TABLE({service}.SEARCH(?, LIMIT => ?))"
    ))
    .add_binding(query)
    .add_binding(limit))
}

/// Check a possibly dotted Snowflake identifier and return it ready for SQL text
///
/// Each part is either unquoted (`[A-Za-z_][A-Za-z0-9_$]*`, case-insensitive,
/// left as is) or double-quoted with embedded quotes doubled.
pub fn quote_identifier(name: &str) -> SnowflakeResult<String> {
    let invalid = || SnowflakeError::InvalidIdentifier(name.to_owned());
    let mut parts = Vec::new();
    let mut rest = name.trim();
    if rest.is_empty() {
        return Err(invalid());
    }
    loop {
        let (part, remainder) = if let Some(quoted) = rest.strip_prefix('"') {
            let end = closing_quote(quoted).ok_or_else(invalid)?;
            let inner = &quoted[..end];
            if inner.is_empty() {
                return Err(invalid());
            }
            (&rest[..end + 2], &quoted[end + 1..])
        } else {
            let end = rest.find('.').unwrap_or(rest.len());
            let part = &rest[..end];
            if !is_unquoted_identifier(part) {
                return Err(invalid());
            }
            (part, &rest[end..])
        };
        parts.push(part);
        match remainder.strip_prefix('.') {
            Some(next) => rest = next,
            None if remainder.is_empty() => break,
            None => return Err(invalid()),
        }
    }
    Ok(parts.join("."))
}

/// Byte offset of the quote that closes a quoted identifier, skipping `""` escapes
fn closing_quote(quoted: &str) -> Option<usize> {
    let bytes = quoted.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}

fn is_unquoted_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && part.len() <= 255
}
