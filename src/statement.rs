use std::collections::BTreeMap;

use crate::bindings::Binding;

/// Extra time the HTTP client waits beyond a statement's server-side timeout
const CLIENT_TIMEOUT_MARGIN_SECS: u64 = 15;

/// A builder for a SQL statement and its positional bindings
///
/// Statements are transport-neutral: any [`Session`](crate::Session) can run them.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub(crate) sql: String,
    pub(crate) bindings: BTreeMap<String, Binding>,
    pub(crate) timeout: Option<u64>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Statement {
        Statement {
            sql: sql.into(),
            bindings: BTreeMap::new(),
            timeout: None,
        }
    }

    /// Add a binding for the next `?` placeholder
    ///
    /// * All integers are bound as `FIXED`
    /// * `f64` and `f32` are bound as `REAL`
    /// * `bool` is bound as `BOOLEAN`
    /// * `&str`, `String`, `char`, and the `chrono` naive date/time types are bound as `TEXT`
    pub fn add_binding<T: Into<Binding>>(mut self, value: T) -> Statement {
        let position = (self.bindings.len() + 1).to_string();
        self.bindings.insert(position, value.into());
        self
    }

    /// Set the Snowflake-side timeout for the statement
    ///
    /// The client-side timeout is this value plus 15 seconds.
    /// Without one, the server's own statement timeout applies and the client waits indefinitely.
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Statement {
        self.timeout = Some(timeout_seconds);
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bindings keyed by their 1-based position, as sent on the wire
    pub fn bindings(&self) -> &BTreeMap<String, Binding> {
        &self.bindings
    }

    pub fn timeout(&self) -> Option<u64> {
        self.timeout
    }

    pub(crate) fn client_timeout(&self) -> Option<std::time::Duration> {
        self.timeout
            .map(|seconds| std::time::Duration::from_secs(seconds + CLIENT_TIMEOUT_MARGIN_SECS))
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Statement::new(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_are_numbered_from_one() {
        let sql = Statement::new("SELECT * FROM TEST_TABLE WHERE id = ? AND name = ?").add_binding(10);
        assert_eq!(sql.bindings().len(), 1);
        let sql = sql.add_binding("Henry");
        assert_eq!(sql.bindings().len(), 2);
        assert_eq!(sql.bindings()["1"], Binding::from(10));
        assert_eq!(sql.bindings()["2"], Binding::from("Henry"));
    }

    #[test]
    fn no_timeout_unless_asked() {
        let sql = Statement::new("SELECT 1");
        assert_eq!(sql.timeout(), None);
        assert_eq!(sql.client_timeout(), None);
        let sql = sql.with_timeout(5);
        assert_eq!(sql.timeout(), Some(5));
        assert_eq!(sql.client_timeout(), Some(std::time::Duration::from_secs(20)));
    }
}
