//! Sessions over the SQL API (`/api/v2/statements`).
//!
//! The SQL API is stateless: every request carries its own bearer credential
//! and its own warehouse/database/schema/role, so "closing" one of these
//! sessions only drops the HTTP client.

use std::collections::BTreeMap;
use std::future::Future;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::auth::BearerAuth;
use crate::bindings::Binding;
use crate::errors::{SnowflakeResult, SnowflakeWireResult};
use crate::result::{ColumnType, QueryResult, StringTable};
use crate::session::Session;
use crate::statement::Statement;
use crate::SnowflakeTarget;

#[derive(Debug, Clone)]
pub struct SqlApiSession {
    host: String,
    target: SnowflakeTarget,
    auth: BearerAuth,
    http: reqwest::Client,
}

impl SqlApiSession {
    pub(crate) fn new(target: &SnowflakeTarget, auth: BearerAuth) -> SnowflakeResult<SqlApiSession> {
        Ok(SqlApiSession {
            host: target.host(),
            target: target.clone(),
            auth,
            http: crate::http_client()?,
        })
    }

    fn wire<'a>(&'a self, statement: &'a Statement) -> WireStatement<'a> {
        WireStatement {
            statement: statement.sql(),
            timeout: statement.timeout(),
            database: self.target.database.to_ascii_uppercase(),
            schema: self.target.schema.to_ascii_uppercase(),
            warehouse: self.target.warehouse.to_ascii_uppercase(),
            role: self.target.role.to_ascii_uppercase(),
            bindings: statement.bindings(),
        }
    }

    async fn send(&self, statement: &Statement) -> SnowflakeResult<WireQueryResponse> {
        let wire = self.wire(statement);
        log::debug!(
            "Sending statement: {}",
            serde_json::to_string_pretty(&wire).unwrap_or_default()
        );
        let mut request = self
            .http
            .post(format!(
                "{}/api/v2/statements?nullable=true&requestId={}",
                self.host,
                uuid::Uuid::new_v4()
            ))
            .headers(self.auth.headers()?)
            .json(&wire);
        if let Some(timeout) = statement.client_timeout() {
            request = request.timeout(timeout);
        }
        Ok(request
            .send()
            .await?
            .json::<SnowflakeWireResult<WireQueryResponse>>()
            .await?
            .into_result()?)
    }

    /// Fetch one of the partitions after the first, which arrives with the response
    async fn partition(&self, status_url: &str, index: usize) -> SnowflakeResult<StringTable> {
        log::debug!("Fetching partition {} of {}", index, status_url);
        let response = self
            .http
            .get(format!("{}{}", self.host, status_url))
            .headers(self.auth.headers()?)
            .query(&[("partition", index)])
            .send()
            .await?
            .json::<SnowflakeWireResult<WirePartitionResponse>>()
            .await?
            .into_result()?;
        Ok(response.data)
    }
}

#[async_trait]
impl Session for SqlApiSession {
    /// Run the statement and concatenate every partition of the result
    ///
    /// Partitions are fetched one at a time, in order.
    async fn query(&self, statement: &Statement) -> SnowflakeResult<QueryResult> {
        let response = self.send(statement).await?;
        let status_url = response.statement_status_url.clone();
        let status_url = status_url.as_str();
        gather_partitions(response, |index| self.partition(status_url, index)).await
    }

    async fn close(self) -> SnowflakeResult<()> {
        log::debug!("Dropping SQL API session for {}", self.target.user);
        Ok(())
    }
}

/// Append partitions `1..n` to the first one, fetching them in order
async fn gather_partitions<F, Fut>(
    response: WireQueryResponse,
    fetch: F,
) -> SnowflakeResult<QueryResult>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = SnowflakeResult<StringTable>>,
{
    let meta = response.result_set_meta_data;
    let partitions = meta.partition_info.len();
    let mut data = response.data;
    if partitions > 1 {
        let rest: Vec<StringTable> = futures::stream::iter(1..partitions)
            .map(fetch)
            .buffered(1)
            .try_collect()
            .await?;
        data.reserve(meta.num_rows.saturating_sub(data.len()));
        data.extend(rest.into_iter().flatten());
    }
    Ok(QueryResult::new(meta.row_type, data))
}

//
// Wire types
//

#[derive(Serialize, Debug)]
struct WireStatement<'a> {
    statement: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
    database: String,
    schema: String,
    warehouse: String,
    role: String,
    bindings: &'a BTreeMap<String, Binding>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireStatementMetaData {
    #[serde(default)]
    num_rows: usize,
    row_type: Vec<ColumnType>,
    // Only the number of partitions matters
    #[serde(default)]
    partition_info: Vec<serde::de::IgnoredAny>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireQueryResponse {
    result_set_meta_data: WireStatementMetaData,
    #[serde(default)]
    data: StringTable,
    #[serde(default)]
    statement_status_url: String,
}

#[derive(Deserialize, Debug)]
struct WirePartitionResponse {
    data: StringTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> SnowflakeTarget {
        SnowflakeTarget {
            account: "xy12345.us-east-1".into(),
            user: "cortex_user".into(),
            warehouse: "cortex_wh".into(),
            database: "analytics_db".into(),
            schema: "cortex".into(),
            role: "cortex_role".into(),
        }
    }

    #[test]
    fn wire_statement_uppercases_context_and_carries_bindings() -> SnowflakeResult<()> {
        let session = SqlApiSession::new(
            &target(),
            BearerAuth::ProgrammaticAccessToken("sfp_x".into()),
        )?;
        let statement = Statement::new("SELECT ?").add_binding("O'Brien");
        let wire = serde_json::to_value(session.wire(&statement))?;
        assert_eq!(wire["database"], "ANALYTICS_DB");
        assert_eq!(wire["schema"], "CORTEX");
        assert_eq!(wire["warehouse"], "CORTEX_WH");
        assert_eq!(wire["role"], "CORTEX_ROLE");
        assert!(wire.get("timeout").is_none());
        assert_eq!(wire["statement"], "SELECT ?");
        assert_eq!(wire["bindings"]["1"]["value"], "O'Brien");
        assert_eq!(session.host, "https://xy12345.us-east-1.snowflakecomputing.com");

        let wire = serde_json::to_value(session.wire(&statement.with_timeout(600)))?;
        assert_eq!(wire["timeout"], 600);
        Ok(())
    }

    fn three_rows_in_two_partitions() -> SnowflakeResult<WireQueryResponse> {
        let wire: SnowflakeWireResult<WireQueryResponse> = serde_json::from_str(
            r#"{
                "resultSetMetaData": {
                    "numRows": 3,
                    "format": "jsonv2",
                    "partitionInfo": [{"rowCount": 2}, {"rowCount": 1}],
                    "rowType": [{"name": "IX", "database": "", "schema": "", "table": "",
                                 "type": "fixed", "precision": 38, "scale": 0, "nullable": false}]
                },
                "data": [["0"], ["1"]],
                "code": "090001",
                "statementStatusUrl": "/api/v2/statements/01b2?requestId=abc",
                "requestId": "abc",
                "sqlState": "00000",
                "statementHandle": "01b2",
                "message": "Statement executed successfully.",
                "createdOn": 1700000000000
            }"#,
        )?;
        wire.into_result()
    }

    #[tokio::test]
    async fn later_partitions_are_appended_in_order() -> SnowflakeResult<()> {
        let response = three_rows_in_two_partitions()?;
        assert_eq!(response.result_set_meta_data.num_rows, 3);
        assert_eq!(response.data.len(), 2);

        let mut requested = Vec::new();
        let result = gather_partitions(response, |index| {
            requested.push(index);
            futures::future::ready(Ok(vec![vec![Some("2".to_owned())]]))
        })
        .await?;
        assert_eq!(requested, [1]);
        assert_eq!(result.num_rows(), 3);
        let ix: Vec<i64> = result
            .records()
            .iter()
            .map(|record| record["IX"].as_i64().unwrap())
            .collect();
        assert_eq!(ix, [0, 1, 2]);
        Ok(())
    }

    #[tokio::test]
    async fn failed_partition_fetch_fails_the_query() -> SnowflakeResult<()> {
        let response = three_rows_in_two_partitions()?;
        let result = gather_partitions(response, |_| {
            futures::future::ready(Err(crate::SnowflakeError::ServerError {
                code: "000709".into(),
                message: "Statement not found".into(),
            }))
        })
        .await;
        assert!(matches!(result, Err(crate::SnowflakeError::ServerError { ref code, .. }) if code == "000709"));
        Ok(())
    }

    #[tokio::test]
    async fn single_partition_needs_no_fetch() -> SnowflakeResult<()> {
        let mut response = three_rows_in_two_partitions()?;
        response.result_set_meta_data.partition_info.truncate(1);
        let result = gather_partitions(response, |_| {
            futures::future::ready(Err(crate::SnowflakeError::UnsupportedFeature("fetch")))
        })
        .await?;
        assert_eq!(result.num_rows(), 2);
        Ok(())
    }

    #[test]
    fn rejected_jwt_is_a_server_error() {
        let wire: SnowflakeWireResult<WireQueryResponse> = serde_json::from_str(
            r#"{"code": "390144", "message": "JWT token is invalid. [abc]"}"#,
        )
        .unwrap();
        assert!(matches!(
            wire.into_result(),
            Err(crate::SnowflakeError::ServerError { .. })
        ));
    }
}
