//! Tests against a real account. Run with `cargo test --features live-tests`.
//!
//! Dashboard settings come from `SNOWFLAKE_*` (key-pair auth via
//! `SNOWFLAKE_PRIVATE_KEY_PATH`), assistant settings from `CORTEX_*`
//! (`CORTEX_PAT`). `CORTEX_SEARCH_SERVICE` enables the search test.

use crate::{
    Cell, ConnectionManager, Connector, Credential, Session, SessionRole, SnowflakeConnector,
    SnowflakeResult, SnowflakeTarget, Statement, DEFAULT_MODEL,
};

fn setup(prefix: &str) -> (SnowflakeTarget, Credential) {
    let _ = env_logger::try_init();
    let target = SnowflakeTarget::from_env(prefix).expect("target not configured");
    let credential = Credential::from_env(prefix);
    assert!(
        !matches!(credential, Credential::Sso { .. }),
        "live tests need {prefix}_PAT or {prefix}_PRIVATE_KEY_PATH"
    );
    (target, credential)
}

async fn manager() -> SnowflakeResult<ConnectionManager> {
    let mut manager = ConnectionManager::new();
    let (target, credential) = setup("SNOWFLAKE");
    manager
        .connect(SessionRole::Dashboard, &credential, &target)
        .await?;
    let (target, credential) = setup("CORTEX");
    manager
        .connect(SessionRole::Assistant, &credential, &target)
        .await?;
    Ok(manager)
}

#[tokio::test]
async fn can_login_and_select() -> SnowflakeResult<()> {
    let (target, credential) = setup("SNOWFLAKE");
    let session = SnowflakeConnector.connect(&target, &credential).await?;
    let result = session
        .query(&Statement::new("SELECT 1, ?::varchar").add_binding("it's"))
        .await?;
    let cells = result.cells();
    assert_eq!(cells.len(), 1);
    assert!(matches!(cells[0][0], Cell::Int(1)));
    assert!(matches!(cells[0][1], Cell::Varchar(ref x) if x == "it's"));
    session.close().await
}

#[tokio::test]
async fn can_gather_many_partitions() -> SnowflakeResult<()> {
    let (target, credential) = setup("SNOWFLAKE");
    let session = SnowflakeConnector.connect(&target, &credential).await?;
    let result = session
        .query(&Statement::new(
            "SELECT seq4() AS ix FROM table(generator(rowcount => 100000))",
        ))
        .await?;
    assert_eq!(result.num_rows(), 100000);
    for (ix, record) in result.records().into_iter().enumerate() {
        assert_eq!(record["IX"].as_i64().unwrap(), ix as i64);
    }
    Ok(())
}

#[tokio::test]
async fn both_sessions_pass_smoke_tests() -> SnowflakeResult<()> {
    let mut manager = manager().await?;
    assert!(manager.test_connection(SessionRole::Dashboard).await);
    assert!(manager.test_connection(SessionRole::Assistant).await);
    manager.close_all().await?;
    manager.close_all().await
}

#[tokio::test]
async fn assistant_answers_questions_with_quotes() -> SnowflakeResult<()> {
    let mut manager = manager().await?;
    let answer = manager
        .query_assistant("What's a borrower's 'days past due'? One sentence.", DEFAULT_MODEL, None)
        .await?;
    assert!(!answer.is_empty());
    assert!(!answer.text().is_empty());
    manager.close_all().await
}

#[tokio::test]
async fn assistant_sees_dashboard_data() -> SnowflakeResult<()> {
    let mut manager = manager().await?;
    let answer = manager
        .query_assistant_with_data(
            "How many rows are in this data? Answer with a number.",
            DEFAULT_MODEL,
            Some("SELECT seq4() AS ix FROM table(generator(rowcount => 3))"),
        )
        .await?;
    assert!(!answer.is_empty());
    manager.close_all().await
}

#[tokio::test]
async fn search_respects_limit() -> SnowflakeResult<()> {
    let Ok(service) = std::env::var("CORTEX_SEARCH_SERVICE") else {
        return Ok(());
    };
    let mut manager = manager().await?;
    let hits = manager.search(&service, "foreclosure process", &[], 2).await?;
    assert!(hits.len() <= 2);
    manager.close_all().await
}
