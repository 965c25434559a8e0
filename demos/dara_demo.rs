//! Walks through both sessions end to end.
//!
//! ```sh
//! export SNOWFLAKE_ACCOUNT='xy12345.us-east-1'
//! export SNOWFLAKE_USER='your.email@company.com'
//! export SNOWFLAKE_WAREHOUSE=COMPUTE_WH SNOWFLAKE_DATABASE=ANALYTICS_DB \
//!        SNOWFLAKE_SCHEMA=PUBLIC SNOWFLAKE_ROLE=ANALYST_ROLE
//! export CORTEX_USER=CORTEX_USER CORTEX_PAT='sfp_xxxxxxxxxxxxxxxxxx'
//! export CORTEX_WAREHOUSE=CORTEX_WH CORTEX_DATABASE=ANALYTICS_DB \
//!        CORTEX_SCHEMA=CORTEX CORTEX_ROLE=CORTEX_ROLE
//! RUST_LOG=info cargo run --example dara_demo
//! ```
//!
//! Without `SNOWFLAKE_PAT` or `SNOWFLAKE_PRIVATE_KEY_PATH` the dashboard
//! session logs in through the browser.

use light_snowflake_cortex::{
    ConnectionManager, Credential, SessionRole, SnowflakeError, SnowflakeTarget, DEFAULT_MODEL,
};

#[tokio::main]
async fn main() -> Result<(), SnowflakeError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut manager = ConnectionManager::new();

    banner("Dashboard connection");
    let target = SnowflakeTarget::from_env("SNOWFLAKE")?;
    manager
        .connect(SessionRole::Dashboard, &Credential::from_env("SNOWFLAKE"), &target)
        .await?;
    manager.test_connection(SessionRole::Dashboard).await;

    banner("Assistant connection");
    let target = SnowflakeTarget::from_env("CORTEX")?;
    manager
        .connect(SessionRole::Assistant, &Credential::from_env("CORTEX"), &target)
        .await?;
    manager.test_connection(SessionRole::Assistant).await;

    banner("Dashboard KPI");
    match manager.dashboard_kpi("portfolio_overview").await {
        Ok(kpi) => println!("Portfolio overview: {}", serde_json::Value::Object(kpi)),
        Err(e) => log::error!("Error fetching KPI: {}", e),
    }

    banner("Assistant question");
    match manager
        .query_assistant(
            "What are the top 3 strategies to reduce delinquency rates?",
            DEFAULT_MODEL,
            None,
        )
        .await
    {
        Ok(answer) => println!("Assistant: {}", answer),
        Err(e) => log::error!("Error querying the assistant: {}", e),
    }

    banner("Assistant question with data");
    match manager
        .query_assistant_with_data(
            "Analyze the delinquency trends and suggest actions",
            DEFAULT_MODEL,
            Some("SELECT * FROM delinquency_summary LIMIT 10"),
        )
        .await
    {
        Ok(answer) => println!("Context-aware answer: {}", answer),
        Err(e) => log::error!("Error with data question: {}", e),
    }

    manager.close_all().await
}

fn banner(title: &str) {
    println!("\n{}\n{}\n{}", "=".repeat(60), title, "=".repeat(60));
}
