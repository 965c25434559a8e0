//! Dashboard KPIs: a closed set of parameterless aggregate queries.

use crate::errors::{SnowflakeError, SnowflakeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kpi {
    pub name: &'static str,
    pub sql: &'static str,
}

/// Every registered KPI, looked up by name
pub const KPIS: &[Kpi] = &[
    Kpi {
        name: "delinquency",
        sql: "SELECT
    COUNT_IF(dpd_bucket = '30') AS dpd_30_count,
    COUNT_IF(dpd_bucket = '60') AS dpd_60_count,
    COUNT_IF(dpd_bucket = '90+') AS dpd_90_count,
    SUM(IFF(dpd_bucket = '30', upb, NULL)) AS dpd_30_upb,
    SUM(IFF(dpd_bucket = '60', upb, NULL)) AS dpd_60_upb,
    SUM(IFF(dpd_bucket = '90+', upb, NULL)) AS dpd_90_upb
FROM loan_portfolio
WHERE status = 'ACTIVE'",
    },
    Kpi {
        name: "portfolio_overview",
        sql: "SELECT
    COUNT(*) AS total_loans,
    SUM(upb) AS total_upb,
    AVG(upb) AS avg_balance,
    COUNT_IF(current_status = 'CURRENT') * 100.0 / NULLIF(COUNT(*), 0) AS current_pct
FROM loan_portfolio
WHERE status = 'ACTIVE'",
    },
];

pub fn lookup(name: &str) -> SnowflakeResult<&'static Kpi> {
    KPIS.iter()
        .find(|kpi| kpi.name == name)
        .ok_or_else(|| SnowflakeError::UnknownKpi(name.to_owned()))
}

/// Names of every registered KPI
pub fn names() -> impl Iterator<Item = &'static str> {
    KPIS.iter().map(|kpi| kpi.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_closed() {
        assert_eq!(names().collect::<Vec<_>>(), ["delinquency", "portfolio_overview"]);
        assert!(lookup("portfolio_overview").unwrap().sql.contains("total_upb"));
        assert!(matches!(
            lookup("nonexistent_kpi"),
            Err(SnowflakeError::UnknownKpi(name)) if name == "nonexistent_kpi"
        ));
    }

    #[test]
    fn templates_take_no_parameters() {
        for kpi in KPIS {
            assert!(!kpi.sql.contains('?'), "{} has a placeholder", kpi.name);
        }
    }
}
