use anyhow::Context;
use std::path::Path;
use tracing::info;

use crate::models::query::QueryDescriptor;

/// 读取工作负载文件（QueryDescriptor 的 JSON 数组），顺序即查询编号
pub fn load_workload(path: &Path) -> anyhow::Result<Vec<QueryDescriptor>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read workload file {}", path.display()))?;
    let queries = parse_workload(&text).with_context(|| format!("invalid workload file {}", path.display()))?;
    info!("已加载工作负载: {} 条查询 ({})", queries.len(), path.display());
    Ok(queries)
}

pub fn parse_workload(text: &str) -> anyhow::Result<Vec<QueryDescriptor>> {
    let queries: Vec<QueryDescriptor> = serde_json::from_str(text)?;
    validate_workload(&queries)?;
    Ok(queries)
}

pub fn validate_workload(queries: &[QueryDescriptor]) -> anyhow::Result<()> {
    for (idx, query) in queries.iter().enumerate() {
        query.validate().with_context(|| format!("query q{}", idx + 1))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reference_workload() {
        let text = r#"[
            {"select": ["day", {"SUM": "bid_price"}], "from": "events",
             "where": [{"col": "type", "op": "eq", "val": "impression"}], "group_by": ["day"]},
            {"select": ["advertiser_id", "type", {"COUNT": "*"}], "from": "events",
             "group_by": ["advertiser_id", "type"], "order_by": [{"col": "COUNT(*)", "dir": "desc"}]}
        ]"#;
        let queries = parse_workload(text).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1].group_by, vec!["advertiser_id", "type"]);
    }

    #[test]
    fn reports_offending_query_position() {
        let text = r#"[
            {"select": ["day"], "from": "events"},
            {"select": ["day"], "from": "events e"}
        ]"#;
        let err = parse_workload(text).unwrap_err();
        assert!(format!("{err:#}").contains("query q2"));
    }

    #[test]
    fn star_outside_count_is_rejected() {
        let text = r#"[{"select": ["day", {"SUM": "*"}], "from": "events", "group_by": ["day"]}]"#;
        let err = parse_workload(text).unwrap_err();
        assert!(format!("{err:#}").contains("invalid aggregate `SUM(*)`"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_workload(Path::new("/nonexistent/workload.json")).is_err());
    }
}
