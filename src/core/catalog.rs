use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::core::builder::analyze_workload;
use crate::core::ddl::build_statements;
use crate::core::dialect::SqlDialect;
use crate::core::merger::merge_specs;
use crate::models::query::QueryDescriptor;
use crate::models::summary::SummarySpec;

/// 一次构建产出的汇总表规格快照，构建后只读，以 Arc 在请求间共享
#[derive(Debug, Clone, Serialize)]
pub struct SpecCatalog {
    pub build_id: Uuid,
    pub built_at: DateTime<Utc>,
    pub workload_size: usize,
    specs: Vec<SummarySpec>,
}

impl SpecCatalog {
    pub fn build(workload: &[QueryDescriptor]) -> Self {
        Self::from_specs(merge_specs(analyze_workload(workload)), workload.len())
    }

    pub fn from_specs(specs: Vec<SummarySpec>, workload_size: usize) -> Self {
        Self {
            build_id: Uuid::new_v4(),
            built_at: Utc::now(),
            workload_size,
            specs,
        }
    }

    pub fn empty() -> Self {
        Self::from_specs(Vec::new(), 0)
    }

    pub fn specs(&self) -> &[SummarySpec] {
        &self.specs
    }

    /// 物理表名追加构建编号后缀 (`_b<build_id 前 8 位>`)，不同构建的汇总表互不覆盖
    pub fn versioned(mut self) -> Self {
        let suffix = self.build_suffix();
        for spec in &mut self.specs {
            let name = format!("{}_{suffix}", spec.table_name());
            spec.rename(name);
        }
        self
    }

    pub fn build_suffix(&self) -> String {
        let id = self.build_id.simple().to_string();
        format!("b{}", &id[..8])
    }

    pub fn ddl_statements(&self, dialect: SqlDialect) -> Vec<String> {
        build_statements(&self.specs, dialect)
    }

    /// 可直接执行的建表脚本
    pub fn ddl_script(&self, dialect: SqlDialect) -> String {
        let mut script = format!(
            "-- summary tables, build {} ({} specs from {} queries)\n",
            self.build_id,
            self.specs.len(),
            self.workload_size
        );
        for stmt in self.ddl_statements(dialect) {
            script.push_str(&stmt);
            script.push_str(";\n");
        }
        script
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workload() -> Vec<QueryDescriptor> {
        serde_json::from_value(json!([
            {"select": ["day", {"SUM": "bid_price"}], "from": "events",
             "where": [{"col": "type", "op": "eq", "val": "impression"}], "group_by": ["day"]},
            {"select": ["day", {"COUNT": "*"}], "from": "events",
             "where": [{"col": "type", "op": "eq", "val": "impression"}], "group_by": ["day"]},
            {"select": ["type"], "from": "events"}
        ]))
        .unwrap()
    }

    #[test]
    fn build_merges_and_indexes_by_table_name() {
        let catalog = SpecCatalog::build(&workload());
        assert_eq!(catalog.specs().len(), 2);
        assert_eq!(catalog.workload_size, 3);
        let names: Vec<&str> = catalog.specs().iter().map(SummarySpec::table_name).collect();
        assert_eq!(names, vec!["summary_q1_merged_day", "summary_q3_distinct_type"]);
    }

    #[test]
    fn versioned_builds_never_share_table_names() {
        let first = SpecCatalog::build(&workload()).versioned();
        let second = SpecCatalog::build(&workload()).versioned();

        let suffix = first.build_suffix();
        assert_eq!(suffix.len(), 9);
        assert_eq!(first.specs()[0].table_name(), format!("summary_q1_merged_day_{suffix}"));

        let first_names: Vec<&str> = first.specs().iter().map(SummarySpec::table_name).collect();
        assert!(second.specs().iter().all(|s| !first_names.contains(&s.table_name())));

        // DDL 与改写都使用带后缀的物理表名
        let ddl = first.ddl_statements(SqlDialect::DuckDb);
        assert!(ddl[0].starts_with(&format!("CREATE OR REPLACE TABLE summary_q1_merged_day_{suffix} AS")));
    }

    #[test]
    fn rebuilding_same_workload_yields_identical_specs() {
        let a = SpecCatalog::build(&workload());
        let b = SpecCatalog::build(&workload());
        assert_eq!(a.specs(), b.specs());
        assert_ne!(a.build_id, b.build_id);
        assert_eq!(a.ddl_statements(SqlDialect::DuckDb), b.ddl_statements(SqlDialect::DuckDb));
    }

    #[test]
    fn ddl_script_terminates_statements() {
        let script = SpecCatalog::build(&workload()).ddl_script(SqlDialect::Postgres);
        assert_eq!(script.matches(";\n").count(), 4);
        assert!(script.contains("DROP TABLE IF EXISTS summary_q1_merged_day;"));
    }

    #[test]
    fn empty_catalog_has_no_specs() {
        let catalog = SpecCatalog::empty();
        assert!(catalog.specs().is_empty());
        assert!(catalog.ddl_statements(SqlDialect::DuckDb).is_empty());
    }
}
