use tracing::{debug, info, instrument};

use crate::models::query::{Operator, QueryDescriptor};
use crate::models::summary::{AggregateSummary, AggregationSpec, ConstantFilter, DistinctSummary, SummarySpec};

/// 分析工作负载，为每条可预聚合的查询生成一份汇总表规格
///
/// 查询编号从 1 开始，按工作负载顺序分配；输出顺序与输入一致。
/// 无 GROUP BY 的标量聚合与空投影不生成规格，运行期回退到原始表。
#[instrument(skip_all, fields(queries = queries.len()))]
pub fn analyze_workload(queries: &[QueryDescriptor]) -> Vec<SummarySpec> {
    let mut specs = Vec::new();

    for (idx, query) in queries.iter().enumerate() {
        let query_id = idx + 1;
        if !query.group_by.is_empty() {
            specs.push(SummarySpec::Aggregate(aggregate_spec(query, query_id)));
        } else if query.is_projection() {
            match distinct_spec(query, query_id) {
                Some(spec) => specs.push(SummarySpec::Distinct(spec)),
                None => debug!("查询 q{} 投影为空，跳过", query_id),
            }
        } else {
            debug!("查询 q{} 为无分组标量聚合，不生成汇总表", query_id);
        }
    }

    info!("工作负载分析完成，生成 {} 个汇总表规格", specs.len());
    specs
}

/// GROUP BY 查询 -> 聚合汇总表
///
/// 1. 查询本身的 GROUP BY 列原样保留，落在这些列上的过滤留到查询期
/// 2. 其余列上只要出现非等值条件 (BETWEEN/</>/IN...)，该列提升为汇总维度
/// 3. 剩下的等值条件在建表时预先应用
pub fn aggregate_spec(query: &QueryDescriptor, query_id: usize) -> AggregateSummary {
    let query_group_by = dedup(query.group_by.iter().cloned());
    let mut summary_group_by = query_group_by.clone();
    let mut filter_dimensions = Vec::new();

    // 先确定需要提升的维度，保证同一列不会同时被预过滤
    for pred in &query.filters {
        if query_group_by.contains(&pred.column) || pred.operator() == Operator::Eq {
            continue;
        }
        if !summary_group_by.contains(&pred.column) {
            summary_group_by.push(pred.column.clone());
            filter_dimensions.push(pred.column.clone());
        }
    }

    let mut constant_filters: Vec<ConstantFilter> = Vec::new();
    for pred in &query.filters {
        if summary_group_by.contains(&pred.column) {
            continue;
        }
        if let Some(value) = pred.eq_value() {
            let filter = ConstantFilter { column: pred.column.clone(), value: value.clone() };
            if !constant_filters.contains(&filter) {
                constant_filters.push(filter);
            }
        }
    }

    let mut aggregations: Vec<AggregationSpec> = Vec::new();
    for agg in query.aggregations() {
        if !aggregations.iter().any(|a| a.matches(agg)) {
            aggregations.push(AggregationSpec::new(agg));
        }
    }

    let table_name = summary_table_name(query_id, &summary_group_by, false);
    debug!(
        "q{} -> {}: 维度 {:?}, 预过滤 {} 个, 提升维度 {:?}",
        query_id,
        table_name,
        summary_group_by,
        constant_filters.len(),
        filter_dimensions
    );

    AggregateSummary {
        table_name,
        source_table: query.source_table.clone(),
        query_group_by,
        summary_group_by,
        aggregations,
        constant_filters,
        filter_dimensions,
        source_query_ids: vec![query_id],
    }
}

/// 非聚合投影 -> SELECT DISTINCT 汇总表
///
/// 等值条件预先应用；非等值条件的列并入 DISTINCT，保留查询期过滤所需的基数。
pub fn distinct_spec(query: &QueryDescriptor, query_id: usize) -> Option<DistinctSummary> {
    let select_columns = dedup(query.projected_columns().map(str::to_string));
    if select_columns.is_empty() {
        return None;
    }

    let mut constant_filters: Vec<ConstantFilter> = Vec::new();
    let mut filter_columns: Vec<String> = Vec::new();
    for pred in &query.filters {
        match pred.eq_value() {
            Some(value) => {
                let filter = ConstantFilter { column: pred.column.clone(), value: value.clone() };
                if !constant_filters.contains(&filter) {
                    constant_filters.push(filter);
                }
            }
            None => {
                if !select_columns.contains(&pred.column) && !filter_columns.contains(&pred.column) {
                    filter_columns.push(pred.column.clone());
                }
            }
        }
    }

    let mut sorted = select_columns.clone();
    sorted.sort();
    let table_name = format!("summary_q{}_distinct_{}", query_id, sorted.join("_"));

    Some(DistinctSummary {
        table_name,
        source_table: query.source_table.clone(),
        select_columns,
        filter_columns,
        constant_filters,
        source_query_ids: vec![query_id],
    })
}

/// `summary_q<id>_<排序后的维度>`，合并表为 `summary_q<id>_merged_<维度>`
pub fn summary_table_name(first_query_id: usize, group_by: &[String], merged: bool) -> String {
    let mut parts = vec!["summary".to_string(), format!("q{first_query_id}")];
    if merged {
        parts.push("merged".to_string());
    }
    if group_by.is_empty() {
        parts.push("all".to_string());
    } else {
        let mut dims = group_by.to_vec();
        dims.sort();
        parts.extend(dims);
    }
    parts.join("_")
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::query::{AggFunc, Scalar};
    use serde_json::{json, Value};

    fn query(v: Value) -> QueryDescriptor {
        serde_json::from_value(v).unwrap()
    }

    fn aggregate(spec: &SummarySpec) -> &AggregateSummary {
        match spec {
            SummarySpec::Aggregate(s) => s,
            other => panic!("expected aggregate spec, got {other:?}"),
        }
    }

    #[test]
    fn equality_filter_is_pre_applied() {
        let specs = analyze_workload(&[query(json!({
            "select": ["day", {"SUM": "bid_price"}],
            "from": "events",
            "where": [{"col": "type", "op": "eq", "val": "impression"}],
            "group_by": ["day"]
        }))]);

        let s = aggregate(&specs[0]);
        assert_eq!(s.table_name, "summary_q1_day");
        assert_eq!(s.summary_group_by, vec!["day"]);
        assert_eq!(s.constant_filters, vec![ConstantFilter { column: "type".into(), value: "impression".into() }]);
        assert!(s.filter_dimensions.is_empty());
        assert_eq!(s.aggregations[0].alias, "sum_bid_price");
    }

    #[test]
    fn range_filter_promotes_dimension() {
        let specs = analyze_workload(&[query(json!({
            "select": ["publisher_id", {"SUM": "bid_price"}],
            "from": "events",
            "where": [
                {"col": "type", "op": "eq", "val": "impression"},
                {"col": "country", "op": "eq", "val": "JP"},
                {"col": "day", "op": "between", "val": ["2024-10-20", "2024-10-23"]}
            ],
            "group_by": ["publisher_id"]
        }))]);

        let s = aggregate(&specs[0]);
        assert_eq!(s.query_group_by, vec!["publisher_id"]);
        assert_eq!(s.summary_group_by, vec!["publisher_id", "day"]);
        assert_eq!(s.filter_dimensions, vec!["day"]);
        assert_eq!(s.constant_filters.len(), 2);
        assert_eq!(s.table_name, "summary_q1_day_publisher_id");
    }

    #[test]
    fn filter_on_group_by_column_is_left_for_query_time() {
        let specs = analyze_workload(&[query(json!({
            "select": ["country", {"COUNT": "*"}],
            "from": "events",
            "where": [{"col": "country", "op": "in", "val": ["US", "JP"]}],
            "group_by": ["country"]
        }))]);

        let s = aggregate(&specs[0]);
        assert_eq!(s.summary_group_by, vec!["country"]);
        assert!(s.constant_filters.is_empty());
        assert!(s.filter_dimensions.is_empty());
        assert_eq!(s.aggregations[0].alias, "count_count");
    }

    #[test]
    fn promoted_column_is_never_pre_applied() {
        let specs = analyze_workload(&[query(json!({
            "select": ["minute", {"SUM": "bid_price"}],
            "from": "events",
            "where": [
                {"col": "day", "op": "eq", "val": "2024-06-01"},
                {"col": "day", "op": "gte", "val": "2024-05-01"}
            ],
            "group_by": ["minute"]
        }))]);

        let s = aggregate(&specs[0]);
        assert_eq!(s.filter_dimensions, vec!["day"]);
        assert!(s.constant_filters.is_empty());
    }

    #[test]
    fn duplicate_aggregations_are_collapsed() {
        let specs = analyze_workload(&[query(json!({
            "select": ["day", {"SUM": "x"}, {"sum": "x"}, {"AVG": "x"}],
            "from": "events",
            "group_by": ["day"]
        }))]);

        let aliases: Vec<_> = aggregate(&specs[0]).aggregations.iter().map(|a| a.alias.as_str()).collect();
        assert_eq!(aliases, vec!["sum_x", "avg_x"]);
    }

    #[test]
    fn projection_builds_distinct_spec() {
        let specs = analyze_workload(&[query(json!({
            "select": ["type", "advertiser_id"],
            "from": "events",
            "where": [
                {"col": "country", "op": "eq", "val": "US"},
                {"col": "day", "op": "between", "val": ["2024-01-01", "2024-01-31"]},
                {"col": "type", "op": "in", "val": ["click", "purchase"]}
            ]
        }))]);

        match &specs[0] {
            SummarySpec::Distinct(s) => {
                assert_eq!(s.table_name, "summary_q1_distinct_advertiser_id_type");
                assert_eq!(s.select_columns, vec!["type", "advertiser_id"]);
                assert_eq!(s.filter_columns, vec!["day"]);
                assert_eq!(s.constant_filters[0].value, Scalar::Text("US".into()));
            }
            other => panic!("expected distinct spec, got {other:?}"),
        }
    }

    #[test]
    fn scalar_aggregates_and_empty_selects_produce_nothing() {
        let specs = analyze_workload(&[
            query(json!({"select": [{"COUNT": "*"}], "from": "events"})),
            query(json!({"select": [], "from": "events"})),
        ]);
        assert!(specs.is_empty());
    }

    #[test]
    fn query_ids_follow_workload_position() {
        let specs = analyze_workload(&[
            query(json!({"select": [{"COUNT": "*"}], "from": "events"})),
            query(json!({"select": ["advertiser_id", "type", {"COUNT": "*"}], "from": "events", "group_by": ["type", "advertiser_id"]})),
        ]);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].table_name(), "summary_q2_advertiser_id_type");
        assert_eq!(specs[0].source_query_ids(), &[2]);
        assert_eq!(aggregate(&specs[0]).aggregations[0].function, AggFunc::Count);
    }

    #[test]
    fn table_name_variants() {
        let dims = vec!["minute".to_string(), "day".to_string()];
        assert_eq!(summary_table_name(5, &dims, false), "summary_q5_day_minute");
        assert_eq!(summary_table_name(5, &dims, true), "summary_q5_merged_day_minute");
        assert_eq!(summary_table_name(3, &[], false), "summary_q3_all");
    }
}
