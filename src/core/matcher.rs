use std::collections::HashSet;
use tracing::trace;

use crate::models::query::QueryDescriptor;
use crate::models::summary::{is_pre_applied, AggregateSummary, ConstantFilter, DistinctSummary, SummarySpec};

/// 按构建顺序返回第一个兼容的汇总表；无匹配即回退原始表，不是错误
///
/// 纯投影查询只考虑 DISTINCT 表，其余查询只考虑聚合表。
/// 多个兼容时取第一个，不做选择性或大小打分。汇总表只服务于其来源表上的查询。
pub fn find_matching_summary<'a>(query: &QueryDescriptor, specs: &'a [SummarySpec]) -> Option<&'a SummarySpec> {
    let projection = query.is_projection();
    specs
        .iter()
        .filter(|spec| spec.source_table() == query.source_table)
        .find(|spec| match spec {
            SummarySpec::Distinct(s) if projection => distinct_compatible(query, s),
            SummarySpec::Aggregate(s) if !projection => aggregate_compatible(query, s),
            _ => false,
        })
}

/// 汇总表预过滤的每个等值条件，查询里都必须有同列同值的等值条件
fn constants_satisfied(query: &QueryDescriptor, constants: &[ConstantFilter]) -> bool {
    constants.iter().all(|c| {
        query
            .filters
            .iter()
            .any(|p| p.column == c.column && p.eq_value() == Some(&c.value))
    })
}

pub fn distinct_compatible(query: &QueryDescriptor, spec: &DistinctSummary) -> bool {
    let wanted: HashSet<&str> = query.projected_columns().collect();
    let available: HashSet<&str> = spec.select_columns.iter().map(String::as_str).collect();
    if wanted != available {
        trace!("{}: 投影列不一致", spec.table_name);
        return false;
    }

    if !constants_satisfied(query, &spec.constant_filters) {
        trace!("{}: 预过滤条件未被查询覆盖", spec.table_name);
        return false;
    }

    // 未被预过滤吸收的谓词必须能在表内列上重新求值
    query
        .filters
        .iter()
        .all(|p| is_pre_applied(&spec.constant_filters, p) || spec.has_column(&p.column))
}

pub fn aggregate_compatible(query: &QueryDescriptor, spec: &AggregateSummary) -> bool {
    let wanted: HashSet<&str> = query.group_by.iter().map(String::as_str).collect();
    let built_for: HashSet<&str> = spec.query_group_by.iter().map(String::as_str).collect();
    if wanted != built_for {
        trace!("{}: GROUP BY 不一致", spec.table_name);
        return false;
    }

    if !constants_satisfied(query, &spec.constant_filters) {
        trace!("{}: 预过滤条件未被查询覆盖", spec.table_name);
        return false;
    }

    let filters_ok = query
        .filters
        .iter()
        .all(|p| is_pre_applied(&spec.constant_filters, p) || spec.has_dimension(&p.column));
    if !filters_ok {
        trace!("{}: 查询过滤列不在汇总表中", spec.table_name);
        return false;
    }

    let columns_ok = query.projected_columns().all(|c| spec.has_dimension(c));
    let aggregations_ok = query.aggregations().all(|agg| spec.find_aggregation(agg).is_some());
    if !(columns_ok && aggregations_ok) {
        trace!("{}: 缺少查询所需的列或聚合", spec.table_name);
        return false;
    }
    true
}
