use crate::core::dialect::SqlDialect;
use crate::models::summary::{AggregateSummary, DistinctSummary, SummarySpec};

/// 汇总表建表语句 (CREATE TABLE ... AS SELECT)
pub fn summary_table_sql(spec: &SummarySpec, dialect: SqlDialect) -> String {
    match spec {
        SummarySpec::Aggregate(s) => aggregate_table_sql(s, dialect),
        SummarySpec::Distinct(s) => distinct_table_sql(s, dialect),
    }
}

fn aggregate_table_sql(spec: &AggregateSummary, dialect: SqlDialect) -> String {
    let mut select_parts: Vec<String> = spec.summary_group_by.clone();
    for agg in &spec.aggregations {
        select_parts.push(format!("{}({}) AS {}", agg.function, agg.column, agg.alias));
    }

    let mut sql = format!(
        "{} SELECT {} FROM {}",
        dialect.create_table_as(&spec.table_name),
        select_parts.join(", "),
        spec.source_table
    );
    let filters = spec.constant_filters.iter().map(|f| f.as_predicate()).collect::<Vec<_>>();
    if let Some(where_clause) = dialect.render_where(&filters) {
        sql.push(' ');
        sql.push_str(&where_clause);
    }
    // 汇总表不带 ORDER BY，排序交给查询自己
    if !spec.summary_group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&spec.summary_group_by.join(", "));
    }
    sql
}

fn distinct_table_sql(spec: &DistinctSummary, dialect: SqlDialect) -> String {
    let columns = spec.distinct_columns().collect::<Vec<_>>();
    let mut sql = format!(
        "{} SELECT DISTINCT {} FROM {}",
        dialect.create_table_as(&spec.table_name),
        columns.join(", "),
        spec.source_table
    );
    let filters = spec.constant_filters.iter().map(|f| f.as_predicate()).collect::<Vec<_>>();
    if let Some(where_clause) = dialect.render_where(&filters) {
        sql.push(' ');
        sql.push_str(&where_clause);
    }
    sql
}

/// 完整的构建脚本：需要时先删表，再建表，按规格顺序
pub fn build_statements(specs: &[SummarySpec], dialect: SqlDialect) -> Vec<String> {
    let mut statements = Vec::new();
    for spec in specs {
        if let Some(drop) = dialect.drop_table_if_exists(spec.table_name()) {
            statements.push(drop);
        }
        statements.push(summary_table_sql(spec, dialect));
    }
    statements
}
