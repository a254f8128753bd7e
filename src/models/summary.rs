use serde::{Deserialize, Serialize};

use crate::models::query::{AggFunc, Aggregation, Condition, Predicate, Scalar};

/// 汇总表中的一个预聚合列
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AggregationSpec {
    pub function: AggFunc,
    pub column: String,
    pub alias: String,
}

impl AggregationSpec {
    pub fn new(agg: &Aggregation) -> Self {
        Self {
            function: agg.function,
            column: agg.column.clone(),
            alias: aggregation_alias(agg.function, &agg.column),
        }
    }

    pub fn matches(&self, agg: &Aggregation) -> bool {
        self.function == agg.function && self.column == agg.column
    }
}

/// 预聚合列的列名: `*` -> `<func>_count`，其他 -> `<func>_<col>`
pub fn aggregation_alias(function: AggFunc, column: &str) -> String {
    let func = function.as_str().to_ascii_lowercase();
    if column == "*" {
        format!("{func}_count")
    } else {
        let clean = column.replace(['(', ')'], "").replace('*', "star");
        format!("{func}_{clean}")
    }
}

/// 建表时预先应用的等值过滤
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConstantFilter {
    pub column: String,
    pub value: Scalar,
}

impl ConstantFilter {
    pub fn as_predicate(&self) -> Predicate {
        Predicate::new(self.column.clone(), Condition::Eq(self.value.clone()))
    }
}

/// 谓词是否已被汇总表的预过滤完全覆盖（同列同值的等值条件）
pub fn is_pre_applied(constants: &[ConstantFilter], predicate: &Predicate) -> bool {
    match predicate.eq_value() {
        Some(value) => constants
            .iter()
            .any(|c| c.column == predicate.column && &c.value == value),
        None => false,
    }
}

/// GROUP BY 汇总表
///
/// `query_group_by` / `summary_group_by` / `filter_dimensions` 按集合使用，保留首次出现的顺序。
/// 任何列只会出现在 `constant_filters` 与 `summary_group_by` 其中之一。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AggregateSummary {
    pub table_name: String,
    pub source_table: String,
    pub query_group_by: Vec<String>,
    pub summary_group_by: Vec<String>,
    pub aggregations: Vec<AggregationSpec>,
    pub constant_filters: Vec<ConstantFilter>,
    pub filter_dimensions: Vec<String>,
    pub source_query_ids: Vec<usize>,
}

impl AggregateSummary {
    /// 汇总粒度比查询更细时需要二次聚合
    pub fn needs_reaggregation(&self) -> bool {
        !self.filter_dimensions.is_empty()
    }

    pub fn find_aggregation(&self, agg: &Aggregation) -> Option<&AggregationSpec> {
        self.aggregations.iter().find(|a| a.matches(agg))
    }

    pub fn has_dimension(&self, column: &str) -> bool {
        self.summary_group_by.iter().any(|c| c == column)
    }
}

/// SELECT DISTINCT 汇总表（非聚合查询）
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DistinctSummary {
    pub table_name: String,
    pub source_table: String,
    pub select_columns: Vec<String>,
    pub filter_columns: Vec<String>,
    pub constant_filters: Vec<ConstantFilter>,
    pub source_query_ids: Vec<usize>,
}

impl DistinctSummary {
    /// 物理表中的全部列：投影列 + 为查询期过滤保留的列
    pub fn distinct_columns(&self) -> impl Iterator<Item = &str> {
        self.select_columns
            .iter()
            .chain(self.filter_columns.iter())
            .map(String::as_str)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.distinct_columns().any(|c| c == column)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SummarySpec {
    Aggregate(AggregateSummary),
    Distinct(DistinctSummary),
}

impl SummarySpec {
    pub fn table_name(&self) -> &str {
        match self {
            SummarySpec::Aggregate(s) => &s.table_name,
            SummarySpec::Distinct(s) => &s.table_name,
        }
    }

    pub fn rename(&mut self, table_name: String) {
        match self {
            SummarySpec::Aggregate(s) => s.table_name = table_name,
            SummarySpec::Distinct(s) => s.table_name = table_name,
        }
    }

    pub fn source_table(&self) -> &str {
        match self {
            SummarySpec::Aggregate(s) => &s.source_table,
            SummarySpec::Distinct(s) => &s.source_table,
        }
    }

    pub fn source_query_ids(&self) -> &[usize] {
        match self {
            SummarySpec::Aggregate(s) => &s.source_query_ids,
            SummarySpec::Distinct(s) => &s.source_query_ids,
        }
    }
}
