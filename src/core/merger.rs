use std::collections::HashMap;
use tracing::{debug, info};

use crate::core::builder::summary_table_name;
use crate::models::summary::{AggregateSummary, SummarySpec};

/// 合并签名: (源表, 查询分组, 预过滤, 提升维度)，集合部分均已排序
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MergeSignature {
    source_table: String,
    query_group_by: Vec<String>,
    constant_filters: Vec<(String, String)>,
    filter_dimensions: Vec<String>,
}

impl MergeSignature {
    fn of(spec: &AggregateSummary) -> Self {
        let sorted = |cols: &[String]| {
            let mut v = cols.to_vec();
            v.sort();
            v
        };
        let mut constant_filters = spec
            .constant_filters
            .iter()
            .map(|f| (f.column.clone(), f.value.signature_key()))
            .collect::<Vec<_>>();
        constant_filters.sort();

        Self {
            source_table: spec.source_table.clone(),
            query_group_by: sorted(&spec.query_group_by),
            constant_filters,
            filter_dimensions: sorted(&spec.filter_dimensions),
        }
    }
}

/// 签名相同的聚合规格共用一张物理汇总表
///
/// 聚合列按 (函数, 列) 去重，先出现者的别名保留；来源查询编号取并集。
/// 合并后沿用组内第一个规格的编号并加上 `merged` 标记。DISTINCT 规格不参与合并。
/// 输出顺序为每组首次出现的位置。
pub fn merge_specs(specs: Vec<SummarySpec>) -> Vec<SummarySpec> {
    let input_len = specs.len();
    let mut merged: Vec<SummarySpec> = Vec::with_capacity(input_len);
    let mut groups: HashMap<MergeSignature, usize> = HashMap::new();

    for spec in specs {
        let incoming = match spec {
            SummarySpec::Aggregate(s) => s,
            distinct @ SummarySpec::Distinct(_) => {
                merged.push(distinct);
                continue;
            }
        };

        let signature = MergeSignature::of(&incoming);
        match groups.get(&signature).copied() {
            Some(slot) => {
                if let SummarySpec::Aggregate(target) = &mut merged[slot] {
                    debug!("{} 并入 {}", incoming.table_name, target.table_name);
                    absorb(target, incoming);
                }
            }
            None => {
                groups.insert(signature, merged.len());
                merged.push(SummarySpec::Aggregate(incoming));
            }
        }
    }

    for spec in &mut merged {
        if let SummarySpec::Aggregate(s) = spec {
            if s.source_query_ids.len() > 1 {
                s.table_name = summary_table_name(s.source_query_ids[0], &s.summary_group_by, true);
            }
        }
    }

    info!("汇总表规格合并: {} -> {}", input_len, merged.len());
    merged
}

fn absorb(target: &mut AggregateSummary, other: AggregateSummary) {
    for agg in other.aggregations {
        if !target
            .aggregations
            .iter()
            .any(|a| a.function == agg.function && a.column == agg.column)
        {
            target.aggregations.push(agg);
        }
    }
    for id in other.source_query_ids {
        if !target.source_query_ids.contains(&id) {
            target.source_query_ids.push(id);
        }
    }
}
