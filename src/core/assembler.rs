use crate::core::dialect::SqlDialect;
use crate::core::error::RouteError;
use crate::core::rewriter::order_by_clause;
use crate::models::query::{QueryDescriptor, SelectItem};

/// 原始事实表查询的生成方：没有可用汇总表时由路由器调用
pub trait RawTableTranslator: Send + Sync {
    fn assemble(&self, query: &QueryDescriptor) -> Result<String, RouteError>;
}

/// 直接针对 `from` 表拼装 SQL；聚合结果列与汇总表改写后的列名保持一致
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseTableAssembler {
    pub dialect: SqlDialect,
}

impl BaseTableAssembler {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }
}

impl RawTableTranslator for BaseTableAssembler {
    fn assemble(&self, query: &QueryDescriptor) -> Result<String, RouteError> {
        if query.select.is_empty() {
            return Err(RouteError::EmptySelect);
        }

        let select_parts = query
            .select
            .iter()
            .map(|item| match item {
                SelectItem::Column(name) => name.clone(),
                SelectItem::Aggregate(agg) => {
                    format!("{} AS {}", agg.canonical(), self.dialect.quote_alias(&agg.canonical()))
                }
            })
            .collect::<Vec<_>>();

        let mut clauses = vec![
            format!("SELECT {}", select_parts.join(", ")),
            format!("FROM {}", query.source_table),
        ];
        if let Some(where_clause) = self.dialect.render_where(&query.filters) {
            clauses.push(where_clause);
        }
        if !query.group_by.is_empty() {
            clauses.push(format!("GROUP BY {}", query.group_by.join(", ")));
        }
        if let Some(order_clause) = order_by_clause(query, self.dialect) {
            clauses.push(order_clause);
        }
        Ok(clauses.join(" "))
    }
}
