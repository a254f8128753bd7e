use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::query::{Condition, Predicate, Scalar};

/// 目标 SQL 方言。字面量渲染与别名引用统一收口在这里，
/// 建表 DDL、改写查询、回退查询三处共用。
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    DuckDb,
    Postgres,
    MySql,
}

impl FromStr for SqlDialect {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "duckdb" => Ok(SqlDialect::DuckDb),
            "postgres" | "postgresql" => Ok(SqlDialect::Postgres),
            "mysql" => Ok(SqlDialect::MySql),
            other => Err(anyhow::anyhow!("Unsupported SQL dialect: {other}")),
        }
    }
}

impl SqlDialect {
    /// 输出列别名，如 `"SUM(bid_price)"`
    pub fn quote_alias(&self, alias: &str) -> String {
        match self {
            SqlDialect::MySql => format!("`{}`", alias.replace('`', "``")),
            _ => format!("\"{}\"", alias.replace('"', "\"\"")),
        }
    }

    pub fn literal(&self, value: &Scalar) -> String {
        match value {
            Scalar::Bool(true) => "TRUE".to_string(),
            Scalar::Bool(false) => "FALSE".to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) if f.is_finite() => f.to_string(),
            Scalar::Float(_) => "NULL".to_string(),
            Scalar::Text(s) => {
                let escaped = match self {
                    SqlDialect::MySql => s.replace('\\', "\\\\").replace('\'', "''"),
                    _ => s.replace('\'', "''"),
                };
                format!("'{escaped}'")
            }
        }
    }

    pub fn render_predicate(&self, predicate: &Predicate) -> String {
        let col = &predicate.column;
        match &predicate.condition {
            Condition::Eq(v) => format!("{col} = {}", self.literal(v)),
            Condition::Lt(v) => format!("{col} < {}", self.literal(v)),
            Condition::Lte(v) => format!("{col} <= {}", self.literal(v)),
            Condition::Gt(v) => format!("{col} > {}", self.literal(v)),
            Condition::Gte(v) => format!("{col} >= {}", self.literal(v)),
            Condition::Between(low, high) => {
                format!("{col} BETWEEN {} AND {}", self.literal(low), self.literal(high))
            }
            Condition::In(values) => {
                let list = values.iter().map(|v| self.literal(v)).collect::<Vec<_>>();
                format!("{col} IN ({})", list.join(", "))
            }
        }
    }

    /// 没有谓词时返回 None
    pub fn render_where<'a>(&self, predicates: impl IntoIterator<Item = &'a Predicate>) -> Option<String> {
        let parts = predicates
            .into_iter()
            .map(|p| self.render_predicate(p))
            .collect::<Vec<_>>();
        if parts.is_empty() {
            None
        } else {
            Some(format!("WHERE {}", parts.join(" AND ")))
        }
    }

    pub fn create_table_as(&self, table: &str) -> String {
        match self {
            SqlDialect::DuckDb => format!("CREATE OR REPLACE TABLE {table} AS"),
            SqlDialect::Postgres | SqlDialect::MySql => format!("CREATE TABLE {table} AS"),
        }
    }

    /// 不支持 OR REPLACE 的方言需要先删表
    pub fn drop_table_if_exists(&self, table: &str) -> Option<String> {
        match self {
            SqlDialect::DuckDb => None,
            SqlDialect::Postgres | SqlDialect::MySql => Some(format!("DROP TABLE IF EXISTS {table}")),
        }
    }
}
