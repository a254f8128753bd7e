use serde::Serialize;
use serde_json::Value;
use sqlx::{mysql::MySqlPoolOptions, postgres::PgPoolOptions, Column, Executor, MySql, Pool, Postgres};
use tracing::{debug, info, instrument};

use crate::infra::utils::{mysql_row_values, pg_row_values};

pub enum DynamicPool {
    Postgres(Pool<Postgres>),
    MySql(Pool<MySql>),
}

/// 执行结果：列名与行都保持引擎返回的顺序
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// 外部数据仓库（事实表与汇总表所在的库）
///
/// 只负责执行；失败原样返回给调用方，不做重试。
pub struct Warehouse {
    pool: DynamicPool,
    db_type: String,
}

impl Warehouse {
    pub async fn connect(db_type: &str, url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = match db_type.to_lowercase().as_str() {
            "postgres" | "postgresql" => {
                let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
                DynamicPool::Postgres(pool)
            }
            "mysql" => {
                let pool = MySqlPoolOptions::new().max_connections(max_connections).connect(url).await?;
                DynamicPool::MySql(pool)
            }
            other => return Err(anyhow::anyhow!("Unsupported DB type: {other}")),
        };
        info!("数据仓库连接池已建立: type={}, max_connections={}", db_type, max_connections);
        Ok(Self { pool, db_type: db_type.to_lowercase() })
    }

    pub fn db_type(&self) -> &str {
        &self.db_type
    }

    /// 执行单条 DDL（不走预编译）
    #[instrument(skip(self))]
    pub async fn execute_ddl(&self, sql: &str) -> anyhow::Result<()> {
        match &self.pool {
            DynamicPool::Postgres(p) => {
                sqlx::raw_sql(sql).execute(p).await?;
            }
            DynamicPool::MySql(p) => {
                sqlx::raw_sql(sql).execute(p).await?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, sql: &str) -> anyhow::Result<QueryResult> {
        let result = match &self.pool {
            DynamicPool::Postgres(p) => {
                let rows = sqlx::query(sql).fetch_all(p).await?;
                let columns = match rows.first() {
                    Some(row) => sqlx::Row::columns(row).iter().map(|c| c.name().to_string()).collect(),
                    None => p.describe(sql).await?.columns().iter().map(|c| c.name().to_string()).collect(),
                };
                QueryResult { columns, rows: rows.iter().map(pg_row_values).collect() }
            }
            DynamicPool::MySql(p) => {
                let rows = sqlx::query(sql).fetch_all(p).await?;
                let columns = match rows.first() {
                    Some(row) => sqlx::Row::columns(row).iter().map(|c| c.name().to_string()).collect(),
                    None => p.describe(sql).await?.columns().iter().map(|c| c.name().to_string()).collect(),
                };
                QueryResult { columns, rows: rows.iter().map(mysql_row_values).collect() }
            }
        };
        debug!("查询返回 {} 行", result.rows.len());
        Ok(result)
    }

    /// 汇总表行数统计
    pub async fn row_count(&self, table: &str) -> anyhow::Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        let count = match &self.pool {
            DynamicPool::Postgres(p) => sqlx::query_scalar::<_, i64>(&sql).fetch_one(p).await?,
            DynamicPool::MySql(p) => sqlx::query_scalar::<_, i64>(&sql).fetch_one(p).await?,
        };
        Ok(count)
    }
}
