use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::infra::db_external::QueryResult;
use crate::models::query::QueryDescriptor;

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub query: QueryDescriptor, // 结构化查询描述
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub sql: String,
    pub summary_table: Option<String>, // None 表示回退原始表
}

#[derive(Debug, Serialize)]
pub struct QueryMeta {
    pub sql: String,
    pub summary_table: Option<String>,
    pub row_count: usize,
    pub elapsed_ms: u128,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    #[serde(flatten)]
    pub result: QueryResult,
    pub meta: QueryMeta,
}

#[derive(Debug, Serialize)]
pub struct BuiltTable {
    pub table_name: String,
    pub row_count: i64,
    pub elapsed_ms: u128,
}

#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    pub build_id: Uuid,
    pub spec_count: usize,
    pub materialized: bool, // 未配置数据仓库时只生成规格
    pub tables: Vec<BuiltTable>,
}
