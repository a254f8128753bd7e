use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::core::catalog::SpecCatalog;
use crate::core::ddl::build_statements;
use crate::core::dialect::SqlDialect;
use crate::core::router::{RoutedQuery, SummaryRouter};
use crate::infra::db_external::{QueryResult, Warehouse};
use crate::models::context::BuiltTable;
use crate::models::query::QueryDescriptor;

pub struct QueryOutcome {
    pub routed: RoutedQuery,
    pub result: QueryResult,
    pub elapsed_ms: u128,
}

/// 在数据仓库中物化全部汇总表
///
/// 按规格顺序执行（DROP 与 CREATE 成对出现），任一语句失败立即返回错误。
#[instrument(skip_all, fields(build_id = %catalog.build_id, specs = catalog.specs().len()))]
pub async fn materialize(
    warehouse: &Warehouse,
    catalog: &SpecCatalog,
    dialect: SqlDialect,
) -> anyhow::Result<Vec<BuiltTable>> {
    let mut built = Vec::with_capacity(catalog.specs().len());
    for spec in catalog.specs() {
        let started = Instant::now();
        for stmt in build_statements(std::slice::from_ref(spec), dialect) {
            warehouse.execute_ddl(&stmt).await.inspect_err(|e| {
                warn!("汇总表 {} 建表失败: {}", spec.table_name(), e);
            })?;
        }
        let row_count = warehouse.row_count(spec.table_name()).await?;
        let elapsed_ms = started.elapsed().as_millis();
        info!("汇总表 {} 已物化: {} 行, 耗时 {}ms", spec.table_name(), row_count, elapsed_ms);
        built.push(BuiltTable {
            table_name: spec.table_name().to_string(),
            row_count,
            elapsed_ms,
        });
    }
    Ok(built)
}

/// 路由并执行一条查询；路由错误以 `RouteError` 形式包在 anyhow 中返回
#[instrument(skip_all, fields(from = %query.source_table))]
pub async fn run_query(
    warehouse: &Warehouse,
    router: &SummaryRouter,
    query: &QueryDescriptor,
) -> anyhow::Result<QueryOutcome> {
    let routed = router.route_detailed(query)?;
    let started = Instant::now();
    let result = warehouse.fetch(&routed.sql).await?;
    let elapsed_ms = started.elapsed().as_millis();
    info!(
        "查询完成: target={:?}, rows={}, 耗时 {}ms",
        routed.summary_table().unwrap_or(query.source_table.as_str()),
        result.rows.len(),
        elapsed_ms
    );
    Ok(QueryOutcome { routed, result, elapsed_ms })
}
