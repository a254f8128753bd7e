use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::ax_state::AppState;
use crate::core::catalog::SpecCatalog;
use crate::infra::workload::validate_workload;
use crate::models::context::RebuildResponse;
use crate::models::query::QueryDescriptor;
use crate::service::warehouse::materialize;

/// 当前生效的汇总表规格
pub async fn list_summaries(State(state): State<Arc<AppState>>) -> Response {
    let router = state.current_router().await;
    Json(router.catalog().as_ref()).into_response()
}

/// 以新的工作负载重建汇总表并热替换路由器
///
/// 新构建的物理表名带构建编号后缀，物化期间旧路由器指向的表不受影响。
/// 配置了数据仓库时先物化；物化失败则保留旧路由器。重建请求串行执行。
pub async fn rebuild_summaries(
    State(state): State<Arc<AppState>>,
    Json(workload): Json<Vec<QueryDescriptor>>,
) -> Response {
    if let Err(e) = validate_workload(&workload) {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": format!("{e:#}") }))).into_response();
    }

    let _guard = state.rebuild_lock.lock().await;
    let catalog = SpecCatalog::build(&workload).versioned();
    info!("接收到重建请求: {} 条查询 -> {} 个汇总表", workload.len(), catalog.specs().len());

    let tables = match state.warehouse.as_ref() {
        Some(warehouse) => match materialize(warehouse, &catalog, state.dialect).await {
            Ok(tables) => tables,
            Err(e) => {
                error!("汇总表物化失败: {:#}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": format!("materialization failed: {e:#}") })),
                )
                    .into_response();
            }
        },
        None => Vec::new(),
    };

    let response = RebuildResponse {
        build_id: catalog.build_id,
        spec_count: catalog.specs().len(),
        materialized: state.warehouse.is_some(),
        tables,
    };
    state.swap_catalog(catalog).await;
    info!("路由器已热替换: build_id={}", response.build_id);
    Json(response).into_response()
}

/// 导出当前规格的建表脚本
pub async fn export_ddl(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let router = state.current_router().await;
    let script = router.catalog().ddl_script(state.dialect);
    info!("建表脚本导出完成: build_id={}", router.catalog().build_id);

    (
        [
            (header::CONTENT_TYPE, "application/sql"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"summary_tables.sql\""),
        ],
        script,
    )
}
