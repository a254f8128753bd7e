use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::ax_state::AppState;
use crate::core::error::RouteError;
use crate::models::context::{QueryMeta, QueryResponse, RouteRequest, RouteResponse};
use crate::service::warehouse::run_query;

/// 只生成 SQL，不执行
pub async fn route_query(State(state): State<Arc<AppState>>, Json(payload): Json<RouteRequest>) -> Response {
    if let Err(e) = payload.query.validate() {
        return route_error_response(&e);
    }

    let router = state.current_router().await;
    match router.route_detailed(&payload.query) {
        Ok(routed) => Json(RouteResponse {
            summary_table: routed.summary_table().map(str::to_string),
            sql: routed.sql,
        })
        .into_response(),
        Err(e) => route_error_response(&e),
    }
}

/// 路由后在数据仓库中执行
pub async fn execute_query(State(state): State<Arc<AppState>>, Json(payload): Json<RouteRequest>) -> Response {
    let Some(warehouse) = state.warehouse.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "no warehouse configured, set DATABASE_URL to execute queries" })),
        )
            .into_response();
    };
    if let Err(e) = payload.query.validate() {
        return route_error_response(&e);
    }

    let router = state.current_router().await;
    match run_query(warehouse, &router, &payload.query).await {
        Ok(outcome) => {
            let meta = QueryMeta {
                row_count: outcome.result.rows.len(),
                summary_table: outcome.routed.summary_table().map(str::to_string),
                sql: outcome.routed.sql,
                elapsed_ms: outcome.elapsed_ms,
            };
            Json(QueryResponse { result: outcome.result, meta }).into_response()
        }
        Err(e) => match e.downcast_ref::<RouteError>() {
            Some(route_err) => route_error_response(route_err),
            None => {
                error!("执行查询失败: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": format!("query execution failed: {e:#}") })),
                )
                    .into_response()
            }
        },
    }
}

pub async fn router_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.current_router().await.stats())
}

fn route_error_response(e: &RouteError) -> Response {
    let status = if e.is_client_error() {
        info!("拒绝查询: {}", e);
        StatusCode::BAD_REQUEST
    } else {
        error!("路由内部错误: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::SpecCatalog;
    use crate::core::dialect::SqlDialect;
    use crate::models::query::QueryDescriptor;
    use serde_json::Value;

    fn state() -> Arc<AppState> {
        let workload: Vec<QueryDescriptor> = serde_json::from_value(json!([{
            "select": ["day", {"SUM": "bid_price"}],
            "from": "events",
            "where": [{"col": "type", "op": "eq", "val": "impression"}],
            "group_by": ["day"]
        }]))
        .unwrap();
        Arc::new(AppState::new(None, SpecCatalog::build(&workload), SqlDialect::DuckDb))
    }

    fn request(query: Value) -> Json<RouteRequest> {
        Json(serde_json::from_value(json!({ "query": query })).unwrap())
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn route_returns_summary_sql() {
        let state = state();
        let resp = route_query(
            State(state.clone()),
            request(json!({
                "select": ["day", {"SUM": "bid_price"}],
                "from": "events",
                "where": [{"col": "type", "op": "eq", "val": "impression"}],
                "group_by": ["day"]
            })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["summary_table"], "summary_q1_day");
        assert_eq!(body["sql"], "SELECT day, sum_bid_price AS \"SUM(bid_price)\" FROM summary_q1_day");

        let stats = body_json(router_stats(State(state)).await.into_response()).await;
        assert_eq!(stats["hits"], 1);
        assert_eq!(stats["hit_rate"], 100.0);
    }

    #[tokio::test]
    async fn route_falls_back_with_null_table() {
        let resp = route_query(State(state()), request(json!({"select": ["user_id"], "from": "events"}))).await;
        let body = body_json(resp).await;
        assert_eq!(body["summary_table"], Value::Null);
        assert_eq!(body["sql"], "SELECT user_id FROM events");
    }

    #[tokio::test]
    async fn invalid_identifier_is_bad_request() {
        let resp = route_query(
            State(state()),
            request(json!({"select": ["day; DROP TABLE events"], "from": "events"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("invalid identifier"));
    }

    #[tokio::test]
    async fn execute_without_warehouse_is_unavailable() {
        let resp = execute_query(State(state()), request(json!({"select": ["user_id"], "from": "events"}))).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
