use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use summary_router::api::route::{execute_query, route_query, router_stats};
use summary_router::api::summaries::{export_ddl, list_summaries, rebuild_summaries};
use summary_router::ax_state::AppState;
use summary_router::core::catalog::SpecCatalog;
use summary_router::infra::config::AppConfig;
use summary_router::infra::db_external::Warehouse;
use summary_router::infra::workload::load_workload;
use summary_router::service::warehouse::materialize;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")))
        .init();

    let config = AppConfig::from_env()?;

    let warehouse = match (&config.database_url, &config.db_type) {
        (Some(url), Some(db_type)) => {
            let warehouse = Warehouse::connect(db_type, url, config.max_connections).await?;
            info!("数据仓库类型: {}, 方言: {:?}", warehouse.db_type(), config.dialect);
            Some(warehouse)
        }
        _ => {
            warn!("未配置 DATABASE_URL，以仅路由模式运行");
            None
        }
    };

    let catalog = match &config.workload_path {
        Some(path) => SpecCatalog::build(&load_workload(path)?),
        None => SpecCatalog::empty(),
    };
    info!("汇总表规格已生成: {} 个 (build_id={})", catalog.specs().len(), catalog.build_id);

    if let Some(warehouse) = warehouse.as_ref().filter(|_| config.build_on_startup) {
        let tables = materialize(warehouse, &catalog, config.dialect).await?;
        info!("启动时物化完成: {} 张汇总表", tables.len());
    }

    let state = Arc::new(AppState::new(warehouse, catalog, config.dialect));

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/api/route", post(route_query))
        .route("/api/query", post(execute_query))
        .route("/api/stats", get(router_stats))
        .route("/api/summaries", get(list_summaries))
        .route("/api/summaries/rebuild", post(rebuild_summaries))
        .route("/api/summaries/ddl", get(export_ddl))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    info!("🚀 Summary Router 运行在 http://{} (dialect={:?})", config.bind_addr, config.dialect);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
