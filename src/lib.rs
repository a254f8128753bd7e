pub mod api;
pub mod core;
pub mod infra;
pub mod models;
pub mod service;

pub mod ax_state {
    use std::sync::Arc;
    use tokio::sync::{Mutex, RwLock};

    use crate::core::catalog::SpecCatalog;
    use crate::core::dialect::SqlDialect;
    use crate::core::router::SummaryRouter;
    use crate::infra::db_external::Warehouse;

    pub struct AppState {
        /// 未配置 DATABASE_URL 时为 None（仅路由模式）
        pub warehouse: Option<Warehouse>,
        pub router: RwLock<Arc<SummaryRouter>>,
        pub dialect: SqlDialect,
        /// 重建串行执行，避免两次构建的 DDL 交错
        pub rebuild_lock: Mutex<()>,
    }

    impl AppState {
        pub fn new(warehouse: Option<Warehouse>, catalog: SpecCatalog, dialect: SqlDialect) -> Self {
            Self {
                warehouse,
                router: RwLock::new(Arc::new(SummaryRouter::new(Arc::new(catalog), dialect))),
                dialect,
                rebuild_lock: Mutex::new(()),
            }
        }

        /// 当前路由器快照；重建期间已取出的快照继续可用
        pub async fn current_router(&self) -> Arc<SummaryRouter> {
            Arc::clone(&*self.router.read().await)
        }

        pub async fn swap_catalog(&self, catalog: SpecCatalog) {
            let router = Arc::new(SummaryRouter::new(Arc::new(catalog), self.dialect));
            *self.router.write().await = router;
        }
    }
}
