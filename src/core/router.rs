use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::core::assembler::{BaseTableAssembler, RawTableTranslator};
use crate::core::catalog::SpecCatalog;
use crate::core::dialect::SqlDialect;
use crate::core::error::RouteError;
use crate::core::matcher::find_matching_summary;
use crate::core::rewriter::rewrite_for_summary;
use crate::models::query::QueryDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "table", rename_all = "snake_case")]
pub enum RouteTarget {
    Summary(String),
    BaseTable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutedQuery {
    pub sql: String,
    pub target: RouteTarget,
}

impl RoutedQuery {
    pub fn summary_table(&self) -> Option<&str> {
        match &self.target {
            RouteTarget::Summary(table) => Some(table),
            RouteTarget::BaseTable(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterStats {
    pub total: u64,
    pub hits: u64,
    pub misses: u64,
    /// 命中率百分比，无查询时为 0
    pub hit_rate: f64,
    pub table_hits: BTreeMap<String, u64>,
}

/// 路由门面：匹配 -> 改写 -> 回退，并统计命中
///
/// 规格快照只读，计数器为原子量，可直接以 `Arc<SummaryRouter>` 在并发请求间共享。
pub struct SummaryRouter {
    catalog: Arc<SpecCatalog>,
    dialect: SqlDialect,
    fallback: Arc<dyn RawTableTranslator>,
    hits: AtomicU64,
    misses: AtomicU64,
    table_hits: DashMap<String, u64>,
}

impl SummaryRouter {
    pub fn new(catalog: Arc<SpecCatalog>, dialect: SqlDialect) -> Self {
        Self {
            catalog,
            dialect,
            fallback: Arc::new(BaseTableAssembler::new(dialect)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            table_hits: DashMap::new(),
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn RawTableTranslator>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn catalog(&self) -> &Arc<SpecCatalog> {
        &self.catalog
    }

    pub fn route(&self, query: &QueryDescriptor) -> Result<String, RouteError> {
        self.route_detailed(query).map(|routed| routed.sql)
    }

    /// 出错的查询不计入统计
    #[instrument(skip_all, fields(from = %query.source_table))]
    pub fn route_detailed(&self, query: &QueryDescriptor) -> Result<RoutedQuery, RouteError> {
        let routed = match find_matching_summary(query, self.catalog.specs()) {
            Some(spec) => {
                let sql = rewrite_for_summary(query, spec, self.dialect).inspect_err(|e| {
                    warn!("汇总表 {} 改写失败: {}", spec.table_name(), e);
                })?;
                self.hits.fetch_add(1, Ordering::Relaxed);
                *self.table_hits.entry(spec.table_name().to_string()).or_insert(0) += 1;
                debug!("命中汇总表: {}", spec.table_name());
                RoutedQuery { sql, target: RouteTarget::Summary(spec.table_name().to_string()) }
            }
            None => {
                let sql = self.fallback.assemble(query)?;
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("无匹配汇总表，回退原始表 {}", query.source_table);
                RoutedQuery { sql, target: RouteTarget::BaseTable(query.source_table.clone()) }
            }
        };
        Ok(routed)
    }

    pub fn stats(&self) -> RouterStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 { hits as f64 / total as f64 * 100.0 } else { 0.0 };
        let table_hits = self
            .table_hits
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        RouterStats { total, hits, misses, hit_rate, table_hits }
    }
}
