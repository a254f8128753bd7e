use thiserror::Error;

/// 路由核心的错误；引擎执行错误不在此列，原样交给调用方
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// 匹配器放行了一个缺少所需预聚合列的汇总表，属于内部一致性错误
    #[error("summary table `{table}` has no pre-aggregated column for {aggregation}")]
    MissingAggregation { table: String, aggregation: String },

    #[error("query selects no columns")]
    EmptySelect,

    #[error("invalid identifier `{0}`")]
    InvalidIdentifier(String),

    /// `*` 只能作为 COUNT 的参数
    #[error("invalid aggregate `{0}`")]
    InvalidAggregate(String),
}

impl RouteError {
    /// 调用方输入有误（区别于内部错误）
    pub fn is_client_error(&self) -> bool {
        !matches!(self, RouteError::MissingAggregation { .. })
    }
}
