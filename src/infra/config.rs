use anyhow::Context;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::core::dialect::SqlDialect;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// 未配置时服务只做 SQL 路由，不执行
    pub database_url: Option<String>,
    pub db_type: Option<String>,
    pub dialect: SqlDialect,
    pub workload_path: Option<PathBuf>,
    pub build_on_startup: bool,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
}

impl AppConfig {
    /// 读取 .env 与进程环境变量
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL");
        let db_type = match get("DB_TYPE") {
            Some(t) => Some(t.to_lowercase()),
            None => database_url.as_deref().and_then(infer_db_type),
        };
        if database_url.is_some() && db_type.is_none() {
            anyhow::bail!("DB_TYPE is not set and cannot be inferred from DATABASE_URL");
        }

        let dialect = match get("SQL_DIALECT") {
            Some(d) => d.parse::<SqlDialect>()?,
            None => match db_type.as_deref() {
                Some("mysql") => SqlDialect::MySql,
                Some(_) => SqlDialect::Postgres,
                None => SqlDialect::DuckDb,
            },
        };

        let build_on_startup = match get("BUILD_ON_STARTUP") {
            Some(v) => parse_bool(&v).with_context(|| format!("BUILD_ON_STARTUP: invalid value `{v}`"))?,
            None => true,
        };

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be host:port")?;

        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(v) => v.parse::<u32>().context("DB_MAX_CONNECTIONS must be a positive integer")?,
            None => 5,
        };

        Ok(Self {
            database_url,
            db_type,
            dialect,
            workload_path: get("WORKLOAD_PATH").map(PathBuf::from),
            build_on_startup,
            bind_addr,
            max_connections,
        })
    }
}

fn infer_db_type(url: &str) -> Option<String> {
    let scheme = url.split("://").next()?.to_lowercase();
    match scheme.as_str() {
        "postgres" | "postgresql" => Some("postgres".to_string()),
        "mysql" | "mariadb" => Some("mysql".to_string()),
        _ => None,
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
