use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use crate::core::error::RouteError;

// 标识符白名单：列名、表名只允许字母数字下划线
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"));

// ORDER BY 中的聚合引用，如 "SUM(total_price)"、"count(*)"
static AGGREGATE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z]+)\s*\(\s*(\*|[A-Za-z_][A-Za-z0-9_]*)\s*\)\s*$")
        .expect("aggregate reference pattern")
});

pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq, Lt, Lte, Gt, Gte, Between, In
}

/// 谓词中的标量值，按 JSON 原始类型区分
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// 稳定的排序/分组键，文本 "1" 与整数 1 不会混淆
    pub fn signature_key(&self) -> String {
        match self {
            Scalar::Bool(b) => format!("b:{b}"),
            Scalar::Int(i) => format!("i:{i}"),
            Scalar::Float(f) => format!("f:{f}"),
            Scalar::Text(s) => format!("t:{s}"),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::from(*i),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Scalar::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

/// 谓词条件：每种操作符携带自己形状的取值
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Scalar),
    Lt(Scalar),
    Lte(Scalar),
    Gt(Scalar),
    Gte(Scalar),
    Between(Scalar, Scalar),
    In(Vec<Scalar>),
}

impl Condition {
    pub fn operator(&self) -> Operator {
        match self {
            Condition::Eq(_) => Operator::Eq,
            Condition::Lt(_) => Operator::Lt,
            Condition::Lte(_) => Operator::Lte,
            Condition::Gt(_) => Operator::Gt,
            Condition::Gte(_) => Operator::Gte,
            Condition::Between(..) => Operator::Between,
            Condition::In(_) => Operator::In,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WirePredicate", into = "WirePredicate")]
pub struct Predicate {
    pub column: String,
    pub condition: Condition,
}

impl Predicate {
    pub fn new(column: impl Into<String>, condition: Condition) -> Self {
        Self { column: column.into(), condition }
    }

    pub fn operator(&self) -> Operator {
        self.condition.operator()
    }

    /// 等值谓词的取值；其他操作符返回 None
    pub fn eq_value(&self) -> Option<&Scalar> {
        match &self.condition {
            Condition::Eq(v) => Some(v),
            _ => None,
        }
    }
}

// 工作负载文件中的谓词格式: {"col": .., "op": .., "val": ..}
#[derive(Serialize, Deserialize)]
struct WirePredicate {
    col: String,
    op: Operator,
    val: Value,
}

impl TryFrom<WirePredicate> for Predicate {
    type Error = String;

    fn try_from(wire: WirePredicate) -> Result<Self, Self::Error> {
        let scalar = |v: Value| {
            serde_json::from_value::<Scalar>(v)
                .map_err(|_| format!("column `{}`: `{:?}` expects a scalar value", wire.col, wire.op))
        };
        let list = |v: Value| {
            serde_json::from_value::<Vec<Scalar>>(v)
                .map_err(|_| format!("column `{}`: `{:?}` expects a list of scalars", wire.col, wire.op))
        };

        let condition = match wire.op {
            Operator::Eq => Condition::Eq(scalar(wire.val)?),
            Operator::Lt => Condition::Lt(scalar(wire.val)?),
            Operator::Lte => Condition::Lte(scalar(wire.val)?),
            Operator::Gt => Condition::Gt(scalar(wire.val)?),
            Operator::Gte => Condition::Gte(scalar(wire.val)?),
            Operator::Between => {
                let [low, high]: [Scalar; 2] = list(wire.val)?
                    .try_into()
                    .map_err(|_| format!("column `{}`: between needs exactly two bounds", wire.col))?;
                Condition::Between(low, high)
            }
            Operator::In => {
                let values = list(wire.val)?;
                if values.is_empty() {
                    return Err(format!("column `{}`: in needs a non-empty list", wire.col));
                }
                Condition::In(values)
            }
        };
        Ok(Predicate { column: wire.col, condition })
    }
}

impl From<Predicate> for WirePredicate {
    fn from(p: Predicate) -> Self {
        let op = p.operator();
        let val = match &p.condition {
            Condition::Eq(v) | Condition::Lt(v) | Condition::Lte(v) | Condition::Gt(v) | Condition::Gte(v) => v.to_json(),
            Condition::Between(low, high) => Value::Array(vec![low.to_json(), high.to_json()]),
            Condition::In(values) => Value::Array(values.iter().map(Scalar::to_json).collect()),
        };
        WirePredicate { col: p.column, op, val }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggFunc {
    Sum, Avg, Count
}

impl AggFunc {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SUM" => Some(AggFunc::Sum),
            "AVG" => Some(AggFunc::Avg),
            "COUNT" => Some(AggFunc::Count),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggFunc::Sum => "SUM",
            AggFunc::Avg => "AVG",
            AggFunc::Count => "COUNT",
        }
    }
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Aggregation {
    pub function: AggFunc,
    pub column: String,
}

impl Aggregation {
    pub fn new(function: AggFunc, column: impl Into<String>) -> Self {
        Self { function, column: column.into() }
    }

    /// 规范写法 `FUNC(col)`，同时作为结果列名
    pub fn canonical(&self) -> String {
        format!("{}({})", self.function, self.column)
    }

    /// 解析 ORDER BY 中的 `FUNC(col)` 文本，函数名大小写不敏感
    pub fn parse_reference(text: &str) -> Option<Self> {
        let caps = AGGREGATE_REF.captures(text)?;
        let function = AggFunc::parse(&caps[1])?;
        Some(Self::new(function, &caps[2]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireSelectItem", into = "WireSelectItem")]
pub enum SelectItem {
    Column(String),
    Aggregate(Aggregation),
}

// "day" 或 {"SUM": "bid_price"}
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireSelectItem {
    Column(String),
    Aggregate(BTreeMap<String, String>),
}

impl TryFrom<WireSelectItem> for SelectItem {
    type Error = String;

    fn try_from(wire: WireSelectItem) -> Result<Self, Self::Error> {
        match wire {
            WireSelectItem::Column(name) => Ok(SelectItem::Column(name)),
            WireSelectItem::Aggregate(map) => {
                if map.len() != 1 {
                    return Err(format!("aggregation must have exactly one function, got {}", map.len()));
                }
                let (func, column) = map.into_iter().next().ok_or("empty aggregation")?;
                let function = AggFunc::parse(&func).ok_or_else(|| format!("unsupported aggregate function `{func}`"))?;
                Ok(SelectItem::Aggregate(Aggregation { function, column }))
            }
        }
    }
}

impl From<SelectItem> for WireSelectItem {
    fn from(item: SelectItem) -> Self {
        match item {
            SelectItem::Column(name) => WireSelectItem::Column(name),
            SelectItem::Aggregate(agg) => {
                WireSelectItem::Aggregate(BTreeMap::from([(agg.function.to_string(), agg.column)]))
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    #[serde(alias = "ASC")]
    Asc,
    #[serde(alias = "DESC")]
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OrderBy {
    #[serde(rename = "col")]
    pub column: String,
    #[serde(rename = "dir", default)]
    pub direction: Direction,
}

/// 结构化查询描述：select / from / where / group_by / order_by
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub select: Vec<SelectItem>,
    #[serde(rename = "from")]
    pub source_table: String,
    #[serde(rename = "where", default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Predicate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
}

impl QueryDescriptor {
    pub fn aggregations(&self) -> impl Iterator<Item = &Aggregation> {
        self.select.iter().filter_map(|item| match item {
            SelectItem::Aggregate(agg) => Some(agg),
            SelectItem::Column(_) => None,
        })
    }

    pub fn projected_columns(&self) -> impl Iterator<Item = &str> {
        self.select.iter().filter_map(|item| match item {
            SelectItem::Column(name) => Some(name.as_str()),
            SelectItem::Aggregate(_) => None,
        })
    }

    pub fn has_aggregations(&self) -> bool {
        self.aggregations().next().is_some()
    }

    /// 纯投影查询：没有聚合也没有 GROUP BY；与聚合查询互斥
    pub fn is_projection(&self) -> bool {
        self.group_by.is_empty() && !self.has_aggregations()
    }

    pub fn filter_columns(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(|p| p.column.as_str())
    }

    /// 校验所有标识符，防止拼接进 SQL 的名字越界
    pub fn validate(&self) -> Result<(), RouteError> {
        let check = |name: &str| {
            if is_valid_identifier(name) {
                Ok(())
            } else {
                Err(RouteError::InvalidIdentifier(name.to_string()))
            }
        };

        if self.select.is_empty() {
            return Err(RouteError::EmptySelect);
        }
        check(&self.source_table)?;
        for item in &self.select {
            match item {
                SelectItem::Column(name) => check(name)?,
                SelectItem::Aggregate(agg) if agg.column == "*" => {
                    if agg.function != AggFunc::Count {
                        return Err(RouteError::InvalidAggregate(agg.canonical()));
                    }
                }
                SelectItem::Aggregate(agg) => check(&agg.column)?,
            }
        }
        for column in self.filter_columns().chain(self.group_by.iter().map(String::as_str)) {
            check(column)?;
        }
        for order in &self.order_by {
            if Aggregation::parse_reference(&order.column).is_none() {
                check(&order.column)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(v: Value) -> QueryDescriptor {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn parses_workload_wire_format() {
        let q = query(json!({
            "select": ["publisher_id", {"sum": "bid_price"}],
            "from": "events",
            "where": [
                {"col": "type", "op": "eq", "val": "impression"},
                {"col": "day", "op": "between", "val": ["2024-10-20", "2024-10-23"]},
                {"col": "advertiser_id", "op": "in", "val": [100, 200]}
            ],
            "group_by": ["publisher_id"],
            "order_by": [{"col": "SUM(bid_price)", "dir": "desc"}]
        }));

        assert_eq!(q.source_table, "events");
        assert_eq!(q.select[1], SelectItem::Aggregate(Aggregation::new(AggFunc::Sum, "bid_price")));
        assert_eq!(q.filters[0].eq_value(), Some(&Scalar::Text("impression".into())));
        assert_eq!(
            q.filters[1].condition,
            Condition::Between("2024-10-20".into(), "2024-10-23".into())
        );
        assert_eq!(q.filters[2].condition, Condition::In(vec![Scalar::Int(100), Scalar::Int(200)]));
        assert_eq!(q.order_by[0].direction, Direction::Desc);
        assert!(!q.is_projection());
    }

    #[test]
    fn order_by_direction_defaults_to_asc() {
        let q = query(json!({"select": ["type"], "from": "events", "order_by": [{"col": "type"}]}));
        assert_eq!(q.order_by[0].direction, Direction::Asc);
        assert!(q.is_projection());
    }

    #[test]
    fn rejects_malformed_predicates() {
        let bad_between = json!({"select": ["a"], "from": "t", "where": [{"col": "d", "op": "between", "val": ["x"]}]});
        let empty_in = json!({"select": ["a"], "from": "t", "where": [{"col": "d", "op": "in", "val": []}]});
        let list_for_eq = json!({"select": ["a"], "from": "t", "where": [{"col": "d", "op": "eq", "val": [1, 2]}]});

        assert!(serde_json::from_value::<QueryDescriptor>(bad_between).is_err());
        assert!(serde_json::from_value::<QueryDescriptor>(empty_in).is_err());
        assert!(serde_json::from_value::<QueryDescriptor>(list_for_eq).is_err());
    }

    #[test]
    fn rejects_unknown_or_multi_function_select_items() {
        let unknown = json!({"select": [{"MEDIAN": "x"}], "from": "t"});
        let double = json!({"select": [{"SUM": "x", "AVG": "y"}], "from": "t"});
        assert!(serde_json::from_value::<QueryDescriptor>(unknown).is_err());
        assert!(serde_json::from_value::<QueryDescriptor>(double).is_err());
    }

    #[test]
    fn serializes_back_to_wire_format() {
        let original = json!({
            "select": ["country", {"AVG": "total_price"}],
            "from": "events",
            "where": [{"col": "type", "op": "eq", "val": "purchase"}],
            "group_by": ["country"],
            "order_by": [{"col": "AVG(total_price)", "dir": "desc"}]
        });
        let q = query(original.clone());
        assert_eq!(serde_json::to_value(&q).unwrap(), original);
    }

    #[test]
    fn parses_aggregate_references_case_insensitively() {
        assert_eq!(
            Aggregation::parse_reference("count(*)"),
            Some(Aggregation::new(AggFunc::Count, "*"))
        );
        assert_eq!(
            Aggregation::parse_reference("SUM( total_price )"),
            Some(Aggregation::new(AggFunc::Sum, "total_price"))
        );
        assert_eq!(Aggregation::parse_reference("minute"), None);
        assert_eq!(Aggregation::parse_reference("MAX(x)"), None);
    }

    #[test]
    fn validate_rejects_suspicious_identifiers() {
        let q = query(json!({"select": ["day; DROP TABLE events"], "from": "events"}));
        assert_eq!(
            q.validate(),
            Err(RouteError::InvalidIdentifier("day; DROP TABLE events".into()))
        );

        let ok = query(json!({
            "select": ["day", {"COUNT": "*"}],
            "from": "events",
            "group_by": ["day"],
            "order_by": [{"col": "COUNT(*)", "dir": "desc"}]
        }));
        assert_eq!(ok.validate(), Ok(()));
    }

    #[test]
    fn validate_allows_star_only_for_count() {
        let sum_star = query(json!({"select": ["day", {"SUM": "*"}], "from": "events", "group_by": ["day"]}));
        assert_eq!(sum_star.validate(), Err(RouteError::InvalidAggregate("SUM(*)".into())));
        assert!(sum_star.validate().unwrap_err().is_client_error());

        let avg_star = query(json!({"select": [{"avg": "*"}], "from": "events"}));
        assert_eq!(avg_star.validate(), Err(RouteError::InvalidAggregate("AVG(*)".into())));

        let count_star = query(json!({"select": [{"COUNT": "*"}], "from": "events"}));
        assert_eq!(count_star.validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_empty_select() {
        let q = query(json!({"select": [], "from": "events"}));
        assert_eq!(q.validate(), Err(RouteError::EmptySelect));
    }
}
