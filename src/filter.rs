//! 元数据和文本过滤条件
//!
//! 语法与常见向量数据库的 JSON 过滤条件一致，例如：
//!
//! ```json
//! {"category": "animal"}
//! {"$or": [{"category": "sport"}, {"item_id": {"$in": ["Lion", "Tiger"]}}]}
//! ```

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::{CollectionError, Result};
use crate::record::Metadata;

/// 元数据过滤条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Where {
    Eq(String, String),
    /// 不含该键的记录也满足条件
    Ne(String, String),
    In(String, Vec<String>),
    /// 不含该键的记录也满足条件
    Nin(String, Vec<String>),
    And(Vec<Where>),
    Or(Vec<Where>),
}

impl Where {
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = as_object(value)?;
        let mut clauses = object
            .iter()
            .map(|(key, value)| match key.as_str() {
                "$and" => Ok(Self::And(parse_list(value, Self::from_value)?)),
                "$or" => Ok(Self::Or(parse_list(value, Self::from_value)?)),
                op if op.starts_with('$') => Err(invalid(format!("未知的逻辑运算符 {op}"))),
                key => Self::parse_field(key, value),
            })
            .collect::<Result<Vec<_>>>()?;

        match clauses.len() {
            0 => Err(invalid("过滤条件不能为空")),
            1 => Ok(clauses.remove(0)),
            _ => Ok(Self::And(clauses)),
        }
    }

    fn parse_field(key: &str, value: &Value) -> Result<Self> {
        let key = key.to_owned();
        let Value::Object(ops) = value else {
            return Ok(Self::Eq(key, scalar(value)?));
        };
        let (Some((op, operand)), 1) = (ops.iter().next(), ops.len()) else {
            return Err(invalid(format!("字段 {key} 只能有一个运算符")));
        };
        match op.as_str() {
            "$eq" => Ok(Self::Eq(key, scalar(operand)?)),
            "$ne" => Ok(Self::Ne(key, scalar(operand)?)),
            "$in" => Ok(Self::In(key, parse_list(operand, scalar)?)),
            "$nin" => Ok(Self::Nin(key, parse_list(operand, scalar)?)),
            op => Err(invalid(format!("未知的运算符 {op}"))),
        }
    }

    /// 判断元数据是否满足条件
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Eq(key, value) => metadata.get(key) == Some(value),
            Self::Ne(key, value) => metadata.get(key) != Some(value),
            Self::In(key, values) => metadata.get(key).is_some_and(|v| values.contains(v)),
            Self::Nin(key, values) => !metadata.get(key).is_some_and(|v| values.contains(v)),
            Self::And(clauses) => clauses.iter().all(|c| c.matches(metadata)),
            Self::Or(clauses) => clauses.iter().any(|c| c.matches(metadata)),
        }
    }
}

impl FromStr for Where {
    type Err = CollectionError;

    fn from_str(s: &str) -> Result<Self> {
        let value = serde_json::from_str(s).map_err(|e| invalid(e.to_string()))?;
        Self::from_value(&value)
    }
}

/// 文本过滤条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhereDocument {
    Contains(String),
    NotContains(String),
    And(Vec<WhereDocument>),
    Or(Vec<WhereDocument>),
}

impl WhereDocument {
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = as_object(value)?;
        let (Some((op, operand)), 1) = (object.iter().next(), object.len()) else {
            return Err(invalid("文本过滤条件只能有一个运算符"));
        };
        match op.as_str() {
            "$contains" => Ok(Self::Contains(scalar(operand)?)),
            "$not_contains" => Ok(Self::NotContains(scalar(operand)?)),
            "$and" => Ok(Self::And(parse_list(operand, Self::from_value)?)),
            "$or" => Ok(Self::Or(parse_list(operand, Self::from_value)?)),
            op => Err(invalid(format!("未知的文本运算符 {op}"))),
        }
    }

    /// 判断文本是否满足条件，没有文本的记录视为空字符串
    pub fn matches(&self, document: Option<&str>) -> bool {
        let text = document.unwrap_or_default();
        match self {
            Self::Contains(s) => text.contains(s.as_str()),
            Self::NotContains(s) => !text.contains(s.as_str()),
            Self::And(clauses) => clauses.iter().all(|c| c.matches(document)),
            Self::Or(clauses) => clauses.iter().any(|c| c.matches(document)),
        }
    }
}

impl FromStr for WhereDocument {
    type Err = CollectionError;

    fn from_str(s: &str) -> Result<Self> {
        let value = serde_json::from_str(s).map_err(|e| invalid(e.to_string()))?;
        Self::from_value(&value)
    }
}

fn invalid(msg: impl Into<String>) -> CollectionError {
    CollectionError::InvalidWhere(msg.into())
}

fn as_object(value: &Value) -> Result<&Map<String, Value>> {
    value.as_object().ok_or_else(|| invalid(format!("过滤条件必须是对象: {value}")))
}

fn scalar(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(invalid(format!("无效的值: {value}"))),
    }
}

fn parse_list<T>(value: &Value, f: impl Fn(&Value) -> Result<T>) -> Result<Vec<T>> {
    let items = value.as_array().ok_or_else(|| invalid(format!("需要数组: {value}")))?;
    if items.is_empty() {
        return Err(invalid("数组不能为空"));
    }
    items.iter().map(f).collect()
}
