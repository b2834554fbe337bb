//! Data structures shared by the parser, resolver and transpiler.
//!
//! The parser produces an [`AttributeMap`]; the resolver turns it into an
//! [`Intent`]; the transpiler renders an intent as a [`Statement`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Key under which a bare-identifier projection (`{name, email}`) is stored.
pub const COLUMNS_KEY: &str = "_columns";

/// A single loosely-typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// The value as plain text, without SQL quoting.
    pub fn as_text(&self) -> String {
        match self {
            Scalar::Null => "null".to_string(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }

    /// Interpret the value as an integer, if it is one.
    ///
    /// Integral floats and numeric strings are accepted.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(n) => Some(*n),
            Scalar::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Scalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Null => serde_json::Value::Null,
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
            Scalar::Int(n) => serde_json::Value::from(*n),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Scalar::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<i32> for Scalar {
    fn from(n: i32) -> Self {
        Scalar::Int(n as i64)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Int(n)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Float(n)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "NULL"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(n) => write!(f, "{}", n),
            Scalar::Float(n) => write!(f, "{}", n),
            Scalar::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// A value in an attribute map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Scalar(Scalar),
    /// Ordered, possibly heterogeneous list (`[1, 'a']`).
    List(Vec<AttrValue>),
    /// Inclusive bounds (`(1, 10)`). `low > high` is kept as written.
    Range { low: i64, high: i64 },
}

impl AttrValue {
    /// Lists and ranges mean "match one of these" rather than "set to this".
    pub fn is_list_or_range(&self) -> bool {
        matches!(self, AttrValue::List(_) | AttrValue::Range { .. })
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            AttrValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Scalar(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttrValue::Scalar(s) => s.to_json(),
            AttrValue::List(items) => {
                serde_json::Value::Array(items.iter().map(AttrValue::to_json).collect())
            }
            AttrValue::Range { low, high } => serde_json::json!({ "range": [low, high] }),
        }
    }
}

impl From<Scalar> for AttrValue {
    fn from(v: Scalar) -> Self {
        AttrValue::Scalar(v)
    }
}

macro_rules! attr_value_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for AttrValue {
                fn from(v: $t) -> Self {
                    AttrValue::Scalar(v.into())
                }
            }
        )*
    };
}

attr_value_from!(bool, i32, i64, f64, &str, String);

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Scalar(s) => write!(f, "{}", s),
            AttrValue::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            AttrValue::Range { low, high } => write!(f, "({}, {})", low, high),
        }
    }
}

/// Parsed argument expression. Keys are unique; the last write wins.
pub type AttributeMap = BTreeMap<String, AttrValue>;

/// The data command being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// INSERT
    Create,
    /// SELECT
    Get,
    /// UPDATE
    Update,
    /// DELETE
    Delete,
}

impl Command {
    /// Match a command keyword, ignoring case.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "CREATE" => Some(Command::Create),
            "GET" => Some(Command::Get),
            "UPDATE" => Some(Command::Update),
            "DELETE" => Some(Command::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Create => write!(f, "CREATE"),
            Command::Get => write!(f, "GET"),
            Command::Update => write!(f, "UPDATE"),
            Command::Delete => write!(f, "DELETE"),
        }
    }
}

/// Option keys recognized regardless of case.
///
/// Reserved options always take priority over user columns with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservedOption {
    Up,
    Down,
    Lim,
    Off,
    Like,
    Count,
    Distinct,
    Min,
    Max,
    Avg,
    Sum,
}

impl ReservedOption {
    pub const ALL: [ReservedOption; 11] = [
        ReservedOption::Up,
        ReservedOption::Down,
        ReservedOption::Lim,
        ReservedOption::Off,
        ReservedOption::Like,
        ReservedOption::Count,
        ReservedOption::Distinct,
        ReservedOption::Min,
        ReservedOption::Max,
        ReservedOption::Avg,
        ReservedOption::Sum,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            ReservedOption::Up => "up",
            ReservedOption::Down => "down",
            ReservedOption::Lim => "lim",
            ReservedOption::Off => "off",
            ReservedOption::Like => "like",
            ReservedOption::Count => "count",
            ReservedOption::Distinct => "distinct",
            ReservedOption::Min => "min",
            ReservedOption::Max => "max",
            ReservedOption::Avg => "avg",
            ReservedOption::Sum => "sum",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|opt| key.eq_ignore_ascii_case(opt.keyword()))
    }
}

/// Which columns a SELECT returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Projection {
    #[default]
    All,
    Columns(Vec<String>),
}

/// Sort order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    pub direction: SortOrder,
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    /// Name of the result column (`SELECT MAX(x) AS max`).
    pub fn alias(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Avg => "avg",
            AggregateFunc::Min => "min",
            AggregateFunc::Max => "max",
        }
    }
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunc::Count => write!(f, "COUNT"),
            AggregateFunc::Sum => write!(f, "SUM"),
            AggregateFunc::Avg => write!(f, "AVG"),
            AggregateFunc::Min => write!(f, "MIN"),
            AggregateFunc::Max => write!(f, "MAX"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AggregateTarget {
    /// `*`, only valid for COUNT
    Star,
    Column(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub func: AggregateFunc,
    pub target: AggregateTarget,
    pub distinct: bool,
}

/// A LIKE pattern OR-combined across several columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSearch {
    pub pattern: String,
    pub columns: Vec<String>,
}

/// A field that narrows which rows a command affects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub value: AttrValue,
}

impl Filter {
    pub fn new(field: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A WHERE condition derived from a [`Filter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Eq { column: String, value: Scalar },
    IsNull { column: String },
    In { column: String, values: Vec<Scalar> },
    Between { column: String, low: i64, high: i64 },
    /// Matches no row (an empty IN list).
    Never,
}

/// A column assignment for INSERT or UPDATE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: String,
    pub value: Scalar,
}

/// A resolved read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QueryIntent {
    pub projection: Projection,
    /// AND-combined
    pub filters: Vec<Filter>,
    pub search: Option<TextSearch>,
    pub order: Option<Order>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub aggregate: Option<Aggregate>,
}

/// An UPDATE split into the rows to match and the values to write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldClassification {
    pub filter_fields: Vec<Filter>,
    pub update_fields: Vec<Assignment>,
}

impl FieldClassification {
    /// An update without filters touches every row.
    pub fn needs_confirmation(&self) -> bool {
        self.filter_fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertIntent {
    pub values: Vec<Assignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteIntent {
    pub filters: Vec<Filter>,
}

/// The resolved form of one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Intent {
    Insert(InsertIntent),
    Query(QueryIntent),
    Update(FieldClassification),
    Delete(DeleteIntent),
}

/// A column as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub is_text: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, is_text: bool) -> Self {
        Self {
            name: name.into(),
            is_text,
        }
    }
}

/// A table, optionally qualified by its database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub database: Option<String>,
    pub table: String,
}

impl TableRef {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            database: None,
            table: table.into(),
        }
    }

    pub fn in_database(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            table: table.into(),
        }
    }
}

/// A parameterized SQL statement with `?` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Scalar>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Scalar>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}
