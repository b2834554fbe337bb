//! Rendering of shell replies.
//!
//! A command typed in uppercase (`GET 1`) prints MySQL-style tables; any
//! other casing (`get 1`, `Get 1`) prints JSON.

use colored::*;
use serde_json::Value;

use crate::ast::AggregateFunc;
use crate::engine::ResultSet;

/// How a reply is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Json,
    Table,
}

impl OutputMode {
    /// Table output for an all-uppercase command keyword, JSON otherwise.
    pub fn for_keyword(keyword: &str) -> Self {
        if keyword == keyword.to_ascii_uppercase() {
            OutputMode::Table
        } else {
            OutputMode::Json
        }
    }
}

/// The result of one shell command, before formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Rows from GET. `single` asks for a lone `Record:` object.
    Records { rows: ResultSet, single: bool },
    /// GET matched nothing.
    NoRecords,
    Aggregate { func: AggregateFunc, rows: ResultSet },
    Created { id: u64, record: Value },
    /// `rows` holds the re-selected rows (JSON mode only).
    Updated {
        affected: u64,
        rows: Option<ResultSet>,
        unfiltered: bool,
    },
    Deleted { affected: u64 },
    /// `GET dbs` / `GET tables`.
    Names {
        title: String,
        heading: String,
        names: Vec<String>,
    },
    Switched(String),
}

/// Formats replies for the terminal.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    pub color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn render(&self, reply: &Reply, mode: OutputMode) -> String {
        match (reply, mode) {
            (Reply::NoRecords, _) => "No records found".to_string(),
            (Reply::Switched(msg), _) => msg.clone(),

            (Reply::Records { rows, single }, OutputMode::Json) => {
                let records = rows.records();
                if *single && records.len() == 1 {
                    format!("Record: {}", self.json(&records[0]))
                } else {
                    format!("Records: {}", self.json(&Value::Array(records)))
                }
            }
            (Reply::Records { rows, .. }, OutputMode::Table) => table(rows),

            (Reply::Aggregate { func, rows }, OutputMode::Json) => {
                let value = rows.records().into_iter().next().unwrap_or(Value::Null);
                let label = match func {
                    AggregateFunc::Count => "Count".to_string(),
                    other => other.to_string(),
                };
                format!("{}: {}", label, self.json(&value))
            }
            (Reply::Aggregate { rows, .. }, OutputMode::Table) => table(rows),

            (Reply::Created { record, .. }, OutputMode::Json) => {
                format!("Created: {}", self.json(record))
            }
            (Reply::Created { id, .. }, OutputMode::Table) => {
                format!("Query OK, 1 row affected\nLast insert ID: {}", id)
            }

            (
                Reply::Updated {
                    affected,
                    rows: Some(rows),
                    unfiltered,
                },
                OutputMode::Json,
            ) => {
                let body = format!("Records: {}", self.json(&Value::Array(rows.records())));
                if *unfiltered {
                    format!("Updated {} record(s). Showing first 10:\n{}", affected, body)
                } else {
                    body
                }
            }
            (Reply::Updated { affected, .. }, _) | (Reply::Deleted { affected }, OutputMode::Table) => {
                affected_line(*affected)
            }
            (Reply::Deleted { affected }, OutputMode::Json) => {
                format!("Deleted {} record(s)", affected)
            }

            (Reply::Names { title, names, .. }, OutputMode::Json) => {
                let list = Value::Array(names.iter().cloned().map(Value::String).collect());
                format!("{}: {}", title, self.json(&list))
            }
            (Reply::Names { heading, names, .. }, OutputMode::Table) => {
                let rows = names.iter().map(|n| vec![Value::String(n.clone())]).collect();
                table(&ResultSet::new(vec![heading.clone()], rows))
            }
        }
    }

    /// Pretty-print JSON, coloured when enabled.
    pub fn json(&self, value: &Value) -> String {
        if self.color {
            let mut out = String::new();
            colorize(value, 0, &mut out);
            out
        } else {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
    }
}

fn affected_line(n: u64) -> String {
    let noun = if n == 1 { "row" } else { "rows" };
    format!("Query OK, {} {} affected", n, noun)
}

fn colorize(value: &Value, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth + 1);
    let close = "  ".repeat(depth);

    match value {
        Value::Null => out.push_str(&"null".bright_black().bold().to_string()),
        Value::Bool(b) => out.push_str(&b.to_string().yellow().to_string()),
        Value::Number(n) => out.push_str(&n.to_string().cyan().to_string()),
        Value::String(s) => out.push_str(&Value::String(s.clone()).to_string().green().to_string()),
        Value::Array(items) if items.is_empty() => out.push_str("[]"),
        Value::Array(items) => {
            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                out.push_str(&pad);
                colorize(item, depth + 1, out);
                if i + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&close);
            out.push(']');
        }
        Value::Object(map) if map.is_empty() => out.push_str("{}"),
        Value::Object(map) => {
            out.push_str("{\n");
            for (i, (key, item)) in map.iter().enumerate() {
                out.push_str(&pad);
                let key = Value::String(key.clone()).to_string();
                out.push_str(&key.blue().bold().to_string());
                out.push_str(": ");
                colorize(item, depth + 1, out);
                if i + 1 < map.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&close);
            out.push('}');
        }
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// MySQL-style table with a row-count footer.
pub fn table(rows: &ResultSet) -> String {
    let mut widths: Vec<usize> = rows.columns.iter().map(|c| c.chars().count()).collect();
    let cells: Vec<Vec<String>> = rows
        .rows
        .iter()
        .map(|row| row.iter().map(cell).collect())
        .collect();

    for row in &cells {
        for (i, c) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(c.chars().count());
            }
        }
    }

    let line = |values: &[String]| -> String {
        let mut s = String::new();
        for (value, width) in values.iter().zip(&widths) {
            s.push_str(&format!("| {:<width$} ", value, width = width));
        }
        s.push('|');
        s
    };

    let mut out = Vec::new();
    out.push(line(rows.columns.as_slice()));

    let mut sep = String::new();
    for width in &widths {
        sep.push('+');
        sep.push_str(&"-".repeat(width + 2));
    }
    sep.push('+');
    out.push(sep);

    for row in &cells {
        out.push(line(row.as_slice()));
    }

    let noun = if cells.len() == 1 { "row" } else { "rows" };
    out.push(String::new());
    out.push(format!("{} {} in set", cells.len(), noun));
    out.join("\n")
}
