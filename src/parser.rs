//! Argument expression parser using nom.
//!
//! Turns the argument of a command into an [`AttributeMap`].
//!
//! # Syntax Overview
//!
//! ```text
//! 14                                  -> {id: 14}
//! {}                                  -> {}
//! {name: 'John', age: 30}             plain pairs
//! {status: ['active', 'pending']}     list (IN)
//! {id: (1, 10)}                       id range (BETWEEN)
//! {[name, title] = 'Test'}            same value for several fields
//! {name, email, lim: 2}               bare words select columns
//! ```
//!
//! The body of `{...}` is split into clauses on top-level commas. Each clause
//! is classified on its own, then the clauses are applied in a fixed order:
//! assignments, the id range, lists, the column projection, and finally plain
//! pairs. Later phases overwrite earlier ones when they produce the same key.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{take_until, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, rest},
    sequence::{delimited, tuple},
};

use crate::ast::*;
use crate::error::{NoqliError, NoqliResult};

/// Parse a command argument into an attribute map.
///
/// Accepts an empty string, a bare non-negative integer (shorthand for
/// `{id: n}`) or a `{...}` expression.
pub fn parse(input: &str) -> NoqliResult<AttributeMap> {
    let trimmed = input.trim();
    let lead = input.len() - input.trim_start().len();

    if trimmed.is_empty() {
        return Ok(AttributeMap::new());
    }

    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        let id: i64 = trimmed
            .parse()
            .map_err(|_| NoqliError::malformed(lead, format!("id out of range: {}", trimmed)))?;
        let mut map = AttributeMap::new();
        map.insert("id".to_string(), AttrValue::from(id));
        return Ok(map);
    }

    if trimmed.len() >= 2 && trimmed.starts_with('{') && trimmed.ends_with('}') {
        return parse_object(&trimmed[1..trimmed.len() - 1], lead + 1);
    }

    Err(NoqliError::malformed(
        lead,
        "expected an id or a '{...}' expression",
    ))
}

/// A trimmed slice of the input and where it starts.
#[derive(Debug, Clone, Copy)]
struct Fragment<'a> {
    text: &'a str,
    offset: usize,
}

/// One classified clause, with its value already parsed.
#[derive(Debug)]
enum Clause {
    Assign { fields: Vec<String>, value: AttrValue },
    Range { low: i64, high: i64 },
    List { key: String, items: Vec<AttrValue> },
    Column(String),
    Pair { key: String, value: AttrValue },
}

impl Clause {
    /// Application order; a stable sort keeps textual order within a phase.
    fn phase(&self) -> u8 {
        match self {
            Clause::Assign { .. } => 0,
            Clause::Range { .. } => 1,
            Clause::List { .. } => 2,
            Clause::Column(_) => 3,
            Clause::Pair { .. } => 4,
        }
    }
}

fn parse_object(body: &str, offset: usize) -> NoqliResult<AttributeMap> {
    let mut clauses = split_top_level(body, offset)?
        .into_iter()
        .map(classify)
        .collect::<NoqliResult<Vec<_>>>()?;
    clauses.sort_by_key(Clause::phase);

    let mut map = AttributeMap::new();
    let mut columns = Vec::new();

    for clause in clauses {
        match clause {
            Clause::Assign { fields, value } => {
                for field in fields {
                    map.insert(field, value.clone());
                }
            }
            Clause::Range { low, high } => {
                map.insert("id".to_string(), AttrValue::Range { low, high });
            }
            Clause::List { key, items } => {
                map.insert(key, AttrValue::List(items));
            }
            Clause::Column(name) => columns.push(AttrValue::from(name)),
            Clause::Pair { key, value } => {
                map.insert(key, value);
            }
        }
    }

    if !columns.is_empty() {
        map.insert(COLUMNS_KEY.to_string(), AttrValue::List(columns));
    }

    Ok(map)
}

/// Split on commas that are outside quotes and brackets.
///
/// Empty pieces (`a,,b`, trailing commas) are dropped.
fn split_top_level(input: &str, offset: usize) -> NoqliResult<Vec<Fragment<'_>>> {
    let mut parts = Vec::new();
    let mut stack: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => quote = Some(c),
            '[' | '(' | '{' => stack.push(c),
            ']' | ')' | '}' => {
                let open = match c {
                    ']' => '[',
                    ')' => '(',
                    _ => '{',
                };
                if stack.pop() != Some(open) {
                    return Err(NoqliError::malformed(
                        offset + i,
                        format!("unbalanced '{}'", c),
                    ));
                }
            }
            ',' if stack.is_empty() => {
                push_fragment(&mut parts, &input[start..i], offset + start);
                start = i + 1;
            }
            _ => {}
        }
    }

    if let Some(q) = quote {
        return Err(NoqliError::malformed(
            offset + input.len(),
            format!("unterminated {} quote", q),
        ));
    }
    if let Some(open) = stack.last() {
        return Err(NoqliError::malformed(
            offset + input.len(),
            format!("unclosed '{}'", open),
        ));
    }

    push_fragment(&mut parts, &input[start..], offset + start);
    Ok(parts)
}

fn push_fragment<'a>(parts: &mut Vec<Fragment<'a>>, raw: &'a str, offset: usize) {
    let text = raw.trim();
    if !text.is_empty() {
        let lead = raw.len() - raw.trim_start().len();
        parts.push(Fragment {
            text,
            offset: offset + lead,
        });
    }
}

fn classify(fragment: Fragment<'_>) -> NoqliResult<Clause> {
    let text = fragment.text;

    if let Ok((_, (fields, value))) = assignment(text) {
        return parse_assignment(fields, value, fragment.offset);
    }

    if let Ok((_, name)) = all_consuming(identifier)(text) {
        return Ok(Clause::Column(name.to_string()));
    }

    let (_, (key, value)) = key_prefix(text).map_err(|_| {
        NoqliError::malformed(
            fragment.offset,
            format!("expected 'key: value', found '{}'", text),
        )
    })?;
    let value_offset = fragment.offset + (text.len() - value.len());
    let key = key.to_string();

    if value.is_empty() {
        return Err(NoqliError::malformed(
            value_offset,
            format!("missing value for '{}'", key),
        ));
    }

    if value.starts_with('(') && value.ends_with(')') {
        if key != "id" {
            return Err(NoqliError::malformed(
                fragment.offset,
                format!("range syntax is only supported for 'id', not '{}'", key),
            ));
        }
        let (low, high) = parse_range(&value[1..value.len() - 1], value_offset + 1)?;
        return Ok(Clause::Range { low, high });
    }

    if value.starts_with('[') && value.ends_with(']') {
        let items = parse_list(&value[1..value.len() - 1], value_offset + 1)?;
        return Ok(Clause::List { key, items });
    }

    Ok(Clause::Pair {
        key,
        value: parse_literal(value),
    })
}

fn parse_assignment(fields: &str, value: &str, offset: usize) -> NoqliResult<Clause> {
    let fields = fields
        .split(',')
        .map(|f| strip_quotes(f.trim()).to_string())
        .collect::<Vec<_>>();

    if fields.iter().any(String::is_empty) {
        return Err(NoqliError::malformed(offset, "empty field name in assignment"));
    }
    if value.is_empty() {
        return Err(NoqliError::malformed(offset, "missing value in assignment"));
    }

    Ok(Clause::Assign {
        fields,
        value: parse_literal(value),
    })
}

fn parse_range(body: &str, offset: usize) -> NoqliResult<(i64, i64)> {
    let bounds: Vec<&str> = body.split(',').map(str::trim).collect();
    if bounds.len() != 2 {
        return Err(NoqliError::malformed(
            offset,
            format!("range needs exactly two bounds, found {}", bounds.len()),
        ));
    }

    let low = bounds[0]
        .parse()
        .map_err(|_| NoqliError::malformed(offset, format!("invalid range start: '{}'", bounds[0])))?;
    let high = bounds[1]
        .parse()
        .map_err(|_| NoqliError::malformed(offset, format!("invalid range end: '{}'", bounds[1])))?;

    Ok((low, high))
}

/// Parse list items: quoted -> string, integer-looking -> integer,
/// anything else -> the raw word.
fn parse_list(body: &str, offset: usize) -> NoqliResult<Vec<AttrValue>> {
    split_top_level(body, offset)?
        .into_iter()
        .map(|item| {
            let text = item.text;
            if is_quoted(text) {
                Ok(AttrValue::from(&text[1..text.len() - 1]))
            } else if text.starts_with('[') && text.ends_with(']') {
                parse_list(&text[1..text.len() - 1], item.offset + 1).map(AttrValue::List)
            } else if let Ok(n) = text.parse::<i64>() {
                Ok(AttrValue::from(n))
            } else {
                Ok(AttrValue::from(text))
            }
        })
        .collect()
}

/// Decode a value as a structured literal, falling back to integer or
/// string with the surrounding quotes removed.
fn parse_literal(text: &str) -> AttrValue {
    let normalized = text.replace('\'', "\"");
    match serde_json::from_str::<serde_json::Value>(&normalized) {
        Ok(json) => from_json(json),
        Err(_) => match text.parse::<i64>() {
            Ok(n) => AttrValue::from(n),
            Err(_) => AttrValue::from(strip_quotes(text)),
        },
    }
}

fn from_json(json: serde_json::Value) -> AttrValue {
    use serde_json::Value as Json;

    match json {
        Json::Null => AttrValue::Scalar(Scalar::Null),
        Json::Bool(b) => AttrValue::from(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => AttrValue::from(i),
            None => n
                .as_f64()
                .map(AttrValue::from)
                .unwrap_or(AttrValue::Scalar(Scalar::Null)),
        },
        Json::String(s) => AttrValue::from(s),
        Json::Array(items) => AttrValue::List(items.into_iter().map(from_json).collect()),
        obj @ Json::Object(_) => AttrValue::from(obj.to_string()),
    }
}

fn is_quoted(text: &str) -> bool {
    text.len() >= 2
        && ((text.starts_with('\'') && text.ends_with('\''))
            || (text.starts_with('"') && text.ends_with('"')))
}

fn strip_quotes(text: &str) -> &str {
    text.trim_matches(|c| c == '\'' || c == '"')
}

/// Parse an identifier (field or column name).
fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')(input)
}

/// Parse a single- or double-quoted key.
fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
    ))(input)
}

/// Parse `key: value` into the key and the raw value.
fn key_prefix(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, key) = alt((quoted, identifier))(input)?;
    let (input, _) = tuple((multispace0, char(':'), multispace0))(input)?;
    let (input, value) = rest(input)?;
    Ok((input, (key, value.trim_end())))
}

/// Parse `[f1, f2] = value` into the field list and the raw value.
fn assignment(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, fields) = delimited(char('['), take_until("]"), char(']'))(input)?;
    let (input, _) = tuple((multispace0, char('='), multispace0))(input)?;
    let (input, value) = rest(input)?;
    Ok((input, (fields, value.trim_end())))
}
