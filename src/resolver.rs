//! Query intent resolver.
//!
//! Classifies a parsed [`AttributeMap`] into an [`Intent`]: options
//! (aggregate, LIKE, ordering, pagination, projection) are pulled out first,
//! the remaining keys become filters, insert values, or, for UPDATE, are
//! split into filter and update fields.
//!
//! Resolution runs in two steps so that option errors surface before the
//! caller talks to the store:
//!
//! ```rust,ignore
//! let prepared = resolver::prepare(attrs, Command::Get)?;   // no schema needed
//! let columns = if prepared.needs_schema() { store.list_columns(&table).await? } else { vec![] };
//! let intent = prepared.finish(&columns)?;
//! ```

use crate::ast::*;
use crate::error::{NoqliError, NoqliResult};

/// Resolve in one go against an already known column list.
pub fn resolve(attrs: AttributeMap, command: Command, columns: &[ColumnInfo]) -> NoqliResult<Intent> {
    prepare(attrs, command)?.finish(columns)
}

/// Extract and validate everything that does not depend on the schema.
pub fn prepare(mut attrs: AttributeMap, command: Command) -> NoqliResult<Prepared> {
    if command != Command::Get {
        reject_options(&attrs, command)?;
        return Ok(Prepared {
            command,
            attrs,
            options: QueryOptions::default(),
        });
    }

    let options = QueryOptions::extract(&mut attrs)?;
    Ok(Prepared {
        command,
        attrs,
        options,
    })
}

/// A command whose options have been extracted but whose fields have not
/// yet been checked against the table's columns.
#[derive(Debug, Clone)]
pub struct Prepared {
    command: Command,
    attrs: AttributeMap,
    options: QueryOptions,
}

impl Prepared {
    pub fn command(&self) -> Command {
        self.command
    }

    /// Whether [`Prepared::finish`] needs the live column list.
    pub fn needs_schema(&self) -> bool {
        match self.command {
            Command::Update => true,
            Command::Get => {
                let searches_all = self.options.like.is_some()
                    && matches!(self.options.projection, Projection::All);
                let names_column = matches!(
                    self.options.aggregate,
                    Some(PendingAggregate {
                        target: AggregateTarget::Column(_),
                        ..
                    })
                );
                searches_all || names_column
            }
            Command::Create | Command::Delete => false,
        }
    }

    /// Finish resolution against the table's current columns.
    pub fn finish(self, columns: &[ColumnInfo]) -> NoqliResult<Intent> {
        match self.command {
            Command::Get => self.options.into_query(self.attrs, columns).map(Intent::Query),
            Command::Update => classify_update(self.attrs, columns).map(Intent::Update),
            Command::Create => resolve_insert(self.attrs).map(Intent::Insert),
            Command::Delete => resolve_delete(self.attrs).map(Intent::Delete),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingAggregate {
    func: AggregateFunc,
    target: AggregateTarget,
    distinct: bool,
}

#[derive(Debug, Clone, Default)]
struct QueryOptions {
    aggregate: Option<PendingAggregate>,
    projection: Projection,
    like: Option<String>,
    order: Option<Order>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl QueryOptions {
    fn extract(attrs: &mut AttributeMap) -> NoqliResult<Self> {
        let aggregate = take_aggregate(attrs)?;

        // Before LIKE: the search runs over the projected columns when given.
        let projection = take_projection(attrs)?;

        let like = take_option(attrs, ReservedOption::Like)
            .map(|value| match value {
                AttrValue::Scalar(s) => Ok(like_pattern(&s.as_text())),
                other => Err(NoqliError::InvalidValue(format!(
                    "LIKE expects a single value, got {}",
                    other
                ))),
            })
            .transpose()?;

        // `down` is read after `up`, so it wins when both are given.
        let mut order = None;
        for (option, direction) in [
            (ReservedOption::Up, SortOrder::Asc),
            (ReservedOption::Down, SortOrder::Desc),
        ] {
            if let Some(value) = take_option(attrs, option) {
                let column = value.as_str().ok_or_else(|| {
                    NoqliError::InvalidValue(format!(
                        "{} expects a column name, got {}",
                        option.keyword(),
                        value
                    ))
                })?;
                order = Some(Order {
                    column: column.to_string(),
                    direction,
                });
            }
        }

        let limit = take_option(attrs, ReservedOption::Lim)
            .map(|v| pagination(&v, "LIMIT"))
            .transpose()?;
        let offset = take_option(attrs, ReservedOption::Off)
            .map(|v| pagination(&v, "OFFSET"))
            .transpose()?;

        Ok(Self {
            aggregate,
            projection,
            like,
            order,
            limit,
            offset,
        })
    }

    fn into_query(self, attrs: AttributeMap, columns: &[ColumnInfo]) -> NoqliResult<QueryIntent> {
        let aggregate = self
            .aggregate
            .map(|pending| {
                if let AggregateTarget::Column(name) = &pending.target {
                    if !columns.is_empty() && !columns.iter().any(|c| &c.name == name) {
                        return Err(NoqliError::UnknownColumnForAggregate {
                            func: pending.func.to_string(),
                            target: name.clone(),
                        });
                    }
                }
                Ok(Aggregate {
                    func: pending.func,
                    target: pending.target,
                    distinct: pending.distinct,
                })
            })
            .transpose()?;

        let search = self
            .like
            .map(|pattern| {
                let columns: Vec<String> = match &self.projection {
                    Projection::Columns(cols) => cols.clone(),
                    Projection::All => columns
                        .iter()
                        .filter(|c| c.is_text)
                        .map(|c| c.name.clone())
                        .collect(),
                };
                if columns.is_empty() {
                    return Err(NoqliError::NoSearchColumns);
                }
                Ok(TextSearch { pattern, columns })
            })
            .transpose()?;

        Ok(QueryIntent {
            projection: self.projection,
            filters: into_filters(attrs)?,
            search,
            order: self.order,
            limit: self.limit,
            offset: self.offset,
            aggregate,
        })
    }
}

impl Filter {
    /// Map the filter value to a WHERE condition.
    ///
    /// Scalars compare for equality (NULL becomes `IS NULL`), lists test
    /// membership, ranges are inclusive. An empty list matches nothing and a
    /// range with `low > high` is passed through unchanged.
    pub fn condition(&self) -> NoqliResult<Condition> {
        let column = self.field.clone();
        match &self.value {
            AttrValue::Scalar(Scalar::Null) => Ok(Condition::IsNull { column }),
            AttrValue::Scalar(value) => Ok(Condition::Eq {
                column,
                value: value.clone(),
            }),
            AttrValue::List(items) if items.is_empty() => Ok(Condition::Never),
            AttrValue::List(items) => {
                let values = items
                    .iter()
                    .map(|item| {
                        item.as_scalar().cloned().ok_or_else(|| {
                            NoqliError::InvalidValue(format!(
                                "nested value {} in list for '{}'",
                                item, self.field
                            ))
                        })
                    })
                    .collect::<NoqliResult<Vec<_>>>()?;
                Ok(Condition::In { column, values })
            }
            AttrValue::Range { low, high } => Ok(Condition::Between {
                column,
                low: *low,
                high: *high,
            }),
        }
    }
}

/// Remove a reserved option, matching its key in any case.
///
/// If the same option appears under several casings the last key in map
/// order wins and all of them are removed.
fn take_option(attrs: &mut AttributeMap, option: ReservedOption) -> Option<AttrValue> {
    let keys: Vec<String> = attrs
        .keys()
        .filter(|k| k.eq_ignore_ascii_case(option.keyword()))
        .cloned()
        .collect();

    keys.into_iter().filter_map(|k| attrs.remove(&k)).last()
}

fn take_aggregate(attrs: &mut AttributeMap) -> NoqliResult<Option<PendingAggregate>> {
    let mut found = Vec::new();
    for (option, func) in [
        (ReservedOption::Count, AggregateFunc::Count),
        (ReservedOption::Min, AggregateFunc::Min),
        (ReservedOption::Max, AggregateFunc::Max),
        (ReservedOption::Avg, AggregateFunc::Avg),
        (ReservedOption::Sum, AggregateFunc::Sum),
    ] {
        if let Some(value) = take_option(attrs, option) {
            found.push((func, value));
        }
    }

    let distinct = take_option(attrs, ReservedOption::Distinct);

    if found.len() > 1 {
        let names: Vec<String> = found.iter().map(|(f, _)| f.to_string()).collect();
        return Err(NoqliError::AmbiguousAggregate(names.join(", ")));
    }

    let Some((func, value)) = found.pop() else {
        if distinct.is_some() {
            return Err(NoqliError::InvalidValue(
                "DISTINCT requires COUNT, MIN, MAX, AVG or SUM".to_string(),
            ));
        }
        return Ok(None);
    };

    let target = match value.as_str() {
        Some("*") if func == AggregateFunc::Count => AggregateTarget::Star,
        Some(name) if name != "*" && !name.is_empty() => AggregateTarget::Column(name.to_string()),
        _ => {
            return Err(NoqliError::UnknownColumnForAggregate {
                func: func.to_string(),
                target: value.to_string(),
            });
        }
    };

    // DISTINCT only applies to a named column; COUNT(*) counts every row.
    let distinct = matches!(target, AggregateTarget::Column(_))
        && distinct.as_ref().is_some_and(is_truthy);

    Ok(Some(PendingAggregate {
        func,
        target,
        distinct,
    }))
}

fn take_projection(attrs: &mut AttributeMap) -> NoqliResult<Projection> {
    let Some(value) = attrs.remove(COLUMNS_KEY) else {
        return Ok(Projection::All);
    };

    let AttrValue::List(items) = value else {
        return Err(NoqliError::InvalidValue(format!(
            "column selection must be a list of names, got {}",
            value
        )));
    };

    let names = items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                NoqliError::InvalidValue(format!("invalid column name {}", item))
            })
        })
        .collect::<NoqliResult<Vec<_>>>()?;

    if names.is_empty() {
        Ok(Projection::All)
    } else {
        Ok(Projection::Columns(names))
    }
}

fn like_pattern(text: &str) -> String {
    if text.contains('%') {
        text.to_string()
    } else {
        format!("%{}%", text)
    }
}

fn pagination(value: &AttrValue, what: &str) -> NoqliResult<u64> {
    let n = value
        .as_scalar()
        .and_then(Scalar::as_int)
        .ok_or_else(|| NoqliError::InvalidPagination(format!("{} must be an integer", what)))?;

    u64::try_from(n)
        .map_err(|_| NoqliError::InvalidPagination(format!("{} must be non-negative", what)))
}

fn is_truthy(value: &AttrValue) -> bool {
    match value {
        AttrValue::Scalar(Scalar::Bool(b)) => *b,
        AttrValue::Scalar(Scalar::Int(n)) => *n != 0,
        AttrValue::Scalar(Scalar::Text(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn reject_options(attrs: &AttributeMap, command: Command) -> NoqliResult<()> {
    if let Some(key) = attrs.keys().find(|k| ReservedOption::from_key(k).is_some()) {
        return Err(NoqliError::unsupported(key.as_str(), command));
    }
    if attrs.contains_key(COLUMNS_KEY) {
        return Err(NoqliError::InvalidValue(format!(
            "column selection is only supported by GET, not {}",
            command
        )));
    }
    Ok(())
}

fn into_filters(attrs: AttributeMap) -> NoqliResult<Vec<Filter>> {
    attrs
        .into_iter()
        .map(|(field, value)| {
            let filter = Filter { field, value };
            filter.condition()?;
            Ok(filter)
        })
        .collect()
}

fn into_assignment(column: String, value: AttrValue) -> NoqliResult<Assignment> {
    match value {
        AttrValue::Scalar(value) => Ok(Assignment { column, value }),
        other => Err(NoqliError::InvalidValue(format!(
            "cannot store {} in '{}'",
            other, column
        ))),
    }
}

/// Split UPDATE fields.
///
/// `id` always filters. A known column with a list or range value filters.
/// Everything else, unknown keys included, is written.
fn classify_update(attrs: AttributeMap, columns: &[ColumnInfo]) -> NoqliResult<FieldClassification> {
    if attrs.is_empty() {
        return Err(NoqliError::NoUpdateFields(""));
    }

    let is_known = |key: &str| columns.iter().any(|c| c.name == key);

    if attrs.len() == 1 {
        if let Some((key, value)) = attrs.iter().next() {
            if value.is_list_or_range() && is_known(key) {
                return Err(NoqliError::NoUpdateFields(" (filter only provided)"));
            }
        }
    }

    let mut filter_fields = Vec::new();
    let mut update_fields = Vec::new();

    for (key, value) in attrs {
        if key == "id" || (is_known(&key) && value.is_list_or_range()) {
            filter_fields.push(Filter { field: key, value });
        } else {
            update_fields.push(into_assignment(key, value)?);
        }
    }

    if update_fields.is_empty() {
        return Err(NoqliError::NoUpdateFields(""));
    }

    for filter in &filter_fields {
        filter.condition()?;
    }

    Ok(FieldClassification {
        filter_fields,
        update_fields,
    })
}

fn resolve_insert(attrs: AttributeMap) -> NoqliResult<InsertIntent> {
    if attrs.is_empty() {
        return Err(NoqliError::InvalidValue(
            "CREATE requires fields to insert".to_string(),
        ));
    }

    let values = attrs
        .into_iter()
        .map(|(column, value)| into_assignment(column, value))
        .collect::<NoqliResult<Vec<_>>>()?;

    Ok(InsertIntent { values })
}

fn resolve_delete(attrs: AttributeMap) -> NoqliResult<DeleteIntent> {
    if !attrs.contains_key("id") {
        return Err(NoqliError::MissingFilter("DELETE"));
    }
    Ok(DeleteIntent {
        filters: into_filters(attrs)?,
    })
}
