//! SQL transpiler for resolved intents.
//!
//! Renders an [`Intent`] against a [`TableRef`] as a MySQL [`Statement`]
//! with `?` placeholders. Values never appear in the SQL text.

use crate::ast::*;
use crate::error::NoqliResult;

/// Trait for converting resolved nodes to a parameterized statement.
pub trait ToStatement {
    fn to_statement(&self, table: &TableRef) -> NoqliResult<Statement>;
}

impl ToStatement for Intent {
    fn to_statement(&self, table: &TableRef) -> NoqliResult<Statement> {
        match self {
            Intent::Insert(i) => i.to_statement(table),
            Intent::Query(q) => q.to_statement(table),
            Intent::Update(u) => u.to_statement(table),
            Intent::Delete(d) => d.to_statement(table),
        }
    }
}

/// Quote an identifier with backticks, doubling embedded ones.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// `` `db`.`table` `` or `` `table` ``.
pub fn qualified(table: &TableRef) -> String {
    match &table.database {
        Some(db) => format!("{}.{}", quote_ident(db), quote_ident(&table.table)),
        None => quote_ident(&table.table),
    }
}

/// DDL for a column created on the fly by CREATE or UPDATE.
pub fn add_column(table: &TableRef, column: &str) -> Statement {
    Statement::new(
        format!(
            "ALTER TABLE {} ADD COLUMN {} VARCHAR(255)",
            qualified(table),
            quote_ident(column)
        ),
        Vec::new(),
    )
}

impl Condition {
    /// Render this condition, appending its values to `params`.
    pub fn to_sql(&self, params: &mut Vec<Scalar>) -> String {
        match self {
            Condition::Eq { column, value } => {
                params.push(value.clone());
                format!("{} = ?", quote_ident(column))
            }
            Condition::IsNull { column } => format!("{} IS NULL", quote_ident(column)),
            Condition::In { column, values } => {
                params.extend(values.iter().cloned());
                let marks = vec!["?"; values.len()].join(", ");
                format!("{} IN ({})", quote_ident(column), marks)
            }
            Condition::Between { column, low, high } => {
                params.push(Scalar::Int(*low));
                params.push(Scalar::Int(*high));
                format!("{} BETWEEN ? AND ?", quote_ident(column))
            }
            Condition::Never => "0=1".to_string(),
        }
    }
}

/// AND-join the filters into a WHERE body.
///
/// Fails on a filter that has no condition form (a nested list).
fn where_clauses(filters: &[Filter], params: &mut Vec<Scalar>) -> NoqliResult<Vec<String>> {
    filters
        .iter()
        .map(|f| f.condition().map(|c| c.to_sql(params)))
        .collect()
}

impl Aggregate {
    fn to_sql(&self) -> String {
        let target = match &self.target {
            AggregateTarget::Star => "*".to_string(),
            AggregateTarget::Column(c) => quote_ident(c),
        };
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        format!("{}({}{}) AS {}", self.func, distinct, target, self.func.alias())
    }
}

impl ToStatement for QueryIntent {
    fn to_statement(&self, table: &TableRef) -> NoqliResult<Statement> {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        // Columns
        match (&self.aggregate, &self.projection) {
            (Some(agg), _) => sql.push_str(&agg.to_sql()),
            (None, Projection::All) => sql.push('*'),
            (None, Projection::Columns(cols)) => {
                let cols: Vec<String> = cols.iter().map(|c| quote_ident(c)).collect();
                sql.push_str(&cols.join(", "));
            }
        }

        sql.push_str(" FROM ");
        sql.push_str(&qualified(table));

        let mut clauses = where_clauses(&self.filters, &mut params)?;

        if let Some(search) = &self.search {
            let likes: Vec<String> = search
                .columns
                .iter()
                .map(|c| {
                    params.push(Scalar::Text(search.pattern.clone()));
                    format!("{} LIKE ?", quote_ident(c))
                })
                .collect();
            clauses.push(format!("({})", likes.join(" OR ")));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        // ORDER BY means nothing for a single aggregate row.
        if self.aggregate.is_none() {
            if let Some(order) = &self.order {
                let dir = match order.direction {
                    SortOrder::Asc => "ASC",
                    SortOrder::Desc => "DESC",
                };
                sql.push_str(&format!(" ORDER BY {} {}", quote_ident(&order.column), dir));
            }
        }

        if let Some(n) = self.limit {
            sql.push_str(" LIMIT ?");
            params.push(Scalar::Int(n as i64));

            if let Some(off) = self.offset {
                sql.push_str(" OFFSET ?");
                params.push(Scalar::Int(off as i64));
            }
        }

        Ok(Statement::new(sql, params))
    }
}

impl ToStatement for InsertIntent {
    fn to_statement(&self, table: &TableRef) -> NoqliResult<Statement> {
        let cols: Vec<String> = self.values.iter().map(|a| quote_ident(&a.column)).collect();
        let marks = vec!["?"; self.values.len()].join(", ");
        let params = self.values.iter().map(|a| a.value.clone()).collect();

        Ok(Statement::new(
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                qualified(table),
                cols.join(", "),
                marks
            ),
            params,
        ))
    }
}

impl ToStatement for FieldClassification {
    fn to_statement(&self, table: &TableRef) -> NoqliResult<Statement> {
        let mut params: Vec<Scalar> = Vec::new();
        let sets: Vec<String> = self
            .update_fields
            .iter()
            .map(|a| {
                params.push(a.value.clone());
                format!("{} = ?", quote_ident(&a.column))
            })
            .collect();

        let mut sql = format!("UPDATE {} SET {}", qualified(table), sets.join(", "));

        let clauses = where_clauses(&self.filter_fields, &mut params)?;
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        Ok(Statement::new(sql, params))
    }
}

impl ToStatement for DeleteIntent {
    fn to_statement(&self, table: &TableRef) -> NoqliResult<Statement> {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {}", qualified(table));

        let clauses = where_clauses(&self.filters, &mut params)?;
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        Ok(Statement::new(sql, params))
    }
}
