//! Command dispatcher.
//!
//! One input line runs to completion before the next is read:
//!
//! ```text
//! line ─► parse_line ─► parser::parse ─► resolver::prepare
//!                                            │ (columns, when needed)
//!                                            ▼
//!                     store ◄─ transpiler ◄─ finish
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::ast::*;
use crate::engine::TabularStore;
use crate::error::{NoqliError, NoqliResult};
use crate::output::{OutputMode, Reply};
use crate::parser;
use crate::resolver;
use crate::session::Session;
use crate::transpiler::ToStatement;

/// Shown before an UPDATE without filters.
pub const UPDATE_ALL_WARNING: &str = "Warning: No filter conditions specified. \
     This will update ALL records in the table.\nDo you want to continue? (y/N)";

/// Rows shown after an unfiltered UPDATE in JSON mode.
const UPDATE_PREVIEW_ROWS: u64 = 10;

/// Asks the user a yes/no question.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// One input line, split into its command and argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Exit,
    Use(String),
    ListDatabases { mode: OutputMode },
    ListTables { mode: OutputMode },
    Data {
        command: Command,
        mode: OutputMode,
        args: String,
    },
}

fn command_regex() -> &'static Regex {
    static COMMAND_REGEX: OnceLock<Regex> = OnceLock::new();
    COMMAND_REGEX.get_or_init(|| {
        Regex::new(r"(?is)^(CREATE|GET|UPDATE|DELETE|USE)\s*(.*)$").expect("valid command regex")
    })
}

/// Split a line into command and arguments.
pub fn parse_line(line: &str) -> NoqliResult<Line> {
    let trimmed = line.trim();

    if trimmed.eq_ignore_ascii_case("exit") {
        return Ok(Line::Exit);
    }

    let caps = command_regex()
        .captures(trimmed)
        .ok_or_else(|| NoqliError::InvalidCommand(trimmed.to_string()))?;

    let keyword = caps.get(1).map_or("", |m| m.as_str());
    let args = caps.get(2).map_or("", |m| m.as_str()).trim();
    let mode = OutputMode::for_keyword(keyword);

    if keyword.eq_ignore_ascii_case("use") {
        let name = args.trim_end_matches(';').trim().trim_matches('`');
        if name.is_empty() {
            return Err(NoqliError::InvalidCommand(trimmed.to_string()));
        }
        return Ok(Line::Use(name.to_string()));
    }

    let command = Command::from_keyword(keyword)
        .ok_or_else(|| NoqliError::InvalidCommand(trimmed.to_string()))?;

    if command == Command::Get {
        if args.eq_ignore_ascii_case("dbs") {
            return Ok(Line::ListDatabases { mode });
        }
        if args.eq_ignore_ascii_case("tables") {
            return Ok(Line::ListTables { mode });
        }
    }

    Ok(Line::Data {
        command,
        mode,
        args: args.to_string(),
    })
}

/// What running a line produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Exit,
    Reply { reply: Reply, mode: OutputMode },
}

/// Parse and resolve a data command without touching a store.
///
/// Used by `noqli explain`; `columns` stands in for the live schema.
pub fn explain(line: &str, table: &TableRef, columns: &[ColumnInfo]) -> NoqliResult<(Intent, Statement)> {
    let Line::Data { command, args, .. } = parse_line(line)? else {
        return Err(NoqliError::InvalidCommand(line.trim().to_string()));
    };

    let intent = resolver::resolve(parse_args(&args)?, command, columns)?;
    let stmt = intent.to_statement(table)?;
    Ok((intent, stmt))
}

fn parse_args(args: &str) -> NoqliResult<AttributeMap> {
    if args.trim().is_empty() {
        Ok(AttributeMap::new())
    } else {
        parser::parse(args)
    }
}

/// A shell bound to a store and a session.
pub struct Shell<S> {
    store: S,
    session: Session,
}

impl<S: TabularStore> Shell<S> {
    pub fn new(store: S, session: Session) -> Self {
        Self { store, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one input line.
    pub async fn run(&mut self, line: &str, confirm: &mut impl Confirm) -> NoqliResult<Outcome> {
        let (reply, mode) = match parse_line(line)? {
            Line::Exit => return Ok(Outcome::Exit),
            Line::Use(name) => (self.use_target(&name).await?, OutputMode::Table),
            Line::ListDatabases { mode } => {
                let names = self.store.list_databases().await?;
                let reply = Reply::Names {
                    title: "Databases".to_string(),
                    heading: "Database".to_string(),
                    names,
                };
                (reply, mode)
            }
            Line::ListTables { mode } => {
                let db = self
                    .session
                    .database()
                    .ok_or(NoqliError::NoDatabaseSelected)?
                    .to_string();
                let names = self.store.list_tables(&db).await?;
                let reply = Reply::Names {
                    title: format!("Tables in {}", db),
                    heading: format!("Tables_in_{}", db),
                    names,
                };
                (reply, mode)
            }
            Line::Data {
                command,
                mode,
                args,
            } => {
                let attrs = parse_args(&args)?;
                (self.dispatch(command, attrs, mode, confirm).await?, mode)
            }
        };

        Ok(Outcome::Reply { reply, mode })
    }

    async fn use_target(&mut self, name: &str) -> NoqliResult<Reply> {
        if self.store.database_exists(name).await? {
            self.session.use_database(name);
            return Ok(Reply::Switched(format!("Switched to database '{}'", name)));
        }

        let db = self
            .session
            .database()
            .ok_or(NoqliError::NoDatabaseSelected)?
            .to_string();

        if self.store.table_exists(&db, name).await? {
            self.session.use_table(name);
            Ok(Reply::Switched(format!("Using table '{}'", name)))
        } else {
            Err(NoqliError::UnknownTarget {
                database: db,
                table: name.to_string(),
            })
        }
    }

    async fn dispatch(
        &mut self,
        command: Command,
        attrs: AttributeMap,
        mode: OutputMode,
        confirm: &mut impl Confirm,
    ) -> NoqliResult<Reply> {
        let table = self.session.target()?;
        debug!(%command, table = %table.table, "dispatch");

        let prepared = resolver::prepare(attrs, command)?;
        let columns = if prepared.needs_schema() {
            self.store.list_columns(&table).await?
        } else {
            Vec::new()
        };

        match prepared.finish(&columns)? {
            Intent::Query(q) => self.get(&table, q).await,
            Intent::Insert(i) => self.create(&table, i).await,
            Intent::Update(c) => self.update(&table, c, &columns, mode, confirm).await,
            Intent::Delete(d) => self.delete(&table, d).await,
        }
    }

    async fn get(&self, table: &TableRef, q: QueryIntent) -> NoqliResult<Reply> {
        let rows = self.store.fetch(&q.to_statement(table)?).await?;

        if let Some(agg) = &q.aggregate {
            return Ok(Reply::Aggregate {
                func: agg.func,
                rows,
            });
        }

        if rows.is_empty() {
            return Ok(Reply::NoRecords);
        }

        let by_id = matches!(
            q.filters.as_slice(),
            [Filter { field, value: AttrValue::Scalar(_) }] if field == "id"
        );
        let single = by_id && q.search.is_none() && rows.len() == 1;
        Ok(Reply::Records { rows, single })
    }

    async fn create(&self, table: &TableRef, insert: InsertIntent) -> NoqliResult<Reply> {
        let known = self.store.list_columns(table).await?;
        self.ensure_columns(table, &known, insert.values.iter().map(|a| a.column.as_str()))
            .await?;

        let result = self.store.execute(&insert.to_statement(table)?).await?;

        let mut record: serde_json::Map<String, Value> = insert
            .values
            .iter()
            .map(|a| (a.column.clone(), a.value.to_json()))
            .collect();
        record.insert("id".to_string(), Value::from(result.last_insert_id));

        Ok(Reply::Created {
            id: result.last_insert_id,
            record: Value::Object(record),
        })
    }

    async fn update(
        &self,
        table: &TableRef,
        fields: FieldClassification,
        known: &[ColumnInfo],
        mode: OutputMode,
        confirm: &mut impl Confirm,
    ) -> NoqliResult<Reply> {
        let unfiltered = fields.needs_confirmation();
        if unfiltered && !confirm.confirm(UPDATE_ALL_WARNING) {
            return Err(NoqliError::Cancelled);
        }

        self.ensure_columns(table, known, fields.update_fields.iter().map(|a| a.column.as_str()))
            .await?;

        let result = self.store.execute(&fields.to_statement(table)?).await?;
        if result.rows_affected == 0 {
            return Err(NoqliError::NotFound("no records matched the filter criteria"));
        }

        // Filter and update keys never overlap, so the same WHERE finds the
        // updated rows again.
        let rows = match mode {
            OutputMode::Json => {
                let q = QueryIntent {
                    filters: fields.filter_fields,
                    limit: unfiltered.then_some(UPDATE_PREVIEW_ROWS),
                    ..Default::default()
                };
                Some(self.store.fetch(&q.to_statement(table)?).await?)
            }
            OutputMode::Table => None,
        };

        Ok(Reply::Updated {
            affected: result.rows_affected,
            rows,
            unfiltered,
        })
    }

    async fn delete(&self, table: &TableRef, delete: DeleteIntent) -> NoqliResult<Reply> {
        let result = self.store.execute(&delete.to_statement(table)?).await?;
        if result.rows_affected == 0 {
            return Err(NoqliError::NotFound("record(s) not found"));
        }
        Ok(Reply::Deleted {
            affected: result.rows_affected,
        })
    }

    async fn ensure_columns<'a>(
        &self,
        table: &TableRef,
        known: &[ColumnInfo],
        names: impl Iterator<Item = &'a str>,
    ) -> NoqliResult<()> {
        for name in names {
            if name == "id" || known.iter().any(|c| c.name == name) {
                continue;
            }
            self.store.ensure_column(table, name).await?;
        }
        Ok(())
    }
}
