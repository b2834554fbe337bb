//! Session context: the selected database and table.
//!
//! Owned by the shell and passed by reference to everything that needs it.
//! Only `USE` changes it.

use crate::ast::TableRef;
use crate::error::{NoqliError, NoqliResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    database: Option<String>,
    table: Option<String>,
}

impl Session {
    pub fn new(database: Option<String>) -> Self {
        Self {
            database: database.filter(|d| !d.is_empty()),
            table: None,
        }
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Select a database and forget the table.
    pub fn use_database(&mut self, database: impl Into<String>) {
        self.database = Some(database.into());
        self.table = None;
    }

    pub fn use_table(&mut self, table: impl Into<String>) {
        self.table = Some(table.into());
    }

    /// The table CRUD commands operate on.
    pub fn target(&self) -> NoqliResult<TableRef> {
        let table = self.table.as_ref().ok_or(NoqliError::NoTableSelected)?;
        Ok(TableRef {
            database: self.database.clone(),
            table: table.clone(),
        })
    }

    pub fn prompt(&self) -> String {
        match (&self.database, &self.table) {
            (Some(db), Some(t)) => format!("noqli:{}:{}> ", db, t),
            (Some(db), None) => format!("noqli:{}> ", db),
            _ => "noqli> ".to_string(),
        }
    }
}
