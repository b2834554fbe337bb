//! # noqli
//!
//! A NoSQL-flavored command shell for MySQL tables.
//!
//! Commands take a brace expression instead of SQL. The expression is parsed
//! into an attribute map, resolved against the table's columns into an
//! intent, and rendered as a parameterized statement.
//!
//! ## Quick Example
//!
//! ```rust
//! use noqli::prelude::*;
//!
//! let attrs = noqli::parse("{status: ['active', 'pending'], up: 'name', lim: 5}").unwrap();
//! let intent = resolve(attrs, Command::Get, &[]).unwrap();
//!
//! let stmt = intent.to_statement(&TableRef::new("users")).unwrap();
//! assert_eq!(
//!     stmt.sql,
//!     "SELECT * FROM `users` WHERE `status` IN (?, ?) ORDER BY `name` ASC LIMIT ?"
//! );
//! ```
//!
//! ## Expression Shapes
//!
//! | Input                         | Meaning                          |
//! |-------------------------------|----------------------------------|
//! | `5`                           | `{id: 5}`                        |
//! | `{name: 'Ann', age: 30}`      | equality filters / values        |
//! | `{status: ['a', 'b']}`        | membership (`IN`)                |
//! | `{id: (1, 10)}`               | inclusive range (`id` only)      |
//! | `{[a, b] = 'x'}`              | same value for several fields    |
//! | `{name, email}`               | column projection                |
//! | `up` `down` `lim` `off` `like` `count` `distinct` `min` `max` `avg` `sum` | options, any case |

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod parser;
pub mod resolver;
pub mod session;
pub mod shell;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::engine::{ExecResult, MySqlStore, ResultSet, TabularStore};
    pub use crate::error::*;
    pub use crate::output::{OutputMode, Renderer, Reply};
    pub use crate::parser::parse;
    pub use crate::resolver::{prepare, resolve};
    pub use crate::session::Session;
    pub use crate::shell::{Confirm, Outcome, Shell};
    pub use crate::transpiler::ToStatement;
}

/// Parse an argument expression into an attribute map.
///
/// # Example
///
/// ```
/// use noqli::parse;
///
/// let attrs = parse("42").unwrap();
/// assert_eq!(attrs["id"], noqli::ast::AttrValue::from(42));
/// ```
pub fn parse(input: &str) -> Result<ast::AttributeMap, error::NoqliError> {
    parser::parse(input)
}
