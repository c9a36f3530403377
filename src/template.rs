//! SQL templates with named parameter markers and conditional fragments.
//!
//! A template is a list of fragments. Every fragment is SQL text containing `#{name}` markers and
//! is either always included or only included when a named parameter is bound to a non-NULL
//! value. Rendering replaces each marker occurrence with a numbered placeholder, so the rendered
//! text never contains parameter values.
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use sql_reuse::prelude::*;
//!
//! let template = SqlTemplate::builder()
//!     .text("SELECT id FROM users WHERE active = #{active}")
//!     .when_present("name", " AND name = #{name}")
//!     .build()?;
//!
//! let mut params = BTreeMap::new();
//! params.insert("active".to_string(), RowValues::Bool(true));
//! let rendered = template.render(&params, PlaceholderStyle::Sqlite);
//! assert_eq!(rendered.sql, "SELECT id FROM users WHERE active = ?1");
//!
//! params.insert("name".to_string(), RowValues::Text("ada".into()));
//! let rendered = template.render(&params, PlaceholderStyle::Sqlite);
//! assert_eq!(rendered.sql, "SELECT id FROM users WHERE active = ?1 AND name = ?2");
//! assert_eq!(rendered.bindings, vec!["active", "name"]);
//! # Ok::<(), SqlReuseError>(())
//! ```

mod scanner;

use std::collections::BTreeMap;

use crate::error::SqlReuseError;
use crate::types::RowValues;

use scanner::{Piece, scan_pieces};

/// Named parameters of a command.
pub type NamedParams = BTreeMap<String, RowValues>;

/// Placeholder syntax used in rendered SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// SQLite-style placeholders like `?1`.
    Sqlite,
    /// PostgreSQL-style placeholders like `$1`.
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
    Always,
    Present(String),
}

impl Condition {
    fn holds(&self, params: &NamedParams) -> bool {
        match self {
            Condition::Always => true,
            Condition::Present(name) => params.get(name).is_some_and(|value| !value.is_null()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fragment {
    condition: Condition,
    pieces: Vec<Piece>,
}

/// SQL text plus the parameter names bound to its placeholders, in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSql {
    pub sql: String,
    pub bindings: Vec<String>,
}

/// Parsed SQL template. Immutable and cheap to share behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTemplate {
    fragments: Vec<Fragment>,
}

impl SqlTemplate {
    /// Parse a template made of a single unconditional fragment.
    ///
    /// # Errors
    /// Returns [`SqlReuseError::TemplateError`] for malformed parameter markers.
    pub fn parse(text: &str) -> Result<Self, SqlReuseError> {
        Self::builder().text(text).build()
    }

    #[must_use]
    pub fn builder() -> SqlTemplateBuilder {
        SqlTemplateBuilder::default()
    }

    /// Render the fragments whose conditions hold for `params`.
    #[must_use]
    pub fn render(&self, params: &NamedParams, style: PlaceholderStyle) -> RenderedSql {
        let mut sql = String::new();
        let mut bindings = Vec::new();
        for fragment in self.included(params) {
            for piece in &fragment.pieces {
                match piece {
                    Piece::Literal(text) => sql.push_str(text),
                    Piece::Param(name) => {
                        bindings.push(name.clone());
                        let marker = match style {
                            PlaceholderStyle::Sqlite => '?',
                            PlaceholderStyle::Postgres => '$',
                        };
                        sql.push(marker);
                        sql.push_str(&bindings.len().to_string());
                    }
                }
            }
        }
        RenderedSql { sql, bindings }
    }

    /// Parameter names in placeholder order, without building the SQL text.
    #[must_use]
    pub fn binding_names<'a>(&'a self, params: &NamedParams) -> Vec<&'a str> {
        self.included(params)
            .flat_map(|fragment| fragment.pieces.iter())
            .filter_map(|piece| match piece {
                Piece::Param(name) => Some(name.as_str()),
                Piece::Literal(_) => None,
            })
            .collect()
    }

    fn included<'a>(&'a self, params: &NamedParams) -> impl Iterator<Item = &'a Fragment> {
        self.fragments
            .iter()
            .filter(move |fragment| fragment.condition.holds(params))
    }
}

/// Fluent builder for [`SqlTemplate`]; parsing happens in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct SqlTemplateBuilder {
    raw: Vec<(Condition, String)>,
}

impl SqlTemplateBuilder {
    /// Append a fragment that is always rendered.
    #[must_use]
    pub fn text(mut self, text: &str) -> Self {
        self.raw.push((Condition::Always, text.to_string()));
        self
    }

    /// Append a fragment rendered only when `param` is bound to a non-NULL value.
    #[must_use]
    pub fn when_present(mut self, param: &str, text: &str) -> Self {
        self.raw
            .push((Condition::Present(param.to_string()), text.to_string()));
        self
    }

    /// # Errors
    /// Returns [`SqlReuseError::TemplateError`] for malformed parameter markers or an empty
    /// template.
    pub fn build(self) -> Result<SqlTemplate, SqlReuseError> {
        if self.raw.iter().all(|(_, text)| text.trim().is_empty()) {
            return Err(SqlReuseError::TemplateError("template has no SQL text".into()));
        }
        let mut fragments = Vec::with_capacity(self.raw.len());
        for (condition, text) in self.raw {
            fragments.push(Fragment {
                condition,
                pieces: scan_pieces(&text)?,
            });
        }
        Ok(SqlTemplate { fragments })
    }
}
