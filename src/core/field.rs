//! Typed import fields
//!
//! A [`Field`] is one spreadsheet column bound to one destination column. It
//! is built from a textual definition such as `varchar(20) not null`, and
//! knows how to render its DDL and how to coerce a cell into a [`DbValue`].

use crate::db::quote_ident;
use crate::error::{BcpError, BcpResult};
use crate::excel::{cell_number, cell_text};
use crate::types::DbValue;
use calamine::Data;
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

/// Width used for text columns when nothing else sets one
pub const DEFAULT_VARCHAR_WIDTH: u32 = 512;

/// Text column flavour, each rendering to its own DDL type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextType {
    Char,
    Varchar,
    NVarchar,
}

impl TextType {
    pub fn sql_name(&self) -> &'static str {
        match self {
            TextType::Char => "char",
            TextType::Varchar => "varchar",
            TextType::NVarchar => "nvarchar",
        }
    }
}

/// The closed set of field variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Text(TextType),
}

impl FieldKind {
    /// Look up the variant for a (lower-cased) type token
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "i" | "int" => Some(FieldKind::Integer),
            "s" | "string" | "varchar" => Some(FieldKind::Text(TextType::Varchar)),
            "char" => Some(FieldKind::Text(TextType::Char)),
            "u" | "unicode" | "nvarchar" => Some(FieldKind::Text(TextType::NVarchar)),
            _ => None,
        }
    }

    pub fn sql_name(&self) -> &'static str {
        match self {
            FieldKind::Integer => "int",
            FieldKind::Text(t) => t.sql_name(),
        }
    }
}

/// A definition string split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub base_type: String,
    pub size: Option<u32>,
    pub nullable: bool,
}

fn definition_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?P<type>\w+)\s*(\(\s*(?P<size>\d+)\s*\))?\s*(?P<not>not\s+)?(?P<null>null)?")
            .expect("definition pattern is valid")
    })
}

impl ColumnDefinition {
    /// Split `<type>[(size)] [not] [null]`. A definition without `not` is
    /// nullable, whether or not `null` is spelled out.
    pub fn parse(definition: &str) -> Option<Self> {
        let lowered = definition.trim().to_lowercase();
        let caps = definition_regex().captures(&lowered)?;
        let base_type = caps.name("type")?.as_str().to_string();
        let size = match caps.name("size") {
            Some(m) => Some(m.as_str().parse().ok()?),
            None => None,
        };
        let nullable = caps.name("not").is_none();
        Some(Self {
            base_type,
            size,
            nullable,
        })
    }
}

/// One resolved column
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Spreadsheet column, 0-based
    pub column_index: usize,
    /// Position in the destination row, 0-based and dense
    pub sql_index: usize,
    pub name: String,
    pub kind: FieldKind,
    /// Declared size, `None` when the definition gave none
    pub db_size: Option<u32>,
    pub db_nullable: bool,
}

impl Field {
    /// Build a field from a raw definition string.
    ///
    /// Fails with `UnsupportedType` when the type token is not registered.
    pub fn from_definition(
        column_index: usize,
        sql_index: usize,
        name: &str,
        definition: &str,
    ) -> BcpResult<Self> {
        let parsed =
            ColumnDefinition::parse(definition).ok_or_else(|| BcpError::InvalidDefinition {
                column_index,
                name: name.to_string(),
                definition: definition.to_string(),
            })?;

        let kind =
            FieldKind::from_token(&parsed.base_type).ok_or_else(|| BcpError::UnsupportedType {
                column_index,
                name: name.to_string(),
                definition: definition.to_string(),
                token: parsed.base_type.clone(),
            })?;

        Ok(Self {
            column_index,
            sql_index,
            name: name.to_string(),
            kind,
            db_size: parsed.size,
            db_nullable: parsed.nullable,
        })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, FieldKind::Text(_))
    }

    /// Give unsized text fields a width; explicit sizes are left alone
    pub fn apply_default_width(&mut self, width: u32) {
        if self.is_text() && self.db_size.is_none() {
            self.db_size = Some(width);
        }
    }

    /// DDL type fragment, e.g. `varchar(256) null`
    pub fn sql_type_name(&self) -> String {
        let null = if self.db_nullable { "null" } else { "not null" };
        match self.kind {
            FieldKind::Integer => format!("int {}", null),
            FieldKind::Text(t) => format!(
                "{}({}) {}",
                t.sql_name(),
                self.db_size.unwrap_or(DEFAULT_VARCHAR_WIDTH),
                null
            ),
        }
    }

    /// Column clause for `CREATE TABLE`
    pub fn sql_def(&self) -> String {
        format!("{} {}", quote_ident(&self.name), self.sql_type_name())
    }

    /// Value stored for a blank cell in a non-nullable column
    pub fn empty_value(&self) -> DbValue {
        match self.kind {
            FieldKind::Integer => DbValue::Int(0),
            FieldKind::Text(_) => DbValue::Text(String::new()),
        }
    }

    /// Coerce a non-blank cell. `row` is the 0-based sheet row, used in
    /// diagnostics only.
    pub fn coerce(&self, cell: &Data, row: usize) -> BcpResult<DbValue> {
        match self.kind {
            FieldKind::Integer => {
                let number = cell_number(cell).ok_or_else(|| BcpError::RowExtraction {
                    row: row + 1,
                    column: self.column_index + 1,
                    reason: format!("'{}' is not numeric", cell),
                })?;
                let truncated = number.trunc();
                if !truncated.is_finite()
                    || truncated < i32::MIN as f64
                    || truncated > i32::MAX as f64
                {
                    return Err(BcpError::RowExtraction {
                        row: row + 1,
                        column: self.column_index + 1,
                        reason: format!("{} does not fit an int", number),
                    });
                }
                Ok(DbValue::Int(truncated as i32))
            }
            FieldKind::Text(_) => {
                let text = cell_text(cell);
                let text = text.trim();
                let length = text.chars().count();
                match self.db_size {
                    Some(bound) if length > bound as usize => {
                        warn!(
                            row = row + 1,
                            column = self.column_index + 1,
                            length,
                            bound,
                            "Truncating string in Excel (row,col): ({},{}) from {} to {}",
                            row + 1,
                            self.column_index + 1,
                            length,
                            bound
                        );
                        Ok(DbValue::Text(text.chars().take(bound as usize).collect()))
                    }
                    _ => Ok(DbValue::Text(text.to_string())),
                }
            }
        }
    }

    /// Write this field's value for one sheet row into `dest`.
    ///
    /// Returns `true` when the cell contributed a value, `false` when it was
    /// absent or blank and a null or empty value was written instead.
    pub fn set_data(&self, dest: &mut [DbValue], cell: Option<&Data>, row: usize) -> BcpResult<bool> {
        match cell {
            Some(c) if !is_blank(c) => {
                dest[self.sql_index] = self.coerce(c, row)?;
                Ok(true)
            }
            _ => {
                dest[self.sql_index] = if self.db_nullable {
                    DbValue::Null
                } else {
                    self.empty_value()
                };
                Ok(false)
            }
        }
    }
}

fn is_blank(cell: &Data) -> bool {
    matches!(cell, Data::Empty) || cell_text(cell).trim().is_empty()
}
