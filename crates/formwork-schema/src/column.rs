//! Column metadata and column type parsing.
//!
//! Type strings follow the SQL column declaration shape most databases
//! report: `NAME[(args)] [modifiers]`, e.g. `VARCHAR(100)`,
//! `DECIMAL(8,2) UNSIGNED`, `ENUM('Yes','No')`.

use crate::error::SchemaError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

fn default_nullable() -> bool {
    true
}

/// One column as reported by the database catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Free-form catalogue extras such as `auto_increment`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            nullable: true,
            default: None,
            extra: None,
            comment: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    pub fn is_auto_increment(&self) -> bool {
        self.extra
            .as_deref()
            .is_some_and(|extra| extra.to_ascii_lowercase().contains("auto_increment"))
    }

    pub fn parsed_type(&self) -> Result<ColumnType, SchemaError> {
        ColumnType::parse(&self.column_type).map_err(|reason| SchemaError::MalformedType {
            column: self.name.clone(),
            column_type: self.column_type.clone(),
            reason,
        })
    }
}

/// Read a JSON array of [`ColumnMeta`].
pub fn load_columns(path: impl AsRef<Path>) -> Result<Vec<ColumnMeta>, SchemaError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|error| SchemaError::Io {
        path: path.display().to_string(),
        message: error.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|error| SchemaError::InvalidJson {
        path: path.display().to_string(),
        message: error.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalType {
    Date,
    DateTime,
    Time,
    Timestamp,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongTextSize {
    Tiny,
    Regular,
    Medium,
    Long,
}

impl LongTextSize {
    /// Character capacity, where small enough to be worth enforcing.
    pub fn max_length(self) -> Option<usize> {
        match self {
            Self::Tiny => Some(255),
            Self::Regular => Some(65_535),
            Self::Medium | Self::Long => None,
        }
    }
}

/// Parsed column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Enum(Vec<String>),
    Set(Vec<String>),
    Char { length: Option<usize> },
    /// `width` is the declared digit count; `default_width` the digit count
    /// of the type's full range.
    Integer { width: Option<usize>, default_width: usize, unsigned: bool },
    Decimal { precision: Option<usize>, scale: Option<usize>, unsigned: bool },
    Temporal(TemporalType),
    LongText(LongTextSize),
    Unknown(String),
}

fn type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^\s*([A-Za-z]+)\s*(?:\((.*)\))?\s*([A-Za-z ]*)$")
            .expect("column type regex must compile")
    })
}

fn numbers(args: &str) -> Result<Vec<usize>, String> {
    args.split(',')
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .map(|arg| {
            arg.parse::<usize>()
                .map_err(|_| format!("expected a number, found `{arg}`"))
        })
        .collect()
}

/// Split `'a','b''c'` into `["a", "b'c"]`.
fn quoted_literals(args: &str) -> Result<Vec<String>, String> {
    let mut literals = Vec::new();
    let mut chars = args.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(quote) = chars.next() else {
            break;
        };
        if quote != '\'' && quote != '"' {
            return Err(format!("expected a quoted literal, found `{quote}`"));
        }
        let mut literal = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            if c == quote {
                if chars.next_if_eq(&quote).is_some() {
                    literal.push(quote);
                    continue;
                }
                closed = true;
                break;
            }
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    literal.push(escaped);
                }
                continue;
            }
            literal.push(c);
        }
        if !closed {
            return Err("unterminated literal".to_string());
        }
        literals.push(literal);
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => break,
            Some(',') => {}
            Some(other) => return Err(format!("expected `,` between literals, found `{other}`")),
        }
    }
    Ok(literals)
}

impl ColumnType {
    /// Parse a column type string. Unrecognized names parse as
    /// [`ColumnType::Unknown`]; only structurally broken arguments fail.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let Some(caps) = type_re().captures(raw) else {
            if raw.contains('(') {
                return Err("unbalanced type arguments".to_string());
            }
            return Ok(Self::Unknown(raw.trim().to_string()));
        };
        let name = caps[1].to_ascii_uppercase();
        let args = caps.get(2).map_or("", |m| m.as_str());
        let unsigned = caps
            .get(3)
            .is_some_and(|m| m.as_str().to_ascii_lowercase().contains("unsigned"));

        let integer = |default_width: usize| -> Result<Self, String> {
            Ok(Self::Integer {
                width: numbers(args)?.first().copied(),
                default_width,
                unsigned,
            })
        };

        match name.as_str() {
            "ENUM" => Ok(Self::Enum(quoted_literals(args)?)),
            "SET" => Ok(Self::Set(quoted_literals(args)?)),
            "CHAR" | "VARCHAR" => Ok(Self::Char {
                length: numbers(args)?.first().copied(),
            }),
            "TINYINT" => integer(3),
            "SMALLINT" => integer(5),
            "MEDIUMINT" => integer(8),
            "INT" | "INTEGER" => integer(10),
            "BIGINT" => integer(20),
            "FLOAT" | "DOUBLE" | "REAL" | "DECIMAL" | "NUMERIC" => {
                let args = numbers(args)?;
                Ok(Self::Decimal {
                    precision: args.first().copied(),
                    scale: args.get(1).copied(),
                    unsigned,
                })
            }
            "DATE" => Ok(Self::Temporal(TemporalType::Date)),
            "DATETIME" => Ok(Self::Temporal(TemporalType::DateTime)),
            "TIME" => Ok(Self::Temporal(TemporalType::Time)),
            "TIMESTAMP" => Ok(Self::Temporal(TemporalType::Timestamp)),
            "YEAR" => Ok(Self::Temporal(TemporalType::Year)),
            "TINYTEXT" | "TINYBLOB" => Ok(Self::LongText(LongTextSize::Tiny)),
            "TEXT" | "BLOB" => Ok(Self::LongText(LongTextSize::Regular)),
            "MEDIUMTEXT" | "MEDIUMBLOB" => Ok(Self::LongText(LongTextSize::Medium)),
            "LONGTEXT" | "LONGBLOB" => Ok(Self::LongText(LongTextSize::Long)),
            _ => Ok(Self::Unknown(raw.trim().to_string())),
        }
    }
}
