use std::fmt;

//==============================================================================
// Import: format directive hints
//==============================================================================

/// Column kind requested by one format directive token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintKind {
    /// `i` - integer column
    Int,
    /// `s` - single-byte string column
    String,
    /// `u` - unicode string column
    UnicodeString,
}

/// One parsed format directive token, e.g. `s20`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnTypeHint {
    pub kind: HintKind,
    pub size: Option<u32>,
}

impl ColumnTypeHint {
    pub fn new(kind: HintKind, size: Option<u32>) -> Self {
        Self { kind, size }
    }

    /// Render the hint as a column definition, using `default_width` for
    /// string kinds without an explicit size
    pub fn to_definition(&self, default_width: u32) -> String {
        let size = self.size.unwrap_or(default_width);
        match self.kind {
            HintKind::Int => "int".to_string(),
            HintKind::String => format!("varchar({})", size),
            HintKind::UnicodeString => format!("nvarchar({})", size),
        }
    }
}

//==============================================================================
// Import: destination values
//==============================================================================

/// A coerced cell value ready for the bulk load
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Int(i32),
    Text(String),
}

//==============================================================================
// Export: source schema and values
//==============================================================================

/// One column descriptor of a relational result schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceColumn {
    pub base_name: String,
    /// Declared type as reported by the database, `None` for computed columns
    pub data_type: Option<String>,
    pub allow_null: bool,
}

impl SourceColumn {
    pub fn new(base_name: impl Into<String>, data_type: Option<&str>) -> Self {
        Self {
            base_name: base_name.into(),
            data_type: data_type.map(str::to_string),
            allow_null: true,
        }
    }
}

/// One value read from a relational result set
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Storage class name, used in conversion diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Blob(_) => "blob",
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => Ok(()),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(s) => write!(f, "{}", s),
            SqlValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}
