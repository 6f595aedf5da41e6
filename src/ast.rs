//! Normalized schema model shared by the migration and diagram front ends.

use std::fmt;

use crate::naming;

/// Columns the migration skeleton and timestamp helpers provide on their own.
pub const SYSTEM_COLUMNS: [&str; 4] = ["id", "created_at", "updated_at", "deleted_at"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    TinyInteger,
    SmallInteger,
    MediumInteger,
    Integer,
    BigInteger,
    String,
    Char,
    Text,
    MediumText,
    LongText,
    Boolean,
    Date,
    DateTime,
    Timestamp,
    Time,
    Year,
    Decimal,
    Float,
    Double,
    Json,
    Enum,
    Uuid,
    IpAddress,
    MacAddress,
    Binary,
    /// Unrecognised type name, kept verbatim.
    Other(String),
}

impl ColumnType {
    /// Map a diagram type name (case-insensitive, common synonyms allowed).
    pub fn from_diagram(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "tinyint" | "tinyinteger" => Self::TinyInteger,
            "smallint" | "smallinteger" => Self::SmallInteger,
            "mediumint" | "mediuminteger" => Self::MediumInteger,
            "int" | "integer" | "int4" => Self::Integer,
            "bigint" | "biginteger" | "int8" => Self::BigInteger,
            "varchar" | "string" | "character varying" => Self::String,
            "char" | "character" => Self::Char,
            "text" | "tinytext" => Self::Text,
            "mediumtext" => Self::MediumText,
            "longtext" => Self::LongText,
            "boolean" | "bool" => Self::Boolean,
            "date" => Self::Date,
            "datetime" | "datetimetz" => Self::DateTime,
            "timestamp" | "timestamptz" => Self::Timestamp,
            "time" | "timetz" => Self::Time,
            "year" => Self::Year,
            "decimal" | "numeric" => Self::Decimal,
            "float" | "real" | "float4" => Self::Float,
            "double" | "float8" => Self::Double,
            "json" | "jsonb" => Self::Json,
            "enum" => Self::Enum,
            "uuid" => Self::Uuid,
            "ipaddress" | "ip" | "inet" => Self::IpAddress,
            "macaddress" | "mac" | "macaddr" => Self::MacAddress,
            "binary" | "blob" | "bytea" => Self::Binary,
            _ => Self::Other(s.to_string()),
        }
    }

    /// Canonical spelling used in diagram output.
    pub fn diagram_name(&self) -> &str {
        match self {
            Self::TinyInteger => "tinyint",
            Self::SmallInteger => "smallint",
            Self::MediumInteger => "mediumint",
            Self::Integer => "integer",
            Self::BigInteger => "bigint",
            Self::String => "varchar",
            Self::Char => "char",
            Self::Text => "text",
            Self::MediumText => "mediumtext",
            Self::LongText => "longtext",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Timestamp => "timestamp",
            Self::Time => "time",
            Self::Year => "year",
            Self::Decimal => "decimal",
            Self::Float => "float",
            Self::Double => "double",
            Self::Json => "json",
            Self::Enum => "enum",
            Self::Uuid => "uuid",
            Self::IpAddress => "ipaddress",
            Self::MacAddress => "macaddress",
            Self::Binary => "binary",
            Self::Other(s) => s,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::TinyInteger
                | Self::SmallInteger
                | Self::MediumInteger
                | Self::Integer
                | Self::BigInteger
        )
    }
}

/// Validation-oriented boundaries picked up from modifier chains.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bounds {
    pub min: Option<String>,
    pub max: Option<String>,
    pub before: Option<String>,
    pub after: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    pub on_delete: Option<String>,
}

impl ForeignKey {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            on_delete: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub typ: ColumnType,
    pub size: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
    pub primary: bool,
    pub auto_increment: bool,
    pub unsigned: bool,
    pub indexed: bool,
    pub default: Option<String>,
    pub comment: Option<String>,
    pub enum_values: Vec<String>,
    pub bounds: Bounds,
    pub foreign_key: Option<ForeignKey>,
}

impl Column {
    pub fn new(name: impl Into<String>, typ: ColumnType) -> Self {
        Self {
            name: name.into(),
            typ,
            size: None,
            precision: None,
            scale: None,
            nullable: true,
            primary: false,
            auto_increment: false,
            unsigned: false,
            indexed: false,
            default: None,
            comment: None,
            enum_values: Vec::new(),
            bounds: Bounds::default(),
            foreign_key: None,
        }
    }

    /// Non-nullable bigint referencing `table.id`.
    pub fn foreign_id(name: impl Into<String>, table: impl Into<String>) -> Self {
        let mut col = Self::new(name, ColumnType::BigInteger);
        col.nullable = false;
        col.foreign_key = Some(ForeignKey::new(table, "id"));
        col
    }

    pub fn is_system(&self) -> bool {
        SYSTEM_COLUMNS.contains(&self.name.as_str())
    }

    /// Whether the name follows the `<noun>_id` key convention.
    pub fn is_key_reference(&self) -> bool {
        self.name.len() > 3 && self.name.ends_with("_id")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Entity form (`OrderItem`) for domain tables, stored form for pivots.
    pub name: String,
    pub columns: Vec<Column>,
    pub is_pivot: bool,
    pub unique_keys: Vec<Vec<String>>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            is_pivot: false,
            unique_keys: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Table name as it appears in migration text.
    pub fn storage_name(&self) -> String {
        if self.is_pivot {
            self.name.clone()
        } else {
            naming::table_name(&self.name)
        }
    }

    pub fn foreign_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.foreign_key.is_some())
    }

    /// Columns whose foreign key points at the stored table name `target`.
    pub fn columns_referencing<'a>(
        &'a self,
        target: &'a str,
    ) -> impl Iterator<Item = &'a Column> {
        self.columns
            .iter()
            .filter(move |c| c.foreign_key.as_ref().is_some_and(|fk| fk.table == target))
    }

    /// Record a unique key; ignores one already present.
    pub fn add_unique_key(&mut self, columns: Vec<String>) {
        if !columns.is_empty() && !self.unique_keys.contains(&columns) {
            self.unique_keys.push(columns);
        }
    }

    pub fn is_unique(&self, column: &str) -> bool {
        self.unique_keys
            .iter()
            .any(|key| key.iter().any(|c| c == column))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relationship {
    OneToOne {
        parent: String,
        child: String,
    },
    OneToMany {
        parent: String,
        child: String,
    },
    ManyToMany {
        table1: String,
        table2: String,
        pivot_table: String,
    },
}

/// Order-independent identity of a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationshipKey {
    Directed(String, String),
    Pair(String, String),
}

impl Relationship {
    pub fn key(&self) -> RelationshipKey {
        match self {
            Self::OneToOne { parent, child } | Self::OneToMany { parent, child } => {
                RelationshipKey::Directed(parent.clone(), child.clone())
            }
            Self::ManyToMany { table1, table2, .. } => {
                if table1 <= table2 {
                    RelationshipKey::Pair(table1.clone(), table2.clone())
                } else {
                    RelationshipKey::Pair(table2.clone(), table1.clone())
                }
            }
        }
    }
}

/// Something a parser saw but the inferencer could not tie to a known table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReference {
    ForeignKey {
        table: String,
        column: String,
        target: String,
    },
    Relationship {
        from: String,
        to: String,
        missing: String,
    },
    AlterTarget {
        table: String,
    },
    /// `A }o--o{ A` without a declared pivot holding two keys to `A`.
    SelfReference {
        table: String,
        pivot_table: String,
    },
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForeignKey {
                table,
                column,
                target,
            } => write!(f, "{table}.{column} references unknown table `{target}`"),
            Self::Relationship { from, to, missing } => {
                write!(f, "relationship {from} -- {to} names unknown entity `{missing}`")
            }
            Self::AlterTarget { table } => {
                write!(f, "Schema::table block for unknown table `{table}`")
            }
            Self::SelfReference { table, pivot_table } => write!(
                f,
                "{table} }}o--o{{ {table} needs a declared `{pivot_table}` with two keys to it"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub tables: Vec<Table>,
    pub relationships: Vec<Relationship>,
    pub unresolved: Vec<UnresolvedReference>,
}

impl Schema {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    /// Append unless a relationship with the same key is already present.
    pub fn push_relationship(&mut self, rel: Relationship) -> bool {
        let key = rel.key();
        if self.relationships.iter().any(|r| r.key() == key) {
            return false;
        }
        self.relationships.push(rel);
        true
    }

    /// Record an unresolved reference once.
    pub fn note_unresolved(&mut self, reference: UnresolvedReference) {
        if !self.unresolved.contains(&reference) {
            self.unresolved.push(reference);
        }
    }

    /// Stable partition: domain tables first, pivots after.
    pub fn order_tables(&mut self) {
        let (domain, pivots): (Vec<Table>, Vec<Table>) =
            std::mem::take(&mut self.tables).into_iter().partition(|t| !t.is_pivot);
        self.tables = domain;
        self.tables.extend(pivots);
    }

    pub fn domain_tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().filter(|t| !t.is_pivot)
    }

    pub fn pivot_tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().filter(|t| t.is_pivot)
    }
}
