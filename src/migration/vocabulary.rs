//! Builder and modifier vocabulary of the migration DSL.
//!
//! Each entry maps a schema-builder method name to the action the parser
//! takes for it. Extending the recognised DSL means adding a row here.

use crate::ast::ColumnType;

/// A method that opens a statement on the blueprint variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Builder {
    /// `method('name'[, params])`
    Column { typ: ColumnType, unsigned: bool },
    /// Auto-incrementing unsigned primary key, default name `id`.
    Increments(ColumnType),
    RememberToken,
    /// `<name>_type` + `<name>_id`.
    Morphs { nullable: bool },
    ForeignId,
    Timestamps,
    SoftDeletes,
    /// `foreign('col')->references(..)->on(..)`
    Foreign,
    /// `unique('col' | [cols])`
    Unique,
    /// `index('col' | [cols])`
    Index,
    /// `primary('col' | [cols])`
    Primary,
}

/// A method chained onto a column declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Nullable,
    Default,
    Unique,
    Min,
    Max,
    Unsigned,
    Index,
    Comment,
    Before,
    After,
    Primary,
    AutoIncrement,
    Constrained,
    References,
    On,
    OnDelete(Option<&'static str>),
}

const fn column(typ: ColumnType) -> Builder {
    Builder::Column {
        typ,
        unsigned: false,
    }
}

const fn unsigned(typ: ColumnType) -> Builder {
    Builder::Column {
        typ,
        unsigned: true,
    }
}

static BUILDERS: &[(&str, Builder)] = &[
    ("id", Builder::Increments(ColumnType::BigInteger)),
    ("increments", Builder::Increments(ColumnType::Integer)),
    ("tinyIncrements", Builder::Increments(ColumnType::TinyInteger)),
    ("smallIncrements", Builder::Increments(ColumnType::SmallInteger)),
    ("mediumIncrements", Builder::Increments(ColumnType::MediumInteger)),
    ("bigIncrements", Builder::Increments(ColumnType::BigInteger)),
    ("integer", column(ColumnType::Integer)),
    ("tinyInteger", column(ColumnType::TinyInteger)),
    ("smallInteger", column(ColumnType::SmallInteger)),
    ("mediumInteger", column(ColumnType::MediumInteger)),
    ("bigInteger", column(ColumnType::BigInteger)),
    ("unsignedInteger", unsigned(ColumnType::Integer)),
    ("unsignedTinyInteger", unsigned(ColumnType::TinyInteger)),
    ("unsignedSmallInteger", unsigned(ColumnType::SmallInteger)),
    ("unsignedMediumInteger", unsigned(ColumnType::MediumInteger)),
    ("unsignedBigInteger", unsigned(ColumnType::BigInteger)),
    ("string", column(ColumnType::String)),
    ("char", column(ColumnType::Char)),
    ("text", column(ColumnType::Text)),
    ("tinyText", column(ColumnType::Text)),
    ("mediumText", column(ColumnType::MediumText)),
    ("longText", column(ColumnType::LongText)),
    ("boolean", column(ColumnType::Boolean)),
    ("date", column(ColumnType::Date)),
    ("dateTime", column(ColumnType::DateTime)),
    ("dateTimeTz", column(ColumnType::DateTime)),
    ("timestamp", column(ColumnType::Timestamp)),
    ("timestampTz", column(ColumnType::Timestamp)),
    ("time", column(ColumnType::Time)),
    ("timeTz", column(ColumnType::Time)),
    ("year", column(ColumnType::Year)),
    ("decimal", column(ColumnType::Decimal)),
    ("unsignedDecimal", unsigned(ColumnType::Decimal)),
    ("float", column(ColumnType::Float)),
    ("double", column(ColumnType::Double)),
    ("json", column(ColumnType::Json)),
    ("jsonb", column(ColumnType::Json)),
    ("enum", column(ColumnType::Enum)),
    ("uuid", column(ColumnType::Uuid)),
    ("ipAddress", column(ColumnType::IpAddress)),
    ("macAddress", column(ColumnType::MacAddress)),
    ("binary", column(ColumnType::Binary)),
    ("rememberToken", Builder::RememberToken),
    ("morphs", Builder::Morphs { nullable: false }),
    ("nullableMorphs", Builder::Morphs { nullable: true }),
    ("foreignId", Builder::ForeignId),
    ("timestamps", Builder::Timestamps),
    ("nullableTimestamps", Builder::Timestamps),
    ("timestampsTz", Builder::Timestamps),
    ("softDeletes", Builder::SoftDeletes),
    ("softDeletesTz", Builder::SoftDeletes),
    ("foreign", Builder::Foreign),
    ("unique", Builder::Unique),
    ("index", Builder::Index),
    ("primary", Builder::Primary),
];

static MODIFIERS: &[(&str, Modifier)] = &[
    ("nullable", Modifier::Nullable),
    ("default", Modifier::Default),
    ("unique", Modifier::Unique),
    ("min", Modifier::Min),
    ("max", Modifier::Max),
    ("unsigned", Modifier::Unsigned),
    ("index", Modifier::Index),
    ("comment", Modifier::Comment),
    ("before", Modifier::Before),
    ("after", Modifier::After),
    ("primary", Modifier::Primary),
    ("autoIncrement", Modifier::AutoIncrement),
    ("constrained", Modifier::Constrained),
    ("references", Modifier::References),
    ("on", Modifier::On),
    ("onDelete", Modifier::OnDelete(None)),
    ("cascadeOnDelete", Modifier::OnDelete(Some("cascade"))),
    ("nullOnDelete", Modifier::OnDelete(Some("set null"))),
    ("restrictOnDelete", Modifier::OnDelete(Some("restrict"))),
];

pub fn builder(method: &str) -> Option<&'static Builder> {
    BUILDERS.iter().find(|(name, _)| *name == method).map(|(_, b)| b)
}

pub fn modifier(method: &str) -> Option<Modifier> {
    MODIFIERS
        .iter()
        .find(|(name, _)| *name == method)
        .map(|(_, m)| *m)
}

/// Builder call that declares a column of `typ` (inverse of [`builder`]).
pub fn builder_method(typ: &ColumnType, unsigned: bool) -> &'static str {
    match (typ, unsigned) {
        (ColumnType::TinyInteger, false) => "tinyInteger",
        (ColumnType::TinyInteger, true) => "unsignedTinyInteger",
        (ColumnType::SmallInteger, false) => "smallInteger",
        (ColumnType::SmallInteger, true) => "unsignedSmallInteger",
        (ColumnType::MediumInteger, false) => "mediumInteger",
        (ColumnType::MediumInteger, true) => "unsignedMediumInteger",
        (ColumnType::Integer, false) => "integer",
        (ColumnType::Integer, true) => "unsignedInteger",
        (ColumnType::BigInteger, false) => "bigInteger",
        (ColumnType::BigInteger, true) => "unsignedBigInteger",
        (ColumnType::String, _) => "string",
        (ColumnType::Char, _) => "char",
        (ColumnType::Text, _) => "text",
        (ColumnType::MediumText, _) => "mediumText",
        (ColumnType::LongText, _) => "longText",
        (ColumnType::Boolean, _) => "boolean",
        (ColumnType::Date, _) => "date",
        (ColumnType::DateTime, _) => "dateTime",
        (ColumnType::Timestamp, _) => "timestamp",
        (ColumnType::Time, _) => "time",
        (ColumnType::Year, _) => "year",
        (ColumnType::Decimal, false) => "decimal",
        (ColumnType::Decimal, true) => "unsignedDecimal",
        (ColumnType::Float, _) => "float",
        (ColumnType::Double, _) => "double",
        (ColumnType::Json, _) => "json",
        (ColumnType::Enum, _) => "enum",
        (ColumnType::Uuid, _) => "uuid",
        (ColumnType::IpAddress, _) => "ipAddress",
        (ColumnType::MacAddress, _) => "macAddress",
        (ColumnType::Binary, _) => "binary",
        (ColumnType::Other(_), _) => "string",
    }
}
