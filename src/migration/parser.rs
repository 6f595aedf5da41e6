//! Tolerant parser for migration files.
//!
//! Only `Schema::create` / `Schema::table` closures are read. Inside a closure
//! each `;`-terminated statement on the blueprint variable is matched against
//! the vocabulary; anything unrecognised is skipped.

use std::sync::LazyLock;

use regex::Regex;

use super::lexer::{Lexer, Token};
use super::vocabulary::{self, Builder, Modifier};
use crate::ast::{Column, ColumnType, UnresolvedReference};
use crate::infer::{ForeignKeyFact, RawSchema, RawTable};
use crate::naming;

static BLOCK_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"Schema::(create|table)\(\s*['"]([^'"]+)['"]\s*,\s*"#,
        r"(?:static\s+)?function\s*\([^)]*\)\s*",
        r"(?:use\s*\([^)]*\)\s*)?(?::\s*\w+\s*)?\{",
    ))
    .expect("block marker pattern is valid")
});

/// Builder call argument.
#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Str(String),
    Num(String),
    Ident(String),
    Array(Vec<Arg>),
    /// Anything else, kept as source-like text (`now()`, `DB::raw('..')`).
    Expr(String),
}

impl Arg {
    fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Num(s) | Self::Ident(s) => Some(s),
            _ => None,
        }
    }

    fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Num(n) => n.parse().ok(),
            _ => None,
        }
    }

    /// One column name or a list of them.
    fn as_columns(&self) -> Vec<String> {
        match self {
            Self::Array(items) => items
                .iter()
                .filter_map(|a| a.as_str().map(str::to_string))
                .collect(),
            other => other.as_str().map(|s| vec![s.to_string()]).unwrap_or_default(),
        }
    }

    /// PHP literal text, used for `default(..)` round trips.
    fn to_literal(&self) -> String {
        match self {
            Self::Str(s) => format!("'{}'", s.replace('\'', "\\'")),
            Self::Num(s) | Self::Ident(s) | Self::Expr(s) => s.clone(),
            Self::Array(items) => {
                let inner: Vec<String> = items.iter().map(Arg::to_literal).collect();
                format!("[{}]", inner.join(", "))
            }
        }
    }

    /// Date boundary: `now`, `now()` or a literal date.
    fn to_date_bound(&self) -> Option<String> {
        match self {
            Self::Str(s) if s.eq_ignore_ascii_case("now") => Some("now".to_string()),
            Self::Str(s) => Some(s.clone()),
            Self::Ident(s) | Self::Expr(s) if s.to_lowercase().starts_with("now") => {
                Some("now".to_string())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Call {
    method: String,
    args: Vec<Arg>,
}

/// Parse every create/alter block of one migration document.
///
/// Alter blocks are returned separately so that [`parse_migrations`] can merge
/// them once all files are known.
fn parse_document(source: &str) -> (Vec<RawTable>, Vec<RawTable>) {
    let mut created = Vec::new();
    let mut altered = Vec::new();

    for caps in BLOCK_MARKER.captures_iter(source) {
        let (Some(whole), Some(kind), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let body = block_body(&source[whole.end()..]);
        let table = parse_block(name.as_str(), body);
        log::debug!(
            "parsed Schema::{}('{}') with {} columns",
            kind.as_str(),
            table.name,
            table.columns.len()
        );
        if kind.as_str() == "create" {
            created.push(table);
        } else {
            altered.push(table);
        }
    }

    (created, altered)
}

/// Parse one migration document.
pub fn parse_migration(source: &str) -> RawSchema {
    parse_migrations(&[source])
}

/// Parse a set of migration documents, in migration order.
pub fn parse_migrations<S: AsRef<str>>(sources: &[S]) -> RawSchema {
    let mut raw = RawSchema::default();
    let mut pending_alters = Vec::new();

    for source in sources {
        let (created, altered) = parse_document(source.as_ref());
        raw.tables.extend(created);
        pending_alters.extend(altered);
    }

    for alter in pending_alters {
        match raw.tables.iter_mut().find(|t| t.name == alter.name) {
            Some(table) => table.merge(alter),
            None => {
                log::warn!("Schema::table('{}') has no matching create block", alter.name);
                raw.unresolved
                    .push(UnresolvedReference::AlterTarget { table: alter.name });
            }
        }
    }

    raw
}

/// Text between the opening brace (already consumed) and its matching close.
/// Braces inside strings and comments are not counted.
fn block_body(rest: &str) -> &str {
    let mut depth = 1usize;
    let mut chars = rest.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\'' | '"' => {
                while let Some((_, s)) = chars.next() {
                    if s == '\\' {
                        chars.next();
                    } else if s == c {
                        break;
                    }
                }
            }
            '/' if chars.peek().is_some_and(|&(_, n)| n == '*') => {
                chars.next();
                let mut prev = ' ';
                for (_, s) in chars.by_ref() {
                    if prev == '*' && s == '/' {
                        break;
                    }
                    prev = s;
                }
            }
            '#' | '/' if c == '#' || chars.peek().is_some_and(|&(_, n)| n == '/') => {
                for (_, s) in chars.by_ref() {
                    if s == '\n' {
                        break;
                    }
                }
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return &rest[..i];
                }
            }
            _ => {}
        }
    }
    rest
}

fn parse_block(table_name: &str, body: &str) -> RawTable {
    let tokens = Lexer::new(body).tokenize();
    let mut table = RawTable::new(table_name);

    for statement in split_statements(&tokens) {
        let Some(calls) = parse_chain(statement) else {
            continue;
        };
        apply_statement(&mut table, &calls);
    }

    table
}

/// Split at top-level semicolons.
fn split_statements(tokens: &[Token]) -> Vec<&[Token]> {
    let mut statements = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, tok) in tokens.iter().enumerate() {
        match tok {
            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
            Token::RParen | Token::RBracket | Token::RBrace => depth -= 1,
            Token::Semicolon | Token::Eof if depth <= 0 => {
                if i > start {
                    statements.push(&tokens[start..i]);
                }
                start = i + 1;
                depth = 0;
            }
            _ => {}
        }
    }
    statements
}

/// `$var->a(..)->b(..)` into its calls. Returns `None` unless the statement
/// starts with a variable and at least one call follows.
fn parse_chain(tokens: &[Token]) -> Option<Vec<Call>> {
    let mut cursor = Cursor { tokens, pos: 0 };
    if !matches!(cursor.current(), Token::Variable(_)) {
        return None;
    }
    cursor.advance();

    let mut calls = Vec::new();
    while cursor.current() == &Token::Arrow {
        cursor.advance();
        let method = match cursor.current() {
            Token::Ident(m) => m.clone(),
            _ => break,
        };
        cursor.advance();
        if cursor.current() != &Token::LParen {
            break;
        }
        cursor.advance();
        let args = cursor.parse_args(&Token::RParen);
        calls.push(Call { method, args });
    }

    if calls.is_empty() { None } else { Some(calls) }
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Cursor<'_> {
    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    /// Arguments up to and including `close`.
    fn parse_args(&mut self, close: &Token) -> Vec<Arg> {
        let mut args = Vec::new();
        loop {
            match self.current() {
                t if t == close => {
                    self.advance();
                    break;
                }
                Token::Eof => break,
                Token::Comma => self.advance(),
                _ => match self.parse_arg() {
                    Some(arg) => {
                        // `key => value` keeps the value
                        if self.current() == &Token::FatArrow {
                            self.advance();
                            continue;
                        }
                        args.push(arg);
                    }
                    None => self.advance(),
                },
            }
        }
        args
    }

    fn parse_arg(&mut self) -> Option<Arg> {
        let arg = match self.current().clone() {
            Token::Str(s) => {
                self.advance();
                Arg::Str(s)
            }
            Token::Num(n) => {
                self.advance();
                Arg::Num(n)
            }
            Token::LBracket => {
                self.advance();
                Arg::Array(self.parse_args(&Token::RBracket))
            }
            Token::Variable(v) => {
                self.advance();
                Arg::Expr(format!("${v}"))
            }
            Token::Ident(first) => {
                self.advance();
                let mut text = first;
                while self.current() == &Token::DoubleColon {
                    self.advance();
                    if let Token::Ident(next) = self.current().clone() {
                        self.advance();
                        text.push_str("::");
                        text.push_str(&next);
                    }
                }
                if self.current() == &Token::LParen {
                    self.advance();
                    let inner: Vec<String> = self
                        .parse_args(&Token::RParen)
                        .iter()
                        .map(Arg::to_literal)
                        .collect();
                    Arg::Expr(format!("{}({})", text, inner.join(", ")))
                } else if text.contains("::") {
                    Arg::Expr(text)
                } else {
                    Arg::Ident(text)
                }
            }
            _ => return None,
        };
        Some(arg)
    }
}

fn first_arg_str(call: &Call) -> Option<String> {
    call.args.first().and_then(Arg::as_str).map(str::to_string)
}

fn apply_statement(table: &mut RawTable, calls: &[Call]) {
    let (head, chain) = match calls.split_first() {
        Some(split) => split,
        None => return,
    };
    let Some(builder) = vocabulary::builder(&head.method) else {
        log::trace!("skipping unrecognised builder `{}`", head.method);
        return;
    };

    let columns = match builder {
        Builder::Foreign => {
            let first = head.args.first().and_then(|a| a.as_columns().into_iter().next());
            if let Some(column) = first {
                let mut link = ForeignKeyLink::default();
                for call in chain {
                    link.apply(call);
                }
                if let Some(fact) = link.into_fact(&column) {
                    table.foreign_keys.push(fact);
                }
            }
            return;
        }
        Builder::Unique => {
            if let Some(arg) = head.args.first() {
                let key = arg.as_columns();
                if !key.is_empty() && !table.unique_keys.contains(&key) {
                    table.unique_keys.push(key);
                }
            }
            return;
        }
        Builder::Index => {
            for name in head.args.first().map(Arg::as_columns).unwrap_or_default() {
                if let Some(col) = table.columns.iter_mut().find(|c| c.name == name) {
                    col.indexed = true;
                }
            }
            return;
        }
        Builder::Primary => {
            // Composite keys are not modelled.
            if let [name] = head.args.first().map(Arg::as_columns).unwrap_or_default().as_slice() {
                if let Some(col) = table.columns.iter_mut().find(|c| &c.name == name) {
                    col.primary = true;
                    col.nullable = false;
                }
            }
            return;
        }
        _ => build_columns(builder, head),
    };

    let Some(mut columns) = columns else {
        log::trace!("`{}` declared without a column name", head.method);
        return;
    };

    // Modifiers apply to the key column of a multi-column helper.
    let target = columns.len() - 1;
    let mut link = ForeignKeyLink::default();
    for call in chain {
        match vocabulary::modifier(&call.method) {
            Some(modifier) => {
                if matches!(builder, Builder::Morphs { .. }) && modifier == Modifier::Nullable {
                    columns.iter_mut().for_each(|c| c.nullable = true);
                    continue;
                }
                apply_modifier(&mut columns[target], modifier, call, table, &mut link);
            }
            None => log::trace!("skipping unrecognised modifier `{}`", call.method),
        }
    }

    let key_column = columns[target].name.clone();
    if let Some(fact) = link.into_fact(&key_column) {
        table.foreign_keys.push(fact);
    }
    table.columns.extend(columns);
}

/// Columns declared by a builder call; `None` when a required name is missing.
fn build_columns(builder: &Builder, call: &Call) -> Option<Vec<Column>> {
    let name = first_arg_str(call);
    let columns = match builder {
        Builder::Column { typ, unsigned } => {
            let mut col = Column::new(name?, typ.clone());
            col.nullable = false;
            if *unsigned {
                col.unsigned = true;
                col.bounds.min = Some("0".to_string());
            }
            match typ {
                ColumnType::String | ColumnType::Char | ColumnType::Binary => {
                    col.size = call.args.get(1).and_then(Arg::as_u32);
                }
                ColumnType::Decimal | ColumnType::Float | ColumnType::Double => {
                    col.precision = call.args.get(1).and_then(Arg::as_u32);
                    col.scale = call.args.get(2).and_then(Arg::as_u32);
                }
                ColumnType::Enum => {
                    if let Some(Arg::Array(values)) = call.args.get(1) {
                        col.enum_values = values
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect();
                    }
                }
                _ => {}
            }
            vec![col]
        }
        Builder::Increments(typ) => {
            let mut col = Column::new(name.unwrap_or_else(|| "id".to_string()), typ.clone());
            col.nullable = false;
            col.primary = true;
            col.auto_increment = true;
            col.unsigned = true;
            vec![col]
        }
        Builder::RememberToken => {
            let mut col = Column::new("remember_token", ColumnType::String);
            col.size = Some(100);
            vec![col]
        }
        Builder::Morphs { nullable } => {
            let name = name?;
            let mut kind = Column::new(format!("{name}_type"), ColumnType::String);
            let mut id = Column::new(format!("{name}_id"), ColumnType::BigInteger);
            id.unsigned = true;
            for col in [&mut kind, &mut id] {
                col.nullable = *nullable;
                col.indexed = true;
            }
            vec![kind, id]
        }
        Builder::ForeignId => {
            let mut col = Column::new(name?, ColumnType::BigInteger);
            col.nullable = false;
            col.unsigned = true;
            vec![col]
        }
        Builder::Timestamps => vec![
            Column::new("created_at", ColumnType::Timestamp),
            Column::new("updated_at", ColumnType::Timestamp),
        ],
        Builder::SoftDeletes => vec![Column::new(
            name.unwrap_or_else(|| "deleted_at".to_string()),
            ColumnType::Timestamp,
        )],
        Builder::Foreign | Builder::Unique | Builder::Index | Builder::Primary => return None,
    };
    Some(columns)
}

fn apply_modifier(
    col: &mut Column,
    modifier: Modifier,
    call: &Call,
    table: &mut RawTable,
    link: &mut ForeignKeyLink,
) {
    let arg = call.args.first();
    match modifier {
        Modifier::Nullable => {
            col.nullable = !matches!(arg, Some(Arg::Ident(v)) if v.eq_ignore_ascii_case("false"));
        }
        Modifier::Default => col.default = arg.map(Arg::to_literal),
        Modifier::Unique => {
            let key = vec![col.name.clone()];
            if !table.unique_keys.contains(&key) {
                table.unique_keys.push(key);
            }
        }
        Modifier::Min => col.bounds.min = arg.and_then(Arg::as_str).map(str::to_string),
        Modifier::Max => col.bounds.max = arg.and_then(Arg::as_str).map(str::to_string),
        Modifier::Unsigned => {
            col.unsigned = true;
            col.bounds.min.get_or_insert_with(|| "0".to_string());
        }
        Modifier::Index => col.indexed = true,
        Modifier::Comment => {
            col.comment = arg.and_then(Arg::as_str).map(str::to_string);
        }
        Modifier::Before => col.bounds.before = arg.and_then(Arg::to_date_bound),
        Modifier::After => col.bounds.after = arg.and_then(Arg::to_date_bound),
        Modifier::Primary => {
            col.primary = true;
            col.nullable = false;
        }
        Modifier::AutoIncrement => col.auto_increment = true,
        Modifier::Constrained | Modifier::References | Modifier::On | Modifier::OnDelete(_) => {
            link.apply(call)
        }
    }
}

/// Pieces of a foreign-key declaration gathered across one chain.
#[derive(Debug, Default)]
struct ForeignKeyLink {
    table: Option<String>,
    references: Option<String>,
    on_delete: Option<String>,
    constrained: bool,
}

impl ForeignKeyLink {
    fn apply(&mut self, call: &Call) {
        match vocabulary::modifier(&call.method) {
            Some(Modifier::Constrained) => {
                self.constrained = true;
                self.table = first_arg_str(call).or(self.table.take());
                if let Some(column) = call.args.get(1).and_then(Arg::as_str) {
                    self.references = Some(column.to_string());
                }
            }
            Some(Modifier::References) => self.references = first_arg_str(call),
            Some(Modifier::On) => self.table = first_arg_str(call),
            Some(Modifier::OnDelete(Some(action))) => self.on_delete = Some(action.to_string()),
            Some(Modifier::OnDelete(None)) => self.on_delete = first_arg_str(call),
            _ => {}
        }
    }

    fn into_fact(self, column: &str) -> Option<ForeignKeyFact> {
        let table = match self.table {
            Some(table) => table,
            // `foreignId('user_id')->constrained()` -> users
            None if self.constrained => naming::table_name(column.strip_suffix("_id")?),
            None => return None,
        };
        Some(ForeignKeyFact {
            column: column.to_string(),
            table,
            references: self.references.unwrap_or_else(|| "id".to_string()),
            on_delete: self.on_delete,
        })
    }
}
