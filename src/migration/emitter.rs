//! Migration emitter: one migration document per table.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use super::skeleton::Skeleton;
use super::vocabulary;
use crate::ast::{Column, ColumnType, Schema, Table};
use crate::config::GeneratorConfig;
use crate::infer;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmitError {
    #[error("Pivot table `{table}` has {foreign_keys} foreign keys, expected 2")]
    MalformedPivot { table: String, foreign_keys: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub file_name: String,
    pub contents: String,
}

/// `2026_10_17_120000_create_users_table.php`
pub fn file_name(at: DateTime<Utc>, table: &str) -> String {
    format!("{}_create_{}_table.php", at.format("%Y_%m_%d_%H%M%S"), table)
}

/// Emit every table in [`creation_order`]. Each file is stamped one second
/// after the previous one so filename order is creation order.
pub fn emit_migrations(
    schema: &Schema,
    skeleton: &Skeleton,
    config: &GeneratorConfig,
    at: DateTime<Utc>,
) -> Result<Vec<MigrationFile>, EmitError> {
    let mut files = Vec::with_capacity(schema.tables.len());
    for (i, table) in creation_order(schema).into_iter().enumerate() {
        let stamp = at + Duration::seconds(i as i64);
        let file = MigrationFile {
            file_name: file_name(stamp, &table.storage_name()),
            contents: emit_migration(table, skeleton, config)?,
        };
        log::debug!("emitted {}", file.file_name);
        files.push(file);
    }
    Ok(files)
}

/// Domain tables by foreign-key level (referenced tables first, input order
/// within a level, cycles last), then pivots.
pub fn creation_order(schema: &Schema) -> Vec<&Table> {
    let domain: Vec<&Table> = schema.domain_tables().collect();
    let index: HashMap<String, usize> = domain
        .iter()
        .enumerate()
        .map(|(i, t)| (t.storage_name(), i))
        .collect();

    // child -> parents (FK targets), self-references ignored
    let parents: Vec<HashSet<usize>> = domain
        .iter()
        .enumerate()
        .map(|(i, table)| {
            table
                .foreign_key_columns()
                .filter_map(|c| c.foreign_key.as_ref().and_then(|fk| index.get(&fk.table)))
                .copied()
                .filter(|&p| p != i)
                .collect()
        })
        .collect();

    let mut levels: Vec<Option<usize>> = vec![None; domain.len()];
    let mut changed = true;
    while changed {
        changed = false;
        for (i, deps) in parents.iter().enumerate() {
            if levels[i].is_some() {
                continue;
            }
            let known: Vec<usize> = deps.iter().filter_map(|&p| levels[p]).collect();
            if known.len() == deps.len() {
                levels[i] = Some(known.into_iter().max().map_or(0, |l| l + 1));
                changed = true;
            }
        }
    }

    let max_level = levels.iter().flatten().copied().max().unwrap_or(0);
    let mut ordered: Vec<(usize, &Table)> = domain
        .into_iter()
        .zip(&levels)
        .map(|(table, level)| (level.unwrap_or(max_level + 1), table))
        .collect();
    ordered.sort_by_key(|(level, _)| *level);
    ordered
        .into_iter()
        .map(|(_, table)| table)
        .chain(schema.pivot_tables())
        .collect()
}

pub fn emit_migration(
    table: &Table,
    skeleton: &Skeleton,
    config: &GeneratorConfig,
) -> Result<String, EmitError> {
    let lines = statements(table, config)?;
    Ok(skeleton.render(&table.storage_name(), &lines))
}

/// Statements spliced between `$table->id()` and `$table->timestamps()`.
pub fn statements(table: &Table, config: &GeneratorConfig) -> Result<Vec<String>, EmitError> {
    let foreign: Vec<&Column> = table.foreign_key_columns().collect();
    if table.is_pivot && foreign.len() != 2 {
        return Err(EmitError::MalformedPivot {
            table: table.name.clone(),
            foreign_keys: foreign.len(),
        });
    }

    let mut lines = Vec::new();
    let mut soft_deletes = config.soft_deletes && !table.is_pivot;

    for col in &table.columns {
        match col.name.as_str() {
            "id" | "created_at" | "updated_at" => {}
            "deleted_at" => soft_deletes = true,
            _ => lines.push(column_statement(col)),
        }
    }
    if soft_deletes {
        lines.push("$table->softDeletes();".to_string());
    }

    for col in &foreign {
        let Some(fk) = &col.foreign_key else {
            continue;
        };
        let policy = fk.on_delete.as_deref().unwrap_or(&config.on_delete);
        lines.push(format!(
            "$table->foreign('{}')->references('{}')->on('{}')->onDelete('{}');",
            col.name, fk.column, fk.table, policy
        ));
    }

    let pivot_key: Option<Vec<String>> = match foreign.as_slice() {
        [a, b]
            if a.is_key_reference()
                && b.is_key_reference()
                && (table.is_pivot || infer::has_pivot_shape(&table.columns)) =>
        {
            Some(vec![a.name.clone(), b.name.clone()])
        }
        _ => None,
    };
    if let Some(key) = &pivot_key {
        lines.push(unique_statement(key));
    }
    for key in &table.unique_keys {
        if pivot_key.as_ref().is_some_and(|p| same_columns(p, key)) {
            continue;
        }
        lines.push(unique_statement(key));
    }

    Ok(lines)
}

fn same_columns(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().all(|c| b.contains(c))
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn unique_statement(columns: &[String]) -> String {
    match columns {
        [single] => format!("$table->unique({});", quote(single)),
        _ => {
            let list: Vec<String> = columns.iter().map(|c| quote(c)).collect();
            format!("$table->unique([{}]);", list.join(", "))
        }
    }
}

fn column_statement(col: &Column) -> String {
    let unsigned = col.unsigned || (col.foreign_key.is_some() && col.typ.is_integer());
    let method = vocabulary::builder_method(&col.typ, unsigned);

    let mut args = vec![quote(&col.name)];
    match col.typ {
        ColumnType::String | ColumnType::Char | ColumnType::Binary | ColumnType::Other(_) => {
            args.extend(col.size.map(|s| s.to_string()));
        }
        ColumnType::Decimal | ColumnType::Float | ColumnType::Double => {
            if let Some(precision) = col.precision {
                args.push(precision.to_string());
                args.extend(col.scale.map(|s| s.to_string()));
            }
        }
        ColumnType::Enum => {
            let values: Vec<String> = col.enum_values.iter().map(|v| quote(v)).collect();
            args.push(format!("[{}]", values.join(", ")));
        }
        _ => {}
    }

    let mut stmt = format!("$table->{method}({})", args.join(", "));
    if col.nullable && !col.primary {
        stmt.push_str("->nullable()");
    }
    if let Some(default) = &col.default {
        stmt.push_str(&format!("->default({default})"));
    }
    if col.indexed {
        stmt.push_str("->index()");
    }
    if let Some(comment) = col.comment.as_deref().filter(|c| !c.is_empty()) {
        stmt.push_str(&format!("->comment({})", quote(comment)));
    }
    stmt.push(';');
    stmt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ForeignKey;
    use chrono::TimeZone;

    fn post_table() -> Table {
        let mut table = Table::new("Post");
        let mut id = Column::new("id", ColumnType::BigInteger);
        id.primary = true;
        id.nullable = false;
        table.columns.push(id);

        let mut title = Column::new("title", ColumnType::String);
        title.size = Some(120);
        title.nullable = false;
        table.columns.push(title);

        let mut price = Column::new("price", ColumnType::Decimal);
        price.precision = Some(8);
        price.scale = Some(2);
        price.comment = Some("Gross price".into());
        table.columns.push(price);

        table.columns.push(Column::foreign_id("user_id", "users"));
        table.columns.push(Column::new("created_at", ColumnType::Timestamp));
        table
    }

    #[test]
    fn test_column_statements_in_modifier_order() {
        let lines = statements(&post_table(), &GeneratorConfig::default()).unwrap();
        assert_eq!(
            lines,
            vec![
                "$table->string('title', 120);",
                "$table->decimal('price', 8, 2)->nullable()->comment('Gross price');",
                "$table->unsignedBigInteger('user_id');",
                "$table->foreign('user_id')->references('id')->on('users')->onDelete('cascade');",
            ]
        );
    }

    #[test]
    fn test_on_delete_policy_from_column_or_config() {
        let mut table = post_table();
        let config = GeneratorConfig {
            on_delete: "restrict".into(),
            ..Default::default()
        };
        let lines = statements(&table, &config).unwrap();
        assert!(lines[3].ends_with("->onDelete('restrict');"));

        table.column_mut("user_id").unwrap().foreign_key = Some(ForeignKey {
            table: "users".into(),
            column: "id".into(),
            on_delete: Some("set null".into()),
        });
        let lines = statements(&table, &config).unwrap();
        assert!(lines[3].ends_with("->onDelete('set null');"));
    }

    #[test]
    fn test_pivot_gets_composite_unique() {
        let pivot = infer::synthesize_pivot("Product", "Category", None);
        let lines = statements(&pivot, &GeneratorConfig::default()).unwrap();
        assert_eq!(
            lines.last().map(String::as_str),
            Some("$table->unique(['category_id', 'product_id']);")
        );
        assert_eq!(lines.iter().filter(|l| l.contains("unique")).count(), 1);
    }

    #[test]
    fn test_malformed_pivot_is_an_error() {
        let mut pivot = infer::synthesize_pivot("Product", "Category", None);
        pivot.columns.pop();
        let err = statements(&pivot, &GeneratorConfig::default()).unwrap_err();
        assert_eq!(
            err,
            EmitError::MalformedPivot {
                table: "category_product".into(),
                foreign_keys: 1
            }
        );
    }

    #[test]
    fn test_soft_deletes_from_column_or_config() {
        let mut table = Table::new("Comment");
        table.columns.push(Column::new("deleted_at", ColumnType::Timestamp));
        let lines = statements(&table, &GeneratorConfig::default()).unwrap();
        assert_eq!(lines, vec!["$table->softDeletes();"]);

        let config = GeneratorConfig {
            soft_deletes: true,
            ..Default::default()
        };
        let lines = statements(&Table::new("Tag"), &config).unwrap();
        assert_eq!(lines, vec!["$table->softDeletes();"]);
    }

    #[test]
    fn test_enum_and_quoted_comment() {
        let mut table = Table::new("Order");
        let mut status = Column::new("status", ColumnType::Enum);
        status.enum_values = vec!["open".into(), "paid".into()];
        status.nullable = false;
        status.default = Some("'open'".into());
        status.comment = Some("customer's state".into());
        table.columns.push(status);
        let lines = statements(&table, &GeneratorConfig::default()).unwrap();
        assert_eq!(
            lines,
            vec![concat!(
                "$table->enum('status', ['open', 'paid'])",
                "->default('open')->comment('customer\\'s state');"
            )]
        );
    }

    #[test]
    fn test_emit_migrations_orders_and_names_files() {
        let mut schema = Schema::default();
        schema.tables.push(infer::synthesize_pivot("Role", "User", None));
        schema.tables.push(Table::new("User"));
        schema.tables.push(Table::new("Role"));

        let at = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let files = emit_migrations(
            &schema,
            &Skeleton::default(),
            &GeneratorConfig::default(),
            at,
        )
        .unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "2026_10_17_120000_create_users_table.php",
                "2026_10_17_120001_create_roles_table.php",
                "2026_10_17_120002_create_role_user_table.php",
            ]
        );
        assert!(files[2].contents.contains("Schema::create('role_user'"));
    }

    #[test]
    fn test_primary_key_column_has_no_primary_modifier() {
        let mut table = Table::new("Country");
        let mut code = Column::new("code", ColumnType::Char);
        code.size = Some(2);
        code.primary = true;
        code.nullable = false;
        table.columns.push(code);
        let mut seq = Column::new("seq", ColumnType::Integer);
        seq.auto_increment = true;
        seq.nullable = false;
        table.columns.push(seq);

        let lines = statements(&table, &GeneratorConfig::default()).unwrap();
        assert_eq!(lines, vec!["$table->char('code', 2);", "$table->integer('seq');"]);
    }

    #[test]
    fn test_creation_order_puts_referenced_tables_first() {
        let mut comment = Table::new("Comment");
        comment.columns.push(Column::foreign_id("post_id", "posts"));
        comment.columns.push(Column::foreign_id("parent_id", "comments"));
        let mut post = Table::new("Post");
        post.columns.push(Column::foreign_id("author_id", "authors"));
        let mut schema = Schema::default();
        schema.tables.push(comment);
        schema.tables.push(post);
        schema.tables.push(Table::new("Tag"));
        schema.tables.push(Table::new("Author"));
        schema.tables.push(infer::synthesize_pivot("Post", "Tag", None));

        let names: Vec<&str> = creation_order(&schema)
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["Tag", "Author", "Post", "Comment", "post_tag"]);
    }

    #[test]
    fn test_creation_order_keeps_cycles() {
        let mut a = Table::new("Author");
        a.columns.push(Column::foreign_id("book_id", "books"));
        let mut b = Table::new("Book");
        b.columns.push(Column::foreign_id("author_id", "authors"));
        let schema = Schema {
            tables: vec![a, b, Table::new("Shelf")],
            ..Default::default()
        };
        let names: Vec<&str> = creation_order(&schema)
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["Shelf", "Author", "Book"]);
    }
}
