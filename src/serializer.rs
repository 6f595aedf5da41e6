//! Serializer for converting a Schema to a PlantUML entity-relationship document.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use unicode_width::UnicodeWidthStr;

use crate::ast::{Column, ColumnType, Relationship, Schema, Table};

#[derive(Debug, Clone)]
pub struct DiagramOptions {
    pub generated_at: DateTime<Utc>,
    pub title: Option<String>,
}

impl DiagramOptions {
    pub fn new(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            title: None,
        }
    }
}

/// Serialize a Schema to one PlantUML document.
pub fn serialize(schema: &Schema, options: &DiagramOptions) -> String {
    let mut output = String::from("@startuml\n");
    output.push_str(&format!(
        "' generated by schemagen at {}\n",
        options.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(title) = &options.title {
        output.push_str(&format!("title {title}\n"));
    }
    output.push_str("hide circle\n");
    output.push_str("skinparam linetype ortho\n");

    for table in &schema.tables {
        output.push('\n');
        serialize_table(&mut output, table);
    }

    let mut seen = HashSet::new();
    let mut lines = Vec::new();
    for rel in &schema.relationships {
        if seen.insert(rel.key()) {
            lines.push(relationship_line(rel));
        }
    }
    if !lines.is_empty() {
        output.push_str("\n' relationships\n");
        for line in lines {
            output.push_str(&line);
            output.push('\n');
        }
    }

    output.push_str("@enduml\n");
    output
}

fn serialize_table(output: &mut String, table: &Table) {
    output.push_str(&format!("entity {} {{\n", table.name));

    let width = table
        .columns
        .iter()
        .map(|c| UnicodeWidthStr::width(c.name.as_str()))
        .max()
        .unwrap_or(0);

    for col in &table.columns {
        let marker = if col.primary { "* " } else { "  " };
        let pad = width - UnicodeWidthStr::width(col.name.as_str());
        output.push_str(&format!(
            "  {marker}{}{} : {}",
            col.name,
            " ".repeat(pad),
            column_type(col)
        ));
        if !col.nullable && !col.primary {
            output.push_str(" NOT NULL");
        }
        if let Some(fk) = &col.foreign_key {
            if fk.column == "id" {
                output.push_str(&format!(" <<FK {}>>", fk.table));
            } else {
                output.push_str(&format!(" <<FK {}.{}>>", fk.table, fk.column));
            }
        }
        if let Some(comment) = col.comment.as_deref().filter(|c| !c.is_empty()) {
            output.push_str(&format!(" \"{comment}\""));
        }
        output.push('\n');
    }

    output.push_str("}\n");
}

fn column_type(col: &Column) -> String {
    let name = col.typ.diagram_name();
    if col.typ == ColumnType::Enum && !col.enum_values.is_empty() {
        let values: Vec<String> = col.enum_values.iter().map(|v| format!("'{v}'")).collect();
        return format!("{name}({})", values.join(","));
    }
    match (col.precision, col.scale, col.size) {
        (Some(p), Some(s), _) => format!("{name}({p},{s})"),
        (Some(p), None, _) => format!("{name}({p})"),
        (None, _, Some(size)) => format!("{name}({size})"),
        _ => name.to_string(),
    }
}

fn relationship_line(rel: &Relationship) -> String {
    match rel {
        Relationship::OneToMany { parent, child } => format!("{parent} ||--o{{ {child}"),
        Relationship::OneToOne { parent, child } => format!("{parent} ||--|| {child}"),
        Relationship::ManyToMany {
            table1,
            table2,
            pivot_table,
        } => format!("{table1} }}o--o{{ {table2} : {pivot_table}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ForeignKey;
    use crate::parser::parse_diagram;
    use chrono::TimeZone;

    fn options() -> DiagramOptions {
        DiagramOptions::new(Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap())
    }

    fn column(name: &str, typ: ColumnType) -> Column {
        Column::new(name, typ)
    }

    #[test]
    fn test_serialize_document() {
        let mut user = Table::new("User");
        let mut id = column("id", ColumnType::BigInteger);
        id.primary = true;
        id.nullable = false;
        user.columns.push(id);
        let mut email = column("email", ColumnType::String);
        email.size = Some(255);
        email.nullable = false;
        email.comment = Some("Login".into());
        user.columns.push(email);

        let schema = Schema {
            tables: vec![user, Table::new("Post")],
            relationships: vec![Relationship::OneToMany {
                parent: "User".into(),
                child: "Post".into(),
            }],
            ..Default::default()
        };

        let expected = "\
@startuml
' generated by schemagen at 2026-10-17 12:00:00 UTC
hide circle
skinparam linetype ortho

entity User {
  * id    : bigint
    email : varchar(255) NOT NULL \"Login\"
}

entity Post {
}

' relationships
User ||--o{ Post
@enduml
";
        assert_eq!(serialize(&schema, &options()), expected);
    }

    #[test]
    fn test_decimal_parameters() {
        let mut product = Table::new("Product");
        let mut price = column("price", ColumnType::Decimal);
        price.precision = Some(8);
        price.scale = Some(2);
        product.columns.push(price);
        let schema = Schema {
            tables: vec![product],
            ..Default::default()
        };
        assert!(serialize(&schema, &options()).contains("    price : decimal(8,2)\n"));
    }

    #[test]
    fn test_enum_values() {
        let mut order = Table::new("Order");
        let mut status = column("status", ColumnType::Enum);
        status.enum_values = vec!["open".into(), "paid".into()];
        order.columns.push(status);
        let schema = Schema {
            tables: vec![order],
            ..Default::default()
        };
        assert!(serialize(&schema, &options()).contains("status : enum('open','paid')"));
    }

    #[test]
    fn test_title() {
        let mut opts = options();
        opts.title = Some("Shop".into());
        let out = serialize(&Schema::default(), &opts);
        assert!(out.contains("\ntitle Shop\n"));
    }

    #[test]
    fn test_synthesized_pivot_is_a_block() {
        let schema = parse_diagram(
            "entity Product {\n}\nentity Category {\n}\nProduct }o--o{ Category\n",
        );
        let out = serialize(&schema, &options());
        let expected = "\
entity category_product {
  * id          : bigint
    category_id : bigint NOT NULL <<FK categories>>
    product_id  : bigint NOT NULL <<FK products>>
}
";
        assert!(out.contains(expected), "{out}");
        assert!(out.contains("Product }o--o{ Category : category_product\n"));
    }

    #[test]
    fn test_pivot_with_extra_columns_is_a_block() {
        let mut schema = parse_diagram(
            "entity Role {\n}\nentity User {\n}\nRole }o--o{ User\n",
        );
        schema
            .table_mut("role_user")
            .unwrap()
            .columns
            .push(column("created_at", ColumnType::Timestamp));
        let out = serialize(&schema, &options());
        assert!(out.contains("entity role_user {"));
        assert!(out.contains("    created_at : timestamp\n"));
    }

    #[test]
    fn test_foreign_key_stereotype_names_target() {
        let mut post = Table::new("Post");
        let mut owner = column("owner_id", ColumnType::BigInteger);
        owner.nullable = false;
        owner.foreign_key = Some(ForeignKey::new("users", "id"));
        owner.comment = Some("Author".into());
        post.columns.push(owner);
        let mut country = column("country", ColumnType::Char);
        country.foreign_key = Some(ForeignKey::new("countries", "code"));
        post.columns.push(country);
        let schema = Schema {
            tables: vec![post],
            ..Default::default()
        };
        let out = serialize(&schema, &options());
        assert!(out.contains("    owner_id : bigint NOT NULL <<FK users>> \"Author\"\n"), "{out}");
        assert!(out.contains("    country  : char <<FK countries.code>>\n"), "{out}");
    }

    #[test]
    fn test_relationships_deduplicated() {
        let schema = Schema {
            relationships: vec![
                Relationship::ManyToMany {
                    table1: "Product".into(),
                    table2: "Category".into(),
                    pivot_table: "category_product".into(),
                },
                Relationship::ManyToMany {
                    table1: "Category".into(),
                    table2: "Product".into(),
                    pivot_table: "category_product".into(),
                },
            ],
            ..Default::default()
        };
        let out = serialize(&schema, &options());
        assert_eq!(out.matches("}o--o{").count(), 1);
    }

    #[test]
    fn test_alignment_uses_display_width() {
        let mut user = Table::new("ユーザー");
        user.columns.push(column("名前", ColumnType::String));
        user.columns.push(column("email", ColumnType::String));
        let schema = Schema {
            tables: vec![user],
            ..Default::default()
        };
        let out = serialize(&schema, &options());
        assert!(out.contains("    名前  : varchar\n"));
        assert!(out.contains("    email : varchar\n"));
    }
}
