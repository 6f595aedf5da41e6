//! Line-oriented parser for PlantUML entity-relationship diagrams.
//!
//! Parsing is tolerant: any line that is not an entity header, a column, a
//! closing brace or a relationship is skipped.

use std::sync::LazyLock;

use regex::Regex;

use crate::ast::{Column, ColumnType, ForeignKey, Relationship, Schema, Table};
use crate::infer;

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^entity\s+(?:"([^"]+)"|(\w+))(?:\s+as\s+(\w+))?\s*(?:<<[^>]*>>)?\s*\{?\s*$"#)
        .expect("entity pattern is valid")
});

static COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*)?\s*(\w+)\s*:\s*(\w+)\s*(?:\(([^)]*)\))?\s*(.*)$")
        .expect("column pattern is valid")
});

static RELATIONSHIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+)\s*(\|\|--o\{|\|\|--\|\||\}o--o\{)\s*(\w+)\s*(?::\s*(.*))?$")
        .expect("relationship pattern is valid")
});

static FOREIGN_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<<\s*FK\s+(\w+)(?:\.(\w+))?\s*>>").expect("foreign-key pattern is valid")
});

static STEREOTYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<<[^>]*>>").expect("stereotype pattern is valid"));

static NOT_NULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bnot\s+null\b").expect("not-null pattern is valid"));

/// Parse a diagram document and add the key columns and pivot tables its
/// relationship lines imply.
pub fn parse_diagram(source: &str) -> Schema {
    let mut parser = Parser::default();
    for line in source.lines() {
        parser.line(line.trim());
    }
    parser.finish()
}

#[derive(Default)]
struct Parser {
    schema: Schema,
    current: Option<Table>,
}

impl Parser {
    fn line(&mut self, line: &str) {
        if line.is_empty() || line.starts_with('\'') {
            return;
        }

        if let Some(caps) = ENTITY.captures(line) {
            self.close();
            let name = caps
                .get(3)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(1))
                .map_or("", |m| m.as_str());
            self.current = Some(Table::new(name));
            return;
        }

        if line == "}" {
            self.close();
            return;
        }

        if let Some(caps) = RELATIONSHIP.captures(line) {
            let left = caps[1].to_string();
            let right = caps[3].to_string();
            let rel = match &caps[2] {
                "||--o{" => Relationship::OneToMany {
                    parent: left,
                    child: right,
                },
                "||--||" => Relationship::OneToOne {
                    parent: left,
                    child: right,
                },
                _ => {
                    let custom = caps
                        .get(4)
                        .map(|m| unquote(m.as_str().trim()))
                        .filter(|s| !s.is_empty());
                    let pivot_table = infer::pivot_table_name(&left, &right, custom);
                    Relationship::ManyToMany {
                        table1: left,
                        table2: right,
                        pivot_table,
                    }
                }
            };
            if !self.schema.push_relationship(rel) {
                log::trace!("duplicate relationship: {line}");
            }
            return;
        }

        if let Some(table) = self.current.as_mut() {
            if let Some(caps) = COLUMN.captures(line) {
                table.columns.push(column(&caps));
                return;
            }
        }

        log::trace!("skipping diagram line: {line}");
    }

    fn close(&mut self) {
        if let Some(table) = self.current.take() {
            log::debug!("parsed entity {} ({} columns)", table.name, table.columns.len());
            self.schema.tables.push(table);
        }
    }

    fn finish(mut self) -> Schema {
        self.close();
        infer::augment(&mut self.schema);
        self.schema
    }
}

fn column(caps: &regex::Captures<'_>) -> Column {
    let mut col = Column::new(&caps[2], ColumnType::from_diagram(&caps[3]));
    if caps.get(1).is_some() {
        col.primary = true;
        col.nullable = false;
    }
    if let Some(params) = caps.get(4) {
        apply_params(&mut col, params.as_str());
    }

    let rest = caps.get(5).map_or("", |m| m.as_str());
    if let Some(fk) = FOREIGN_KEY.captures(rest) {
        col.foreign_key = Some(ForeignKey::new(&fk[1], fk.get(2).map_or("id", |m| m.as_str())));
    }
    let rest = STEREOTYPE.replace_all(rest, "");
    let rest = if NOT_NULL.is_match(&rest) {
        col.nullable = false;
        NOT_NULL.replace_all(&rest, "").into_owned()
    } else {
        rest.into_owned()
    };
    let comment = unquote(rest.trim());
    if !comment.is_empty() {
        col.comment = Some(comment.to_string());
    }
    col
}

fn apply_params(col: &mut Column, params: &str) {
    if col.typ == ColumnType::Enum {
        col.enum_values = params
            .split(',')
            .map(|v| unquote(v.trim()).to_string())
            .filter(|v| !v.is_empty())
            .collect();
        return;
    }
    match params.split_once(',') {
        Some((precision, scale)) => {
            col.precision = precision.trim().parse().ok();
            col.scale = scale.trim().parse().ok();
        }
        None => col.size = params.trim().parse().ok(),
    }
}

fn unquote(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::UnresolvedReference;

    #[test]
    fn test_parse_entity() {
        let input = r#"
            @startuml
            entity User {
              * id : bigint
                email : varchar(255) NOT NULL "Login address"
                bio : text
            }
            @enduml
        "#;
        let schema = parse_diagram(input);
        assert_eq!(schema.tables.len(), 1);
        let user = &schema.tables[0];
        assert_eq!(user.name, "User");
        assert_eq!(user.columns.len(), 3);

        assert!(user.columns[0].primary);
        assert!(!user.columns[0].nullable);

        let email = &user.columns[1];
        assert_eq!(email.typ, ColumnType::String);
        assert_eq!(email.size, Some(255));
        assert!(!email.nullable);
        assert_eq!(email.comment.as_deref(), Some("Login address"));

        assert!(user.columns[2].nullable);
        assert_eq!(user.columns[2].comment, None);
    }

    #[test]
    fn test_one_to_many_backfills_existing_column() {
        let input = "
            entity User {
              * id : bigint
            }
            entity Post {
              * id : bigint
                user_id : bigint
            }
            User ||--o{ Post
        ";
        let schema = parse_diagram(input);
        let post = schema.table("Post").unwrap();
        assert_eq!(post.columns.len(), 2);
        assert_eq!(
            post.column("user_id").unwrap().foreign_key,
            Some(ForeignKey::new("users", "id"))
        );
        assert_eq!(
            schema.relationships,
            vec![Relationship::OneToMany {
                parent: "User".into(),
                child: "Post".into(),
            }]
        );
    }

    #[test]
    fn test_many_to_many_synthesizes_pivot_last() {
        let input = "
            entity Product {
              * id : bigint
            }
            entity Category {
              * id : bigint
            }
            Product }o--o{ Category
        ";
        let schema = parse_diagram(input);
        let names: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Product", "Category", "category_product"]);

        let pivot = &schema.tables[2];
        assert!(pivot.is_pivot);
        assert_eq!(
            pivot.column("category_id").unwrap().foreign_key,
            Some(ForeignKey::new("categories", "id"))
        );
        assert_eq!(
            pivot.column("product_id").unwrap().foreign_key,
            Some(ForeignKey::new("products", "id"))
        );
    }

    #[test]
    fn test_custom_pivot_name() {
        let input = "
            entity Product {
            }
            entity Tag {
            }
            Product }o--o{ Tag : ProductTagging
        ";
        let schema = parse_diagram(input);
        assert!(schema.table("product_tagging").is_some_and(|t| t.is_pivot));
    }

    #[test]
    fn test_one_to_one_adds_unique_key() {
        let input = "
            entity User {
            }
            entity Profile {
            }
            User ||--|| Profile
        ";
        let schema = parse_diagram(input);
        let profile = schema.table("Profile").unwrap();
        assert_eq!(profile.unique_keys, vec![vec!["user_id".to_string()]]);
        assert!(!profile.column("user_id").unwrap().nullable);
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let input = "
            entity Post {
              * id : bigint
                not a real column def
                title : varchar(200)
            }
        ";
        let schema = parse_diagram(input);
        let names: Vec<&str> = schema.tables[0]
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "title"]);
    }

    #[test]
    fn test_type_parameters() {
        let input = r#"
            entity Order {
                price : decimal(8, 2)
                status : enum('open','paid') <<state>>
                code : char(3) not null
            }
        "#;
        let schema = parse_diagram(input);
        let order = &schema.tables[0];

        let price = order.column("price").unwrap();
        assert_eq!((price.precision, price.scale, price.size), (Some(8), Some(2), None));

        let status = order.column("status").unwrap();
        assert_eq!(status.enum_values, vec!["open", "paid"]);
        assert_eq!(status.comment, None);

        let code = order.column("code").unwrap();
        assert_eq!(code.size, Some(3));
        assert!(!code.nullable);
    }

    #[test]
    fn test_entity_closed_by_next_header_and_eof() {
        let input = "
            entity A
              x : integer
            entity B
              y : integer
        ";
        let schema = parse_diagram(input);
        assert_eq!(schema.tables.len(), 2);
        assert_eq!(schema.tables[0].columns[0].name, "x");
        assert_eq!(schema.tables[1].columns[0].name, "y");
    }

    #[test]
    fn test_quoted_entity_with_alias() {
        let schema = parse_diagram("entity \"Blog post\" as Post {\n}\n");
        assert_eq!(schema.tables[0].name, "Post");
    }

    #[test]
    fn test_relationship_to_undeclared_entity() {
        let input = "
            entity Post {
            }
            Ghost ||--o{ Post
        ";
        let schema = parse_diagram(input);
        assert!(schema.relationships.is_empty());
        assert_eq!(schema.unresolved.len(), 1);
        assert!(schema.tables[0].columns.is_empty());
    }

    #[test]
    fn test_duplicate_relationships_collapse() {
        let input = "
            entity Category {
            }
            entity Product {
            }
            Product }o--o{ Category
            Category }o--o{ Product
        ";
        let schema = parse_diagram(input);
        assert_eq!(schema.relationships.len(), 1);
        assert_eq!(schema.pivot_tables().count(), 1);
    }

    #[test]
    fn test_parse_unicode() {
        let input = "
            entity ユーザー {
                名前 : varchar NOT NULL
            }
        ";
        let schema = parse_diagram(input);
        assert_eq!(schema.tables[0].name, "ユーザー");
        assert_eq!(schema.tables[0].columns[0].name, "名前");
    }

    #[test]
    fn test_foreign_key_stereotype() {
        let input = "
            entity User {
              * id : bigint
            }
            entity Country {
              * code : char(2)
            }
            entity Post {
              * id : bigint
                owner_id : bigint NOT NULL <<FK users>> \"Author\"
                country : char(2) <<FK countries.code>>
                editor_id : bigint <<FK>>
            }
        ";
        let schema = parse_diagram(input);
        let post = schema.table("Post").unwrap();
        let owner = post.column("owner_id").unwrap();
        assert_eq!(owner.foreign_key, Some(ForeignKey::new("users", "id")));
        assert!(!owner.nullable);
        assert_eq!(owner.comment.as_deref(), Some("Author"));
        assert_eq!(
            post.column("country").unwrap().foreign_key,
            Some(ForeignKey::new("countries", "code"))
        );
        assert!(post.column("editor_id").unwrap().foreign_key.is_none());
    }

    #[test]
    fn test_foreign_key_stereotype_to_undeclared_table() {
        let input = "
            entity Post {
                owner_id : bigint <<FK ghosts>>
            }
        ";
        let schema = parse_diagram(input);
        assert!(schema.tables[0].columns[0].foreign_key.is_none());
        assert_eq!(
            schema.unresolved,
            vec![UnresolvedReference::ForeignKey {
                table: "posts".into(),
                column: "owner_id".into(),
                target: "ghosts".into(),
            }]
        );
    }

    #[test]
    fn test_declared_pivot_entity_is_detected() {
        let input = "
            entity User {
              * id : bigint
            }
            entity Role {
              * id : bigint
            }
            entity role_user {
              * id : bigint
                role_id : bigint NOT NULL
                user_id : bigint NOT NULL
            }
        ";
        let schema = parse_diagram(input);
        let pivot = schema.table("role_user").unwrap();
        assert!(pivot.is_pivot);
        assert_eq!(pivot.storage_name(), "role_user");
        assert_eq!(
            schema.relationships,
            vec![Relationship::ManyToMany {
                table1: "Role".into(),
                table2: "User".into(),
                pivot_table: "role_user".into(),
            }]
        );
    }

    #[test]
    fn test_self_many_to_many_needs_declared_pivot() {
        let input = "
            entity User {
              * id : bigint
            }
            User }o--o{ User
        ";
        let schema = parse_diagram(input);
        assert_eq!(schema.tables.len(), 1);
        assert!(schema.relationships.is_empty());
        assert_eq!(schema.unresolved.len(), 1);
    }
}
