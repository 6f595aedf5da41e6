//! Pivot detection and relationship inference.
//!
//! Two entry points: [`infer`] turns parsed migration tables into a
//! [`Schema`], and [`augment`] completes a diagram-derived schema by adding the
//! key columns and pivot tables its relationship lines imply. Both are
//! idempotent over their own output.

use std::collections::{HashMap, HashSet};

use crate::ast::{
    Column, ColumnType, ForeignKey, Relationship, Schema, Table, UnresolvedReference,
};
use crate::config::GeneratorConfig;
use crate::naming;

/// Foreign-key constraint as declared in migration text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyFact {
    pub column: String,
    pub table: String,
    pub references: String,
    pub on_delete: Option<String>,
}

/// A table exactly as a migration declares it, before inference.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    /// Migration table name (`order_items`).
    pub name: String,
    pub columns: Vec<Column>,
    pub unique_keys: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKeyFact>,
}

impl RawTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Fold a later `Schema::table` block into this table.
    pub fn merge(&mut self, other: RawTable) {
        for col in other.columns {
            if !self.columns.iter().any(|c| c.name == col.name) {
                self.columns.push(col);
            }
        }
        for key in other.unique_keys {
            if !self.unique_keys.contains(&key) {
                self.unique_keys.push(key);
            }
        }
        self.foreign_keys.extend(other.foreign_keys);
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSchema {
    pub tables: Vec<RawTable>,
    pub unresolved: Vec<UnresolvedReference>,
}

/// `item_user`, `product_categories`: two parts, the first singular.
pub fn is_pivot_name(name: &str) -> bool {
    match name.split('_').collect::<Vec<_>>().as_slice() {
        [first, second] => !first.is_empty() && !second.is_empty() && naming::is_singular(first),
        _ => false,
    }
}

/// Exactly two `_id` columns and nothing else besides system columns.
pub fn has_pivot_shape(columns: &[Column]) -> bool {
    let keys = columns.iter().filter(|c| c.is_key_reference()).count();
    let others = columns
        .iter()
        .filter(|c| !c.is_system() && !c.is_key_reference())
        .count();
    keys == 2 && others == 0
}

pub fn is_pivot_table(name: &str, columns: &[Column]) -> bool {
    is_pivot_name(name) && has_pivot_shape(columns)
}

fn singular_snake(model: &str) -> String {
    naming::singularize_snake(&naming::snake_case(model))
}

/// Custom names are snake-cased; otherwise the two singular names, sorted.
pub fn pivot_table_name(a: &str, b: &str, custom: Option<&str>) -> String {
    if let Some(name) = custom {
        return naming::snake_case(name);
    }
    let mut parts = [singular_snake(a), singular_snake(b)];
    parts.sort();
    parts.join("_")
}

/// Join table between models `a` and `b`. A self-join (`a == b`) has no
/// conventional column pair and must be declared instead.
pub fn synthesize_pivot(a: &str, b: &str, custom: Option<&str>) -> Table {
    let mut table = Table::new(pivot_table_name(a, b, custom));
    table.is_pivot = true;

    let mut id = Column::new("id", ColumnType::BigInteger);
    id.primary = true;
    id.nullable = false;
    table.columns.push(id);

    let mut models = [a, b];
    models.sort_by_key(|m| singular_snake(m));
    for model in models {
        table.columns.push(Column::foreign_id(
            naming::foreign_key_column(model),
            naming::table_name(model),
        ));
    }
    table
}

/// Give `table` a `column` referencing `target.id`, or backfill the reference
/// on an existing column of that name.
pub fn ensure_foreign_key(table: &mut Table, column: &str, target: &str) {
    match table.column_mut(column) {
        Some(col) => {
            if col.foreign_key.is_none() {
                col.foreign_key = Some(ForeignKey::new(target, "id"));
            }
        }
        None => table.columns.push(Column::foreign_id(column, target)),
    }
}

/// Build a schema from migration tables.
pub fn infer(raw: RawSchema, config: &GeneratorConfig) -> Schema {
    let mut schema = Schema {
        unresolved: raw.unresolved,
        ..Default::default()
    };

    // migration name -> model name (or stored name, for pivots)
    let mut names: HashMap<String, String> = HashMap::new();
    let mut pivots: Vec<bool> = Vec::with_capacity(raw.tables.len());
    for raw_table in &raw.tables {
        let is_pivot = is_pivot_table(&raw_table.name, &raw_table.columns);
        let name = if is_pivot {
            raw_table.name.clone()
        } else {
            naming::model_name(&raw_table.name)
        };
        names.insert(raw_table.name.clone(), name);
        pivots.push(is_pivot);
    }

    for (raw_table, is_pivot) in raw.tables.into_iter().zip(pivots) {
        let mut table = Table::new(names[&raw_table.name].clone());
        table.is_pivot = is_pivot;
        table.columns = raw_table.columns;
        table.unique_keys = raw_table.unique_keys;

        for fact in raw_table.foreign_keys {
            if !names.contains_key(&fact.table) {
                log::warn!(
                    "{}.{} references `{}`, which is not among the parsed tables",
                    raw_table.name,
                    fact.column,
                    fact.table
                );
                schema.unresolved.push(UnresolvedReference::ForeignKey {
                    table: raw_table.name.clone(),
                    column: fact.column,
                    target: fact.table,
                });
                continue;
            }
            match table.column_mut(&fact.column) {
                Some(col) => {
                    col.foreign_key = Some(ForeignKey {
                        table: fact.table,
                        column: fact.references,
                        on_delete: fact.on_delete,
                    });
                }
                None => log::trace!(
                    "foreign key on undeclared column {}.{}",
                    raw_table.name,
                    fact.column
                ),
            }
        }

        // Pivots always need both references; other tables only on request.
        if is_pivot || config.infer_conventional_keys {
            for col in table.columns.iter_mut() {
                if col.foreign_key.is_some() || !col.is_key_reference() {
                    continue;
                }
                let Some(stem) = col.name.strip_suffix("_id") else {
                    continue;
                };
                let target = naming::table_name(stem);
                if names.contains_key(&target) {
                    col.foreign_key = Some(ForeignKey::new(target, "id"));
                } else if is_pivot {
                    schema.unresolved.push(UnresolvedReference::ForeignKey {
                        table: raw_table.name.clone(),
                        column: col.name.clone(),
                        target,
                    });
                }
            }
        }

        schema.tables.push(table);
    }

    classify(&mut schema, &names);
    schema.order_tables();
    schema
}

/// Derive relationships from the resolved foreign keys.
fn classify(schema: &mut Schema, names: &HashMap<String, String>) {
    let mut relationships = Vec::new();

    for table in &schema.tables {
        let parents: Vec<(&Column, &String)> = table
            .foreign_key_columns()
            .filter_map(|col| {
                let fk = col.foreign_key.as_ref()?;
                Some((col, names.get(&fk.table)?))
            })
            .collect();

        if table.is_pivot {
            if let [(_, a), (_, b)] = parents.as_slice() {
                relationships.push(Relationship::ManyToMany {
                    table1: (*a).clone(),
                    table2: (*b).clone(),
                    pivot_table: table.name.clone(),
                });
            }
            continue;
        }

        for (col, parent) in parents {
            if schema.table(parent).is_some_and(|t| t.is_pivot) {
                continue;
            }
            let rel = if table.is_unique(&col.name) {
                Relationship::OneToOne {
                    parent: parent.clone(),
                    child: table.name.clone(),
                }
            } else {
                Relationship::OneToMany {
                    parent: parent.clone(),
                    child: table.name.clone(),
                }
            };
            relationships.push(rel);
        }
    }

    for rel in relationships {
        schema.push_relationship(rel);
    }
}

/// Add the key columns and pivot tables implied by `schema.relationships`,
/// and recognise declared entities that have the shape of a pivot table.
pub fn augment(schema: &mut Schema) {
    resolve_declared_keys(schema);
    let detected = detect_pivots(schema);
    let relationships = std::mem::take(&mut schema.relationships);

    for rel in relationships.into_iter().chain(detected) {
        let (from, to) = match &rel {
            Relationship::OneToOne { parent, child }
            | Relationship::OneToMany { parent, child } => (parent, child),
            Relationship::ManyToMany { table1, table2, .. } => (table1, table2),
        };
        if let Some(missing) = [from, to].into_iter().find(|n| schema.table(n).is_none()) {
            log::warn!("relationship {from} -- {to} names undeclared entity `{missing}`");
            schema.note_unresolved(UnresolvedReference::Relationship {
                from: from.clone(),
                to: to.clone(),
                missing: missing.clone(),
            });
            continue;
        }

        match &rel {
            Relationship::OneToOne { parent, child }
            | Relationship::OneToMany { parent, child } => {
                let target = naming::table_name(parent);
                if let Some(child_table) = schema.table_mut(child) {
                    let column = key_column(child_table, parent, &target);
                    ensure_foreign_key(child_table, &column, &target);
                    if matches!(rel, Relationship::OneToOne { .. }) {
                        child_table.add_unique_key(vec![column]);
                    }
                }
            }
            Relationship::ManyToMany {
                table1,
                table2,
                pivot_table,
            } => {
                if !link_pivot(schema, table1, table2, pivot_table) {
                    continue;
                }
            }
        }
        schema.push_relationship(rel);
    }

    schema.order_tables();
}

/// Drop declared references to tables the diagram does not define.
fn resolve_declared_keys(schema: &mut Schema) {
    let stored: HashSet<String> = schema.tables.iter().map(Table::storage_name).collect();
    let mut dangling = Vec::new();

    for table in schema.tables.iter_mut() {
        let storage = table.storage_name();
        for col in table.columns.iter_mut() {
            let Some(fk) = &col.foreign_key else {
                continue;
            };
            if stored.contains(&fk.table) {
                continue;
            }
            log::warn!(
                "{storage}.{} references `{}`, which is not declared",
                col.name,
                fk.table
            );
            dangling.push(UnresolvedReference::ForeignKey {
                table: storage.clone(),
                column: col.name.clone(),
                target: fk.table.clone(),
            });
            col.foreign_key = None;
        }
    }

    for reference in dangling {
        schema.note_unresolved(reference);
    }
}

/// Flag entities with a pivot name and shape, link their key columns and
/// return the many-to-many relationships they stand for.
fn detect_pivots(schema: &mut Schema) -> Vec<Relationship> {
    // stored name -> entity name
    let models: HashMap<String, String> = schema
        .tables
        .iter()
        .filter(|t| !t.is_pivot)
        .map(|t| (t.storage_name(), t.name.clone()))
        .collect();
    let mut found = Vec::new();
    let mut dangling = Vec::new();

    for table in schema.tables.iter_mut() {
        let stored = if table.is_pivot {
            table.name.clone()
        } else {
            naming::snake_case(&table.name)
        };
        if !is_pivot_table(&stored, &table.columns) {
            continue;
        }
        if !table.is_pivot {
            log::debug!("entity {} is a pivot table, stored as {stored}", table.name);
            table.is_pivot = true;
            table.name = stored;
        }

        let mut parents = Vec::new();
        for col in table.columns.iter_mut().filter(|c| c.is_key_reference()) {
            if col.foreign_key.is_none() {
                let Some(stem) = col.name.strip_suffix("_id") else {
                    continue;
                };
                let target = naming::table_name(stem);
                if !models.contains_key(&target) {
                    dangling.push(UnresolvedReference::ForeignKey {
                        table: table.name.clone(),
                        column: col.name.clone(),
                        target,
                    });
                    continue;
                }
                col.foreign_key = Some(ForeignKey::new(target, "id"));
            }
            if let Some(model) = col.foreign_key.as_ref().and_then(|fk| models.get(&fk.table)) {
                parents.push(model.clone());
            }
        }

        if let [a, b] = parents.as_slice() {
            found.push(Relationship::ManyToMany {
                table1: a.clone(),
                table2: b.clone(),
                pivot_table: table.name.clone(),
            });
        }
    }

    for reference in dangling {
        schema.note_unresolved(reference);
    }
    found
}

/// The column of `child` that holds its reference to `parent`: the
/// conventional `<parent>_id`, else a column already pointing at `target`.
fn key_column(child: &Table, parent: &str, target: &str) -> String {
    let conventional = naming::foreign_key_column(parent);
    if child.column(&conventional).is_some() {
        return conventional;
    }
    child
        .columns_referencing(target)
        .next()
        .map(|c| c.name.clone())
        .unwrap_or(conventional)
}

/// Complete or create the pivot behind a many-to-many line. Returns `false`
/// when the relationship cannot be represented; it is then recorded.
fn link_pivot(schema: &mut Schema, table1: &str, table2: &str, pivot_table: &str) -> bool {
    if table1 == table2 {
        let target = naming::table_name(table1);
        let linked = schema
            .table(pivot_table)
            .is_some_and(|t| t.columns_referencing(&target).count() >= 2);
        if let Some(pivot) = schema.table_mut(pivot_table).filter(|_| linked) {
            pivot.is_pivot = true;
            return true;
        }
        log::warn!("{table1} }}o--o{{ {table1} has no declared pivot `{pivot_table}`");
        schema.note_unresolved(UnresolvedReference::SelfReference {
            table: table1.to_string(),
            pivot_table: pivot_table.to_string(),
        });
        return false;
    }

    match schema.table_mut(pivot_table) {
        Some(existing) => {
            existing.is_pivot = true;
            for model in [table1, table2] {
                let target = naming::table_name(model);
                if existing.columns_referencing(&target).next().is_none() {
                    ensure_foreign_key(existing, &naming::foreign_key_column(model), &target);
                }
            }
        }
        None => schema
            .tables
            .push(synthesize_pivot(table1, table2, Some(pivot_table))),
    }
    true
}
