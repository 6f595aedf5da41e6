//! Migration file skeleton with named insertion points.
//!
//! A template is split once into literal text and slots; rendering fills the
//! slots and concatenates. Generated text is never searched or rewritten.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_TEMPLATE: &str = r#"<?php

use Illuminate\Database\Migrations\Migration;
use Illuminate\Database\Schema\Blueprint;
use Illuminate\Support\Facades\Schema;

return new class extends Migration
{
    /**
     * Run the migrations.
     */
    public function up(): void
    {
        Schema::create('{{table}}', function (Blueprint $table) {
            $table->id();
            {{columns}}
            $table->timestamps();
        });
    }

    /**
     * Reverse the migrations.
     */
    public function down(): void
    {
        Schema::dropIfExists('{{table}}');
    }
};
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Table,
    Columns,
}

impl Slot {
    const ALL: [Slot; 2] = [Slot::Table, Slot::Columns];

    fn marker(self) -> &'static str {
        match self {
            Slot::Table => "{{table}}",
            Slot::Columns => "{{columns}}",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot(Slot),
}

#[derive(Debug, Error)]
pub enum SkeletonError {
    #[error("Template is missing the {0} slot")]
    MissingSlot(&'static str),
    #[error("Failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skeleton {
    segments: Vec<Segment>,
}

impl Default for Skeleton {
    fn default() -> Self {
        Self {
            segments: split(DEFAULT_TEMPLATE),
        }
    }
}

/// Split `template` at every slot marker.
fn split(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = template;

    loop {
        let next = Slot::ALL
            .iter()
            .filter_map(|slot| rest.find(slot.marker()).map(|pos| (pos, *slot)))
            .min_by_key(|(pos, _)| *pos);
        match next {
            Some((pos, slot)) => {
                if pos > 0 {
                    segments.push(Segment::Text(rest[..pos].to_string()));
                }
                segments.push(Segment::Slot(slot));
                rest = &rest[pos + slot.marker().len()..];
            }
            None => {
                if !rest.is_empty() {
                    segments.push(Segment::Text(rest.to_string()));
                }
                break;
            }
        }
    }
    segments
}

impl Skeleton {
    pub fn parse(template: &str) -> Result<Self, SkeletonError> {
        let segments = split(template);
        for slot in Slot::ALL {
            if !segments.contains(&Segment::Slot(slot)) {
                return Err(SkeletonError::MissingSlot(slot.marker()));
            }
        }
        Ok(Self { segments })
    }

    pub fn load(path: &Path) -> Result<Self, SkeletonError> {
        let template = fs::read_to_string(path).map_err(|source| SkeletonError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&template)
    }

    /// Fill the slots. Each entry of `lines` becomes one line at the
    /// indentation of the columns marker; with no lines the marker's line is
    /// dropped.
    pub fn render(&self, table: &str, lines: &[String]) -> String {
        let mut out = String::new();
        let mut skip_newline = false;

        for segment in &self.segments {
            match segment {
                Segment::Text(text) => {
                    let text = match text.strip_prefix('\n') {
                        Some(stripped) if skip_newline => stripped,
                        _ => text.as_str(),
                    };
                    out.push_str(text);
                    skip_newline = false;
                }
                Segment::Slot(Slot::Table) => out.push_str(table),
                Segment::Slot(Slot::Columns) => {
                    let line_start = out.rfind('\n').map_or(0, |i| i + 1);
                    let indent = out[line_start..].to_string();
                    if lines.is_empty() && indent.trim().is_empty() {
                        out.truncate(line_start);
                        skip_newline = true;
                    } else {
                        out.push_str(&lines.join(&format!("\n{indent}")));
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_renders_columns_between_id_and_timestamps() {
        let out = Skeleton::default().render(
            "posts",
            &["$table->string('title');".into(), "$table->text('body');".into()],
        );
        assert!(out.contains("Schema::create('posts', function (Blueprint $table) {"));
        assert!(out.contains(
            "            $table->id();
            $table->string('title');
            $table->text('body');
            $table->timestamps();"
        ));
        assert!(out.contains("Schema::dropIfExists('posts');"));
    }

    #[test]
    fn test_empty_columns_drop_the_marker_line() {
        let out = Skeleton::default().render("tags", &[]);
        assert!(out.contains("            $table->id();\n            $table->timestamps();"));
        assert!(!out.contains("{{"));
    }

    #[test]
    fn test_custom_template() {
        let skeleton = Skeleton::parse("create {{table}}:\n  {{columns}}\nend\n").unwrap();
        let out = skeleton.render("users", &["a;".into(), "b;".into()]);
        assert_eq!(out, "create users:\n  a;\n  b;\nend\n");
    }

    #[test]
    fn test_missing_slot_is_rejected() {
        let err = Skeleton::parse("Schema::create('{{table}}')").unwrap_err();
        assert!(matches!(err, SkeletonError::MissingSlot("{{columns}}")));
    }
}
