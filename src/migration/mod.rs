//! Laravel-style migration DSL: parsing and emission.

pub mod emitter;
pub mod lexer;
pub mod parser;
pub mod skeleton;
pub mod vocabulary;

pub use emitter::{EmitError, MigrationFile, emit_migration, emit_migrations};
pub use parser::{parse_migration, parse_migrations};
pub use skeleton::{Skeleton, SkeletonError};

use crate::ast::Schema;
use crate::config::GeneratorConfig;
use crate::infer;

/// Parse every migration document and infer relationships across the set.
pub fn parse<S: AsRef<str>>(sources: &[S], config: &GeneratorConfig) -> Schema {
    infer::infer(parse_migrations(sources), config)
}
