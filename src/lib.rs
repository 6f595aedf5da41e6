pub mod ast;
pub mod config;
pub mod infer;
pub mod migration;
pub mod naming;
pub mod parser;
pub mod serializer;

use chrono::{DateTime, Utc};
use wasm_bindgen::prelude::*;

use config::GeneratorConfig;
use migration::{EmitError, MigrationFile, Skeleton};
use serializer::DiagramOptions;

/// Parse a set of migration documents and render them as one diagram.
pub fn migrations_to_diagram<S: AsRef<str>>(
    sources: &[S],
    config: &GeneratorConfig,
    mut options: DiagramOptions,
) -> String {
    let schema = migration::parse(sources, config);
    if options.title.is_none() {
        options.title = config.diagram_title.clone();
    }
    serializer::serialize(&schema, &options)
}

/// Parse a diagram and render one migration document per table.
pub fn diagram_to_migrations(
    source: &str,
    skeleton: &Skeleton,
    config: &GeneratorConfig,
    at: DateTime<Utc>,
) -> Result<Vec<MigrationFile>, EmitError> {
    let schema = parser::parse_diagram(source);
    migration::emit_migrations(&schema, skeleton, config, at)
}

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Convert migration sources to a PlantUML document
#[wasm_bindgen(js_name = "migrationsToPuml")]
pub fn migrations_to_puml(sources: Vec<String>) -> String {
    migrations_to_diagram(
        &sources,
        &GeneratorConfig::default(),
        DiagramOptions::new(Utc::now()),
    )
}

/// Convert a PlantUML document to migrations, each preceded by a
/// `// <file name>` line
#[wasm_bindgen(js_name = "pumlToMigrations")]
pub fn puml_to_migrations(source: &str) -> Result<String, String> {
    let files = diagram_to_migrations(
        source,
        &Skeleton::default(),
        &GeneratorConfig::default(),
        Utc::now(),
    )
    .map_err(|e| e.to_string())?;

    Ok(files
        .iter()
        .map(|f| format!("// {}\n{}", f.file_name, f.contents))
        .collect::<Vec<_>>()
        .join("\n"))
}
