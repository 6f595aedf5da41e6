//! Generator configuration.
//!
//! Values are passed explicitly into the parsers and emitters; nothing in the
//! core reads environment or process state.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Emit `softDeletes()` on every generated domain table.
    pub soft_deletes: bool,
    /// Treat `<noun>_id` columns without an explicit constraint as references
    /// to `<nouns>.id` when that table was parsed.
    pub infer_conventional_keys: bool,
    /// Fallback `onDelete` policy for generated foreign keys.
    pub on_delete: String,
    /// Replacement migration template with `{{table}}` and `{{columns}}` slots.
    pub migration_template: Option<PathBuf>,
    /// `title` line for generated diagrams.
    pub diagram_title: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            soft_deletes: false,
            infer_conventional_keys: true,
            on_delete: "cascade".to_string(),
            migration_template: None,
            diagram_title: None,
        }
    }
}

impl GeneratorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;

        // Template paths are relative to the config file.
        if let (Some(template), Some(dir)) = (&config.migration_template, path.parent()) {
            if template.is_relative() {
                config.migration_template = Some(dir.join(template));
            }
        }
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::from_toml_str("").unwrap();
        assert_eq!(config, GeneratorConfig::default());
        assert!(config.infer_conventional_keys);
        assert_eq!(config.on_delete, "cascade");
    }

    #[test]
    fn test_partial_override() {
        let source = "soft_deletes = true\non_delete = \"restrict\"";
        let config = GeneratorConfig::from_toml_str(source).unwrap();
        assert!(config.soft_deletes);
        assert_eq!(config.on_delete, "restrict");
        assert!(config.infer_conventional_keys);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(GeneratorConfig::from_toml_str("softdeletes = true").is_err());
    }

    #[test]
    fn test_load_resolves_template_relative_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schemagen.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "migration_template = \"stubs/migration.stub\"").unwrap();

        let config = GeneratorConfig::load(&path).unwrap();
        assert_eq!(
            config.migration_template,
            Some(dir.path().join("stubs/migration.stub"))
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = GeneratorConfig::load(Path::new("/nonexistent/schemagen.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
