//! Shared helpers for CLI commands.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use quyaml::{Document, ParserConfig, parse_with_config};
use tracing::info;

/// Load the parser configuration, applying `QUYAML_*` overrides.
pub fn load_config(path: Option<&Path>) -> Result<ParserConfig> {
    if let Some(path) = path {
        info!(path = %path.display(), "loading parser config");
    }
    let config = ParserConfig::load(path)?;
    Ok(config)
}

/// Read and parse a document.
///
/// Parse failures are returned as [`quyaml::Error`] so callers can report
/// their category.
pub fn load_document(path: &Path, config: &ParserConfig) -> Result<Document> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }

    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let doc = parse_with_config(&source, config)?;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_document() {
        let file = write_temp("version: 0.4\nname: bell\nqubits: 2\nops: [h 0, cx 0 1]\n");
        let doc = load_document(file.path(), &ParserConfig::default()).unwrap();
        assert_eq!(doc.name, "bell");
        assert_eq!(doc.qubit_count, 2);
    }

    #[test]
    fn test_missing_file() {
        let err = load_document(Path::new("/nonexistent/bell.yaml"), &ParserConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("File not found"));
        assert!(err.downcast_ref::<quyaml::Error>().is_none());
    }

    #[test]
    fn test_parse_error_keeps_its_kind() {
        let file = write_temp("version: 0.4\nqubits: &n 1\nops: []\n");
        let err = load_document(file.path(), &ParserConfig::default()).unwrap_err();
        let err = err.downcast_ref::<quyaml::Error>().unwrap();
        assert_eq!(err.kind(), quyaml::ErrorKind::Safety);
    }

    #[test]
    fn test_load_config_file() {
        let file = write_temp("limits:\n  max_depth: 8\nallow_legacy_versions: false\n");
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.limits.max_depth, 8);
        assert!(!config.allow_legacy_versions);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let file = write_temp("limits:\n  max_input_bytes: 0\n");
        assert!(load_config(Some(file.path())).is_err());
    }
}
