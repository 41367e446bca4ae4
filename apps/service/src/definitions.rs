use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;
use vigie::importer::SuiteDefinition;

/// Load every `*.toml` suite definition under `dir`. A file that fails
/// to parse is logged and skipped; only an unreadable directory is
/// fatal.
pub fn load_definitions(dir: &Path) -> Result<Vec<SuiteDefinition>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read tests directory {}", dir.display()))?;

    let mut definitions = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
            continue;
        }

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unreadable suite file");
                continue;
            }
        };
        match toml::from_str::<SuiteDefinition>(&raw) {
            Ok(definition) => definitions.push(definition),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping malformed suite file");
            }
        }
    }

    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITE: &str = r#"
name = "web"

[[testcases]]
name = "frontpage"

[[testcases.teststeps]]
name = "homepage"
assertions = ["code == 200", "responsetime < 500ms"]
frequency = "30s"

[testcases.teststeps.probe]
type = "http"
url = "https://example.com"
"#;

    #[test]
    fn test_loads_valid_suite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("web.toml"), SUITE).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let definitions = load_definitions(dir.path()).unwrap();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].name, "web");
        assert_eq!(definitions[0].testcases[0].teststeps[0].probe.kind, "http");
    }

    #[test]
    fn test_malformed_file_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("web.toml"), SUITE).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "name = [unclosed").unwrap();

        let definitions = load_definitions(dir.path()).unwrap();
        assert_eq!(definitions.len(), 1);
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        assert!(load_definitions(Path::new("/nonexistent/vigie-tests")).is_err());
    }
}
