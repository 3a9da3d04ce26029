//! Configuration file discovery

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::AppConfig;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./gtest-pool.yaml",
    "./gtest-pool.yml",
    "./.gtest-pool.yaml",
    "~/.config/gtest-pool/config.yaml",
];

/// Candidate config paths with `~` expanded
pub fn config_locations() -> Vec<PathBuf> {
    CONFIG_LOCATIONS.iter().map(|l| expand_path(l)).collect()
}

/// Find configuration file in standard locations
pub fn find_config() -> Option<PathBuf> {
    config_locations().into_iter().find(|path| path.exists())
}

/// Load `explicit` if given, else the first standard location, else defaults.
pub fn load_default(explicit: Option<&Path>) -> Result<(AppConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => Some(expand_path(&path.to_string_lossy())),
        None => find_config(),
    };

    match path {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            Ok((AppConfig::load(&path)?, Some(path)))
        }
        None => Ok((AppConfig::default(), None)),
    }
}

/// Expand ~ to home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
pub(super) fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_expand_path() {
        assert_eq!(expand_path("./test.yaml"), PathBuf::from("./test.yaml"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/x.yaml"), home.join("x.yaml"));
        }
    }

    #[test]
    fn test_config_locations() {
        let locations = config_locations();
        assert_eq!(locations.len(), CONFIG_LOCATIONS.len());
        assert_eq!(locations[0], PathBuf::from("./gtest-pool.yaml"));
    }

    #[test]
    fn test_is_yaml_file() {
        assert!(is_yaml_file(Path::new("a.yaml")));
        assert!(is_yaml_file(Path::new("a.yml")));
        assert!(!is_yaml_file(Path::new("a.json")));
    }

    #[test]
    fn test_load_explicit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.yml");
        std::fs::write(&path, "jobs: 5\nfilter: \"Foo*\"\n").unwrap();

        let (config, found) = load_default(Some(&path)).unwrap();
        assert_eq!(found, Some(path));
        assert_eq!(config.jobs, 5);
        assert_eq!(config.filter, "Foo*");
    }

    #[test]
    fn test_load_explicit_missing() {
        let dir = tempdir().unwrap();
        assert!(load_default(Some(&dir.path().join("absent.yaml"))).is_err());
    }
}
