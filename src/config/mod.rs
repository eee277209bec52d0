//! Configuration module
//!
//! Handles loading settings from YAML files and environment variables.
//! Settings are loaded once in `main` and passed explicitly to
//! [`crate::bootstrap`]; there is no process-global instance.

mod settings;

pub use settings::*;

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit settings file
pub const SETTINGS_PATH_VAR: &str = "GATEWAY_SETTINGS_PATH";

/// Candidate settings file locations, in lookup order
pub fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("settings.yml"),
        PathBuf::from("config/settings.yml"),
        PathBuf::from("/etc/rag-gateway/settings.yml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("rag-gateway/settings.yml"));
    }
    paths
}

/// Load settings from file or use defaults, then apply environment overrides.
///
/// Returns the file the settings came from, if any. Nothing is logged here
/// because logging is configured from the loaded settings.
pub fn load() -> Result<(Settings, Option<PathBuf>)> {
    let explicit = std::env::var(SETTINGS_PATH_VAR).ok().map(PathBuf::from);
    let source = locate(explicit.as_deref(), &default_paths())?;

    let mut settings = match source {
        Some(ref path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    settings.merge_env();
    settings.validate()?;

    Ok((settings, source))
}

/// Pick the settings file: an explicit path must exist, otherwise the
/// first existing candidate wins
fn locate(explicit: Option<&Path>, candidates: &[PathBuf]) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!(
                "{} points to {}, which does not exist",
                SETTINGS_PATH_VAR,
                path.display()
            );
        }
        return Ok(Some(path.to_path_buf()));
    }
    Ok(candidates.iter().find(|path| path.exists()).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_must_exist() {
        let missing = Path::new("/nonexistent/rag-gateway/settings.yml");
        let err = locate(Some(missing), &[]).unwrap_err();
        assert!(err.to_string().contains(SETTINGS_PATH_VAR));
    }

    #[test]
    fn test_explicit_path_wins_over_candidates() {
        let file = std::env::temp_dir().join(format!("rag-gateway-{}.yml", uuid::Uuid::new_v4()));
        std::fs::write(&file, "server:\n  port: 9100\n").unwrap();

        let found = locate(Some(file.as_path()), &[PathBuf::from("Cargo.toml")]).unwrap();
        assert_eq!(found.as_deref(), Some(file.as_path()));
        assert_eq!(Settings::from_file(&file).unwrap().server.port, 9100);

        std::fs::remove_file(&file).unwrap();
    }

    #[test]
    fn test_candidates_fall_through() {
        let candidates = [
            PathBuf::from("/nonexistent/settings.yml"),
            PathBuf::from("Cargo.toml"),
        ];
        assert_eq!(
            locate(None, &candidates).unwrap(),
            Some(PathBuf::from("Cargo.toml"))
        );
        assert_eq!(locate(None, &candidates[..1]).unwrap(), None);
    }
}
