use crate::catalog::Catalog;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CATALOG_ENV: &str = "TRACKDECK_CATALOG";
const LOG_FILE_ENV: &str = "TRACKDECK_LOG_FILE";
const LOG_FILTER_ENV: &str = "TRACKDECK_LOG";
const LOG_FILE_NAME: &str = "trackdeck.log";
const DEFAULT_LOG_FILTER: &str = "info";

/// Values given on the command line. They win over the environment.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub catalog: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub null_audio: bool,
    pub player: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub catalog_path: Option<PathBuf>,
    pub null_audio: bool,
    pub start_in_player: bool,
    pub log_file: PathBuf,
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_args(args: CliArgs) -> Self {
        Self::resolve(args, |key| env::var(key).ok())
    }

    pub fn resolve(args: CliArgs, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let from_env = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            catalog_path: args
                .catalog
                .or_else(|| from_env(CATALOG_ENV).map(PathBuf::from)),
            null_audio: args.null_audio,
            start_in_player: args.player,
            log_file: args
                .log_file
                .or_else(|| from_env(LOG_FILE_ENV).map(PathBuf::from))
                .unwrap_or_else(|| env::temp_dir().join(LOG_FILE_NAME)),
            log_filter: from_env(LOG_FILTER_ENV)
                .unwrap_or_else(|| String::from(DEFAULT_LOG_FILTER)),
        }
    }

    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog_path {
            Some(path) => load_catalog_file(path),
            None => Catalog::builtin(),
        }
    }
}

pub fn load_catalog_file(path: &Path) -> Result<Catalog> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file {}", path.display()))?;
    Catalog::from_json(&raw)
        .with_context(|| format!("failed to load catalog file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_args_or_env() {
        let config = AppConfig::resolve(CliArgs::default(), lookup(&[]));
        assert_eq!(config.catalog_path, None);
        assert_eq!(config.log_filter, "info");
        assert!(config.log_file.ends_with(LOG_FILE_NAME));
        assert!(!config.null_audio);
        assert!(!config.start_in_player);
    }

    #[test]
    fn environment_fills_missing_args() {
        let config = AppConfig::resolve(
            CliArgs::default(),
            lookup(&[
                (CATALOG_ENV, "/music/catalog.json"),
                (LOG_FILE_ENV, "/var/log/trackdeck.log"),
                (LOG_FILTER_ENV, "trackdeck=debug"),
            ]),
        );
        assert_eq!(config.catalog_path, Some(PathBuf::from("/music/catalog.json")));
        assert_eq!(config.log_file, PathBuf::from("/var/log/trackdeck.log"));
        assert_eq!(config.log_filter, "trackdeck=debug");
    }

    #[test]
    fn args_win_over_environment() {
        let args = CliArgs {
            catalog: Some(PathBuf::from("mine.json")),
            ..CliArgs::default()
        };
        let config = AppConfig::resolve(args, lookup(&[(CATALOG_ENV, "theirs.json")]));
        assert_eq!(config.catalog_path, Some(PathBuf::from("mine.json")));
    }

    #[test]
    fn blank_environment_values_are_ignored() {
        let config = AppConfig::resolve(CliArgs::default(), lookup(&[(LOG_FILTER_ENV, "  ")]));
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn loads_catalog_from_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r#"[{"name":"One","artist":"Band","audio_url":"songs/one.mp3"}]"#,
        )
        .expect("write");

        let config = AppConfig::resolve(
            CliArgs {
                catalog: Some(path),
                ..CliArgs::default()
            },
            lookup(&[]),
        );
        let catalog = config.load_catalog().expect("catalog");
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].name, "One");
    }

    #[test]
    fn missing_catalog_file_reports_path() {
        let err = load_catalog_file(Path::new("/definitely/not/here.json")).expect_err("missing");
        assert!(format!("{err:#}").contains("/definitely/not/here.json"));
    }
}
