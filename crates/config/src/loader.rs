use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::ShelfsyncConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "shelfsync.toml",
    "shelfsync.yaml",
    "shelfsync.yml",
    "shelfsync.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<ShelfsyncConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config, then apply environment overrides.
///
/// Search order:
/// 1. `config_dir` when given (e.g. from `--config-dir`)
/// 2. `./shelfsync.{toml,yaml,yml,json}` (project-local)
/// 3. `~/.config/shelfsync/shelfsync.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `ShelfsyncConfig::default()` if no file is found or the file
/// cannot be parsed.
pub fn discover_and_load(config_dir: Option<&Path>) -> ShelfsyncConfig {
    let mut config = match find_config_file(config_dir) {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                ShelfsyncConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            ShelfsyncConfig::default()
        },
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config
}

/// Overlay well-known environment variables onto a loaded config.
///
/// `lookup` is usually `std::env::var`; tests pass a closure instead of
/// mutating the process environment.
pub fn apply_env_overrides(config: &mut ShelfsyncConfig, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(store) = non_empty("SHOPIFY_STORE_NAME") {
        config.catalog.store_name = store;
    }
    if let Some(token) = non_empty("SHOPIFY_ACCESS_TOKEN") {
        config.catalog.access_token = Some(Secret::new(token));
    }
    if let Some(version) = non_empty("SHOPIFY_API_VERSION") {
        config.catalog.api_version = version;
    }
    if let Some(url) = non_empty("SHELFSYNC_DATABASE_URL") {
        config.database.url = url;
    }
}

/// Find the first config file in standard locations.
pub fn find_config_file(config_dir: Option<&Path>) -> Option<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    if let Some(dir) = config_dir {
        dirs.push(dir.to_path_buf());
    }
    dirs.push(PathBuf::from("."));
    if let Some(global) = self::config_dir() {
        dirs.push(global);
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/shelfsync/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "shelfsync").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<ShelfsyncConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn loads_toml_from_explicit_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("shelfsync.toml"),
            r#"
[catalog]
store_name = "acme"
page_size = 100

[sync]
exclusive_runs = true
"#,
        )
        .unwrap();

        let path = find_config_file(Some(dir.path())).unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.catalog.store_name, "acme");
        assert_eq!(cfg.catalog.page_size, 100);
        assert!(cfg.sync.exclusive_runs);
        // Untouched sections keep their defaults.
        assert_eq!(cfg.sync.retention_days, 30);
        assert_eq!(cfg.schedule.low_stock_time, "09:00");
    }

    #[test]
    fn loads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelfsync.yaml");
        std::fs::write(&path, "schedule:\n  sync_every_hours: 12\n").unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.schedule.sync_every_hours, 12);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelfsync.ini");
        std::fs::write(&path, "x=1").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn env_overrides_replace_credentials() {
        let mut cfg = ShelfsyncConfig::default();
        apply_env_overrides(&mut cfg, |name| match name {
            "SHOPIFY_STORE_NAME" => Some("from-env".into()),
            "SHOPIFY_ACCESS_TOKEN" => Some("shpat_env".into()),
            "SHELFSYNC_DATABASE_URL" => Some("   ".into()),
            _ => None,
        });
        assert_eq!(cfg.catalog.store_name, "from-env");
        assert_eq!(
            cfg.catalog.access_token.as_ref().unwrap().expose_secret(),
            "shpat_env"
        );
        // Blank values are ignored.
        assert_eq!(cfg.database.url, "sqlite://shelfsync.db?mode=rwc");
    }
}
