//! Configuration loading, env substitution, and validation.
//!
//! Config files: `shelfsync.toml`, `shelfsync.yaml`, or `shelfsync.json`
//! Searched in `./` then `~/.config/shelfsync/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values, and a handful of
//! well-known environment variables override the file (see
//! [`loader::apply_env_overrides`]).

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{
        CatalogConfig, DatabaseConfig, ScheduleConfig, ShelfsyncConfig, SyncConfig, TimeOfDay,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
