use std::path::Path;

use {
    anyhow::Result,
    shelfsync_config::{
        ShelfsyncConfig, apply_env_overrides, loader::find_config_file, load_config,
        validate::{self, Severity},
    },
};

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Validate the config and print diagnostics. Returns `false` when there are
/// errors.
pub fn check(config_dir: Option<&Path>, verbose: bool) -> Result<bool> {
    let path = find_config_file(config_dir);
    let mut config = match &path {
        Some(p) => {
            eprintln!("Checking {}\n", p.display());
            match load_config(p) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("  {BOLD}{RED}error{RESET} {e}");
                    return Ok(false);
                },
            }
        },
        None => {
            eprintln!("No config file found; checking defaults.\n");
            ShelfsyncConfig::default()
        },
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    let result = validate::validate(&config, path);

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }
        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
            Severity::Info => (CYAN, "info"),
        };
        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if shown > 0 {
        eprintln!();
    }
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    Ok(errors == 0)
}
