// Configuration loading: YAML with environment expansion and validation

use anyhow::{bail, Context, Result};
use regex::{Captures, Regex};
use std::path::Path;

use super::types::RecorderConfig;

/// Environment overrides applied on top of a parsed file, in table order.
const ENV_OVERRIDES: &[(&str, fn(&mut RecorderConfig, String))] = &[
    ("DDS_RECORDER_OUTPUT_DIR", |config, value| {
        config.output.directory = value
    }),
    ("DDS_RECORDER_PREFIX", |config, value| {
        config.output.prefix = value
    }),
];

/// Load and validate a YAML configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;

    let config: RecorderConfig = serde_yaml::from_str(&expand_env_refs(&raw))
        .with_context(|| format!("cannot parse {}", path.display()))?;

    validate(&config)?;
    Ok(config)
}

/// [`load_config`] plus the `DDS_RECORDER_*` environment overrides.
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
    let mut config = load_config(path)?;

    for (name, apply) in ENV_OVERRIDES {
        if let Ok(value) = std::env::var(name) {
            apply(&mut config, value);
        }
    }

    Ok(config)
}

/// Expand `${NAME}` and `${NAME:-fallback}` references against the process
/// environment before parsing.
///
/// An unset variable without a fallback expands to the empty string; if that
/// empties a mandatory field, validation rejects the file with the field's
/// name instead of leaving a literal `${NAME}` in the value.
fn expand_env_refs(raw: &str) -> String {
    let pattern = Regex::new(r"\$\{(\w+)(?::-([^}]*))?\}").unwrap();

    pattern
        .replace_all(raw, |groups: &Captures| {
            std::env::var(&groups[1]).unwrap_or_else(|_| {
                groups
                    .get(2)
                    .map(|fallback| fallback.as_str().to_string())
                    .unwrap_or_default()
            })
        })
        .into_owned()
}

fn validate(config: &RecorderConfig) -> Result<()> {
    if config.output.directory.is_empty() {
        bail!("output.directory cannot be empty");
    }

    if config.output.prefix.is_empty() {
        bail!("output.prefix cannot be empty");
    }

    if config.storage.max_size == 0 {
        bail!("storage.max_size must be > 0");
    }

    if config.storage.max_file_size > config.storage.max_size {
        bail!("storage.max_file_size must not exceed storage.max_size");
    }

    if config.storage.safety_margin >= config.storage.effective_max_file_size() {
        bail!("storage.safety_margin must be smaller than the per-file size limit");
    }

    if config.handler.buffer_size == 0 {
        bail!("handler.buffer_size must be > 0");
    }

    if config.handler.event_window_seconds <= 0.0 {
        bail!("handler.event_window_seconds must be > 0");
    }

    if config.handler.cleanup_period_seconds <= 0.0 {
        bail!("handler.cleanup_period_seconds must be > 0");
    }

    if config.handler.downsampling == 0 {
        bail!("handler.downsampling must be >= 1");
    }

    Ok(())
}
