use std::{fs, path::Path};

use anyhow::Context;
use serde::Deserialize;
use shared::domain::{ExtensionName, DEFAULT_FIXED_EXTENSIONS, DEFAULT_MAX_CUSTOM_EXTENSIONS};
use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/fix/extensions";
pub const DEFAULT_SETTINGS_FILE: &str = "blocklist.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub base_url: String,
    pub max_count: usize,
    pub fixed_extensions: Vec<ExtensionName>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            max_count: DEFAULT_MAX_CUSTOM_EXTENSIONS,
            fixed_extensions: DEFAULT_FIXED_EXTENSIONS
                .iter()
                .filter_map(|raw| ExtensionName::parse(raw).ok())
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    base_url: Option<String>,
    max_count: Option<usize>,
    fixed_extensions: Option<Vec<String>>,
}

/// Defaults, then the TOML file at `path` when it exists, then `BLOCKLIST_*`
/// environment variables.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ControllerSettings> {
    let mut settings = ControllerSettings::default();

    let path = path.unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_FILE));
    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        let file_cfg: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;
        apply_file_settings(&mut settings, file_cfg);
    }

    if let Ok(v) = std::env::var("BLOCKLIST_BASE_URL") {
        settings.base_url = v;
    }
    if let Ok(v) = std::env::var("BLOCKLIST_MAX_COUNT") {
        match v.parse::<usize>() {
            Ok(parsed) => settings.max_count = parsed,
            Err(_) => warn!(value = %v, "ignoring non-numeric BLOCKLIST_MAX_COUNT"),
        }
    }
    if let Ok(v) = std::env::var("BLOCKLIST_FIXED_EXTENSIONS") {
        settings.fixed_extensions = parse_vocabulary(v.split(','));
    }

    Ok(settings)
}

fn apply_file_settings(settings: &mut ControllerSettings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.base_url {
        settings.base_url = v;
    }
    if let Some(v) = file_cfg.max_count {
        settings.max_count = v;
    }
    if let Some(v) = file_cfg.fixed_extensions {
        settings.fixed_extensions = parse_vocabulary(v.iter().map(String::as_str));
    }
}

fn parse_vocabulary<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<ExtensionName> {
    let mut vocabulary: Vec<ExtensionName> = Vec::new();
    for entry in raw {
        if entry.trim().is_empty() {
            continue;
        }
        match ExtensionName::parse(entry) {
            Ok(name) if !vocabulary.contains(&name) => vocabulary.push(name),
            Ok(_) => {}
            Err(error) => warn!(entry, %error, "skipping invalid fixed extension"),
        }
    }
    vocabulary
}
