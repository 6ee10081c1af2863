use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default capacity of the custom extension list.
pub const DEFAULT_MAX_CUSTOM_EXTENSIONS: usize = 200;

/// Checkbox vocabulary shipped with the admin page.
pub const DEFAULT_FIXED_EXTENSIONS: [&str; 7] = ["bat", "cmd", "com", "cpl", "exe", "scr", "js"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtType {
    Fixed,
    Custom,
}

impl fmt::Display for ExtType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => f.write_str("fixed"),
            Self::Custom => f.write_str("custom"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtensionNameError {
    #[error("extension name is empty")]
    Empty,
    #[error("extension must be alphanumeric: {0:?}")]
    NotAlphanumeric(String),
}

/// Lowercase ASCII alphanumeric file extension, without the leading dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ExtensionName(String);

impl ExtensionName {
    /// Trims and lowercases `raw`, then requires it to match `^[a-z0-9]+$`.
    pub fn parse(raw: &str) -> Result<Self, ExtensionNameError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ExtensionNameError::Empty);
        }
        let lowered = trimmed.to_lowercase();
        if !lowered
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ExtensionNameError::NotAlphanumeric(lowered));
        }
        Ok(Self(lowered))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ExtensionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ExtensionName {
    type Err = ExtensionNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ExtensionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ExtensionName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ExtensionName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl<'de> Deserialize<'de> for ExtensionName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Extension of `filename` as the upload check sees it: everything after the
/// final `.`, lowercased. A name without a dot yields the whole name.
pub fn file_extension(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or(filename)
        .to_lowercase()
}
