use std::path::Path;

use engine::{RenderOptions, Value};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {origin}: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid TOML in {origin}: {source}")]
    Toml {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("data in {origin} must be a mapping at the top level, found {found}")]
    NotAMapping { origin: String, found: &'static str },
}

/// `docfill.toml`: currently only the `[render]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub render: RenderOptions,
}

pub fn read_file(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_config(path: &Path) -> Result<Config, LoadError> {
    let text = read_file(path)?;
    toml::from_str(&text).map_err(|source| LoadError::Toml {
        origin: path.display().to_string(),
        source,
    })
}

/// Load render data from a `.json` or `.toml` file. Anything that is not
/// `.toml` is read as JSON.
pub fn load_data(path: &Path) -> Result<Value, LoadError> {
    let text = read_file(path)?;
    let origin = path.display().to_string();
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        parse_toml_data(&text, &origin)
    } else {
        parse_json_data(&text, &origin)
    }
}

pub fn parse_json_data(text: &str, origin: &str) -> Result<Value, LoadError> {
    let value = serde_json::from_str(text).map_err(|source| LoadError::Json {
        origin: origin.to_string(),
        source,
    })?;
    ensure_mapping(value, origin)
}

pub fn parse_toml_data(text: &str, origin: &str) -> Result<Value, LoadError> {
    let value = toml::from_str(text).map_err(|source| LoadError::Toml {
        origin: origin.to_string(),
        source,
    })?;
    ensure_mapping(value, origin)
}

fn ensure_mapping(value: Value, origin: &str) -> Result<Value, LoadError> {
    match value {
        Value::Mapping(_) => Ok(value),
        other => Err(LoadError::NotAMapping {
            origin: origin.to_string(),
            found: other.type_name(),
        }),
    }
}
