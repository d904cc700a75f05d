//! Server configuration in a small YAML format.
//!
//! Every field has a default, so a missing or partial file still yields a
//! runnable server. The defaults reproduce the reference deployment: Dutch
//! national monuments loaded from a GeoJSON dump into a `monuments` table.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// One attribute carried into rendered tiles.
///
/// `expression` is any SQL expression over the dataset's columns; `key` is
/// the feature property name it appears under in the tile.
#[derive(Clone, Debug, Deserialize)]
pub struct TileAttribute {
    pub key: String,
    pub expression: String,
}

/// A tile server configuration, usually parsed from a YAML document:
///
/// ```yaml
/// database: tiles.db
/// source: rijksmonumenten.geojson
/// table: monuments
/// geometry_column: geom
/// listen: 127.0.0.1:5000
/// attributes:
///   - key: Monument number
///     expression: rijksmonument_nummer
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Dataset file rebuilt at startup and served from afterwards.
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// Source file ingested during bootstrap, in any format `st_read` accepts.
    #[serde(default = "default_source")]
    pub source: PathBuf,
    /// Table the source is loaded into and tiles are rendered from.
    #[serde(default = "default_table")]
    pub table: String,
    /// Geometry column of `table`, assumed to be in EPSG:3857 already.
    #[serde(default = "default_geometry_column")]
    pub geometry_column: String,
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default = "default_attributes")]
    pub attributes: Vec<TileAttribute>,
}

fn default_database() -> PathBuf {
    PathBuf::from("tiles.db")
}

fn default_source() -> PathBuf {
    PathBuf::from("rijksmonumenten.geojson")
}

fn default_table() -> String {
    String::from("monuments")
}

fn default_geometry_column() -> String {
    String::from("geom")
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

fn default_attributes() -> Vec<TileAttribute> {
    vec![
        TileAttribute {
            key: String::from("Monument number"),
            expression: String::from("rijksmonument_nummer"),
        },
        TileAttribute {
            key: String::from("Url"),
            expression: String::from(
                r#"concat('<a href="', rijksmonumenturl, '" target="_blank">link</a>')"#,
            ),
        },
    ]
}

impl Default for Config {
    fn default() -> Config {
        Config {
            database: default_database(),
            source: default_source(),
            table: default_table(),
            geometry_column: default_geometry_column(),
            listen: default_listen(),
            attributes: default_attributes(),
        }
    }
}

impl Config {
    /// Constructs a new Config from a YAML string.
    pub fn from_yaml(data: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_yaml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Config::from_yaml(&data)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.table.is_empty() {
            return Err(ConfigError::EmptyField("table"));
        }
        if self.geometry_column.is_empty() {
            return Err(ConfigError::EmptyField("geometry_column"));
        }
        if self.attributes.is_empty() {
            return Err(ConfigError::NoAttributes);
        }

        for (i, attribute) in self.attributes.iter().enumerate() {
            if attribute.key.is_empty() || attribute.expression.is_empty() {
                return Err(ConfigError::EmptyField("attributes"));
            }
            // The rendered feature struct always carries the clipped geometry
            // under "geom"; identifiers compare case-insensitively in SQL.
            if attribute.key.eq_ignore_ascii_case("geom") {
                return Err(ConfigError::ReservedKey(attribute.key.clone()));
            }
            let duplicated = self.attributes[..i]
                .iter()
                .any(|earlier| earlier.key.eq_ignore_ascii_case(&attribute.key));
            if duplicated {
                return Err(ConfigError::DuplicateKey(attribute.key.clone()));
            }
        }

        Ok(())
    }
}
