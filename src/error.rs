use std::io;
use std::path::PathBuf;

use crate::tile::MAX_ZOOM;

/// Errors raised while loading or validating a server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read configuration at {path:?}.")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid YAML in configuration.")]
    InvalidYaml(#[from] serde_yaml::Error),
    #[error("Configuration field `{0}` must not be empty.")]
    EmptyField(&'static str),
    #[error("At least one tile attribute is required.")]
    NoAttributes,
    #[error("Attribute key {0:?} is reserved for the tile geometry.")]
    ReservedKey(String),
    #[error("Duplicate attribute key {0:?}.")]
    DuplicateKey(String),
}

/// Fatal errors raised while (re)building the dataset before serving.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Source dataset {path:?} is missing or unreadable.")]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not reset dataset file {path:?}.")]
    Reset {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Storage initialization failed.")]
    Storage(#[from] duckdb::Error),
    #[error("Table {table:?} has no geometry column named {column:?}.")]
    MissingGeometryColumn { table: String, column: String },
}

/// Errors raised while rendering a tile. Every variant maps to an HTTP 500;
/// none of them are fatal to the serving process.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Spatial dataset at {path:?} is unavailable.")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: duckdb::Error,
    },
    #[error("Tile query failed.")]
    Engine(#[from] duckdb::Error),
    #[error("Tile render task failed.")]
    Task(#[from] tokio::task::JoinError),
}

/// Rejections of malformed tile requests. Every variant maps to an HTTP 400.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Tile {axis} must be a non-negative integer, got {value:?}.")]
    NotAnInteger { axis: &'static str, value: String },
    #[error("Zoom {0} exceeds the maximum supported zoom {}.", MAX_ZOOM)]
    InvalidZoom(u32),
    #[error("Tile {axis} {value} is out of range for zoom {zoom}.")]
    OutOfRange { axis: &'static str, value: u32, zoom: u8 },
    #[error("Tile path must end in .pbf, got {0:?}.")]
    Extension(String),
}
