//! # Tile Conjurer
//!
//! An HTTP server that renders Mapbox Vector Tiles on demand from an
//! embedded DuckDB spatial dataset.
//!
//! ## Current status
//!
//! This crate grew out of a single-dataset deployment (the Dutch national
//! monuments register) and the configuration surface still reflects that:
//! one table, one geometry column, one layer per tile. The rendering path
//! is exercised in production, but trait and method signatures should not
//! yet be considered stable.
//!
//! ## Current features
//!
//! Given a spatially indexed table in a DuckDB database, this crate serves
//! `/tiles/{z}/{x}/{y}.pbf` by pushing filtering, clipping, and MVT encoding
//! down into the spatial extension with one parameterized query per tile.
//! Nothing is precomputed and nothing is cached; every tile is rendered
//! from the dataset at request time. The dataset itself is rebuilt from a
//! configured source file each time the server starts.
//!
//! ## Known limitations
//!
//! Geometry is assumed to be in EPSG:3857 web mercator already; no
//! reprojection is attempted. Tiles carry a single source layer under the
//! engine's default name `layer`. The dataset is immutable while serving,
//! which is what makes lock-free concurrent reads sound.

#![deny(warnings)]

// TODO: remove once async fn in traits can appear in trait objects
use async_trait::async_trait;

use crate::error::QueryError;
use crate::tile::TileCoord;

/// This is the main trait exported by this crate. The HTTP layer is written
/// against it, so alternative engines (or test stubs) can stand in for the
/// embedded dataset.
#[async_trait]
pub trait TileSource: Send + Sync {
    /// Renders the Mapbox vector tile for a slippy map tile in XYZ format.
    ///
    /// A tile covering no features renders to an empty byte vector, which
    /// is a valid MVT payload.
    async fn render_mvt(&self, coord: TileCoord) -> Result<Vec<u8>, QueryError>;
}

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod server;
pub mod source;
pub mod store;
pub mod tile;
