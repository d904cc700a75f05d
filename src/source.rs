//! Rendering Mapbox Vector Tiles from the embedded spatial dataset.
//!
//! Geometry work is delegated to the engine: one `ST_TileEnvelope`
//! expression both filters candidate rows and clips their geometry, so the
//! two envelopes can never drift apart. Statement text is composed once at
//! startup from configuration; request coordinates only ever reach the
//! engine as bound parameters.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use duckdb::params;
use tracing::debug;

use crate::config::{Config, TileAttribute};
use crate::error::QueryError;
use crate::store::{ReadPool, ReadSession};
use crate::tile::{TileBounds, TileCoord};
use crate::TileSource;

/// A tile source rendering from one table of an embedded dataset.
pub struct SpatialSource {
    inner: Arc<Inner>,
}

struct Inner {
    pool: ReadPool,
    tile_sql: String,
    extent_sql: String,
    /// Outer `None`: not measured yet. Inner `None`: the table is empty.
    extent: Mutex<Option<Option<TileBounds>>>,
}

impl SpatialSource {
    /// Builds a source over `pool` for the table and attributes named in a
    /// validated configuration.
    pub fn new(config: &Config, pool: ReadPool) -> SpatialSource {
        let tile_sql = build_tile_query(&config.table, &config.geometry_column, &config.attributes);
        let extent_sql = build_extent_query(&config.table, &config.geometry_column);
        debug!(sql = %tile_sql, "composed tile query");

        SpatialSource {
            inner: Arc::new(Inner {
                pool,
                tile_sql,
                extent_sql,
                extent: Mutex::new(None),
            }),
        }
    }
}

#[async_trait]
impl TileSource for SpatialSource {
    async fn render_mvt(&self, coord: TileCoord) -> Result<Vec<u8>, QueryError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.render_blocking(coord)).await?
    }
}

impl Inner {
    fn render_blocking(&self, coord: TileCoord) -> Result<Vec<u8>, QueryError> {
        let session = self.pool.session()?;

        if !self.dataset_reaches(&session, &coord.envelope())? {
            debug!(tile = %coord, "tile outside dataset extent");
            return Ok(Vec::new());
        }

        let z = i32::from(coord.zoom());
        let x = coord.x() as i32;
        let y = coord.y() as i32;
        let tile = match session.query_row(&self.tile_sql, params![z, x, y], |row| {
            row.get::<_, Option<Vec<u8>>>(0)
        }) {
            Ok(Some(tile)) => tile,
            // An aggregate over zero candidate rows comes back as a NULL
            // value or no row at all; both mean "no features here".
            Ok(None) | Err(duckdb::Error::QueryReturnedNoRows) => Vec::new(),
            Err(e) => return Err(QueryError::Engine(e)),
        };

        debug!(tile = %coord, bytes = tile.len(), "rendered tile");
        Ok(tile)
    }

    /// Whether the requested envelope can contain any data at all.
    ///
    /// The dataset never changes while the server runs, so its bounding box
    /// is measured once on the first tile served and reused afterwards to
    /// skip rendering tiles that are disjoint from every feature.
    fn dataset_reaches(
        &self,
        session: &ReadSession,
        envelope: &TileBounds,
    ) -> Result<bool, QueryError> {
        let mut cached = self.extent.lock().unwrap_or_else(PoisonError::into_inner);
        let extent = match *cached {
            Some(extent) => extent,
            None => {
                let extent = query_extent(session, &self.extent_sql)?;
                debug!(?extent, "measured dataset extent");
                *cached = Some(extent);
                extent
            }
        };

        match extent {
            Some(extent) => Ok(extent.intersects(envelope)),
            None => Ok(false),
        }
    }
}

fn query_extent(session: &ReadSession, sql: &str) -> Result<Option<TileBounds>, QueryError> {
    let corners = session.query_row(sql, [], |row| {
        Ok((
            row.get::<_, Option<f64>>(0)?,
            row.get::<_, Option<f64>>(1)?,
            row.get::<_, Option<f64>>(2)?,
            row.get::<_, Option<f64>>(3)?,
        ))
    })?;

    Ok(match corners {
        (Some(west), Some(south), Some(east), Some(north)) => Some(TileBounds {
            west,
            south,
            east,
            north,
        }),
        _ => None,
    })
}

fn build_tile_query(table: &str, geometry_column: &str, attributes: &[TileAttribute]) -> String {
    let geom = quote_ident(geometry_column);
    let envelope = "ST_TileEnvelope($1, $2, $3)";
    let fields: Vec<String> = attributes
        .iter()
        .map(|attribute| format!("{}: {}", quote_ident(&attribute.key), attribute.expression))
        .collect();

    format!(
        "SELECT ST_AsMVT({{{fields}, \"geom\": ST_AsMVTGeom({geom}, ST_Extent({env}))}}) \
         FROM {table} WHERE ST_Intersects({geom}, {env})",
        fields = fields.join(", "),
        geom = geom,
        env = envelope,
        table = quote_ident(table),
    )
}

fn build_extent_query(table: &str, geometry_column: &str) -> String {
    let geom = quote_ident(geometry_column);
    format!(
        "SELECT min(ST_XMin({geom})), min(ST_YMin({geom})), \
         max(ST_XMax({geom})), max(ST_YMax({geom})) FROM {table}",
        geom = geom,
        table = quote_ident(table),
    )
}

/// Quotes an identifier for direct inclusion in statement text.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes a string literal for direct inclusion in statement text. Only
/// configuration values are ever spliced in this way; request values always
/// travel as bound parameters.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
