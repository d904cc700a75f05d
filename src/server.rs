//! The HTTP surface: a landing page and the tile endpoint.
//!
//! Error bodies are always empty. Malformed requests never reach the tile
//! source, and failures while rendering leave their detail in the log only.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{debug, error, instrument};

use crate::error::ValidationError;
use crate::tile::{TileCoord, MAX_ZOOM};
use crate::TileSource;

/// Content type of Mapbox Vector Tile payloads.
pub const MVT_CONTENT_TYPE: &str = "application/x-protobuf";

static INDEX_HTML: &str = include_str!("../assets/index.html");

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    source: Arc<dyn TileSource>,
}

impl AppState {
    pub fn new(source: Arc<dyn TileSource>) -> AppState {
        AppState { source }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/tiles/:z/:x/:y", get(render_tile))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[instrument(skip(state))]
async fn render_tile(
    State(state): State<AppState>,
    Path((z, x, y)): Path<(String, String, String)>,
) -> Response {
    let coord = match parse_tile_path(&z, &x, &y) {
        Ok(coord) => coord,
        Err(err) => {
            debug!(%err, "rejected tile request");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match state.source.render_mvt(coord).await {
        Ok(tile) => ([(header::CONTENT_TYPE, MVT_CONTENT_TYPE)], tile).into_response(),
        Err(err) => {
            error!(?err, tile = %coord, "tile query failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Parses `/tiles/{z}/{x}/{y}.pbf` path segments into a validated address.
fn parse_tile_path(z: &str, x: &str, y: &str) -> Result<TileCoord, ValidationError> {
    let zoom = parse_axis("z", z)?;
    if zoom > u32::from(MAX_ZOOM) {
        return Err(ValidationError::InvalidZoom(zoom));
    }
    let x = parse_axis("x", x)?;
    let y = y
        .strip_suffix(".pbf")
        .ok_or_else(|| ValidationError::Extension(y.to_string()))
        .and_then(|name| parse_axis("y", name))?;
    TileCoord::new(zoom as u8, x, y)
}

fn parse_axis(axis: &'static str, value: &str) -> Result<u32, ValidationError> {
    let reject = || ValidationError::NotAnInteger {
        axis,
        value: value.to_string(),
    };
    // Plain decimal digits only: no signs, no whitespace.
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(reject());
    }
    value.parse().map_err(|_| reject())
}
