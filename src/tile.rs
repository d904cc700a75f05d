//! Slippy-map tile addressing in EPSG:3857 web mercator.
//!
//! Tiles follow the XYZ convention: at zoom `z` the square mercator world is
//! split into `2^z x 2^z` tiles, with tile `(0, 0)` in the northwest corner
//! and `y` growing southward.

use std::f64::consts::PI;
use std::fmt;

use crate::error::ValidationError;

/// Highest zoom level accepted from clients.
pub const MAX_ZOOM: u8 = 30;

/// Mean equatorial radius of the WGS84 spheroid, in meters.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Half the side length of the square EPSG:3857 world, in meters.
pub const HALF_WORLD_M: f64 = PI * EARTH_RADIUS_M;

/// An axis-aligned bounding box in EPSG:3857 meters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl TileBounds {
    /// Whether two boxes share at least one point. Touching edges count as
    /// intersecting.
    pub fn intersects(&self, other: &TileBounds) -> bool {
        self.west <= other.east
            && other.west <= self.east
            && self.south <= other.north
            && other.south <= self.north
    }
}

/// Computes the EPSG:3857 envelope of an XYZ tile.
///
/// Edges shared between neighboring tiles evaluate from the same floating
/// point expression, so they are bit-identical: adjacent envelopes tile the
/// plane without gaps or overlaps, and a tile's envelope is exactly the
/// union of its four children one zoom level down.
pub fn get_epsg_3857_tile_bounds(zoom: u8, x: u32, y: u32) -> TileBounds {
    let tiles_across = 2_f64.powi(i32::from(zoom));
    let tile_size = (2.0 * HALF_WORLD_M) / tiles_across;

    TileBounds {
        west: -HALF_WORLD_M + f64::from(x) * tile_size,
        south: HALF_WORLD_M - (f64::from(y) + 1.0) * tile_size,
        east: -HALF_WORLD_M + (f64::from(x) + 1.0) * tile_size,
        north: HALF_WORLD_M - f64::from(y) * tile_size,
    }
}

/// A validated XYZ tile address.
///
/// Construction enforces `z <= MAX_ZOOM` and `x, y < 2^z`, so a value of
/// this type always names a tile that exists in the pyramid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileCoord {
    z: u8,
    x: u32,
    y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Result<TileCoord, ValidationError> {
        if z > MAX_ZOOM {
            return Err(ValidationError::InvalidZoom(u32::from(z)));
        }
        let tiles_across = 1_u32 << z;
        if x >= tiles_across {
            return Err(ValidationError::OutOfRange {
                axis: "x",
                value: x,
                zoom: z,
            });
        }
        if y >= tiles_across {
            return Err(ValidationError::OutOfRange {
                axis: "y",
                value: y,
                zoom: z,
            });
        }
        Ok(TileCoord { z, x, y })
    }

    pub fn zoom(&self) -> u8 {
        self.z
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    /// The envelope this tile covers, in EPSG:3857 meters.
    pub fn envelope(&self) -> TileBounds {
        get_epsg_3857_tile_bounds(self.z, self.x, self.y)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use assert_approx_eq::assert_approx_eq;
    use proptest::prelude::*;

    use super::*;

    fn lon_to_mercator_x(lon: f64) -> f64 {
        lon / 180.0 * HALF_WORLD_M
    }

    fn lat_to_mercator_y(lat: f64) -> f64 {
        EARTH_RADIUS_M * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln()
    }

    #[test]
    fn zoom_zero_covers_the_world() {
        let bounds = get_epsg_3857_tile_bounds(0, 0, 0);
        assert_eq!(-HALF_WORLD_M, bounds.west);
        assert_eq!(-HALF_WORLD_M, bounds.south);
        assert_eq!(HALF_WORLD_M, bounds.east);
        assert_eq!(HALF_WORLD_M, bounds.north);
    }

    #[test]
    fn zoom_one_splits_into_quadrants() {
        let nw = get_epsg_3857_tile_bounds(1, 0, 0);
        assert_eq!(-HALF_WORLD_M, nw.west);
        assert_eq!(0.0, nw.south);
        assert_eq!(0.0, nw.east);
        assert_eq!(HALF_WORLD_M, nw.north);

        let se = get_epsg_3857_tile_bounds(1, 1, 1);
        assert_eq!(0.0, se.west);
        assert_eq!(-HALF_WORLD_M, se.south);
        assert_eq!(HALF_WORLD_M, se.east);
        assert_eq!(0.0, se.north);
    }

    #[test]
    fn corners_match_slippy_map_tilenames() {
        // tile2lonlat reports the northwest corner of a tile.
        let (lon, lat) = slippy_map_tilenames::tile2lonlat(131, 83, 8);
        let bounds = get_epsg_3857_tile_bounds(8, 131, 83);
        assert_approx_eq!(lon_to_mercator_x(lon), bounds.west, 1e-6);
        assert_approx_eq!(lat_to_mercator_y(lat), bounds.north, 1e-6);
    }

    #[test]
    fn envelope_center_round_trips_through_tile_indexing() {
        let bounds = get_epsg_3857_tile_bounds(10, 551, 341);
        let center_lon = (bounds.west + bounds.east) / 2.0 / HALF_WORLD_M * 180.0;
        let center_y = (bounds.south + bounds.north) / 2.0;
        let center_lat = (2.0 * (center_y / EARTH_RADIUS_M).exp().atan() - PI / 2.0).to_degrees();
        assert_eq!(
            (551, 341),
            slippy_map_tilenames::lonlat2tile(center_lon, center_lat, 10)
        );
    }

    #[test]
    fn envelopes_stay_non_degenerate_at_max_zoom() {
        let bounds = get_epsg_3857_tile_bounds(MAX_ZOOM, 536_870_911, 5);
        assert!(bounds.west < bounds.east);
        assert!(bounds.south < bounds.north);
    }

    #[test]
    fn intersects_counts_shared_edges() {
        let here = get_epsg_3857_tile_bounds(3, 2, 2);
        let touching = get_epsg_3857_tile_bounds(3, 3, 2);
        let far = get_epsg_3857_tile_bounds(3, 6, 2);
        let world = get_epsg_3857_tile_bounds(0, 0, 0);

        assert!(here.intersects(&touching));
        assert!(touching.intersects(&here));
        assert!(here.intersects(&here));
        assert!(world.intersects(&here));
        assert!(!here.intersects(&far));
    }

    #[test]
    fn tile_coord_rejects_addresses_outside_the_pyramid() {
        assert!(TileCoord::new(0, 0, 0).is_ok());
        assert!(TileCoord::new(2, 3, 3).is_ok());
        assert!(matches!(
            TileCoord::new(2, 4, 0),
            Err(ValidationError::OutOfRange { axis: "x", .. })
        ));
        assert!(matches!(
            TileCoord::new(2, 0, 4),
            Err(ValidationError::OutOfRange { axis: "y", .. })
        ));
        assert!(matches!(
            TileCoord::new(31, 0, 0),
            Err(ValidationError::InvalidZoom(31))
        ));
    }

    #[test]
    fn tile_coord_displays_as_z_x_y() {
        let coord = TileCoord::new(8, 131, 83).unwrap();
        assert_eq!("8/131/83", coord.to_string());
        assert_eq!(8, coord.zoom());
        assert_eq!(131, coord.x());
        assert_eq!(83, coord.y());
    }

    proptest! {
        #[test]
        fn neighbors_share_edges_exactly(z in 1u8..=22, x_seed in 0u32.., y_seed in 0u32..) {
            let tiles_across = 1_u32 << z;
            let x = x_seed % (tiles_across - 1);
            let y = y_seed % tiles_across;

            let here = get_epsg_3857_tile_bounds(z, x, y);
            let east_neighbor = get_epsg_3857_tile_bounds(z, x + 1, y);

            prop_assert_eq!(here.east, east_neighbor.west);
            prop_assert_eq!(here.north, east_neighbor.north);
            prop_assert_eq!(here.south, east_neighbor.south);
        }

        #[test]
        fn children_tile_their_parent_exactly(z in 0u8..=21, x_seed in 0u32.., y_seed in 0u32..) {
            let tiles_across = 1_u32 << z;
            let x = x_seed % tiles_across;
            let y = y_seed % tiles_across;

            let parent = get_epsg_3857_tile_bounds(z, x, y);
            let nw_child = get_epsg_3857_tile_bounds(z + 1, 2 * x, 2 * y);
            let se_child = get_epsg_3857_tile_bounds(z + 1, 2 * x + 1, 2 * y + 1);

            prop_assert_eq!(parent.west, nw_child.west);
            prop_assert_eq!(parent.north, nw_child.north);
            prop_assert_eq!(parent.east, se_child.east);
            prop_assert_eq!(parent.south, se_child.south);
            // The seam between the four children falls on a single shared line.
            prop_assert_eq!(nw_child.east, se_child.west);
            prop_assert_eq!(nw_child.south, se_child.north);
        }

        #[test]
        fn envelopes_are_ordered(z in 0u8..=22, x_seed in 0u32.., y_seed in 0u32..) {
            let tiles_across = 1_u32 << z;
            let bounds = get_epsg_3857_tile_bounds(z, x_seed % tiles_across, y_seed % tiles_across);

            prop_assert!(bounds.west < bounds.east);
            prop_assert!(bounds.south < bounds.north);
            prop_assert!(bounds.west >= -HALF_WORLD_M && bounds.east <= HALF_WORLD_M);
            prop_assert!(bounds.south >= -HALF_WORLD_M && bounds.north <= HALF_WORLD_M);
        }
    }
}
