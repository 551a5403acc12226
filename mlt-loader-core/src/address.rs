//! Tile pyramid addresses and their placement in Web Mercator.
//!
//! Tiles carry coordinates on a local grid (`0..extent` on both axes, y
//! growing downwards). A [`TileAddress`] pins that grid to a square of the
//! EPSG:3857 plane, and [`compute_transform`] returns the affine mapping
//! between the two.
//!
//! # Examples
//! ```
//! use mlt_loader_core::{TileScheme, parse_address};
//!
//! let address = parse_address("tiles/14_8297_10749.mlt").expect("address in file name");
//! assert_eq!((address.zoom(), address.column(), address.row()), (14, 8297, 10749));
//! assert_eq!(address.scheme(), TileScheme::Tms);
//! ```

use std::f64::consts::PI;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use geo::AffineTransform;
use log::debug;
use regex::Regex;
use thiserror::Error;

/// Deepest zoom level a tile address may use.
pub const MAX_ZOOM: u8 = 30;

/// Tile-local grid size used when a layer does not declare its own.
pub const DEFAULT_EXTENT: u32 = 4096;

/// Equatorial radius of the WGS84 ellipsoid, the sphere used by EPSG:3857.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// `Z_X_Y` or `Z-X-Y` anywhere in a file stem, with a one or two digit zoom.
#[expect(
    clippy::expect_used,
    reason = "the pattern is a literal and is covered by unit tests"
)]
static STEM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})[_\-](\d+)[_\-](\d+)").expect("tile stem pattern compiles")
});

/// Row-axis convention of a tile pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TileScheme {
    /// Row 0 is the southernmost tile (OpenMapTiles, MBTiles, TileJSON).
    #[default]
    Tms,
    /// Row 0 is the northernmost tile (OSM slippy maps).
    Xyz,
}

impl TileScheme {
    /// Return the scheme as a lowercase `&str`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tms => "tms",
            Self::Xyz => "xyz",
        }
    }
}

impl std::fmt::Display for TileScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TileScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tms" => Ok(Self::Tms),
            "xyz" => Ok(Self::Xyz),
            _ => Err(format!("unknown tile scheme '{s}'")),
        }
    }
}

/// Errors returned by [`TileAddress::new`] and by parsing `z/x/y` text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileAddressError {
    /// The zoom level exceeds [`MAX_ZOOM`].
    #[error("zoom {zoom} is outside 0..={max}", max = MAX_ZOOM)]
    ZoomOutOfRange {
        /// Rejected zoom level.
        zoom: u32,
    },
    /// The column does not exist at this zoom level.
    #[error("column {column} is outside 0..{limit} at zoom {zoom}")]
    ColumnOutOfRange {
        /// Rejected column.
        column: u32,
        /// Zoom level of the address.
        zoom: u8,
        /// Number of columns at this zoom level.
        limit: u32,
    },
    /// The row does not exist at this zoom level.
    #[error("row {row} is outside 0..{limit} at zoom {zoom}")]
    RowOutOfRange {
        /// Rejected row.
        row: u32,
        /// Zoom level of the address.
        zoom: u8,
        /// Number of rows at this zoom level.
        limit: u32,
    },
    /// The text was not of the form `z/x/y`.
    #[error("expected a tile address of the form z/x/y, found '{input}'")]
    Malformed {
        /// Text that failed to parse.
        input: String,
    },
}

/// Position of a tile in the zoom/column/row pyramid.
///
/// Values are validated on construction and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TileAddress {
    zoom: u8,
    column: u32,
    row: u32,
    scheme: TileScheme,
}

impl TileAddress {
    /// Validates and constructs a [`TileAddress`].
    ///
    /// # Errors
    /// Returns [`TileAddressError`] when the zoom exceeds [`MAX_ZOOM`] or the
    /// column or row does not exist at that zoom.
    ///
    /// # Examples
    /// ```
    /// use mlt_loader_core::{TileAddress, TileScheme};
    ///
    /// assert!(TileAddress::new(2, 3, 3, TileScheme::Xyz).is_ok());
    /// assert!(TileAddress::new(2, 4, 0, TileScheme::Xyz).is_err());
    /// ```
    pub fn new(
        zoom: u32,
        column: u32,
        row: u32,
        scheme: TileScheme,
    ) -> Result<Self, TileAddressError> {
        let level = u8::try_from(zoom)
            .ok()
            .filter(|z| *z <= MAX_ZOOM)
            .ok_or(TileAddressError::ZoomOutOfRange { zoom })?;
        let limit = 1_u32 << level;
        if column >= limit {
            return Err(TileAddressError::ColumnOutOfRange {
                column,
                zoom: level,
                limit,
            });
        }
        if row >= limit {
            return Err(TileAddressError::RowOutOfRange {
                row,
                zoom: level,
                limit,
            });
        }
        Ok(Self {
            zoom: level,
            column,
            row,
            scheme,
        })
    }

    /// Zoom level.
    #[must_use]
    pub const fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Column (x) index.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Row (y) index, in this address's [`TileScheme`].
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Row-axis convention the row is expressed in.
    #[must_use]
    pub const fn scheme(&self) -> TileScheme {
        self.scheme
    }

    /// Return the same tile indices interpreted under another convention.
    #[must_use]
    pub const fn with_scheme(self, scheme: TileScheme) -> Self {
        Self { scheme, ..self }
    }

    /// Number of tiles along each axis at this zoom level.
    #[must_use]
    pub const fn tiles_per_axis(&self) -> u32 {
        1 << self.zoom
    }

    /// Row counted from the north edge, whatever the scheme.
    #[must_use]
    pub const fn xyz_row(&self) -> u32 {
        match self.scheme {
            TileScheme::Tms => self.tiles_per_axis() - 1 - self.row,
            TileScheme::Xyz => self.row,
        }
    }
}

impl std::fmt::Display for TileAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.column, self.row)
    }
}

impl FromStr for TileAddress {
    type Err = TileAddressError;

    /// Parse `z/x/y` in the default [`TileScheme`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/').map(str::parse::<u32>);
        let (Some(Ok(zoom)), Some(Ok(column)), Some(Ok(row)), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TileAddressError::Malformed {
                input: s.to_owned(),
            });
        };
        Self::new(zoom, column, row, TileScheme::default())
    }
}

/// Guess a tile address from a file path.
///
/// Recognises, in priority order:
/// - a file stem containing `Z_X_Y` or `Z-X-Y` with a one or two digit zoom
///   (`14_8297_10749.mlt`, `tile-3-4-5.mlt`);
/// - a `.../Z/X/Y.ext` directory hierarchy.
///
/// The result uses the default [`TileScheme`]; callers override it with
/// [`TileAddress::with_scheme`]. Returns `None` when neither pattern yields a
/// valid address.
///
/// # Examples
/// ```
/// use mlt_loader_core::parse_address;
///
/// let nested = parse_address("tiles/14/8297/10749.mlt").expect("hierarchy");
/// assert_eq!(nested.to_string(), "14/8297/10749");
/// assert!(parse_address("random.mlt").is_none());
/// ```
#[must_use]
pub fn parse_address(path: &str) -> Option<TileAddress> {
    let path = Path::new(path);
    let stem = path.file_stem()?.to_str()?;
    from_stem(stem).or_else(|| from_hierarchy(path, stem))
}

fn from_stem(stem: &str) -> Option<TileAddress> {
    let captures = STEM_PATTERN.captures(stem)?;
    let number = |index: usize| captures.get(index)?.as_str().parse::<u32>().ok();
    let (zoom, column, row) = (number(1)?, number(2)?, number(3)?);
    validated(zoom, column, row)
}

fn from_hierarchy(path: &Path, stem: &str) -> Option<TileAddress> {
    let row = stem.parse::<u32>().ok()?;
    let column_dir = path.parent()?;
    let column = column_dir.file_name()?.to_str()?.parse::<u32>().ok()?;
    let zoom = column_dir.parent()?.file_name()?.to_str()?.parse::<u32>().ok()?;
    validated(zoom, column, row)
}

fn validated(zoom: u32, column: u32, row: u32) -> Option<TileAddress> {
    TileAddress::new(zoom, column, row, TileScheme::default())
        .inspect_err(|err| debug!("Ignoring tile address candidate {zoom}/{column}/{row}: {err}"))
        .ok()
}

/// Affine transform from a tile's local grid to EPSG:3857 metres.
///
/// `extent` is the size of the local grid; the tile's north-west corner maps
/// to local `(0, 0)` and local y grows southwards, so the y scale is
/// negative. An `extent` of zero is treated as one.
///
/// # Examples
/// ```
/// use geo::{AffineOps, Point};
/// use mlt_loader_core::{TileAddress, TileScheme, compute_transform};
///
/// let world = TileAddress::new(0, 0, 0, TileScheme::Xyz).expect("valid address");
/// let transform = compute_transform(&world, 4096);
/// let centre = Point::new(2048.0, 2048.0).affine_transform(&transform);
/// assert!(centre.x().abs() < 1e-6 && centre.y().abs() < 1e-6);
/// ```
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "projection maths operates on floating-point metres"
)]
pub fn compute_transform(address: &TileAddress, extent: u32) -> AffineTransform<f64> {
    let circumference = 2.0 * PI * EARTH_RADIUS_M;
    let half = circumference / 2.0;
    let tile_size = circumference / f64::from(address.tiles_per_axis());
    let scale = tile_size / f64::from(extent.max(1));

    let x_origin = f64::from(address.column()) * tile_size - half;
    let y_origin = half - f64::from(address.xyz_row()) * tile_size;

    AffineTransform::new(scale, 0.0, x_origin, 0.0, -scale, y_origin)
}
