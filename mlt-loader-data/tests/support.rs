//! Temporary tile directories populated with JSON dumps.

use base64::{Engine as _, engine::general_purpose};
use camino::Utf8PathBuf;
use geo::{Geometry, LineString};
use geozero::{CoordDimensions, ToWkb};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

/// A temporary directory that owns the tile files written into it.
pub struct TileDir {
    _guard: TempDir,
    root: Utf8PathBuf,
}

impl TileDir {
    /// Create an empty directory.
    pub fn new() -> Self {
        let guard = TempDir::new().unwrap_or_else(|err| panic!("failed to create temp dir: {err}"));
        let root = Utf8PathBuf::from_path_buf(guard.path().to_path_buf())
            .unwrap_or_else(|path| panic!("temp dir {path:?} is not UTF-8"));
        Self {
            _guard: guard,
            root,
        }
    }

    /// Absolute path of `relative` inside the directory.
    pub fn path(&self, relative: &str) -> Utf8PathBuf {
        self.root.join(relative)
    }

    /// Write a dump with one `roads` layer holding `count` lines.
    pub fn write_roads(&self, relative: &str, count: u32) -> Utf8PathBuf {
        let features: Vec<_> = (0..count)
            .map(|index| {
                let start = f64::from(index);
                let line = LineString::from(vec![(start, 0.0), (start, 100.0)]);
                json!({
                    "id": index,
                    "geometry_type": "LineString",
                    "wkb": encode(line),
                    "properties": {"class": "primary", "lanes": index}
                })
            })
            .collect();
        let dump = json!({"layers": [{"name": "roads", "extent": 4096, "features": features}]});
        self.write(relative, dump.to_string().as_bytes())
    }

    /// Write raw bytes, creating parent directories.
    pub fn write(&self, relative: &str, bytes: &[u8]) -> Utf8PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .unwrap_or_else(|err| panic!("failed to create {parent}: {err}"));
        }
        fs::write(&path, bytes).unwrap_or_else(|err| panic!("failed to write {path}: {err}"));
        path
    }
}

fn encode(geometry: impl Into<Geometry<f64>>) -> String {
    let bytes = geometry
        .into()
        .to_wkb(CoordDimensions::xy())
        .unwrap_or_else(|err| panic!("failed to encode WKB fixture: {err}"));
    general_purpose::STANDARD.encode(bytes)
}
