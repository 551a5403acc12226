//! Test helpers for writing tile dumps and reading reports back.

use base64::{Engine as _, engine::general_purpose};
use camino::{Utf8Path, Utf8PathBuf};
use geo::{Geometry, LineString, Point, Rect, coord};
use geozero::{CoordDimensions, ToWkb};
use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;

/// Write `contents` to `path`, creating parent directories.
pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directories");
    }
    fs::write(path, contents).expect("write file");
}

/// A temporary directory with a UTF-8 root.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, relative: &str) -> Utf8PathBuf {
        self.root.join(relative)
    }

    /// Write a dump whose `buildings` layer mixes polygons and points.
    pub(super) fn write_buildings(&self, relative: &str) -> Utf8PathBuf {
        let footprint = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 64.0, y: 64.0 });
        let dump = json!({"layers": [{"name": "buildings", "features": [
            feature("Polygon", footprint.to_polygon(), json!({"height": 12})),
            feature("Point", Point::new(32.0, 32.0), json!({"height": 3.5})),
        ]}]});
        self.write_json(relative, &dump)
    }

    /// Write a dump with one `roads` line.
    pub(super) fn write_roads(&self, relative: &str) -> Utf8PathBuf {
        let line = LineString::from(vec![(0.0, 0.0), (4096.0, 4096.0)]);
        let dump = json!({"layers": [{"name": "roads", "features": [
            feature("LineString", line, json!({"class": "primary"})),
        ]}]});
        self.write_json(relative, &dump)
    }

    pub(super) fn write_json(&self, relative: &str, dump: &Value) -> Utf8PathBuf {
        let path = self.path(relative);
        write_utf8(&path, dump.to_string().as_bytes());
        path
    }
}

fn feature(tag: &str, geometry: impl Into<Geometry<f64>>, properties: Value) -> Value {
    let wkb = geometry
        .into()
        .to_wkb(CoordDimensions::xy())
        .expect("encode WKB");
    json!({
        "geometry_type": tag,
        "wkb": general_purpose::STANDARD.encode(wkb),
        "properties": properties,
    })
}

/// Parse captured report output.
pub(super) fn parse_report(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("report should be JSON")
}
