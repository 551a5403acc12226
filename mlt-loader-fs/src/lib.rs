//! Capability-based file helpers for tile inputs and report outputs.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io::{self, Read};
use std::path::Component;

/// Open the directory containing `path` and return it with the file name.
pub fn open_parent_dir(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("{path} does not name a file")))?
        .to_owned();
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, name))
}

/// Read a whole tile file into memory.
///
/// Fails with [`io::ErrorKind::InvalidInput`] when `path` exists but is not a
/// regular file.
pub fn read_tile_bytes(path: &Utf8Path) -> io::Result<Vec<u8>> {
    let (dir, name) = open_parent_dir(path)?;
    if !dir.metadata(name.as_str())?.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{path} is not a regular file"),
        ));
    }
    let mut file = dir.open(name.as_str())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Create (or truncate) `path`, creating missing parent directories first.
pub fn create_output_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
        let (root, relative) = split_root(parent)?;
        if !relative.as_str().is_empty() {
            root.create_dir_all(&relative)?;
        }
    }
    let (dir, name) = open_parent_dir(path)?;
    dir.create(name.as_str())
}

/// Split `path` into an ambient root directory and the path relative to it.
///
/// Absolute paths resolve from the filesystem root (or the drive prefix on
/// Windows); relative paths resolve from the current directory.
fn split_root(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();
    let root = match std_path.components().next() {
        Some(Component::Prefix(prefix)) => {
            let drive = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            Utf8PathBuf::from(format!("{drive}{}", std::path::MAIN_SEPARATOR))
        }
        Some(Component::RootDir) => Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string()),
        _ => Utf8PathBuf::from("."),
    };
    let relative = if root.as_str() == "." {
        path.to_path_buf()
    } else {
        path.strip_prefix(&root)
            .map_err(|_| io::Error::other(format!("cannot make {path} relative to {root}")))?
            .to_path_buf()
    };
    let dir = fs_utf8::Dir::open_ambient_dir(&root, ambient_authority())?;
    Ok((dir, relative))
}
