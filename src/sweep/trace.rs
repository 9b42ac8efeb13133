//! Trace Enumeration

use std::path::{Path, PathBuf};

use super::error::BatchError;

/// One input workload; `name` (the file's base name) is the join key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub name: String,
    pub path: PathBuf,
}

impl Trace {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { name, path }
    }
}

/// List regular files in `dir`, sorted by path for a stable submission order
pub fn list_traces(dir: &Path) -> Result<Vec<Trace>, BatchError> {
    let enumerate_err = |source: std::io::Error| BatchError::Enumerate {
        dir: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(enumerate_err)? {
        let entry = entry.map_err(enumerate_err)?;
        let file_type = entry.file_type().map_err(enumerate_err)?;
        if file_type.is_dir() {
            continue;
        }
        paths.push(entry.path());
    }
    paths.sort();

    Ok(paths.into_iter().map(Trace::from_path).collect())
}
